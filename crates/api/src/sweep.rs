//! Background sweepers (§5): the due-task sweep and the webhook-subscription
//! renewal loop run as their own `tokio::spawn`'d long-lived tasks, gated by
//! the same cancellation token as the HTTP server's graceful shutdown.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::state::AppContext;

const TASK_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
const RENEWAL_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Pulls and executes due scheduled tasks on a fixed interval, exiting
/// cleanly when `token` is cancelled — never mid-claim (§5).
pub async fn run_task_sweep(ctx: AppContext, token: CancellationToken) {
    let mut interval = tokio::time::interval(TASK_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("task sweep shutting down");
                return;
            }
            _ = interval.tick() => {
                match ctx.engine.process_due_tasks(None).await {
                    Ok(tasks) if !tasks.is_empty() => info!(count = tasks.len(), "processed due tasks"),
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "task sweep iteration failed"),
                }
            }
        }
    }
}

/// Renews webhook subscriptions nearing expiry or previously in error, on a
/// fixed interval (§4.7).
pub async fn run_renewal_sweep(ctx: AppContext, token: CancellationToken) {
    let mut interval = tokio::time::interval(RENEWAL_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("renewal sweep shutting down");
                return;
            }
            _ = interval.tick() => {
                match ctx.renewal_sweeper.run_once(Utc::now()).await {
                    Ok(renewed) if renewed > 0 => info!(renewed, "renewed webhook subscriptions"),
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "renewal sweep iteration failed"),
                }
            }
        }
    }
}
