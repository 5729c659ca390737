use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pe_adapters::http_client::ReqwestHttpClient;
use pe_cache::memory::InMemoryCache;
use pe_cache::redis_cache::RedisCache;
use pe_cache::Cache;
use pe_core::error::CoreResult;
use pe_core::integration_manager::{RefreshedToken, TokenRefresher};
use pe_core::{ContextMapper, ErrorHandler, IntegrationManager, PluginEngineBuilder, Scheduler};
use pe_models::{Integration, WebhookSubscription};
use pe_store::memory::InMemoryStore;
use pe_store::postgres::PostgresStore;
use pe_store::Store;
use pe_webhooks::{RenewalSweeper, RenewedSubscription, SubscriptionRenewer, WebhookIngestor};

use plugin_engine_api::config::{is_development, load_settings};
use plugin_engine_api::{build_router, sweep, AppContext};

/// A renewal strategy that simulates a successful provider renewal (every
/// adapter in this workspace simulates success per the explicit Non-goal on
/// real provider calls — §9).
struct SimulatedRenewer;

#[async_trait]
impl SubscriptionRenewer for SimulatedRenewer {
    async fn renew(&self, subscription: &WebhookSubscription) -> CoreResult<RenewedSubscription> {
        Ok(RenewedSubscription {
            subscription_id: pe_adapters::support::synthetic_id("sub"),
            expires_at: Some(Utc::now() + chrono::Duration::days(7)),
        })
    }
}

/// A refresh strategy that simulates a successful token exchange: every
/// adapter in this workspace simulates provider calls per the explicit
/// Non-goal on real OAuth flows (§9), so refresh just mints a fresh 1h
/// token and carries the stored refresh token forward unchanged.
struct SimulatedTokenRefresher;

#[async_trait]
impl TokenRefresher for SimulatedTokenRefresher {
    async fn refresh(&self, integration: &Integration) -> CoreResult<RefreshedToken> {
        Ok(RefreshedToken {
            access_token: pe_adapters::support::synthetic_id("tok"),
            refresh_token: integration.refresh_token.clone(),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "plugin-engine-api", about = "Plugin Engine HTTP server")]
struct Cli {
    /// Override the listen address (defaults to config/env).
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let settings = Arc::new(load_settings()?);

    let (store, cache): (Arc<dyn Store>, Arc<dyn Cache>) = if is_development() {
        info!("PLUGIN_ENGINE_ENV=development: using in-memory Store/Cache");
        (Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new()))
    } else {
        let database_url = settings
            .database
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required outside development mode"))?;
        let redis_url = settings
            .cache
            .redis_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("REDIS_URL is required outside development mode"))?;
        (
            Arc::new(PostgresStore::connect(database_url).await?),
            Arc::new(RedisCache::connect(redis_url).await?),
        )
    };

    let mut integration_manager = IntegrationManager::new(store.clone(), cache.clone());
    for tool in ["gmail", "notion", "slack", "asana", "trello", "taskmaster"] {
        integration_manager.register_refresher(tool, Arc::new(SimulatedTokenRefresher));
    }
    let integration_manager = Arc::new(integration_manager);
    let error_handler = Arc::new(ErrorHandler::load(store.clone(), cache.clone()).await?);
    let scheduler = Arc::new(Scheduler::new(store.clone(), cache.clone()));
    let context_mapper = Arc::new(ContextMapper::new(store.clone(), cache.clone()));
    let webhook_ingestor = Arc::new(WebhookIngestor::new(store.clone()));

    let mut renewal_sweeper = RenewalSweeper::new(store.clone(), integration_manager.clone());
    for provider in ["gmail", "slack", "asana"] {
        renewal_sweeper.register_renewer(provider, Arc::new(SimulatedRenewer));
    }
    let renewal_sweeper = Arc::new(renewal_sweeper);

    let http_client = Arc::new(ReqwestHttpClient::new());
    let adapters = pe_adapters::build_default_registry(integration_manager.clone(), http_client);
    let mut builder = PluginEngineBuilder::new();
    for adapter in adapters {
        builder = builder.register_adapter(adapter);
    }
    let engine = Arc::new(builder.build(error_handler.clone(), scheduler.clone(), cache.clone()));

    let ctx = AppContext {
        engine,
        integration_manager,
        error_handler,
        scheduler,
        context_mapper,
        webhook_ingestor,
        renewal_sweeper,
        store,
        cache,
        settings: settings.clone(),
    };

    let shutdown = CancellationToken::new();
    let task_sweep = tokio::spawn(sweep::run_task_sweep(ctx.clone(), shutdown.clone()));
    let renewal_sweep = tokio::spawn(sweep::run_renewal_sweep(ctx.clone(), shutdown.clone()));

    let addr = cli.bind.unwrap_or_else(|| settings.server.address());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "plugin-engine-api listening");

    let router = build_router(ctx);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    let _ = tokio::join!(task_sweep, renewal_sweep);

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
    token.cancel();
}
