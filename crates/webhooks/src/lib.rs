//! Webhook ingestion and subscription renewal (§4.7): provider signature
//! verification, ack-before-process event persistence, and the renewal
//! sweep that keeps provider subscriptions from lapsing.

pub mod ingest;
pub mod renewal;
pub mod signature;

pub use ingest::{IngestError, IngestOutcome, WebhookIngestor};
pub use renewal::{RenewalSweeper, RenewedSubscription, SubscriptionRenewer};
pub use signature::SignatureError;
