pub mod adapters;
pub mod context_mappings;
pub mod cron;
pub mod integrations;
pub mod intents;
pub mod tasks;
pub mod webhooks;
