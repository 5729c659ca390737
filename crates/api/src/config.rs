//! Layered configuration (§6 "Environment"): defaults, then an optional
//! config file, then environment variables, following the teacher's
//! `control::config::Settings` shape modernized to the `config` crate's
//! builder API.

use serde::Deserialize;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL the engine is reachable at, used to construct OAuth
    /// callback and webhook subscription endpoints.
    pub app_url: String,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
}

/// Header-based guards for the two operator-only endpoints (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct GuardSettings {
    pub cron_secret_token: String,
    pub webhook_refresh_api_key: String,
}

/// Per-provider webhook signing secrets (§4.7).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSettings {
    pub slack_signing_secret: Option<String>,
    pub asana_webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub guards: GuardSettings,
    #[serde(default)]
    pub webhooks: WebhookSettings,
}

/// `PLUGIN_ENGINE_ENV=development` selects in-memory Store/Cache doubles
/// (renamed from the source's `NODE_ENV`, same semantics — §6).
pub fn is_development() -> bool {
    std::env::var("PLUGIN_ENGINE_ENV").as_deref() == Ok("development")
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("server.host", default_host())?
        .set_default("server.port", default_port() as i64)?
        .set_default("server.app_url", "http://localhost:8080")?
        .set_default("guards.cron_secret_token", "development-cron-secret")?
        .set_default("guards.webhook_refresh_api_key", "development-webhook-key")?
        .add_source(
            config::Environment::default()
                .prefix("PLUGIN_ENGINE")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("database.database_url", std::env::var("DATABASE_URL").ok())?
        .set_override_option("cache.redis_url", std::env::var("REDIS_URL").ok())?
        .set_override_option("server.app_url", std::env::var("APP_URL").ok())?
        .set_override_option("guards.cron_secret_token", std::env::var("CRON_SECRET_TOKEN").ok())?
        .set_override_option(
            "guards.webhook_refresh_api_key",
            std::env::var("WEBHOOK_REFRESH_API_KEY").ok(),
        )?
        .set_override_option(
            "webhooks.slack_signing_secret",
            std::env::var("SLACK_SIGNING_SECRET").ok(),
        )?
        .set_override_option(
            "webhooks.asana_webhook_secret",
            std::env::var("ASANA_WEBHOOK_SECRET").ok(),
        )?
        .build()?;

    config.try_deserialize()
}
