//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;

use payments_hex::{OrphanIntentPolicy, Timeouts};
use payments_repo::PoolSettings;

/// Stripe account settings. Present only when a secret key is configured.
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub webhook_tolerance_secs: i64,
}

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub pool: PoolSettings,
    pub stripe: Option<StripeSettings>,
    pub rate_limit_per_minute: u32,
    /// Key rate limits on `X-Forwarded-For` rather than the peer address
    pub trust_forwarded_for: bool,
    pub orphan_policy: OrphanIntentPolicy,
    pub timeouts: Timeouts,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`; unset and blank values are
    /// treated the same.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&var, "PORT", 8080)?;
        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => compose_database_url(&var)?,
        };

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&var, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            max_lifetime: Duration::from_secs(parse_or(
                &var,
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime.as_secs(),
            )?),
            acquire_timeout: Duration::from_secs(parse_or(
                &var,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
        };

        let stripe = match var("STRIPE_SECRET_KEY") {
            Some(secret_key) => Some(StripeSettings {
                secret_key,
                webhook_secret: var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                api_base: var("STRIPE_API_BASE")
                    .unwrap_or_else(|| "https://api.stripe.com".to_string()),
                webhook_tolerance_secs: parse_or(&var, "STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            }),
            None => None,
        };

        let orphan_policy = match var("ORPHAN_INTENT_POLICY") {
            Some(raw) => raw
                .parse::<OrphanIntentPolicy>()
                .map_err(|e| anyhow::anyhow!("ORPHAN_INTENT_POLICY: {}", e))?,
            None => OrphanIntentPolicy::default(),
        };

        let default_timeouts = Timeouts::default();
        let millis = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            parse_or(&var, key, default.as_millis() as u64).map(Duration::from_millis)
        };
        let timeouts = Timeouts {
            intent: millis("INTENT_TIMEOUT_MS", default_timeouts.intent)?,
            charge: millis("CHARGE_TIMEOUT_MS", default_timeouts.charge)?,
            webhook: millis("WEBHOOK_TIMEOUT_MS", default_timeouts.webhook)?,
            storage: millis("STORAGE_TIMEOUT_MS", default_timeouts.storage)?,
        };

        Ok(Self {
            port,
            database_url,
            pool,
            stripe,
            rate_limit_per_minute: parse_or(&var, "RATE_LIMIT_PER_MINUTE", 100)?,
            trust_forwarded_for: parse_or(&var, "RATE_LIMIT_TRUST_FORWARDED_FOR", false)?,
            orphan_policy,
            timeouts,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

/// Builds a PostgreSQL URL from the individual `DB_*` variables. User,
/// password and database name are percent-encoded.
fn compose_database_url(var: &impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let required = |key: &str| {
        var(key).ok_or_else(|| {
            anyhow::anyhow!("either DATABASE_URL or {} environment variable is required", key)
        })
    };
    let user = required("DB_USER")?;
    let name = required("DB_NAME")?;

    let host = var("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = var("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let mut url = Url::parse(&format!("postgres://{}:{}", host, port))
        .with_context(|| format!("DB_HOST '{}' and DB_PORT '{}' do not form a URL", host, port))?;

    url.set_username(&user)
        .map_err(|_| anyhow::anyhow!("DB_USER cannot be used in a URL"))?;
    if let Some(password) = var("DB_PASSWORD") {
        url.set_password(Some(&password))
            .map_err(|_| anyhow::anyhow!("DB_PASSWORD cannot be used in a URL"))?;
    }
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("DB_HOST '{}' cannot carry a database name", host))?
        .push(&name);
    url.query_pairs_mut().append_pair(
        "sslmode",
        &var("SSL_MODE").unwrap_or_else(|| "disable".to_string()),
    );

    Ok(url.to_string())
}

/// The database URL with any password replaced, for logging.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}
