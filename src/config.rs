use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("LINKTRACE_GEO_TIMEOUT_MS must be greater than zero")]
    ZeroTimeout,
    #[error("LINKTRACE_WORKER_QUEUE must be greater than zero")]
    ZeroQueue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // HTTP settings
    pub listen_addr: String,
    pub public_url: Option<String>,
    pub admin_token: Option<String>,
    pub default_template: String,

    // Storage; in-memory when unset
    pub db_path: Option<String>,

    // Geo resolution
    pub abstractapi_key: Option<String>,
    pub geo_timeout_ms: u64,

    // Reverse geocoding
    pub reverse_geocoding_enabled: bool,
    pub nominatim_url: Option<String>,
    pub worker_queue: usize,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            public_url: None,
            admin_token: None,
            default_template: "news".to_string(),
            db_path: None,
            abstractapi_key: None,
            geo_timeout_ms: 3000,
            reverse_geocoding_enabled: true,
            nominatim_url: None,
            worker_queue: 256,
            debug: false,
        }
    }
}

impl Config {
    /// Build a config from a variable lookup. `load_config` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        // Blank values count as unset
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str, default: bool| {
            var(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        let listen_addr = var("LINKTRACE_LISTEN_ADDR")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{}", port)))
            .unwrap_or(defaults.listen_addr);

        let geo_timeout_ms = var("LINKTRACE_GEO_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.geo_timeout_ms);

        let worker_queue = var("LINKTRACE_WORKER_QUEUE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.worker_queue);

        Config {
            listen_addr,
            public_url: var("LINKTRACE_PUBLIC_URL"),
            admin_token: var("LINKTRACE_ADMIN_TOKEN"),
            default_template: var("LINKTRACE_DEFAULT_TEMPLATE").unwrap_or(defaults.default_template),
            db_path: var("LINKTRACE_DB_PATH"),
            abstractapi_key: var("LINKTRACE_ABSTRACTAPI_KEY").or_else(|| var("ABSTRACTAPI_KEY")),
            geo_timeout_ms,
            reverse_geocoding_enabled: flag(
                "LINKTRACE_REVERSE_GEOCODING_ENABLED",
                defaults.reverse_geocoding_enabled,
            ),
            nominatim_url: var("LINKTRACE_NOMINATIM_URL"),
            worker_queue,
            debug: lookup("DEBUG").is_some(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geo_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.worker_queue == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        Ok(())
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let cfg = Config::from_lookup(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}
