use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SLOT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: String,
    pub slot_lock_timeout_ms: u64,
    pub seed_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            slot_lock_timeout_ms: Self::parse_lock_timeout(env::var("SLOT_LOCK_TIMEOUT_MS").ok()),
            seed_file: env::var("SEED_FILE").ok().filter(|path| !path.trim().is_empty()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    fn parse_lock_timeout(raw: Option<String>) -> u64 {
        match raw {
            None => DEFAULT_SLOT_LOCK_TIMEOUT_MS,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    warn!("SLOT_LOCK_TIMEOUT_MS={:?} is not a positive integer, using default", value);
                    DEFAULT_SLOT_LOCK_TIMEOUT_MS
                }
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn slot_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.slot_lock_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            slot_lock_timeout_ms: DEFAULT_SLOT_LOCK_TIMEOUT_MS,
            seed_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_falls_back_on_garbage() {
        assert_eq!(AppConfig::parse_lock_timeout(None), DEFAULT_SLOT_LOCK_TIMEOUT_MS);
        assert_eq!(AppConfig::parse_lock_timeout(Some("250".into())), 250);
        assert_eq!(AppConfig::parse_lock_timeout(Some("0".into())), DEFAULT_SLOT_LOCK_TIMEOUT_MS);
        assert_eq!(AppConfig::parse_lock_timeout(Some("soon".into())), DEFAULT_SLOT_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn unconfigured_without_secret() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.slot_lock_timeout(), Duration::from_millis(5_000));
    }
}
