use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    /// Process-local store and auth, for development and tests.
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendKind,
    pub supabase_url: String,
    pub supabase_key: String,
    pub allowed_origin: Option<String>,
    pub secure_cookies: bool,
    pub http_timeout: Duration,
    pub dev_admin: Option<Credentials>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let backend: BackendKind = try_load("GAROON_BACKEND", "supabase")?;

        let (supabase_url, supabase_key) = match backend {
            BackendKind::Supabase => (
                var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                var("SUPABASE_ANON_KEY")
                    .or_else(|| read_secret("SUPABASE_ANON_KEY"))
                    .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            ),
            BackendKind::Memory => (String::new(), String::new()),
        };

        let dev_admin = match (
            var("GAROON_DEV_ADMIN_EMAIL"),
            var("GAROON_DEV_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            backend,
            supabase_url,
            supabase_key,
            allowed_origin: var("GAROON_ALLOWED_ORIGIN"),
            secure_cookies: try_load("GAROON_SECURE_COOKIES", "true")?,
            http_timeout: Duration::from_millis(try_load("GAROON_HTTP_TIMEOUT_MS", "10000")?),
            dev_admin,
        })
    }

    /// Memory backend on an ephemeral port with plain-HTTP cookies.
    pub fn memory() -> Self {
        Self {
            port: 0,
            backend: BackendKind::Memory,
            supabase_url: String::new(),
            supabase_key: String::new(),
            allowed_origin: None,
            secure_cookies: false,
            http_timeout: Duration::from_secs(10),
            dev_admin: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind() {
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert_eq!(" Supabase ".parse::<BackendKind>(), Ok(BackendKind::Supabase));
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_memory_config() {
        let config = Config::memory();

        assert_eq!(config.backend, BackendKind::Memory);
        assert!(!config.secure_cookies);
        assert!(config.dev_admin.is_none());
    }
}
