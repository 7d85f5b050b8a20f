//! Configuration for the bot and the two currency services.
//!
//! Values come from the environment, after `.env` has been loaded with
//! `dotenv` by the binary.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::localization::DEFAULT_LANGUAGE;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CURRENCY_MANAGER_URL: &str = "http://localhost:5001";
pub const DEFAULT_DATA_MANAGER_URL: &str = "http://localhost:5002";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Where the bot keeps currencies and admins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Volatile, nothing survives a restart
    Memory,
    /// Direct SQL against Postgres
    Postgres,
    /// Currencies through the HTTP services, admins in Postgres
    Http,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            "http" => Ok(StoreBackend::Http),
            other => Err(anyhow!(
                "Unknown STORE_BACKEND '{}', expected memory, postgres or http",
                other
            )),
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub admin_command: Option<String>,
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub currency_manager_url: String,
    pub data_manager_url: String,
    pub http_timeout: Duration,
    pub default_language: String,
}

impl BotConfig {
    /// Load the bot configuration from environment variables.
    ///
    /// Required:
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `DATABASE_URL` unless `STORE_BACKEND=memory`
    ///
    /// Optional:
    /// - `ADMIN_COMMAND`: secret text that grants admin rights
    /// - `STORE_BACKEND`: memory, postgres or http (default: postgres)
    /// - `DB_MAX_CONNECTIONS` (default: 5)
    /// - `CURRENCY_MANAGER_URL`, `DATA_MANAGER_URL`
    /// - `HTTP_TIMEOUT_SECS` (default: 10)
    /// - `DEFAULT_LANGUAGE` (default: ru)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let admin_command = lookup("ADMIN_COMMAND").filter(|s| !s.trim().is_empty());

        let backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Postgres,
        };
        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        if backend != StoreBackend::Memory && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set for the {:?} back-end", backend));
        }

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let timeout_secs = parse_or(&lookup, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            bot_token,
            admin_command,
            backend,
            database_url,
            max_connections,
            currency_manager_url: lookup("CURRENCY_MANAGER_URL")
                .unwrap_or_else(|| DEFAULT_CURRENCY_MANAGER_URL.to_string()),
            data_manager_url: lookup("DATA_MANAGER_URL")
                .unwrap_or_else(|| DEFAULT_DATA_MANAGER_URL.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
            default_language: lookup("DEFAULT_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }
}

/// Configuration shared by the currency-manager and data-manager services
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
}

impl ServiceConfig {
    /// Load a service configuration; `port_var` names the service's port variable
    pub fn from_env(port_var: &str, default_port: u16) -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), port_var, default_port)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        port_var: &str,
        default_port: u16,
    ) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let port: u16 = parse_or(&lookup, port_var, default_port)?;
        let host = lookup("BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());
        let bind_addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_bot_config_defaults() {
        let config = BotConfig::from_lookup(vars(&[
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("DATABASE_URL", "postgres://localhost/currency"),
        ]))
        .unwrap();

        assert_eq!(config.backend, StoreBackend::Postgres);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.currency_manager_url, "http://localhost:5001");
        assert_eq!(config.default_language, "ru");
        assert!(config.admin_command.is_none());
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let config = BotConfig::from_lookup(vars(&[
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("STORE_BACKEND", "Memory"),
            ("ADMIN_COMMAND", "open sesame"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.admin_command.as_deref(), Some("open sesame"));

        assert!(BotConfig::from_lookup(vars(&[
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("STORE_BACKEND", "http"),
        ]))
        .is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(BotConfig::from_lookup(vars(&[("STORE_BACKEND", "memory")])).is_err());
        assert!(BotConfig::from_lookup(vars(&[
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("STORE_BACKEND", "redis"),
        ]))
        .is_err());
        assert!(BotConfig::from_lookup(vars(&[
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("STORE_BACKEND", "memory"),
            ("HTTP_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn test_service_config_bind_address() {
        let config = ServiceConfig::from_lookup(
            vars(&[("DATABASE_URL", "postgres://db/currency"), ("DATA_MANAGER_PORT", "6002")]),
            "DATA_MANAGER_PORT",
            5002,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:6002".parse().unwrap());

        let config = ServiceConfig::from_lookup(
            vars(&[("DATABASE_URL", "postgres://db/currency"), ("BIND_HOST", "127.0.0.1")]),
            "CURRENCY_MANAGER_PORT",
            5001,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5001".parse().unwrap());
    }
}
