//! Environment-driven application configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::{AppError, Result};

/// Database URL that selects the in-process store
pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub media_root: PathBuf,
    pub static_root: PathBuf,
    pub session_idle: Duration,
    /// Staff account created at start-up when both are present
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let get_env = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = parse_var("SERVER_PORT", get_env("SERVER_PORT"), 8000u16)?;
        let database_url = get_env("DATABASE_URL")
            .ok_or_else(|| AppError::Config("Missing environment variable 'DATABASE_URL'".into()))?;
        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", get_env("DB_MAX_CONNECTIONS"), 10u32)?;
        let media_root = PathBuf::from(get_env("MEDIA_ROOT").unwrap_or_else(|| "media".to_string()));
        let static_root = PathBuf::from(get_env("STATIC_ROOT").unwrap_or_else(|| "static".to_string()));
        let session_idle_secs =
            parse_var("SESSION_IDLE_SECS", get_env("SESSION_IDLE_SECS"), 14 * 24 * 60 * 60u64)?;

        tracing::info!("Application configuration loaded");

        Ok(Self {
            server_host,
            server_port,
            database_url,
            db_max_connections,
            media_root,
            static_root,
            session_idle: Duration::from_secs(session_idle_secs),
            admin_email: get_env("ADMIN_EMAIL"),
            admin_password: get_env("ADMIN_PASSWORD"),
        })
    }

    /// Config for in-process use (tests, local experiments)
    pub fn in_memory() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            database_url: MEMORY_DATABASE_URL.to_string(),
            db_max_connections: 1,
            media_root: env::temp_dir().join("courseshop-media"),
            static_root: PathBuf::from("static"),
            session_idle: Duration::from_secs(60 * 60),
            admin_email: None,
            admin_password: None,
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_and_value() {
        assert_eq!(parse_var("SERVER_PORT", None, 8000u16).unwrap(), 8000);
        assert_eq!(parse_var("SERVER_PORT", Some(" 9001 ".into()), 8000u16).unwrap(), 9001);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let err = parse_var("SERVER_PORT", Some("eighty".into()), 8000u16).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_in_memory_selects_memory_store() {
        let config = AppConfig::in_memory();
        assert!(config.uses_memory_store());
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
    }
}
