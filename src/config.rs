use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Period of the expired-attempt sweep; `None` disables it.
    pub abandon_sweep_secs: Option<u64>,
    pub abandon_grace_minutes: i64,
    pub log_format: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            server_address: get_env(&lookup, "SERVER_ADDRESS")?,
            database_url: get_env(&lookup, "DATABASE_URL")?,
            jwt_secret: get_env(&lookup, "JWT_SECRET")?,
            db_max_connections: get_env_parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            rate_limit_requests: get_env_parse_or(&lookup, "RATE_LIMIT_REQUESTS", 120)?,
            rate_limit_window_secs: get_env_parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 60)?,
            abandon_sweep_secs: get_env_parse_opt(&lookup, "ABANDON_SWEEP_SECS")?,
            abandon_grace_minutes: get_env_parse_or(&lookup, "ABANDON_GRACE_MINUTES", 5)?,
            log_format: lookup("LOG_FORMAT"),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn get_env<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_opt<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
    }
}

fn get_env_parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse_opt(lookup, name)?.unwrap_or(default))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
