// src/config.rs

use std::env;
use std::time::Duration;

use crate::api::nowpayments_client::NOWPAYMENTS_API_BASE;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub rabbitmq_url: Option<String>,
    pub interval: Duration,
    pub batch_size: i64,
    pub max_age_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub nowpayments_api_key: String,
    pub nowpayments_ipn_secret: String,
    pub nowpayments_api_url: String,
    pub callback_base_url: String,
    pub monthly_plan_price: f64,
    pub yearly_plan_price: f64,
    pub poller: PollerConfig,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::Invalid { name, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let poller = PollerConfig {
            rabbitmq_url: env::var("RABBITMQ_URL").ok().filter(|v| !v.is_empty()),
            interval: Duration::from_secs(parsed_or("PAYMENT_POLL_INTERVAL_SECS", 10u64)?),
            batch_size: parsed_or("PAYMENT_POLL_BATCH_SIZE", 50i64)?,
            max_age_hours: parsed_or("PAYMENT_POLL_MAX_AGE_HOURS", 24i64)?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8065".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            nowpayments_api_key: required("NOWPAYMENTS_API_KEY")?,
            nowpayments_ipn_secret: required("NOWPAYMENTS_IPN_SECRET")?,
            nowpayments_api_url: env::var("NOWPAYMENTS_API_URL")
                .unwrap_or_else(|_| NOWPAYMENTS_API_BASE.to_string()),
            callback_base_url: env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8065".to_string()),
            monthly_plan_price: parsed_or("MONTHLY_PLAN_PRICE_USD", 9.99f64)?,
            yearly_plan_price: parsed_or("YEARLY_PLAN_PRICE_USD", 99.99f64)?,
            poller,
        })
    }
}
