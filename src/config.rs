//! Env-driven configuration for the service, the CLI and the library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Everything except the API key has a default so a fresh
//! checkout runs with only `GEMINI_API_KEY` set.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::generation::retry::RetryPolicy;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub api_host: String,
    pub api_port: String,
    pub output_dir: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_backoff_factor: u32,
    pub pacing_delay_ms: u64,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Self {
        let defaults = RetryPolicy::default();
        Config {
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8190".to_string()),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".to_string()),
            retry_max_attempts: parse_or("RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            retry_base_delay_ms: parse_or("RETRY_BASE_DELAY_MS", defaults.base_delay.as_millis() as u64),
            retry_backoff_factor: parse_or("RETRY_BACKOFF_FACTOR", defaults.backoff_factor),
            pacing_delay_ms: parse_or("PACING_DELAY_MS", defaults.pacing.as_millis() as u64),
        }
    }

    /// Retry and pacing parameters for the generation loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            backoff_factor: self.retry_backoff_factor.max(1),
            pacing: Duration::from_millis(self.pacing_delay_ms),
        }
    }

    pub fn print_env_vars() {
        let key_state = if env::var("GEMINI_API_KEY").is_ok() { "<set>" } else { "<unset>" };
        println!("GEMINI_API_KEY: {}", key_state);
        for key in [
            "GEMINI_MODEL",
            "GEMINI_BASE_URL",
            "API_HOST",
            "API_PORT",
            "OUTPUT_DIR",
            "RETRY_MAX_ATTEMPTS",
            "RETRY_BASE_DELAY_MS",
            "RETRY_BACKOFF_FACTOR",
            "PACING_DELAY_MS",
        ] {
            println!("{}: {}", key, env::var(key).unwrap_or_else(|_| "<unset>".to_string()));
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} '{}', falling back to {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
