//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::CacheSettings;
use crate::storage::MAX_BATCH_WRITE;
use crate::tasks::SWEEP_BATCH_SIZE;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between background sweeps
    pub sweep_interval: u64,
    /// Seconds a single sweep may run before it is interrupted
    pub sweep_deadline: u64,
    /// Expired keys fetched and deleted per sweep page
    pub sweep_batch_size: usize,
    /// Records per batched write
    pub batch_write_limit: usize,
    /// Extra attempts for a conflicting add/cas transaction
    pub transaction_retries: u32,
    /// Leave falsy values out of get_multi results
    pub get_multi_omit_falsy: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Seconds between sweeps (default: 300)
    /// - `SWEEP_DEADLINE` - Seconds per sweep before it is cut short (default: 30)
    /// - `SWEEP_BATCH_SIZE` - Keys per sweep page (default: 100)
    /// - `BATCH_WRITE_LIMIT` - Records per batched write (default: 500)
    /// - `TRANSACTION_RETRIES` - Retries on transaction conflict (default: 3)
    /// - `GET_MULTI_OMIT_FALSY` - Omit falsy values from get_multi (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            sweep_deadline: env_or("SWEEP_DEADLINE", defaults.sweep_deadline),
            sweep_batch_size: env_or("SWEEP_BATCH_SIZE", defaults.sweep_batch_size),
            batch_write_limit: env_or("BATCH_WRITE_LIMIT", defaults.batch_write_limit),
            transaction_retries: env_or("TRANSACTION_RETRIES", defaults.transaction_retries),
            get_multi_omit_falsy: env_or("GET_MULTI_OMIT_FALSY", defaults.get_multi_omit_falsy),
        }
    }

    /// Settings for the cache store built from this configuration.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            batch_write_limit: self.batch_write_limit,
            transaction_retries: self.transaction_retries,
            omit_falsy_in_get_multi: self.get_multi_omit_falsy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 300,
            sweep_deadline: 30,
            sweep_batch_size: SWEEP_BATCH_SIZE,
            batch_write_limit: MAX_BATCH_WRITE,
            transaction_retries: 3,
            get_multi_omit_falsy: false,
        }
    }
}

/// Parses an environment variable, falling back when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
