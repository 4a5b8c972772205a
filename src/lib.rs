//! dscache - A memcache-style cache on top of a document store
//!
//! Provides set/get/delete/add with batch variants, lazy TTL expiry,
//! compare-and-swap sessions and a background sweep of expired entries.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, CacheValue, CasClient};
pub use config::Config;
pub use error::CacheError;
pub use storage::{DocumentStore, MemoryDocumentStore};
pub use tasks::{spawn_sweep_task, Sweeper};
