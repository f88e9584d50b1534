//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Request/response model shared by the router and the stores
//! - Named cache storage with in-memory and SQLite backends
//! - Unified error types
//! - Worker configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheStorage, MemoryStorage, NamedCache, SqliteStorage};
pub use config::{ConfigError, StorageBackend, WorkerConfig};
pub use error::Error;
pub use request::{Destination, RequestKey, ResourceRequest, Response};
