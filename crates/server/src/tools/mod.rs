//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod caches;
pub mod fetch;
pub mod lifecycle;
