//! Caching worker for swcache.
//!
//! This crate provides the network facility, the cache-first/network-first
//! request router, offline fallbacks, and the worker lifecycle that keeps
//! the cache generations in order.

pub mod fallback;
pub mod fetch;
pub mod router;
pub mod settings;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fallback::OfflineFallback;
pub use fetch::{FetchConfig, HttpNetwork, Network};
pub use router::{CacheRouter, FetchOutcome, ResponseSource, Strategy};
pub use settings::WorkerSettings;
pub use worker::{
    ActivateReport, ControlMessage, EventOutcome, InstallReport, MessageOutcome, NoopReconciler, Reconciler,
    ServiceWorker, SyncOutcome, VersionReply, WorkerEvent, WorkerState, WorkerStatus,
};
