//! Background sync hook.

use async_trait::async_trait;
use serde::Serialize;
use swcache_core::Error;

/// Work run when the background sync tag fires.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self) -> Result<(), Error>;
}

/// Reconciler with nothing to reconcile yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReconciler;

#[async_trait]
impl Reconciler for NoopReconciler {
    async fn reconcile(&self) -> Result<(), Error> {
        tracing::info!("running background sync");
        Ok(())
    }
}

/// Result of a sync event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed,
    Failed { reason: String },
    /// Tag not handled by this worker.
    Ignored,
}
