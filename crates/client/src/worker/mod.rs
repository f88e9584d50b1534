//! The caching worker: lifecycle state plus typed event dispatch.
//!
//! Hosts deliver [`WorkerEvent`]s; each is handled by an async call whose
//! completion marks the event as handled. Install and activate gate the
//! lifecycle phases, fetch events go to the [`CacheRouter`], message and
//! sync events are the control plane.

pub mod lifecycle;
pub mod message;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;
use swcache_core::{CacheStorage, Error, ResourceRequest};
use tokio::sync::{RwLock, oneshot};

pub use lifecycle::{ActivateReport, AssetFailure, InstallReport};
pub use message::{ControlMessage, MessageOutcome, VersionReply};
pub use sync::{NoopReconciler, Reconciler, SyncOutcome};

use crate::fetch::Network;
use crate::router::{CacheRouter, FetchOutcome};
use crate::settings::WorkerSettings;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker will never control clients.
    Redundant,
}

/// Observable lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    /// Set once the worker asked to replace any previous worker immediately.
    pub skip_waiting: bool,
    /// Set once activation took control of open pages.
    pub clients_claimed: bool,
}

/// Events delivered by the hosting environment.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(ResourceRequest),
    Message { data: serde_json::Value, reply: Option<oneshot::Sender<VersionReply>> },
    Sync { tag: String },
}

/// What handling an event produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetch(FetchOutcome),
    Message(MessageOutcome),
    Sync(SyncOutcome),
}

/// Offline caching worker.
pub struct ServiceWorker {
    pub(crate) settings: Arc<WorkerSettings>,
    pub(crate) storage: Arc<dyn CacheStorage>,
    pub(crate) network: Arc<dyn Network>,
    router: CacheRouter,
    reconciler: Arc<dyn Reconciler>,
    pub(crate) status: RwLock<WorkerStatus>,
}

impl ServiceWorker {
    pub fn new(settings: WorkerSettings, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        let settings = Arc::new(settings);
        let router = CacheRouter::new(settings.clone(), storage.clone(), network.clone());
        Self {
            settings,
            storage,
            network,
            router,
            reconciler: Arc::new(NoopReconciler),
            status: RwLock::new(WorkerStatus {
                state: WorkerState::Parsed,
                skip_waiting: false,
                clients_claimed: false,
            }),
        }
    }

    /// Replace the background sync reconciler.
    pub fn with_reconciler(mut self, reconciler: Arc<dyn Reconciler>) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn router(&self) -> &CacheRouter {
        &self.router
    }

    pub async fn status(&self) -> WorkerStatus {
        *self.status.read().await
    }

    /// Install, then activate straight away since install always asks to
    /// skip waiting. This is what a host does on first registration.
    pub async fn start(&self) -> Result<(InstallReport, ActivateReport), Error> {
        let installed = self.install().await?;
        let activated = self.activate().await?;
        Ok((installed, activated))
    }

    /// Handle one event to completion.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => Ok(EventOutcome::Fetch(self.fetch(&request).await)),
            WorkerEvent::Message { data, reply } => self.post_message(&data, reply).await.map(EventOutcome::Message),
            WorkerEvent::Sync { tag } => Ok(EventOutcome::Sync(self.sync(&tag).await)),
        }
    }

    /// Route an intercepted request.
    pub async fn fetch(&self, request: &ResourceRequest) -> FetchOutcome {
        self.router.handle(request).await
    }

    /// Handle raw message data; unrecognized messages are ignored.
    pub async fn post_message(
        &self, data: &serde_json::Value, reply: Option<oneshot::Sender<VersionReply>>,
    ) -> Result<MessageOutcome, Error> {
        match ControlMessage::parse(data) {
            Some(message) => self.message(message, reply).await,
            None => {
                tracing::debug!(%data, "ignoring unrecognized message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    /// Handle a control message.
    pub async fn message(
        &self, message: ControlMessage, reply: Option<oneshot::Sender<VersionReply>>,
    ) -> Result<MessageOutcome, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                let waiting = self.skip_waiting().await == WorkerState::Installed;
                if waiting {
                    let report = self.activate().await?;
                    Ok(MessageOutcome::Activated(report))
                } else {
                    Ok(MessageOutcome::SkipWaiting)
                }
            }
            ControlMessage::GetVersion => {
                let version = VersionReply { version: self.settings.static_cache.clone() };
                match reply {
                    Some(port) => {
                        if port.send(version.clone()).is_err() {
                            tracing::warn!("version reply port closed before reply");
                        }
                    }
                    None => tracing::warn!("GET_VERSION without reply port"),
                }
                Ok(MessageOutcome::Version(version))
            }
        }
    }

    /// Run the reconciler for the configured sync tag.
    ///
    /// Reconciler errors are reported in the outcome, never propagated.
    pub async fn sync(&self, tag: &str) -> SyncOutcome {
        if tag != self.settings.sync_tag {
            tracing::debug!(tag, "ignoring sync tag");
            return SyncOutcome::Ignored;
        }

        match self.reconciler.reconcile().await {
            Ok(()) => SyncOutcome::Completed,
            Err(e) => {
                tracing::warn!(tag, error = %e, "background sync failed");
                SyncOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Record the skip-waiting request and return the current state.
    pub(crate) async fn skip_waiting(&self) -> WorkerState {
        let mut status = self.status.write().await;
        status.skip_waiting = true;
        status.state
    }

    /// Move to `next` if the current state passes `allowed`.
    pub(crate) async fn transition(
        &self, allowed: impl FnOnce(WorkerState) -> bool, next: WorkerState,
    ) -> Result<(), Error> {
        let mut status = self.status.write().await;
        if !allowed(status.state) {
            return Err(Error::InvalidState(format!("cannot enter {:?} from {:?}", next, status.state)));
        }
        status.state = next;
        Ok(())
    }
}
