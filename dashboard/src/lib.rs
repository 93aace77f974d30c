//! Polling and state reconciliation core of the SPS dashboard.
//!
//! Two repeating tasks keep a [`store::StateStore`] in step with the REST API:
//! a fast loop reading the lamp bitmask of the discrete I/O controller and a slow
//! loop reading the three temperatures of the temperature controller. Operator
//! commands go through [`dispatcher::CommandDispatcher`], which follows every
//! accepted command with an early lamp refresh.

pub mod config;
pub mod dispatcher;
pub mod remote;
pub mod scheduler;
pub mod store;
mod task;


use config::DashboardConfig;
use dispatcher::{CommandDispatcher, RefreshHandle};
use remote::Remote;
use scheduler::PollScheduler;
use sps_protocol::wago::types::ControlCommand;
use std::sync::Arc;
use store::{ReconciledState, StateStore};
use tokio::sync::watch;

pub use task::TaskPhase;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected with HTTP status {0}")]
    Rejected(u16),

    #[error("No data available")]
    NoData,

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<sps_protocol::Error> for Error {
    fn from(e: sps_protocol::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// A running dashboard core: the store, both polling loops and the dispatcher.
///
/// This is the surface handed to a renderer. Cloning is cheap and all clones
/// share the same state and loops.
pub struct Dashboard<R: Remote> {
    store: StateStore,
    scheduler: Arc<PollScheduler<R>>,
    dispatcher: CommandDispatcher<R>,
}

impl<R: Remote> Clone for Dashboard<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scheduler: self.scheduler.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<R: Remote> Dashboard<R> {
    /// Starts both polling loops. Must be called from within a tokio runtime.
    pub fn start(remote: R, config: &DashboardConfig) -> Self {
        let remote = Arc::new(remote);
        let store = StateStore::new();

        let scheduler = PollScheduler::start(remote.clone(), store.clone(), config);
        let dispatcher = CommandDispatcher::new(
            remote,
            store.clone(),
            scheduler.fast_path(),
            config.refresh_delay,
        );

        Self {
            store,
            scheduler: Arc::new(scheduler),
            dispatcher,
        }
    }

    pub fn snapshot(&self) -> ReconciledState {
        self.store.read()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconciledState> {
        self.store.subscribe()
    }

    pub async fn dispatch(&self, command: ControlCommand) -> Result<RefreshHandle, Error> {
        self.dispatcher.dispatch(command).await
    }

    pub fn scheduler(&self) -> &PollScheduler<R> {
        &self.scheduler
    }

    /// Stops both loops; nothing written after this returns reaches the store.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
