use sps_protocol::{
    siemens::types::AnalogReading,
    wago::types::{DiscreteStatus, LampChannels},
};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::sync::watch;

/// Everything the dashboard knows about both controllers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledState {
    /// Last lamp bitmask read, `None` until the first successful read.
    pub discrete: Option<DiscreteStatus>,
    pub analog: AnalogReading,
    /// Set while a temperature tick is outstanding.
    pub loading: bool,
    /// Most recent failure, replaced by the next one.
    pub last_error: Option<String>,
}

impl Default for ReconciledState {
    fn default() -> Self {
        Self {
            discrete: None,
            analog: AnalogReading::default(),
            loading: true,
            last_error: None,
        }
    }
}

impl ReconciledState {
    pub fn lamps(&self) -> LampChannels {
        LampChannels::decode(self.discrete)
    }
}

/// Generation counter of one polling loop.
///
/// Tokens taken from it stay valid until the generation is advanced. Once retired
/// no token, old or new, is valid again.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    inner: Arc<GenerationInner>,
}

#[derive(Debug, Default)]
struct GenerationInner {
    counter: AtomicU64,
    retired: AtomicBool,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.inner.counter.load(Ordering::SeqCst)
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            generation: self.clone(),
            issued: self.current(),
        }
    }

    fn advance(&self) {
        self.inner.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
        self.advance();
    }
}

/// Stamp carried by an in-flight request, identifying the loop generation that
/// issued it.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: Generation,
    issued: u64,
}

impl GenerationToken {
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn is_current(&self) -> bool {
        !self.generation.is_retired() && self.generation.current() == self.issued
    }
}

/// Owner of the [`ReconciledState`].
///
/// Writers submit closures together with the token of the request they are
/// applying. The token is checked under the same lock that guards the state, and
/// generations are advanced under that lock as well, so a write and a cancellation
/// can never interleave.
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ReconciledState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReconciledState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Point-in-time copy of the state.
    pub fn read(&self) -> ReconciledState {
        self.tx.borrow().clone()
    }

    /// Receiver notified after every applied write.
    pub fn subscribe(&self) -> watch::Receiver<ReconciledState> {
        self.tx.subscribe()
    }

    /// Applies `update` if `token` is still current, returns whether it was applied.
    pub fn apply<F>(&self, token: &GenerationToken, update: F) -> bool
    where
        F: FnOnce(&mut ReconciledState),
    {
        self.tx.send_if_modified(|state| {
            if token.is_current() {
                update(state);
                true
            } else {
                false
            }
        })
    }

    /// Invalidates every token of `generation`, in flight or not yet issued.
    pub fn retire(&self, generation: &Generation) {
        self.tx.send_if_modified(|_| {
            generation.retire();
            false
        });
    }

    /// Invalidates tokens issued so far; tokens taken afterwards are valid.
    pub fn advance(&self, generation: &Generation) {
        self.tx.send_if_modified(|_| {
            generation.advance();
            false
        });
    }
}
