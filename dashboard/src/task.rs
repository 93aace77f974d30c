use crate::store::{Generation, GenerationToken};
use core::future::Future;
use log::{debug, trace};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Stopped, no further ticks will run.
    Idle,
    /// A tick's action has not settled yet.
    InFlight,
    /// Waiting for the next tick.
    Scheduled,
}

#[derive(Debug, Default)]
struct TaskStatus {
    stopped: AtomicBool,
    in_flight: AtomicBool,
    ticks_started: AtomicU64,
    ticks_skipped: AtomicU64,
}

/// A timed loop that runs an async action every `period`.
///
/// At most one action is outstanding at any time: a tick that arrives while the
/// previous action is still running is skipped, not queued. Each action receives
/// a token of the task's generation taken when the tick fired.
#[derive(Debug)]
pub(crate) struct RepeatingTask {
    name: &'static str,
    status: Arc<TaskStatus>,
    exit_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub(crate) fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        run_immediately: bool,
        generation: Generation,
        mut action: F,
    ) -> Self
    where
        F: FnMut(GenerationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let status = Arc::new(TaskStatus::default());
        let (exit_tx, mut exit_rx) = watch::channel(false);

        let handle = tokio::spawn({
            let status = status.clone();
            async move {
                let start = if run_immediately {
                    Instant::now()
                } else {
                    Instant::now() + period
                };
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        biased;

                        Ok(_) = exit_rx.changed() => {
                            break;
                        }
                        _ = ticker.tick() => {
                            if status.in_flight.swap(true, Ordering::AcqRel) {
                                status.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                                debug!("{name}: previous tick still in flight, skipping");
                                continue;
                            }

                            let tick = status.ticks_started.fetch_add(1, Ordering::Relaxed) + 1;
                            let token = generation.token();
                            trace!("{name}: tick {tick} (generation {})", token.issued());

                            let run = action(token);
                            let status = status.clone();
                            tokio::spawn(async move {
                                run.await;
                                status.in_flight.store(false, Ordering::Release);
                            });
                        }
                    }
                }

                debug!(
                    "{name}: stopped after {} ticks ({} skipped)",
                    status.ticks_started.load(Ordering::Relaxed),
                    status.ticks_skipped.load(Ordering::Relaxed),
                );
            }
        });

        Self {
            name,
            status,
            exit_tx,
            handle,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn phase(&self) -> TaskPhase {
        if self.status.stopped.load(Ordering::Acquire) {
            TaskPhase::Idle
        } else if self.status.in_flight.load(Ordering::Acquire) {
            TaskPhase::InFlight
        } else {
            TaskPhase::Scheduled
        }
    }

    pub(crate) fn ticks_started(&self) -> u64 {
        self.status.ticks_started.load(Ordering::Relaxed)
    }

    pub(crate) fn ticks_skipped(&self) -> u64 {
        self.status.ticks_skipped.load(Ordering::Relaxed)
    }

    /// Stops issuing ticks. Actions already running are left to settle; their
    /// results must be discarded through the generation.
    pub(crate) fn stop(&self) {
        if !self.status.stopped.swap(true, Ordering::AcqRel) {
            let _ = self.exit_tx.send(true);
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.stop();
        self.handle.abort();
    }
}
