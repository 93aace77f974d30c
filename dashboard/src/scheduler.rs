use crate::{
    config::DashboardConfig,
    remote::Remote,
    store::{Generation, GenerationToken, StateStore},
    task::{RepeatingTask, TaskPhase},
    Error,
};
use futures::join;
use log::{debug, info, warn};
use sps_protocol::siemens::types::{AnalogChannel, AnalogReading};
use std::sync::Arc;

/// Reads the lamp status once and records the outcome.
///
/// A failure leaves the last known status in place and only updates the error.
async fn poll_discrete<R: Remote>(remote: &R, store: &StateStore, token: GenerationToken) {
    let applied = match remote.discrete_status().await {
        Ok(status) => store.apply(&token, |state| state.discrete = Some(status)),
        Err(Error::NoData) => {
            debug!("No lamp status available yet");
            return;
        }
        Err(e) => {
            warn!("Failed to read lamp status: {e}");
            store.apply(&token, |state| {
                state.last_error = Some(format!("Failed to read lamp status: {e}"))
            })
        }
    };

    if !applied {
        debug!(
            "Discarding lamp status from retired generation {}",
            token.issued()
        );
    }
}

/// Reads all three temperatures concurrently and merges them once all settled.
///
/// A channel that failed is cleared rather than left at its previous value.
async fn poll_analog<R: Remote>(remote: &R, store: &StateStore, token: GenerationToken) {
    store.apply(&token, |state| state.loading = true);

    let (actual, setpoint, difference) = join!(
        remote.analog(AnalogChannel::Actual),
        remote.analog(AnalogChannel::Setpoint),
        remote.analog(AnalogChannel::Difference),
    );

    let mut reading = AnalogReading::default();
    let mut failures = Vec::new();

    for (channel, result) in [
        (AnalogChannel::Actual, actual),
        (AnalogChannel::Setpoint, setpoint),
        (AnalogChannel::Difference, difference),
    ] {
        match result {
            Ok(value) => reading.set(channel, Some(value)),
            Err(Error::NoData) => debug!("No {channel} temperature available"),
            Err(e) => {
                warn!("Failed to read {channel} temperature: {e}");
                failures.push(format!("{channel}: {e}"));
            }
        }
    }

    let applied = store.apply(&token, |state| {
        state.analog = reading;
        if !failures.is_empty() {
            state.last_error = Some(format!(
                "Failed to read temperatures ({})",
                failures.join("; ")
            ));
        }
        state.loading = false;
    });

    if !applied {
        debug!(
            "Discarding temperatures from retired generation {}",
            token.issued()
        );
    }
}

/// Out-of-cadence access to the lamp status read.
///
/// Reads issued here are not subject to the fast loop's in-flight guard but carry
/// its generation, so they are discarded after shutdown like regular ticks.
pub struct FastPath<R: Remote> {
    remote: Arc<R>,
    store: StateStore,
    generation: Generation,
}

impl<R: Remote> Clone for FastPath<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            store: self.store.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<R: Remote> FastPath<R> {
    pub fn token(&self) -> GenerationToken {
        self.generation.token()
    }

    pub async fn refresh(&self) {
        let token = self.generation.token();
        if !token.is_current() {
            debug!("Lamp refresh skipped, polling has stopped");
            return;
        }

        poll_discrete(&*self.remote, &self.store, token).await;
    }
}

/// The two polling loops feeding the [`StateStore`].
pub struct PollScheduler<R: Remote> {
    remote: Arc<R>,
    store: StateStore,
    fast_generation: Generation,
    slow_generation: Generation,
    fast: RepeatingTask,
    slow: RepeatingTask,
}

impl<R: Remote> PollScheduler<R> {
    /// Starts both loops; each runs its first tick straight away.
    pub fn start(remote: Arc<R>, store: StateStore, config: &DashboardConfig) -> Self {
        let fast_generation = Generation::new();
        let slow_generation = Generation::new();

        info!(
            "Polling lamp status every {:?} and temperatures every {:?}",
            config.fast_period, config.slow_period
        );

        let fast = RepeatingTask::spawn(
            "fast",
            config.fast_period,
            true,
            fast_generation.clone(),
            {
                let remote = remote.clone();
                let store = store.clone();
                move |token| {
                    let remote = remote.clone();
                    let store = store.clone();
                    async move { poll_discrete(&*remote, &store, token).await }
                }
            },
        );

        let slow = RepeatingTask::spawn(
            "slow",
            config.slow_period,
            true,
            slow_generation.clone(),
            {
                let remote = remote.clone();
                let store = store.clone();
                move |token| {
                    let remote = remote.clone();
                    let store = store.clone();
                    async move { poll_analog(&*remote, &store, token).await }
                }
            },
        );

        Self {
            remote,
            store,
            fast_generation,
            slow_generation,
            fast,
            slow,
        }
    }

    pub fn fast_path(&self) -> FastPath<R> {
        FastPath {
            remote: self.remote.clone(),
            store: self.store.clone(),
            generation: self.fast_generation.clone(),
        }
    }

    pub fn fast_phase(&self) -> TaskPhase {
        self.fast.phase()
    }

    pub fn slow_phase(&self) -> TaskPhase {
        self.slow.phase()
    }

    /// Ticks started and skipped by the fast loop.
    pub fn fast_ticks(&self) -> (u64, u64) {
        (self.fast.ticks_started(), self.fast.ticks_skipped())
    }

    /// Ticks started and skipped by the slow loop.
    pub fn slow_ticks(&self) -> (u64, u64) {
        (self.slow.ticks_started(), self.slow.ticks_skipped())
    }

    /// Stops both loops and retires their generations.
    ///
    /// Requests still in flight are allowed to settle but their results are
    /// dropped.
    pub fn shutdown(&self) {
        for (task, generation) in [
            (&self.fast, &self.fast_generation),
            (&self.slow, &self.slow_generation),
        ] {
            if task.phase() == TaskPhase::Idle {
                continue;
            }

            self.store.retire(generation);
            task.stop();

            info!(
                "Stopped {} loop after {} ticks ({} skipped)",
                task.name(),
                task.ticks_started(),
                task.ticks_skipped()
            );
        }
    }
}

impl<R: Remote> Drop for PollScheduler<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::FakeRemote;
    use sps_protocol::wago::types::DiscreteStatus;
    use std::time::Duration;

    fn config() -> DashboardConfig {
        DashboardConfig::default()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn start(remote: FakeRemote) -> (Arc<FakeRemote>, StateStore, PollScheduler<FakeRemote>) {
        let remote = Arc::new(remote);
        let store = StateStore::new();
        let scheduler = PollScheduler::start(remote.clone(), store.clone(), &config());
        (remote, store, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn first_ticks_run_immediately() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(20), Ok(5));
        remote.set_analog(AnalogChannel::Actual, ms(20), Ok(21.5));
        remote.set_analog(AnalogChannel::Setpoint, ms(20), Ok(45.0));
        remote.set_analog(AnalogChannel::Difference, ms(20), Ok(23.5));

        let (remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(50)).await;

        let state = store.read();
        assert_eq!(state.discrete, Some(DiscreteStatus::new(5)));
        assert_eq!(state.lamps().lamp(1), Some(true));
        assert_eq!(
            state.analog,
            AnalogReading {
                actual: Some(21.5),
                setpoint: Some(45.0),
                difference: Some(23.5),
            }
        );
        assert!(!state.loading);
        assert_eq!(state.last_error, None);
        assert_eq!(remote.discrete_calls(), 1);
        assert_eq!(remote.analog_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loops_follow_their_periods() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(10), Ok(1));

        let (remote, _store, scheduler) = start(remote);

        // Fast ticks at 0, 700, 1400, 2100; slow ticks at 0, 1000, 2000.
        tokio::time::sleep(ms(2200)).await;

        assert_eq!(remote.discrete_calls(), 4);
        assert_eq!(remote.analog_calls(), 9);
        assert_eq!(scheduler.fast_ticks(), (4, 0));
        assert_eq!(scheduler.slow_ticks(), (3, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_fast_request_in_flight() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(10), Ok(3));
        remote.hold_discrete();

        let (remote, store, scheduler) = start(remote);

        tokio::time::sleep(ms(5000)).await;

        assert_eq!(remote.discrete_calls(), 1);
        assert_eq!(scheduler.fast_phase(), TaskPhase::InFlight);
        let (started, skipped) = scheduler.fast_ticks();
        assert_eq!(started, 1);
        assert!(skipped >= 6, "skipped {skipped}");
        assert_eq!(store.read().discrete, None);

        remote.release_discrete(100);
        tokio::time::sleep(ms(3000)).await;

        assert_eq!(remote.max_discrete_in_flight(), 1);
        assert!(remote.discrete_calls() > 1);
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_failure_keeps_last_known_status() {
        let remote = FakeRemote::new();
        remote.queue_discrete(ms(10), Ok(0x00ff));
        remote.set_discrete(ms(10), Err(Error::Transport("connection reset".into())));

        let (_remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(800)).await;

        let state = store.read();
        assert_eq!(state.discrete, Some(DiscreteStatus::new(0x00ff)));
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed to read lamp status: Transport error: connection reset")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fast_rejection_sets_error() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(10), Err(Error::Rejected(500)));

        let (_remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(50)).await;

        let state = store.read();
        assert_eq!(state.discrete, None);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed to read lamp status: Request rejected with HTTP status 500")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_data_is_not_an_error() {
        let remote = FakeRemote::new();
        remote.queue_discrete(ms(10), Ok(9));
        remote.set_discrete(ms(10), Err(Error::NoData));

        let (_remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(1500)).await;

        let state = store.read();
        assert_eq!(state.discrete, Some(DiscreteStatus::new(9)));
        assert_eq!(state.analog, AnalogReading::default());
        assert_eq!(state.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_analog_failure() {
        let remote = FakeRemote::new();
        remote.set_analog(AnalogChannel::Actual, ms(30), Ok(21.5));
        remote.set_analog(
            AnalogChannel::Setpoint,
            ms(10),
            Err(Error::Transport("timed out".into())),
        );
        remote.set_analog(AnalogChannel::Difference, ms(20), Err(Error::Rejected(502)));

        let (_remote, store, _scheduler) = start(remote);
        let mut rx = store.subscribe();

        let mut loading_transitions = 0;
        let mut loading = rx.borrow().loading;
        let watch = async {
            while rx.changed().await.is_ok() {
                let now = rx.borrow_and_update().loading;
                if loading && !now {
                    loading_transitions += 1;
                }
                loading = now;
            }
        };
        let _ = tokio::time::timeout(ms(100), watch).await;

        assert_eq!(loading_transitions, 1);

        let state = store.read();
        assert_eq!(
            state.analog,
            AnalogReading {
                actual: Some(21.5),
                setpoint: None,
                difference: None,
            }
        );
        assert!(!state.loading);
        assert_eq!(
            state.last_error.as_deref(),
            Some(
                "Failed to read temperatures (setpoint: Transport error: timed out; \
                 difference: Request rejected with HTTP status 502)"
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_analog_channel_is_cleared() {
        let remote = FakeRemote::new();
        remote.set_analog(AnalogChannel::Actual, ms(10), Ok(21.5));
        remote.set_analog(AnalogChannel::Setpoint, ms(10), Ok(45.0));

        let (remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(50)).await;
        assert_eq!(store.read().analog.setpoint, Some(45.0));

        remote.set_analog(
            AnalogChannel::Setpoint,
            ms(10),
            Err(Error::Transport("unreachable".into())),
        );
        tokio::time::sleep(ms(1000)).await;

        let state = store.read();
        assert_eq!(state.analog.actual, Some(21.5));
        assert_eq!(state.analog.setpoint, None);
        assert!(state.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn loading_is_set_for_each_tick() {
        let remote = FakeRemote::new();
        remote.set_analog(AnalogChannel::Actual, ms(200), Ok(20.0));

        let (_remote, store, _scheduler) = start(remote);

        tokio::time::sleep(ms(100)).await;
        assert!(store.read().loading);

        tokio::time::sleep(ms(200)).await;
        assert!(!store.read().loading);

        tokio::time::sleep(ms(800)).await;
        assert!(store.read().loading);

        tokio::time::sleep(ms(200)).await;
        assert!(!store.read().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_in_flight_results() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(300), Ok(0xffff));
        remote.set_analog(AnalogChannel::Actual, ms(300), Ok(21.5));
        remote.set_analog(
            AnalogChannel::Setpoint,
            ms(100),
            Err(Error::Transport("down".into())),
        );

        let (remote, store, scheduler) = start(remote);

        tokio::time::sleep(ms(50)).await;
        let before = store.read();
        assert_eq!(scheduler.fast_phase(), TaskPhase::InFlight);
        assert_eq!(scheduler.slow_phase(), TaskPhase::InFlight);

        scheduler.shutdown();
        assert_eq!(scheduler.fast_phase(), TaskPhase::Idle);
        assert_eq!(scheduler.slow_phase(), TaskPhase::Idle);

        let mut rx = store.subscribe();
        tokio::time::sleep(ms(5000)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.read(), before);
        assert_eq!(remote.discrete_calls(), 1);
        assert_eq!(remote.analog_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_path_bypasses_in_flight_guard() {
        let remote = FakeRemote::new();
        remote.queue_discrete(ms(500), Ok(1));
        remote.set_discrete(ms(10), Ok(2));

        let (remote, store, scheduler) = start(remote);

        tokio::time::sleep(ms(100)).await;
        assert_eq!(scheduler.fast_phase(), TaskPhase::InFlight);

        scheduler.fast_path().refresh().await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(2)));
        assert_eq!(remote.max_discrete_in_flight(), 2);

        // The slower tick settles last and wins.
        tokio::time::sleep(ms(450)).await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(1)));
    }
}
