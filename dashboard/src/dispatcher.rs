use crate::{remote::Remote, scheduler::FastPath, store::StateStore, Error};
use log::{debug, info, warn};
use sps_protocol::wago::types::ControlCommand;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// The confirmatory lamp read scheduled after an accepted command.
///
/// Dropping the handle leaves the refresh running.
#[derive(Debug)]
pub struct RefreshHandle(JoinHandle<()>);

impl RefreshHandle {
    /// Waits for the refresh read to settle.
    pub async fn settled(self) {
        let _ = self.0.await;
    }
}

/// Sends operator commands to the discrete I/O controller.
pub struct CommandDispatcher<R: Remote> {
    remote: Arc<R>,
    store: StateStore,
    fast_path: FastPath<R>,
    refresh_delay: Duration,
}

impl<R: Remote> Clone for CommandDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            store: self.store.clone(),
            fast_path: self.fast_path.clone(),
            refresh_delay: self.refresh_delay,
        }
    }
}

impl<R: Remote> CommandDispatcher<R> {
    pub fn new(
        remote: Arc<R>,
        store: StateStore,
        fast_path: FastPath<R>,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            remote,
            store,
            fast_path,
            refresh_delay,
        }
    }

    /// Sends `command` and, once accepted, schedules a lamp read after the refresh
    /// delay so the effect shows up before the next regular fast tick.
    ///
    /// A failed send is recorded as the last error and nothing is refreshed.
    pub async fn dispatch(&self, command: ControlCommand) -> Result<RefreshHandle, Error> {
        let token = self.fast_path.token();

        info!("Sending control command {command}");

        match self.remote.send_command(command).await {
            Ok(()) => {
                debug!(
                    "Command {command} accepted, refreshing lamp status in {:?}",
                    self.refresh_delay
                );

                let fast_path = self.fast_path.clone();
                let delay = self.refresh_delay;

                Ok(RefreshHandle(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    fast_path.refresh().await;
                })))
            }
            Err(e) => {
                warn!("Failed to send command {command}: {e}");
                self.store.apply(&token, |state| {
                    state.last_error = Some(format!("Failed to send command {command}: {e}"))
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::DashboardConfig, scheduler::PollScheduler, test::FakeRemote};
    use sps_protocol::wago::types::DiscreteStatus;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn start(
        remote: FakeRemote,
    ) -> (
        Arc<FakeRemote>,
        StateStore,
        PollScheduler<FakeRemote>,
        CommandDispatcher<FakeRemote>,
    ) {
        let config = DashboardConfig::default();
        let remote = Arc::new(remote);
        let store = StateStore::new();
        let scheduler = PollScheduler::start(remote.clone(), store.clone(), &config);
        let dispatcher = CommandDispatcher::new(
            remote.clone(),
            store.clone(),
            scheduler.fast_path(),
            config.refresh_delay,
        );
        (remote, store, scheduler, dispatcher)
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_command_refreshes_lamps_early() {
        let remote = FakeRemote::new();
        remote.queue_discrete(ms(10), Ok(0));
        remote.set_discrete(ms(20), Ok(0b0110));

        let (remote, store, _scheduler, dispatcher) = start(remote);

        tokio::time::sleep(ms(100)).await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(0)));

        let refresh = dispatcher.dispatch(ControlCommand::Mode2).await.unwrap();
        assert_eq!(remote.commands_sent(), vec![ControlCommand::Mode2]);

        // Not before the refresh delay has passed.
        tokio::time::sleep(ms(250)).await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(0)));

        // Within the delay plus one round trip, well ahead of the fast tick at 700 ms.
        tokio::time::sleep(ms(80)).await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(0b0110)));
        assert_eq!(remote.discrete_calls(), 2);

        refresh.settled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_sets_error_without_refresh() {
        let remote = FakeRemote::new();
        remote.set_discrete(ms(10), Ok(1));
        remote.set_command(ms(10), Err(Error::Rejected(400)));

        let (remote, store, _scheduler, dispatcher) = start(remote);

        tokio::time::sleep(ms(50)).await;

        let result = dispatcher.dispatch(ControlCommand::Mode3).await;
        assert_eq!(result.err(), Some(Error::Rejected(400)));

        tokio::time::sleep(ms(500)).await;

        let state = store.read();
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed to send command mode 3: Request rejected with HTTP status 400")
        );
        assert_eq!(state.discrete, Some(DiscreteStatus::new(1)));
        assert_eq!(remote.discrete_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_discarded_after_shutdown() {
        let remote = FakeRemote::new();
        remote.queue_discrete(ms(10), Ok(1));
        remote.set_discrete(ms(10), Ok(2));

        let (remote, store, scheduler, dispatcher) = start(remote);

        tokio::time::sleep(ms(50)).await;
        let refresh = dispatcher.dispatch(ControlCommand::Mode1).await.unwrap();

        scheduler.shutdown();
        refresh.settled().await;

        assert_eq!(remote.discrete_calls(), 1);
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn last_settled_read_wins() {
        let remote = FakeRemote::new();
        // Initial tick.
        remote.queue_discrete(ms(10), Ok(1));
        // Command refresh issued at 350 ms, settles at 750 ms.
        remote.queue_discrete(ms(400), Ok(2));
        // Fast tick issued at 700 ms, settles at 710 ms.
        remote.queue_discrete(ms(10), Ok(3));
        remote.set_discrete(ms(10), Ok(4));

        let (_remote, store, _scheduler, dispatcher) = start(remote);

        tokio::time::sleep(ms(50)).await;
        let refresh = dispatcher.dispatch(ControlCommand::Mode0).await.unwrap();

        tokio::time::sleep(ms(670)).await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(3)));

        refresh.settled().await;
        assert_eq!(store.read().discrete, Some(DiscreteStatus::new(2)));
    }
}
