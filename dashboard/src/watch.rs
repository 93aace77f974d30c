use log::{debug, info};
use sps_dashboard::{config::DashboardConfig, remote::Remote, store::ReconciledState, Dashboard};
use sps_protocol::{siemens::types::AnalogChannel, wago::types::LAMP_COUNT};

/// One-line summary of the state, without the loading flag.
///
/// Lamps are shown L1 first; an unknown status is shown as dashes so it cannot be
/// mistaken for all lamps off.
pub(crate) fn describe(state: &ReconciledState) -> String {
    let lamps = match state.discrete {
        Some(_) => state.lamps().to_string(),
        None => "-".repeat(LAMP_COUNT),
    };

    format!(
        "lamps={lamps} actual={} setpoint={} difference={} error={}",
        state.analog.display(AnalogChannel::Actual),
        state.analog.display(AnalogChannel::Setpoint),
        state.analog.display(AnalogChannel::Difference),
        state.last_error.as_deref().unwrap_or("-"),
    )
}

/// Runs the dashboard core headless until interrupted, logging state changes.
pub(crate) async fn run<R: Remote>(remote: R, config: &DashboardConfig) {
    let dashboard = Dashboard::start(remote, config);
    let mut rx = dashboard.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_summary = String::new();
    let mut last_loading = None;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }

                let state = rx.borrow_and_update().clone();

                let summary = describe(&state);
                if summary != last_summary {
                    info!("{summary}");
                    last_summary = summary;
                }

                if last_loading != Some(state.loading) {
                    debug!("loading={}", state.loading);
                    last_loading = Some(state.loading);
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    dashboard.shutdown();
}
