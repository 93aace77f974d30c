mod tui;
mod watch;

use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use sps_dashboard::{
    config::{DashboardConfig, DEFAULT_API_URL},
    remote::{HttpRemote, Remote},
    Dashboard, Error,
};
use sps_protocol::wago::types::ControlCommand;
use std::time::Duration;

/// Live status dashboard for the WAGO 750 and Siemens S7-1500 controllers.
#[derive(Parser)]
struct Cli {
    /// Base URL of the REST API
    #[arg(long, env = "SPS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Lamp status polling period in milliseconds
    #[arg(long, env = "SPS_FAST_PERIOD", default_value_t = 700)]
    fast_period: u64,

    /// Temperature polling period in milliseconds
    #[arg(long, env = "SPS_SLOW_PERIOD", default_value_t = 1000)]
    slow_period: u64,

    /// Delay before re-reading the lamps after a command, in milliseconds
    #[arg(long, env = "SPS_REFRESH_DELAY", default_value_t = 300)]
    refresh_delay: u64,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "SPS_TIMEOUT")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Dashboard,

    /// Log state changes instead of drawing the dashboard
    Watch,

    /// Send one control command and log the lamp state that follows
    Send {
        /// Control mode, 0 to 3
        #[arg(value_parser = parse_command)]
        mode: ControlCommand,
    },

    /// Query the API health endpoint
    Health,
}

impl Cli {
    fn config(&self) -> DashboardConfig {
        DashboardConfig {
            api_url: self.api_url.clone(),
            fast_period: Duration::from_millis(self.fast_period),
            slow_period: Duration::from_millis(self.slow_period),
            refresh_delay: Duration::from_millis(self.refresh_delay),
            request_timeout: self.timeout.map(Duration::from_millis),
        }
    }
}

fn parse_command(s: &str) -> Result<ControlCommand, String> {
    let code: u8 = s.parse().map_err(|e| format!("{e}"))?;
    ControlCommand::try_from(code).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Dashboard);

    // Log output would corrupt the terminal UI
    if !matches!(command, Command::Dashboard) {
        env_logger::init();
    }

    let config = cli.config();
    debug!("{config:?}");

    let remote = match HttpRemote::new(&config.api_url, config.request_timeout) {
        Ok(remote) => remote,
        Err(e) => {
            error!("Failed to create HTTP client: {e}");
            eprintln!("Failed to create HTTP client: {e}");
            ::std::process::exit(1);
        }
    };

    match command {
        Command::Dashboard => {
            if let Err(e) = tui::run(remote, &config).await {
                eprintln!("Dashboard failed: {e}");
                ::std::process::exit(1);
            }
        }
        Command::Watch => {
            check_api_health(&remote).await;
            watch::run(remote, &config).await;
        }
        Command::Send { mode } => {
            check_api_health(&remote).await;
            if let Err(e) = send(remote, &config, mode).await {
                error!("Failed to send {mode}: {e}");
                ::std::process::exit(1);
            }
        }
        Command::Health => {
            if !check_api_health(&remote).await {
                ::std::process::exit(1);
            }
        }
    }
}

async fn send(
    remote: HttpRemote,
    config: &DashboardConfig,
    command: ControlCommand,
) -> Result<(), Error> {
    let dashboard = Dashboard::start(remote, config);

    let result = match dashboard.dispatch(command).await {
        Ok(refresh) => {
            refresh.settled().await;
            info!("After {command}: {}", watch::describe(&dashboard.snapshot()));
            Ok(())
        }
        Err(e) => Err(e),
    };

    dashboard.shutdown();
    result
}

/// Logs what the API reports about itself, returns whether it looks usable.
async fn check_api_health(remote: &impl Remote) -> bool {
    match remote.health().await {
        Ok(report) => {
            info!(
                "{} reports status {}",
                report.service.as_deref().unwrap_or("API"),
                report.status
            );

            if report.database_connected() {
                debug!(
                    "Stored records: {} lamp status, {} temperature",
                    report.wago_data_count.unwrap_or_default(),
                    report.siemens_data_count.unwrap_or_default()
                );
            } else {
                warn!(
                    "API database is not connected{}, readings may be missing",
                    report
                        .error
                        .as_ref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                );
            }

            report.is_up()
        }
        Err(e) => {
            warn!("Health check failed: {e}");
            false
        }
    }
}
