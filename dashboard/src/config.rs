use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Timing and endpoint settings for a dashboard session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Base URL of the REST API, endpoint paths are appended to it.
    pub api_url: String,

    /// Period of the lamp status loop.
    pub fast_period: Duration,

    /// Period of the temperature loop.
    pub slow_period: Duration,

    /// Delay between an accepted command and the confirmatory lamp read.
    pub refresh_delay: Duration,

    /// Per-request timeout, `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            fast_period: Duration::from_millis(700),
            slow_period: Duration::from_millis(1000),
            refresh_delay: Duration::from_millis(300),
            request_timeout: None,
        }
    }
}
