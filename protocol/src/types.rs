use serde::{Deserialize, Serialize};

/// Database connectivity as reported by the API health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseState {
    Connected,
    Disconnected,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub service: Option<String>,
    pub database: Option<DatabaseState>,
    pub wago_data_count: Option<u64>,
    pub siemens_data_count: Option<u64>,
    pub error: Option<String>,
}

impl HealthReport {
    pub const PATH: &'static str = "health";

    pub fn is_up(&self) -> bool {
        self.status == "UP"
    }

    pub fn database_connected(&self) -> bool {
        self.database == Some(DatabaseState::Connected)
    }
}
