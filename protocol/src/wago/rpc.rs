use super::types::{ControlCommand, DiscreteStatus};
use serde::{Deserialize, Serialize};

pub const STATUS_PATH: &str = "wago/status/latest";
pub const CONTROL_PATH: &str = "wago/control";

/// Body of `GET /wago/status/latest`.
///
/// Stored records carry further fields (id, binary copy, timestamp) which are not
/// needed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Option<i64>,
}

impl StatusResponse {
    /// `Ok(None)` when the record holds no status value.
    pub fn into_status(self) -> Result<Option<DiscreteStatus>, crate::Error> {
        self.status.map(DiscreteStatus::try_from).transpose()
    }
}

/// Body of `POST /wago/control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub command: u8,
}

impl From<ControlCommand> for ControlRequest {
    fn from(command: ControlCommand) -> Self {
        Self {
            command: command.code(),
        }
    }
}
