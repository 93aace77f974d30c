use super::types::AnalogChannel;
use serde::{Deserialize, Serialize};

impl AnalogChannel {
    /// Endpoint serving the latest value of this channel.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Actual => "siemens/temperatur/ist/latest",
            Self::Setpoint => "siemens/temperatur/soll/latest",
            Self::Difference => "siemens/temperatur/differenz/latest",
        }
    }
}

/// Body of the `siemens/temperatur/*/latest` endpoints.
///
/// All three endpoints return the same record shape with only the field matching
/// the record type populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureResponse {
    pub ist_temperatur: Option<f64>,
    pub soll_temperatur: Option<f64>,
    pub differenz_temperatur: Option<f64>,
}

impl TemperatureResponse {
    pub fn value(&self, channel: AnalogChannel) -> Option<f64> {
        match channel {
            AnalogChannel::Actual => self.ist_temperatur,
            AnalogChannel::Setpoint => self.soll_temperatur,
            AnalogChannel::Difference => self.differenz_temperatur,
        }
    }
}
