use core::fmt;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// The three temperature values published by the temperature controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum AnalogChannel {
    Actual,
    Setpoint,
    Difference,
}

impl fmt::Display for AnalogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Actual => "actual",
            Self::Setpoint => "setpoint",
            Self::Difference => "difference",
        })
    }
}

/// Latest temperature values, each absent when its last read failed.
///
/// The difference is reported by the controller and is not derived from the other
/// two values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalogReading {
    pub actual: Option<f64>,
    pub setpoint: Option<f64>,
    pub difference: Option<f64>,
}

impl AnalogReading {
    pub fn get(&self, channel: AnalogChannel) -> Option<f64> {
        match channel {
            AnalogChannel::Actual => self.actual,
            AnalogChannel::Setpoint => self.setpoint,
            AnalogChannel::Difference => self.difference,
        }
    }

    pub fn set(&mut self, channel: AnalogChannel, value: Option<f64>) {
        match channel {
            AnalogChannel::Actual => self.actual = value,
            AnalogChannel::Setpoint => self.setpoint = value,
            AnalogChannel::Difference => self.difference = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_none() && self.setpoint.is_none() && self.difference.is_none()
    }

    /// Value formatted for display, two decimals or `N/A`.
    pub fn display(&self, channel: AnalogChannel) -> String {
        match self.get(channel) {
            Some(value) => format!("{value:.2}"),
            None => "N/A".to_string(),
        }
    }
}
