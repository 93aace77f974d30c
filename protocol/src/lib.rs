//! Wire and domain types shared between the dashboard core and the REST API that
//! fronts the two controllers.
//!
//! The WAGO 750 is the discrete I/O controller (16 lamp outputs plus four control
//! modes), the Siemens S7-1500 is the temperature controller.

pub mod siemens;
pub mod types;
pub mod wago;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Status value {0} does not fit in 16 bits")]
    StatusOutOfRange(i64),

    #[error("Unknown control command {0} (expected 0 to 3)")]
    UnknownCommand(u8),
}
