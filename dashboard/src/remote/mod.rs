use crate::Error;
use core::future::Future;
use sps_protocol::{
    siemens::types::AnalogChannel,
    types::HealthReport,
    wago::types::{ControlCommand, DiscreteStatus},
};

mod http;

pub use http::HttpRemote;

/// The REST boundary in front of both controllers.
///
/// Every call issues exactly one request. Implementations do not retry or cache;
/// a missing value is reported as [`Error::NoData`], a non-success status as
/// [`Error::Rejected`].
pub trait Remote: Send + Sync + 'static {
    fn discrete_status(&self) -> impl Future<Output = Result<DiscreteStatus, Error>> + Send;

    fn analog(&self, channel: AnalogChannel) -> impl Future<Output = Result<f64, Error>> + Send;

    fn send_command(
        &self,
        command: ControlCommand,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn health(&self) -> impl Future<Output = Result<HealthReport, Error>> + Send;
}
