use super::Remote;
use crate::Error;
use log::trace;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use sps_protocol::{
    siemens::{rpc::TemperatureResponse, types::AnalogChannel},
    types::HealthReport,
    wago::{
        rpc::{ControlRequest, StatusResponse, CONTROL_PATH, STATUS_PATH},
        types::{ControlCommand, DiscreteStatus},
    },
};
use std::time::Duration;

/// [`Remote`] over the REST API using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    api_url: String,
}

impl HttpRemote {
    pub fn new(api_url: &str, timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self::with_client(builder.build()?, api_url))
    }

    pub fn with_client(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        trace!("GET {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        trace!("GET {url} -> {status}");

        if status == StatusCode::NO_CONTENT {
            return Err(Error::NoData);
        }
        if !status.is_success() {
            return Err(Error::Rejected(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

impl Remote for HttpRemote {
    async fn discrete_status(&self) -> Result<DiscreteStatus, Error> {
        let response: StatusResponse = self.get_json(STATUS_PATH).await?;
        response.into_status()?.ok_or(Error::NoData)
    }

    async fn analog(&self, channel: AnalogChannel) -> Result<f64, Error> {
        let response: TemperatureResponse = self.get_json(channel.path()).await?;
        response.value(channel).ok_or(Error::NoData)
    }

    async fn send_command(&self, command: ControlCommand) -> Result<(), Error> {
        let url = self.url(CONTROL_PATH);
        trace!("POST {url} ({command})");

        let response = self
            .client
            .post(&url)
            .json(&ControlRequest::from(command))
            .send()
            .await?;
        let status = response.status();
        trace!("POST {url} -> {status}");

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Rejected(status.as_u16()))
        }
    }

    async fn health(&self) -> Result<HealthReport, Error> {
        self.get_json(HealthReport::PATH).await
    }
}
