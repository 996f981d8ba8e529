//! Card-reader stand-in that posts scans to a running service.

use std::{future::Future, time::Duration};

use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::{info, warn};

use crate::config::SimulateArgs;
use crate::infra::error::InfraError;

const TARGET: &str = "rfidsystem::simulator";

pub struct Simulator {
    client: Client,
    endpoint: Url,
    rfids: Vec<String>,
    interval: Duration,
    count: Option<u64>,
}

impl Simulator {
    pub fn new(
        target: &str,
        rfids: Vec<String>,
        interval: Duration,
        count: Option<u64>,
    ) -> Result<Self, InfraError> {
        let endpoint = Url::parse(target)
            .and_then(|base| base.join("/card-scan"))
            .map_err(|err| InfraError::configuration(format!("invalid target `{target}`: {err}")))?;

        let rfids: Vec<String> = rfids
            .into_iter()
            .map(|rfid| rfid.trim().to_string())
            .filter(|rfid| !rfid.is_empty())
            .collect();
        if rfids.is_empty() {
            return Err(InfraError::configuration(
                "simulator needs at least one non-blank --rfid",
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("rfidsystem-simulator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            rfids,
            interval,
            count,
        })
    }

    pub fn from_args(args: &SimulateArgs) -> Result<Self, InfraError> {
        Self::new(
            &args.target,
            args.rfids.clone(),
            Duration::from_secs(args.interval_seconds),
            args.count,
        )
    }

    /// Post a single scan and return the response status.
    pub async fn scan_once(&self, rfid: &str) -> Result<StatusCode, InfraError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "rfid": rfid }))
            .send()
            .await
            .map_err(|err| InfraError::client(err.to_string()))?;
        Ok(response.status())
    }

    /// Scan the configured cards in turn until `count` scans were attempted or
    /// `shutdown` resolves. Failed requests are logged and the loop carries on.
    ///
    /// Returns the number of scans attempted.
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut sent = 0_u64;

        for rfid in self.rfids.iter().cycle() {
            if self.count.is_some_and(|count| sent >= count) {
                break;
            }

            match self.scan_once(rfid).await {
                Ok(status) => info!(
                    target = TARGET,
                    rfid = rfid.as_str(),
                    status = status.as_u16(),
                    "scan posted"
                ),
                Err(err) => warn!(
                    target = TARGET,
                    rfid = rfid.as_str(),
                    error = %err,
                    "scan request failed"
                ),
            }
            sent += 1;

            if self.count.is_some_and(|count| sent >= count) {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!(target = TARGET, sent, "simulator interrupted");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        sent
    }
}
