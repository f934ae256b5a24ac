//! HTTP client for the transfer-planning service

use super::planner::{SignedPayload, TransferData, TransferPlanner, TransferQuery, UnsignedTransfer};
use super::TxReference;
use crate::config::PlannerConfig;
use crate::error::{RunnerError, RunnerResult};

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct BuildRequest<'a> {
    query: &'a TransferQuery,
    amount: Decimal,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    query: &'a TransferQuery,
    extrinsic: &'a SignedPayload,
}

#[derive(Deserialize)]
struct SubmitResponse {
    tx_hash: String,
}

/// Planner reached over JSON/HTTP
pub struct HttpTransferPlanner {
    client: Client,
    base_url: Url,
}

impl HttpTransferPlanner {
    pub fn new(config: &PlannerConfig) -> RunnerResult<Self> {
        // join() replaces the last segment unless the base ends with '/'
        let mut url = config.url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        let base_url = Url::parse(&url)
            .map_err(|e| RunnerError::Config(format!("Invalid planner URL {}: {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RunnerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> RunnerResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.post_with(path, body, RunnerError::Planner).await
    }

    /// POST `body`, turning a non-2xx answer into the error built by `rejected`
    async fn post_with<B, R, F>(&self, path: &str, body: &B, rejected: F) -> RunnerResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
        F: FnOnce(String) -> RunnerError + Send,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RunnerError::Config(format!("Invalid planner path {}: {}", path, e)))?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(rejected(format!("{} returned {}: {}", path, status, text)));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RunnerError::Planner(format!("Malformed response from {}: {}", path, e)))
    }

    fn network_error(&self, e: reqwest::Error) -> RunnerError {
        RunnerError::Network {
            endpoint: format!("transfer planner at {}", self.base_url),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl TransferPlanner for HttpTransferPlanner {
    async fn transfer_data(&self, query: &TransferQuery) -> RunnerResult<TransferData> {
        self.post("transfer-data", query).await
    }

    async fn build_transfer(
        &self,
        query: &TransferQuery,
        amount: Decimal,
    ) -> RunnerResult<UnsignedTransfer> {
        self.post("transfer/build", &BuildRequest { query, amount }).await
    }

    async fn submit_signed(
        &self,
        query: &TransferQuery,
        signed: &SignedPayload,
    ) -> RunnerResult<TxReference> {
        // submit relays to the source chain
        let response: SubmitResponse = self
            .post_with(
                "transfer/submit",
                &SubmitRequest { query, extrinsic: signed },
                |message| RunnerError::TransferRejected {
                    chain: query.source_chain.clone(),
                    message,
                },
            )
            .await?;
        Ok(TxReference(response.tx_hash))
    }
}
