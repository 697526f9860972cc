//! Typed HTTP client for a running registry.

use crate::models::{
    DiscoveredServer, HeartbeatReceipt, RegisterServerRequest, RegistrationReceipt, SearchRequest,
    ServerRecord, ToolMatch,
};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Registry responded {status} {code}: {detail}")]
    Api {
        status: u16,
        code: String,
        detail: String,
    },
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
    #[serde(default)]
    detail: String,
}

pub struct RegistryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let response = self.client.get(self.endpoint(&["health"])?).send().await?;
        decode(response).await
    }

    pub async fn register(
        &self,
        request: &RegisterServerRequest,
    ) -> Result<RegistrationReceipt, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&["register_server"])?)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn heartbeat(&self, server_id: &str) -> Result<HeartbeatReceipt, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&["heartbeat"])?)
            .query(&[("server_id", server_id)])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn search_tools(&self, request: &SearchRequest) -> Result<Vec<ToolMatch>, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&["search_tools"])?)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn find_server(&self, request: &SearchRequest) -> Result<DiscoveredServer, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&["find_server"])?)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>, ClientError> {
        let response = self.client.get(self.endpoint(&["servers"])?).send().await?;
        decode(response).await
    }

    pub async fn get_server(&self, id: &str) -> Result<ServerRecord, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&["servers", id])?)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, detail) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error, envelope.detail),
        Err(_) => ("unexpected_response".to_string(), body),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        detail,
    })
}
