//! HTTP/JSON transport for storage nodes

use super::protocol::{
    describe_errors, CreateRecordsRequest, CreateSchemaRequest, CreateSummary, DataEnvelope,
    ErrorBody, NodeReply, ReadRecordsRequest, VoteRecord, CREATE_PATH, READ_PATH, SCHEMAS_PATH,
};
use super::{Endpoint, StorageTransport};
use crate::error::{Error, Result};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default per-request upper bound
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// Transport speaking JSON over HTTP with bearer authentication
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::from_builder(Self::client_builder(timeout))
    }

    fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
    }

    fn from_builder(builder: reqwest::ClientBuilder) -> Result<Self> {
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport { client })
    }

    /// POST `body` to `path` on the node and return the success status and body
    async fn post<B>(
        &self,
        endpoint: &Endpoint<'_>,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String)>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{}", endpoint.url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(endpoint.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::network(endpoint.url, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::network(endpoint.url, e))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => body.describe(),
                Err(_) => text,
            };
            return Err(Error::Node {
                node: endpoint.url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok((status, text))
    }

    /// Parse a success body that may still carry a structured failure
    fn parse_reply<T: DeserializeOwned>(
        endpoint: &Endpoint<'_>,
        status: StatusCode,
        text: &str,
    ) -> Result<T> {
        let reply: NodeReply<T> = serde_json::from_str(text).map_err(|e| {
            Error::Serialization(format!(
                "Unexpected reply from node {}: {}",
                endpoint.url, e
            ))
        })?;

        reply.into_result().map_err(|body| Error::Node {
            node: endpoint.url.to_string(),
            status: status.as_u16(),
            message: body.describe(),
        })
    }
}

#[async_trait]
impl StorageTransport for HttpTransport {
    async fn create_schema(
        &self,
        endpoint: &Endpoint<'_>,
        request: &CreateSchemaRequest,
    ) -> Result<()> {
        self.post(endpoint, SCHEMAS_PATH, request).await?;
        Ok(())
    }

    async fn create_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &CreateRecordsRequest,
    ) -> Result<CreateSummary> {
        let (status, text) = self.post(endpoint, CREATE_PATH, request).await?;
        let envelope: DataEnvelope<CreateSummary> = Self::parse_reply(endpoint, status, &text)?;
        let summary = envelope.data;

        if !summary.errors.is_empty() {
            return Err(Error::Node {
                node: endpoint.url.to_string(),
                status: status.as_u16(),
                message: describe_errors(&summary.errors),
            });
        }

        Ok(summary)
    }

    async fn read_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &ReadRecordsRequest,
    ) -> Result<Vec<VoteRecord>> {
        let (status, text) = self.post(endpoint, READ_PATH, request).await?;
        let envelope: DataEnvelope<Vec<VoteRecord>> =
            Self::parse_reply(endpoint, status, &text)?;
        Ok(envelope.data)
    }
}
