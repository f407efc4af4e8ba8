//! Storage node transport
//!
//! Every node exposes the same three endpoints: create a schema, create
//! records, and read records by filter. [`StorageTransport`] is the seam the
//! rest of the crate talks through; [`HttpTransport`] is the production
//! implementation.

mod http;
#[cfg(test)]
pub(crate) mod memory;
pub mod protocol;

pub use http::{HttpTransport, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::{
    CreateRecordsRequest, CreateSchemaRequest, CreateSummary, ReadRecordsRequest, VoteRecord,
};

use crate::error::Result;
use async_trait::async_trait;

/// Address and credential for one request
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// Node root url, without trailing slash
    pub url: &'a str,
    /// Bearer token presented to the node
    pub bearer_token: &'a str,
}

/// Access to the storage node API
#[async_trait]
pub trait StorageTransport: Send + Sync {
    /// Create a schema; any success status counts
    async fn create_schema(&self, endpoint: &Endpoint<'_>, request: &CreateSchemaRequest)
        -> Result<()>;

    /// Store records under a schema
    async fn create_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &CreateRecordsRequest,
    ) -> Result<CreateSummary>;

    /// Query records under a schema
    async fn read_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &ReadRecordsRequest,
    ) -> Result<Vec<VoteRecord>>;
}
