//! In-memory storage nodes for tests
//!
//! Keeps one record store per node url and lets tests inject failures and
//! count requests.

use super::protocol::{
    CreateRecordsRequest, CreateSchemaRequest, CreateSummary, ReadRecordsRequest, VoteRecord,
};
use super::{Endpoint, StorageTransport};
use crate::error::{Error, Result};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Failure to inject on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transport failure (transient)
    Network,
    /// Node answers with this status
    Status(u16),
}

#[derive(Default)]
struct NodeState {
    schemas: HashMap<Uuid, Value>,
    records: HashMap<Uuid, Vec<VoteRecord>>,
    fault: Option<Fault>,
    schema_calls: u32,
    write_calls: u32,
    read_calls: u32,
}

/// Shared fake cluster keyed by node url
#[derive(Default)]
pub struct MemoryTransport {
    nodes: Mutex<HashMap<String, NodeState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request to `url` fail with `fault`
    pub fn fail(&self, url: &str, fault: Fault) {
        self.nodes.lock().entry(url.to_string()).or_default().fault = Some(fault);
    }

    pub fn schema_calls(&self, url: &str) -> u32 {
        self.nodes.lock().get(url).map(|n| n.schema_calls).unwrap_or(0)
    }

    pub fn write_calls(&self, url: &str) -> u32 {
        self.nodes.lock().get(url).map(|n| n.write_calls).unwrap_or(0)
    }

    pub fn read_calls(&self, url: &str) -> u32 {
        self.nodes.lock().get(url).map(|n| n.read_calls).unwrap_or(0)
    }

    /// Whether `url` holds a schema with this id
    pub fn has_schema(&self, url: &str, schema: Uuid) -> bool {
        self.nodes
            .lock()
            .get(url)
            .map(|n| n.schemas.contains_key(&schema))
            .unwrap_or(false)
    }

    /// Records stored on `url` under `schema`
    pub fn records(&self, url: &str, schema: Uuid) -> Vec<VoteRecord> {
        self.nodes
            .lock()
            .get(url)
            .and_then(|n| n.records.get(&schema).cloned())
            .unwrap_or_default()
    }

    /// Drop one stored share, simulating a lost write
    pub fn remove_record(&self, url: &str, schema: Uuid, id: &str) {
        if let Some(records) = self
            .nodes
            .lock()
            .get_mut(url)
            .and_then(|n| n.records.get_mut(&schema))
        {
            records.retain(|r| r.id != id);
        }
    }

    /// Store a record directly, bypassing the client
    pub fn insert_record(&self, url: &str, schema: Uuid, record: VoteRecord) {
        self.nodes
            .lock()
            .entry(url.to_string())
            .or_default()
            .records
            .entry(schema)
            .or_default()
            .push(record);
    }

    fn check(endpoint: &Endpoint<'_>, state: &NodeState) -> Result<()> {
        match state.fault {
            Some(Fault::Network) => {
                return Err(Error::Network {
                    node: endpoint.url.to_string(),
                    message: "connection refused".to_string(),
                })
            }
            Some(Fault::Status(status)) => {
                return Err(Error::Node {
                    node: endpoint.url.to_string(),
                    status,
                    message: "injected failure".to_string(),
                })
            }
            None => {}
        }

        if endpoint.bearer_token.is_empty() {
            return Err(Error::Node {
                node: endpoint.url.to_string(),
                status: 401,
                message: "missing bearer token".to_string(),
            });
        }

        Ok(())
    }

    fn matches(record: &VoteRecord, filter: &serde_json::Map<String, Value>) -> bool {
        filter.iter().all(|(field, expected)| match field.as_str() {
            "_id" => expected.as_str() == Some(record.id.as_str()),
            "voter_id" => expected.as_str() == Some(record.voter_id.as_str()),
            _ => false,
        })
    }
}

#[async_trait]
impl StorageTransport for MemoryTransport {
    async fn create_schema(
        &self,
        endpoint: &Endpoint<'_>,
        request: &CreateSchemaRequest,
    ) -> Result<()> {
        let mut nodes = self.nodes.lock();
        let state = nodes.entry(endpoint.url.to_string()).or_default();
        state.schema_calls += 1;
        Self::check(endpoint, state)?;

        state.schemas.insert(request.id, request.schema.clone());
        Ok(())
    }

    async fn create_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &CreateRecordsRequest,
    ) -> Result<CreateSummary> {
        let mut nodes = self.nodes.lock();
        let state = nodes.entry(endpoint.url.to_string()).or_default();
        state.write_calls += 1;
        Self::check(endpoint, state)?;

        if !state.schemas.contains_key(&request.schema) {
            return Err(Error::Node {
                node: endpoint.url.to_string(),
                status: 404,
                message: format!("schema {} not found", request.schema),
            });
        }

        let created = request.data.iter().map(|r| r.id.clone()).collect();
        state
            .records
            .entry(request.schema)
            .or_default()
            .extend(request.data.iter().cloned());

        Ok(CreateSummary {
            created,
            errors: Vec::new(),
        })
    }

    async fn read_records(
        &self,
        endpoint: &Endpoint<'_>,
        request: &ReadRecordsRequest,
    ) -> Result<Vec<VoteRecord>> {
        let mut nodes = self.nodes.lock();
        let state = nodes.entry(endpoint.url.to_string()).or_default();
        state.read_calls += 1;
        Self::check(endpoint, state)?;

        let limit = request
            .options
            .as_ref()
            .and_then(|o| o.limit)
            .unwrap_or(usize::MAX);

        Ok(state
            .records
            .get(&request.schema)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| Self::matches(r, &request.filter))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
