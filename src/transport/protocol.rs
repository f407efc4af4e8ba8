//! Wire types for the storage node API
//!
//! Every endpoint takes a JSON body and answers either with a success payload
//! or with `{"errors": [...]}`. [`NodeReply`] models both so call sites never
//! have to sniff the shape themselves.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Path of the schema creation endpoint
pub const SCHEMAS_PATH: &str = "/schemas";

/// Path of the record creation endpoint
pub const CREATE_PATH: &str = "/data/create";

/// Path of the record query endpoint
pub const READ_PATH: &str = "/data/read";

/// One node's share of one vote, as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Vote correlator, identical on every node
    #[serde(rename = "_id")]
    pub id: String,

    /// This node's share of each slot
    pub vote_vector: Vec<i64>,

    /// Identity of the voter
    pub voter_id: String,
}

/// Body of `POST /schemas`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchemaRequest {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub keys: Vec<String>,
    pub schema: Value,
}

/// Body of `POST /data/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordsRequest {
    pub schema: Uuid,
    pub data: Vec<VoteRecord>,
}

/// Query options for `POST /data/read`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Body of `POST /data/read`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRecordsRequest {
    pub schema: Uuid,
    pub filter: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ReadOptions>,
}

impl ReadRecordsRequest {
    /// Full scan of a schema
    pub fn all(schema: Uuid) -> Self {
        ReadRecordsRequest {
            schema,
            filter: Map::new(),
            options: None,
        }
    }

    /// At most one record cast by `voter_id`
    pub fn by_voter(schema: Uuid, voter_id: &str) -> Self {
        let mut filter = Map::new();
        filter.insert("voter_id".to_string(), Value::String(voter_id.to_string()));

        ReadRecordsRequest {
            schema,
            filter,
            options: Some(ReadOptions { limit: Some(1) }),
        }
    }
}

/// `{"data": ...}` wrapper used by the data endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Outcome of a record creation batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSummary {
    /// Ids of records the node stored
    #[serde(default)]
    pub created: Vec<String>,

    /// Per-record rejections
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Structured failure body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub errors: Vec<Value>,
}

impl ErrorBody {
    /// Human-readable summary of the reported errors
    pub fn describe(&self) -> String {
        describe_errors(&self.errors)
    }
}

/// Reply from a storage node: success payload or structured error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeReply<T> {
    Failure(ErrorBody),
    Success(T),
}

impl<T> NodeReply<T> {
    /// Convert into a `Result`, keeping the error body
    pub fn into_result(self) -> std::result::Result<T, ErrorBody> {
        match self {
            NodeReply::Success(value) => Ok(value),
            NodeReply::Failure(body) => Err(body),
        }
    }
}

/// Join error entries into one line
pub fn describe_errors(errors: &[Value]) -> String {
    if errors.is_empty() {
        return "no details".to_string();
    }
    errors
        .iter()
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
