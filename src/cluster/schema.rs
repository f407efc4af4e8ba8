//! Schema provisioning across the cluster

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::fanout::{collect_all, fan_out};
use super::{AuthenticatedCluster, Cluster, Schema};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::transport::{CreateSchemaRequest, StorageTransport};

/// Name every node stores the voting schema under
pub const SCHEMA_NAME: &str = "voting_schema";

/// JSON Schema for vote records with `slot_count` slots
pub fn voting_schema(slot_count: usize) -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "VOTING SCHEMA",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "_id": {"type": "string", "format": "uuid", "coerce": true},
                "vote_vector": {
                    "description": "Share of the vote, one entry per slot",
                    "type": "array",
                    "items": {"type": "integer"},
                    "minItems": slot_count,
                    "maxItems": slot_count
                },
                "voter_id": {
                    "type": "string",
                    "description": "Unique identifier of the voter"
                }
            },
            "required": ["_id", "vote_vector", "voter_id"],
            "additionalProperties": false
        }
    })
}

/// Creates the voting schema on every node
pub struct SchemaProvisioner {
    transport: Arc<dyn StorageTransport>,
    retry: RetryPolicy,
}

impl SchemaProvisioner {
    pub fn new(transport: Arc<dyn StorageTransport>, retry: RetryPolicy) -> Self {
        SchemaProvisioner { transport, retry }
    }

    /// Create one fresh schema on all nodes in parallel.
    ///
    /// Transient failures are retried per node. When any node gives up, the
    /// lowest-index failure is returned; nodes that succeeded keep their
    /// schema.
    pub async fn provision(&self, cluster: AuthenticatedCluster, slot_count: usize) -> Result<Cluster> {
        if slot_count == 0 {
            return Err(Error::Validation(
                "Slot count must be at least 1".to_string(),
            ));
        }

        let schema_id = Uuid::new_v4();
        info!(
            "Creating schema {} with {} slots on {} nodes",
            schema_id,
            slot_count,
            cluster.len()
        );

        let request = CreateSchemaRequest {
            id: schema_id,
            name: SCHEMA_NAME.to_string(),
            keys: vec!["_id".to_string()],
            schema: voting_schema(slot_count),
        };

        let transport = self.transport.as_ref();
        let retry = &self.retry;
        let request = &request;

        let outcomes = fan_out(cluster.nodes(), move |index, node| async move {
            let endpoint = node.endpoint();
            let label = format!("Schema creation on node {}", index);

            retry
                .run(&label, || transport.create_schema(&endpoint, request))
                .await
                .map_err(|e| Error::Provisioning {
                    node: endpoint.url.to_string(),
                    attempts: e.attempts,
                    source: Box::new(e.last),
                })
        })
        .await;

        collect_all(outcomes, "Schema creation")?;

        info!("Schema {} created on all nodes", schema_id);
        cluster.provisioned(Schema::new(schema_id, slot_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeDescriptor;
    use crate::retry::BackoffKind;
    use crate::transport::memory::{Fault, MemoryTransport};

    fn cluster(urls: &[&str]) -> AuthenticatedCluster {
        let nodes = urls
            .iter()
            .map(|url| NodeDescriptor::new(*url, *url, "org").authenticate("tok".to_string()))
            .collect();
        AuthenticatedCluster::new(nodes).unwrap()
    }

    fn provisioner(transport: Arc<MemoryTransport>) -> SchemaProvisioner {
        SchemaProvisioner::new(transport, RetryPolicy::new(3, 1, BackoffKind::Linear))
    }

    #[test]
    fn test_schema_document() {
        let schema = voting_schema(4);
        let vector = &schema["items"]["properties"]["vote_vector"];
        assert_eq!(vector["minItems"], 4);
        assert_eq!(vector["maxItems"], 4);
        assert_eq!(schema["items"]["additionalProperties"], false);
        assert_eq!(
            schema["items"]["required"],
            json!(["_id", "vote_vector", "voter_id"])
        );
    }

    #[tokio::test]
    async fn test_provision_all_nodes() {
        let transport = Arc::new(MemoryTransport::new());
        let cluster = provisioner(transport.clone())
            .provision(cluster(&["http://a", "http://b"]), 3)
            .await
            .unwrap();

        assert_eq!(cluster.slot_count(), 3);
        for node in cluster.nodes() {
            assert_eq!(node.schema_id(), cluster.schema_id());
            assert!(transport.has_schema(node.url(), cluster.schema_id()));
        }
    }

    #[tokio::test]
    async fn test_zero_slots_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        let result = provisioner(transport.clone())
            .provision(cluster(&["http://a"]), 0)
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(transport.schema_calls("http://a"), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_attempts() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail("http://b", Fault::Network);

        let result = provisioner(transport.clone())
            .provision(cluster(&["http://a", "http://b"]), 3)
            .await;

        match result {
            Err(Error::Provisioning { node, attempts, source }) => {
                assert_eq!(node, "http://b");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, Error::Network { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(transport.schema_calls("http://b"), 3);
        assert_eq!(transport.schema_calls("http://a"), 1);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail("http://a", Fault::Status(400));

        let result = provisioner(transport.clone())
            .provision(cluster(&["http://a", "http://b"]), 3)
            .await;

        match result {
            Err(Error::Provisioning { node, attempts, .. }) => {
                assert_eq!(node, "http://a");
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(transport.schema_calls("http://a"), 1);
    }

    #[tokio::test]
    async fn test_lowest_index_failure_reported() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail("http://b", Fault::Status(500));
        transport.fail("http://c", Fault::Status(500));

        let result = provisioner(transport.clone())
            .provision(cluster(&["http://a", "http://b", "http://c"]), 2)
            .await;

        match result {
            Err(Error::Provisioning { node, .. }) => assert_eq!(node, "http://b"),
            other => panic!("unexpected: {:?}", other),
        }
        // Every node was still attempted
        assert_eq!(transport.schema_calls("http://c"), 1);
    }
}
