//! Storage cluster model
//!
//! A cluster is an ordered list of nodes. The order is load-bearing: share
//! vector position `i` always belongs to node `i`, for writes and for
//! reconstruction alike.
//!
//! Setup is staged. Descriptors are turned into an [`AuthenticatedCluster`]
//! by the [`Authenticator`], which the [`SchemaProvisioner`] turns into a
//! provisioned [`Cluster`].

pub mod auth;
pub mod fanout;
pub mod node;
pub mod schema;

pub use auth::{Authenticator, Claims};
pub use fanout::{collect_all, fan_out, NodeOutcome};
pub use node::{AuthenticatedNode, Node, NodeAddress, NodeDescriptor};
pub use schema::SchemaProvisioner;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema shared by every node of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Identical on every node
    pub schema_id: Uuid,
    /// Vote vector length
    pub slot_count: usize,
}

impl Schema {
    pub fn new(schema_id: Uuid, slot_count: usize) -> Self {
        Schema {
            schema_id,
            slot_count,
        }
    }
}

/// Cluster whose nodes hold tokens but no schema yet
#[derive(Debug, Clone)]
pub struct AuthenticatedCluster {
    nodes: Vec<AuthenticatedNode>,
}

impl AuthenticatedCluster {
    /// Create from authenticated nodes, in share order
    pub fn new(nodes: Vec<AuthenticatedNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::InvalidConfig(
                "A cluster needs at least one node".to_string(),
            ));
        }
        Ok(AuthenticatedCluster { nodes })
    }

    pub fn nodes(&self) -> &[AuthenticatedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bind every node to `schema`
    pub fn provisioned(self, schema: Schema) -> Result<Cluster> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|node| node.provisioned(schema.schema_id))
            .collect();
        Cluster::new(nodes, schema)
    }
}

/// Fully authenticated and provisioned cluster
#[derive(Debug, Clone)]
pub struct Cluster {
    nodes: Vec<Node>,
    schema: Schema,
}

impl Cluster {
    /// Create from provisioned nodes, in share order
    pub fn new(nodes: Vec<Node>, schema: Schema) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::InvalidConfig(
                "A cluster needs at least one node".to_string(),
            ));
        }

        if schema.slot_count == 0 {
            return Err(Error::InvalidConfig(
                "Schema must have at least one slot".to_string(),
            ));
        }

        // Diverging schema ids make shares unreconcilable
        if let Some(node) = nodes.iter().find(|n| n.schema_id() != schema.schema_id) {
            return Err(Error::InvalidConfig(format!(
                "Node {} uses schema {}, cluster uses {}",
                node.url(),
                node.schema_id(),
                schema.schema_id
            )));
        }

        Ok(Cluster { nodes, schema })
    }

    /// Rebuild from tokens and schema stored in configuration
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let slot_count = config.slot_count.ok_or_else(|| {
            Error::Config("No slot count recorded; initialize the schema first".to_string())
        })?;

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let token = node.bearer_token.clone().ok_or_else(|| {
                Error::Config(format!("Node {} has no bearer token", node.url))
            })?;
            let schema_id = node.schema_id.ok_or_else(|| {
                Error::Config(format!("Node {} has no schema id", node.url))
            })?;
            nodes.push(node.descriptor().authenticate(token).provisioned(schema_id));
        }

        let schema_id = nodes
            .first()
            .map(|n| n.schema_id())
            .ok_or_else(|| Error::InvalidConfig("No nodes configured".to_string()))?;

        Self::new(nodes, Schema::new(schema_id, slot_count))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node at share position `index`
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn schema_id(&self) -> Uuid {
        self.schema.schema_id
    }

    pub fn slot_count(&self) -> usize {
        self.schema.slot_count
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Summary of the provisioned state, suitable for persisting
    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            schema_id: self.schema.schema_id,
            slot_count: self.schema.slot_count,
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSummary {
                    url: n.url().to_string(),
                    node_id: n.descriptor().node_id().to_string(),
                    bearer_token: n.bearer_token().to_string(),
                })
                .collect(),
        }
    }
}

/// Per-node part of a [`SchemaSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub url: String,
    pub node_id: String,
    pub bearer_token: String,
}

/// Result of initializing a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub schema_id: Uuid,
    pub slot_count: usize,
    pub nodes: Vec<NodeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;

    fn node(url: &str, schema: Uuid) -> Node {
        NodeDescriptor::new(url, url, "org")
            .authenticate("tok".to_string())
            .provisioned(schema)
    }

    #[test]
    fn test_cluster_rejects_empty() {
        let schema = Schema::new(Uuid::new_v4(), 3);
        assert!(Cluster::new(vec![], schema).is_err());
        assert!(AuthenticatedCluster::new(vec![]).is_err());
    }

    #[test]
    fn test_cluster_rejects_mismatched_schema() {
        let schema = Schema::new(Uuid::new_v4(), 3);
        let nodes = vec![
            node("http://a", schema.schema_id),
            node("http://b", Uuid::new_v4()),
        ];
        assert!(Cluster::new(nodes, schema).is_err());
    }

    #[test]
    fn test_cluster_keeps_node_order() {
        let schema = Schema::new(Uuid::new_v4(), 2);
        let cluster = Cluster::new(
            vec![
                node("http://b", schema.schema_id),
                node("http://a", schema.schema_id),
            ],
            schema,
        )
        .unwrap();

        assert_eq!(cluster.node(0).unwrap().url(), "http://b");
        assert_eq!(cluster.node(1).unwrap().url(), "http://a");
        assert_eq!(cluster.summary().nodes[0].url, "http://b");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = ClusterConfig::default();
        config.nodes.push(NodeConfig::new("http://a", "node-a", "org"));
        config.slot_count = Some(3);

        match Cluster::from_config(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("bearer token")),
            other => panic!("unexpected: {:?}", other),
        }

        config.nodes[0].bearer_token = Some("tok".to_string());
        match Cluster::from_config(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("schema id")),
            other => panic!("unexpected: {:?}", other),
        }

        let schema = Uuid::new_v4();
        config.nodes[0].schema_id = Some(schema);
        let cluster = Cluster::from_config(&config).unwrap();
        assert_eq!(cluster.schema_id(), schema);
        assert_eq!(cluster.slot_count(), 3);
    }
}
