//! Storage node stages
//!
//! A node moves through three immutable stages: a bare [`NodeDescriptor`],
//! an [`AuthenticatedNode`] holding its access token, and a provisioned
//! [`Node`] that also knows the cluster's schema id. Each stage is produced
//! from the previous one, so a half-initialized node cannot exist.

use crate::transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Anything addressable by a node url
pub trait NodeAddress {
    /// Node root url
    fn url(&self) -> &str;
}

/// Identity of one storage endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    url: String,
    node_id: String,
    org_id: String,
}

impl NodeDescriptor {
    /// Create a descriptor; a trailing `/` on the url is dropped
    pub fn new(url: impl Into<String>, node_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.strip_suffix('/').map(str::to_string).unwrap_or(url);

        NodeDescriptor {
            url,
            node_id: node_id.into(),
            org_id: org_id.into(),
        }
    }

    /// Endpoint root
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Node identifier, used as token audience
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Organization identifier, used as token issuer
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// Attach an access token
    pub fn authenticate(self, bearer_token: String) -> AuthenticatedNode {
        AuthenticatedNode {
            descriptor: self,
            bearer_token,
        }
    }
}

impl NodeAddress for NodeDescriptor {
    fn url(&self) -> &str {
        &self.url
    }
}

/// A node with an access token but no schema yet
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedNode {
    descriptor: NodeDescriptor,
    bearer_token: String,
}

impl AuthenticatedNode {
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// Request target for this node
    pub fn endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            url: self.descriptor.url(),
            bearer_token: &self.bearer_token,
        }
    }

    /// Bind the node to a created schema
    pub fn provisioned(self, schema_id: Uuid) -> Node {
        Node {
            descriptor: self.descriptor,
            bearer_token: self.bearer_token,
            schema_id,
        }
    }
}

impl NodeAddress for AuthenticatedNode {
    fn url(&self) -> &str {
        self.descriptor.url()
    }
}

impl fmt::Debug for AuthenticatedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedNode")
            .field("descriptor", &self.descriptor)
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// A fully authenticated and provisioned storage node
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    descriptor: NodeDescriptor,
    bearer_token: String,
    schema_id: Uuid,
}

impl Node {
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn url(&self) -> &str {
        self.descriptor.url()
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    pub fn schema_id(&self) -> Uuid {
        self.schema_id
    }

    /// Request target for this node
    pub fn endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            url: self.descriptor.url(),
            bearer_token: &self.bearer_token,
        }
    }
}

impl NodeAddress for Node {
    fn url(&self) -> &str {
        self.descriptor.url()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("descriptor", &self.descriptor)
            .field("bearer_token", &"<redacted>")
            .field("schema_id", &self.schema_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let node = NodeDescriptor::new("https://nildb-a.example.com/api/v1/", "did:node:a", "did:org:x");
        assert_eq!(node.url(), "https://nildb-a.example.com/api/v1");

        let node = NodeDescriptor::new("http://localhost:8080", "a", "x");
        assert_eq!(node.url(), "http://localhost:8080");
    }

    #[test]
    fn test_stages_carry_identity() {
        let schema = Uuid::new_v4();
        let node = NodeDescriptor::new("http://node-a/", "node-a", "org")
            .authenticate("tok".to_string())
            .provisioned(schema);

        assert_eq!(node.url(), "http://node-a");
        assert_eq!(node.descriptor().node_id(), "node-a");
        assert_eq!(node.bearer_token(), "tok");
        assert_eq!(node.schema_id(), schema);

        let endpoint = node.endpoint();
        assert_eq!(endpoint.url, "http://node-a");
        assert_eq!(endpoint.bearer_token, "tok");
    }

    #[test]
    fn test_debug_redacts_token() {
        let node = NodeDescriptor::new("http://node-a", "node-a", "org")
            .authenticate("super-secret".to_string());
        let printed = format!("{:?}", node);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("redacted"));
    }
}
