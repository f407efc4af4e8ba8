//! Vote submission

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::ballot::Ballot;
use crate::cluster::fanout::{collect_all, fan_out, succeeded_nodes};
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::sharing::SecretSharing;
use crate::transport::{CreateRecordsRequest, ReadRecordsRequest, StorageTransport, VoteRecord};

/// Proof of a stored vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    /// Correlator shared by every node's share
    pub vote_id: Uuid,
    pub voter_id: String,
    /// Nodes holding a share
    pub nodes: Vec<String>,
}

/// Validates, splits and stores votes
pub struct VoteUploader {
    transport: Arc<dyn StorageTransport>,
    key: Arc<dyn SecretSharing>,
    write_retry: RetryPolicy,
    read_retry: RetryPolicy,
}

impl VoteUploader {
    pub fn new(
        transport: Arc<dyn StorageTransport>,
        key: Arc<dyn SecretSharing>,
        write_retry: RetryPolicy,
        read_retry: RetryPolicy,
    ) -> Self {
        VoteUploader {
            transport,
            key,
            write_retry,
            read_retry,
        }
    }

    /// Whether node 0 already holds a vote from `voter_id`
    pub async fn has_voted(&self, cluster: &Cluster, voter_id: &str) -> Result<bool> {
        let node = cluster
            .node(0)
            .ok_or_else(|| Error::InvalidConfig("Cluster has no nodes".to_string()))?;
        let endpoint = node.endpoint();
        let request = ReadRecordsRequest::by_voter(node.schema_id(), voter_id);
        let transport = self.transport.as_ref();

        let records = self
            .read_retry
            .run("Duplicate vote check", || {
                transport.read_records(&endpoint, &request)
            })
            .await
            .map_err(|e| Error::Read {
                node: node.url().to_string(),
                source: Box::new(e.last),
            })?;

        Ok(!records.is_empty())
    }

    /// Store one vote across the cluster.
    ///
    /// Nothing is sent when the vote is malformed. A voter who already has a
    /// record on node 0 is refused before any write. If a node fails, shares
    /// already written elsewhere stay in place.
    pub async fn submit(&self, cluster: &Cluster, voter_id: &str, vote: &[i64]) -> Result<VoteReceipt> {
        if voter_id.trim().is_empty() {
            return Err(Error::Validation("voter id is empty".to_string()));
        }

        let ballot = Ballot::new(vote.to_vec())?;
        if ballot.len() != cluster.slot_count() {
            return Err(Error::Validation(format!(
                "vote has {} slots, schema expects {}",
                ballot.len(),
                cluster.slot_count()
            )));
        }

        if self.key.share_count() != cluster.len() {
            return Err(Error::Sharing(format!(
                "key produces {} shares for {} nodes",
                self.key.share_count(),
                cluster.len()
            )));
        }

        if self.has_voted(cluster, voter_id).await? {
            info!("Rejecting second vote from {}", voter_id);
            return Err(Error::AlreadyVoted {
                voter_id: voter_id.to_string(),
            });
        }

        let shares = ballot.split(self.key.as_ref())?;
        let vote_id = Uuid::new_v4();
        debug!("Uploading vote {} for {}", vote_id, voter_id);

        let transport = self.transport.as_ref();
        let retry = &self.write_retry;
        let shares = &shares;
        let record_id = vote_id.to_string();
        let record_id = &record_id;

        let outcomes = fan_out(cluster.nodes(), move |index, node| async move {
            let endpoint = node.endpoint();
            let request = CreateRecordsRequest {
                schema: node.schema_id(),
                data: vec![VoteRecord {
                    id: record_id.clone(),
                    vote_vector: shares[index].clone(),
                    voter_id: voter_id.to_string(),
                }],
            };
            let label = format!("Share upload to node {}", index);

            retry
                .run(&label, || transport.create_records(&endpoint, &request))
                .await
                .map_err(|e| Error::Upload {
                    node: endpoint.url.to_string(),
                    source: Box::new(e.last),
                })
        })
        .await;

        let nodes = succeeded_nodes(&outcomes);
        if nodes.len() != outcomes.len() {
            error!(
                "Vote {} partially stored; committed on {} of {} nodes: [{}]",
                vote_id,
                nodes.len(),
                outcomes.len(),
                nodes.join(", ")
            );
        }
        collect_all(outcomes, "Share upload")?;

        info!("Vote {} stored on {} nodes", vote_id, nodes.len());
        Ok(VoteReceipt {
            vote_id,
            voter_id: voter_id.to_string(),
            nodes,
        })
    }
}
