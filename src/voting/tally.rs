//! Result reconstruction
//!
//! Shares are read from every node, grouped by vote id and put back in node
//! order. Only complete groups are reconstructed; the rest are skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::fanout::{collect_all, fan_out};
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::sharing::{decrypt_vector, shares_by_slot, SecretSharing};
use crate::transport::{ReadRecordsRequest, StorageTransport, VoteRecord};

/// Aggregated voting results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReport {
    /// Votes per slot
    pub counts: Vec<i64>,
    /// Votes reconstructed
    pub counted: usize,
    /// Vote ids skipped for missing or malformed shares
    pub incomplete: usize,
}

impl TallyReport {
    fn empty(slot_count: usize) -> Self {
        TallyReport {
            counts: vec![0; slot_count],
            counted: 0,
            incomplete: 0,
        }
    }

    /// Total votes across all slots
    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }
}

/// Shares of one vote, indexed by node
type ShareGroup = Vec<Option<Vec<i64>>>;

/// Reads shares back from the cluster and tallies them
pub struct ResultAggregator {
    transport: Arc<dyn StorageTransport>,
    key: Arc<dyn SecretSharing>,
    retry: RetryPolicy,
}

impl ResultAggregator {
    pub fn new(
        transport: Arc<dyn StorageTransport>,
        key: Arc<dyn SecretSharing>,
        retry: RetryPolicy,
    ) -> Self {
        ResultAggregator {
            transport,
            key,
            retry,
        }
    }

    /// Read every record from every node; one list per node, in node order
    pub async fn collect(&self, cluster: &Cluster) -> Result<Vec<Vec<VoteRecord>>> {
        let transport = self.transport.as_ref();
        let retry = &self.retry;

        let outcomes = fan_out(cluster.nodes(), move |index, node| async move {
            let endpoint = node.endpoint();
            let request = ReadRecordsRequest::all(node.schema_id());
            let label = format!("Share read from node {}", index);

            retry
                .run(&label, || transport.read_records(&endpoint, &request))
                .await
                .map_err(|e| Error::Read {
                    node: endpoint.url.to_string(),
                    source: Box::new(e.last),
                })
        })
        .await;

        collect_all(outcomes, "Share read")
    }

    /// Reconstruct every complete vote and sum them per slot
    pub async fn tally(&self, cluster: &Cluster) -> Result<TallyReport> {
        if self.key.share_count() != cluster.len() {
            return Err(Error::Sharing(format!(
                "key expects {} shares for {} nodes",
                self.key.share_count(),
                cluster.len()
            )));
        }

        let per_node = self.collect(cluster).await?;
        let report = self.reconstruct(per_node, cluster.slot_count());

        info!(
            "Tallied {} votes ({} incomplete)",
            report.counted, report.incomplete
        );
        Ok(report)
    }

    /// Per-slot vote counts
    pub async fn results(&self, cluster: &Cluster) -> Result<Vec<i64>> {
        Ok(self.tally(cluster).await?.counts)
    }

    /// Number of votes cast
    pub async fn vote_count(&self, cluster: &Cluster) -> Result<i64> {
        Ok(self.tally(cluster).await?.total())
    }

    fn reconstruct(&self, per_node: Vec<Vec<VoteRecord>>, slot_count: usize) -> TallyReport {
        let node_count = per_node.len();
        let mut groups: BTreeMap<String, ShareGroup> = BTreeMap::new();

        for (index, records) in per_node.into_iter().enumerate() {
            for record in records {
                let group = groups
                    .entry(record.id)
                    .or_insert_with(|| vec![None; node_count]);
                if group[index].is_some() {
                    warn!("Node {} returned vote share twice; keeping the first", index);
                    continue;
                }
                group[index] = Some(record.vote_vector);
            }
        }

        let mut report = TallyReport::empty(slot_count);

        for (vote_id, group) in groups {
            match self.reconstruct_vote(group, slot_count) {
                Ok(vote) => {
                    for (count, value) in report.counts.iter_mut().zip(vote) {
                        *count += value;
                    }
                    report.counted += 1;
                }
                Err(reason) => {
                    warn!("Skipping vote {}: {}", vote_id, reason);
                    report.incomplete += 1;
                }
            }
        }

        debug!(
            "Reconstructed {} of {} votes",
            report.counted,
            report.counted + report.incomplete
        );
        report
    }

    fn reconstruct_vote(&self, group: ShareGroup, slot_count: usize) -> Result<Vec<i64>> {
        let missing: Vec<usize> = group
            .iter()
            .enumerate()
            .filter(|(_, share)| share.is_none())
            .map(|(index, _)| index)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Sharing(format!("missing shares from nodes {:?}", missing)));
        }

        let vectors: Vec<Vec<i64>> = group.into_iter().flatten().collect();
        let by_slot = shares_by_slot(&vectors, slot_count)?;

        Ok(decrypt_vector(self.key.as_ref(), &by_slot)?
            .into_iter()
            .map(|v| v.round() as i64)
            .collect())
    }
}
