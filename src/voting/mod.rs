//! Vote encoding, upload and tallying
//!
//! A vote is a one-hot [`Ballot`]. The [`VoteUploader`] splits it into one
//! share vector per node and writes them under a shared vote id; the
//! [`ResultAggregator`] reads them back and rebuilds per-slot totals without
//! ever holding an individual plaintext vote outside reconstruction.

mod ballot;
mod tally;
mod upload;

pub use ballot::Ballot;
pub use tally::{ResultAggregator, TallyReport};
pub use upload::{VoteReceipt, VoteUploader};

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cluster::{AuthenticatedCluster, Cluster, NodeDescriptor, SchemaProvisioner};
    use crate::error::Error;
    use crate::retry::RetryPolicy;
    use crate::sharing::{generate_key, SharingMode, Topology};
    use crate::transport::memory::MemoryTransport;
    use std::sync::Arc;

    /// Provisioned in-memory cluster with an uploader and aggregator bound to it
    pub(crate) async fn setup(
        node_count: usize,
        slot_count: usize,
    ) -> (Arc<MemoryTransport>, Cluster, VoteUploader, ResultAggregator) {
        let transport = Arc::new(MemoryTransport::new());
        let nodes = (0..node_count)
            .map(|i| {
                NodeDescriptor::new(format!("http://node-{}", i), format!("node-{}", i), "org")
                    .authenticate(format!("token-{}", i))
            })
            .collect();

        let cluster = SchemaProvisioner::new(transport.clone(), RetryPolicy::none())
            .provision(AuthenticatedCluster::new(nodes).unwrap(), slot_count)
            .await
            .unwrap();

        let key = Arc::new(generate_key(Topology::new(node_count), SharingMode::Sum).unwrap());
        let uploader = VoteUploader::new(
            transport.clone(),
            key.clone(),
            RetryPolicy::none(),
            RetryPolicy::none(),
        );
        let aggregator = ResultAggregator::new(transport.clone(), key, RetryPolicy::none());

        (transport, cluster, uploader, aggregator)
    }

    #[tokio::test]
    async fn test_two_voter_scenario() {
        let (transport, cluster, uploader, aggregator) = setup(2, 3).await;

        uploader.submit(&cluster, "A", &[1, 0, 0]).await.unwrap();
        uploader.submit(&cluster, "B", &[0, 0, 1]).await.unwrap();

        let writes_before: u32 = cluster
            .nodes()
            .iter()
            .map(|n| transport.write_calls(n.url()))
            .sum();
        let retry = uploader.submit(&cluster, "A", &[0, 1, 0]).await;
        assert!(matches!(retry, Err(Error::AlreadyVoted { .. })));
        let writes_after: u32 = cluster
            .nodes()
            .iter()
            .map(|n| transport.write_calls(n.url()))
            .sum();
        assert_eq!(writes_before, writes_after);

        assert_eq!(aggregator.results(&cluster).await.unwrap(), vec![1, 0, 1]);
        assert_eq!(aggregator.vote_count(&cluster).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tally_is_repeatable() {
        let (_, cluster, uploader, aggregator) = setup(3, 2).await;
        uploader.submit(&cluster, "A", &[0, 1]).await.unwrap();

        let first = aggregator.tally(&cluster).await.unwrap();
        let second = aggregator.tally(&cluster).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.counts, vec![0, 1]);
    }
}
