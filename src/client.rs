//! Voting client facade
//!
//! Wires configuration, transport, sharing key, uploader and aggregator
//! together behind the four operations callers need.

use std::sync::Arc;

use tracing::info;

use crate::cluster::{Authenticator, Cluster, SchemaProvisioner, SchemaSummary};
use crate::config::ClusterConfig;
use crate::error::Result;
use crate::sharing::{generate_key, SecretSharing, SharingMode, Topology};
use crate::transport::{HttpTransport, StorageTransport};
use crate::voting::{ResultAggregator, TallyReport, VoteReceipt, VoteUploader};

/// Client bound to one provisioned cluster
pub struct VotingClient {
    cluster: Cluster,
    uploader: VoteUploader,
    aggregator: ResultAggregator,
}

impl VotingClient {
    /// Connect to an already initialized cluster over HTTP
    pub fn connect(config: &ClusterConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        Self::connect_with(config, transport)
    }

    /// Connect to an already initialized cluster through `transport`
    pub fn connect_with(config: &ClusterConfig, transport: Arc<dyn StorageTransport>) -> Result<Self> {
        let cluster = Cluster::from_config(config)?;
        Self::from_cluster(config, cluster, transport)
    }

    /// Authenticate against every node and create a fresh schema over HTTP
    pub async fn initialize(config: &ClusterConfig, slot_count: usize) -> Result<(Self, SchemaSummary)> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        Self::initialize_with(config, transport, slot_count).await
    }

    /// Authenticate and create a fresh schema through `transport`
    pub async fn initialize_with(
        config: &ClusterConfig,
        transport: Arc<dyn StorageTransport>,
        slot_count: usize,
    ) -> Result<(Self, SchemaSummary)> {
        let authenticator =
            Authenticator::from_hex(config.require_secret_key()?, config.token_ttl()?)?;
        let authenticated = authenticator.authenticate(config.descriptors())?;

        let provisioner = SchemaProvisioner::new(transport.clone(), config.provisioning_retry.clone());
        let cluster = provisioner.provision(authenticated, slot_count).await?;

        let summary = cluster.summary();
        info!(
            "Cluster initialized: schema {} with {} slots",
            summary.schema_id, summary.slot_count
        );

        let client = Self::from_cluster(config, cluster, transport)?;
        Ok((client, summary))
    }

    fn from_cluster(
        config: &ClusterConfig,
        cluster: Cluster,
        transport: Arc<dyn StorageTransport>,
    ) -> Result<Self> {
        let key: Arc<dyn SecretSharing> =
            Arc::new(generate_key(Topology::new(cluster.len()), SharingMode::Sum)?);

        let uploader = VoteUploader::new(
            transport.clone(),
            key.clone(),
            config.upload_retry.clone(),
            config.read_retry.clone(),
        );
        let aggregator = ResultAggregator::new(transport, key, config.read_retry.clone());

        Ok(VotingClient {
            cluster,
            uploader,
            aggregator,
        })
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Cast a vote for `voter_id`
    pub async fn submit_vote(&self, voter_id: &str, vote: &[i64]) -> Result<VoteReceipt> {
        self.uploader.submit(&self.cluster, voter_id, vote).await
    }

    pub async fn has_voted(&self, voter_id: &str) -> Result<bool> {
        self.uploader.has_voted(&self.cluster, voter_id).await
    }

    /// Votes per slot
    pub async fn get_results(&self) -> Result<Vec<i64>> {
        self.aggregator.results(&self.cluster).await
    }

    /// Total votes cast
    pub async fn get_vote_count(&self) -> Result<i64> {
        self.aggregator.vote_count(&self.cluster).await
    }

    /// Per-slot counts with reconstruction statistics
    pub async fn get_report(&self) -> Result<TallyReport> {
        self.aggregator.tally(&self.cluster).await
    }
}
