//! sharevote - Secret-shared voting over a storage cluster
//!
//! Votes are split into additive shares, one per storage node, so no single
//! node ever sees a complete vote. Totals are rebuilt by summing shares.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod retry;
pub mod sharing;
pub mod transport;
pub mod voting;

pub use client::VotingClient;
pub use config::ClusterConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::VotingClient;
    pub use crate::cluster::{Cluster, SchemaSummary};
    pub use crate::config::ClusterConfig;
    pub use crate::error::{Error, Result};
    pub use crate::voting::{Ballot, TallyReport, VoteReceipt};
}
