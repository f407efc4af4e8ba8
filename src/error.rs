//! Error types for sharevote

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sharevote
#[derive(Error, Debug)]
pub enum Error {
    // Ballot errors
    #[error("Invalid vote: {0}")]
    Validation(String),

    #[error("Voter {voter_id} has already voted")]
    AlreadyVoted { voter_id: String },

    // Storage node errors
    #[error("Node {node} rejected request with status {status}: {message}")]
    Node {
        node: String,
        status: u16,
        message: String,
    },

    #[error("Network error talking to node {node}: {message}")]
    Network { node: String, message: String },

    #[error("Failed to create schema on node {node} after {attempts} attempt(s): {source}")]
    Provisioning {
        node: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to upload vote share to node {node}: {source}")]
    Upload {
        node: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to read vote shares from node {node}: {source}")]
    Read {
        node: String,
        #[source]
        source: Box<Error>,
    },

    // Crypto errors
    #[error("Secret sharing error: {0}")]
    Sharing(String),

    #[error("Invalid access token: {0}")]
    Token(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether retrying the same request may succeed.
    ///
    /// Only transport-level failures qualify; a node that answered with an
    /// error status has made a decision and is not asked again.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Provisioning { source, .. }
            | Error::Upload { source, .. }
            | Error::Read { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Wrap a reqwest failure for the given node
    pub fn network(node: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Error::Network {
            node: node.to_string(),
            message,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let node = e
            .url()
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|| "unknown".to_string());
        Error::network(&node, e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
