//! Secret sharing for vote vectors
//!
//! The sharing scheme itself is an external capability consumed through
//! [`SecretSharing`]. [`AdditiveKey`] is the additive ("sum") scheme the
//! voting protocol relies on: shares of each value add up to that value, so
//! per-slot sums can be rebuilt without revealing any single vote.
//!
//! Values are shared in fixed point, scaled by [`SCALING_FACTOR`].

mod additive;

pub use additive::{generate_key, AdditiveKey, SHARE_MODULUS};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Decimal digits kept by the fixed-point encoding
pub const PRECISION: u32 = 7;

/// Fixed-point scaling factor (10^PRECISION)
pub const SCALING_FACTOR: i64 = 10_i64.pow(PRECISION);

/// Cluster layout a key is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Number of parties holding shares
    pub nodes: usize,
}

impl Topology {
    /// Topology with `nodes` parties
    pub fn new(nodes: usize) -> Self {
        Topology { nodes }
    }
}

/// Operation the shared values must support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingMode {
    /// Additive shares; summing shares reconstructs the plaintext
    Sum,
}

/// An external secret-sharing capability bound to one key
pub trait SecretSharing: Send + Sync {
    /// Number of shares produced per value
    fn share_count(&self) -> usize;

    /// Split `plaintext` into one share per node
    fn encrypt(&self, plaintext: i64) -> Result<Vec<i64>>;

    /// Rebuild the plaintext from shares ordered by node index
    fn decrypt(&self, shares: &[i64]) -> Result<i64>;
}

/// Convert a real value to its fixed-point integer
pub fn to_fixed_point(value: f64) -> i64 {
    (value * SCALING_FACTOR as f64).round() as i64
}

/// Convert a fixed-point integer back to a real value
pub fn from_fixed_point(value: i64) -> f64 {
    value as f64 / SCALING_FACTOR as f64
}

/// Encrypt every entry of `values`, returning per-entry share lists
pub fn encrypt_vector<S: SecretSharing + ?Sized>(key: &S, values: &[f64]) -> Result<Vec<Vec<i64>>> {
    values
        .iter()
        .map(|v| key.encrypt(to_fixed_point(*v)))
        .collect()
}

/// Decrypt per-entry share lists back to real values
pub fn decrypt_vector<S: SecretSharing + ?Sized>(key: &S, shares: &[Vec<i64>]) -> Result<Vec<f64>> {
    shares
        .iter()
        .map(|s| key.decrypt(s).map(from_fixed_point))
        .collect()
}

/// Turn per-entry shares (`[entry][node]`) into per-node vectors (`[node][entry]`)
pub fn shares_by_node(entry_shares: &[Vec<i64>], node_count: usize) -> Result<Vec<Vec<i64>>> {
    let mut by_node = vec![Vec::with_capacity(entry_shares.len()); node_count];

    for (entry, shares) in entry_shares.iter().enumerate() {
        if shares.len() != node_count {
            return Err(Error::Sharing(format!(
                "entry {} has {} shares, expected {}",
                entry,
                shares.len(),
                node_count
            )));
        }
        for (node, share) in shares.iter().enumerate() {
            by_node[node].push(*share);
        }
    }

    Ok(by_node)
}

/// Inverse of [`shares_by_node`]: node vectors (`[node][slot]`) to per-slot shares
pub fn shares_by_slot(node_vectors: &[Vec<i64>], slot_count: usize) -> Result<Vec<Vec<i64>>> {
    let mut by_slot = vec![Vec::with_capacity(node_vectors.len()); slot_count];

    for (node, vector) in node_vectors.iter().enumerate() {
        if vector.len() != slot_count {
            return Err(Error::Sharing(format!(
                "node {} holds {} slots, expected {}",
                node,
                vector.len(),
                slot_count
            )));
        }
        for (slot, share) in vector.iter().enumerate() {
            by_slot[slot].push(*share);
        }
    }

    Ok(by_slot)
}
