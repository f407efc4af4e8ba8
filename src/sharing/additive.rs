//! Additive secret sharing over a prime field
//!
//! A value is split into `n` shares that are uniformly random modulo
//! [`SHARE_MODULUS`] except for the last, which makes the total come out to
//! the plaintext. Any `n - 1` shares reveal nothing.

use super::{SecretSharing, SharingMode, Topology};
use crate::error::{Error, Result};
use rand::Rng;

/// Prime modulus for share arithmetic (2^32 + 15)
pub const SHARE_MODULUS: u64 = (1u64 << 32) + 15;

/// Smallest plaintext that can be shared
const PLAINTEXT_MIN: i64 = -(1i64 << 31);

/// One past the largest plaintext that can be shared
const PLAINTEXT_MAX: i64 = 1i64 << 31;

/// Key for additive sharing across a fixed number of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditiveKey {
    nodes: usize,
}

/// Generate a key for `topology` supporting `mode`
pub fn generate_key(topology: Topology, mode: SharingMode) -> Result<AdditiveKey> {
    if topology.nodes == 0 {
        return Err(Error::Sharing(
            "cluster must have at least one node".to_string(),
        ));
    }

    match mode {
        SharingMode::Sum => Ok(AdditiveKey {
            nodes: topology.nodes,
        }),
    }
}

impl AdditiveKey {
    /// Number of nodes this key shares across
    pub fn nodes(&self) -> usize {
        self.nodes
    }
}

impl SecretSharing for AdditiveKey {
    fn share_count(&self) -> usize {
        self.nodes
    }

    fn encrypt(&self, plaintext: i64) -> Result<Vec<i64>> {
        if !(PLAINTEXT_MIN..PLAINTEXT_MAX).contains(&plaintext) {
            return Err(Error::Sharing(format!(
                "plaintext {} outside shareable range",
                plaintext
            )));
        }

        let mut rng = rand::thread_rng();
        let mut shares = Vec::with_capacity(self.nodes);
        let mut total: u64 = 0;

        for _ in 1..self.nodes {
            let share = rng.gen_range(0..SHARE_MODULUS);
            total = (total + share) % SHARE_MODULUS;
            shares.push(share as i64);
        }

        let value = plaintext.rem_euclid(SHARE_MODULUS as i64) as u64;
        let last = (value + SHARE_MODULUS - total) % SHARE_MODULUS;
        shares.push(last as i64);

        Ok(shares)
    }

    fn decrypt(&self, shares: &[i64]) -> Result<i64> {
        if shares.len() != self.nodes {
            return Err(Error::Sharing(format!(
                "expected {} shares, got {}",
                self.nodes,
                shares.len()
            )));
        }

        let sum = shares.iter().fold(0u64, |acc, share| {
            let share = share.rem_euclid(SHARE_MODULUS as i64) as u64;
            (acc + share) % SHARE_MODULUS
        });

        // Upper half of the field encodes negative values
        if sum >= PLAINTEXT_MAX as u64 {
            Ok(sum as i64 - SHARE_MODULUS as i64)
        } else {
            Ok(sum as i64)
        }
    }
}
