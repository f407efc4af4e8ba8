//! One-hot ballots

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sharing::{encrypt_vector, shares_by_node, SecretSharing};

/// A validated one-hot vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    entries: Vec<i64>,
}

impl Ballot {
    /// Validate a vote: every entry 0 or 1, exactly one 1
    pub fn new(entries: Vec<i64>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Validation("vote has no slots".to_string()));
        }

        if let Some((slot, value)) = entries
            .iter()
            .enumerate()
            .find(|(_, v)| **v != 0 && **v != 1)
        {
            return Err(Error::Validation(format!(
                "slot {} holds {}, only 0 or 1 allowed",
                slot, value
            )));
        }

        let ones = entries.iter().filter(|v| **v == 1).count();
        if ones != 1 {
            return Err(Error::Validation(format!(
                "exactly one slot must be 1, found {}",
                ones
            )));
        }

        Ok(Ballot { entries })
    }

    /// Parse the comma-separated form, e.g. `"0,1,0"` or `"0.0,1.0,0.0"`
    pub fn parse(input: &str) -> Result<Self> {
        let entries = input
            .split(',')
            .map(|part| {
                let part = part.trim();
                let value = part
                    .parse::<f64>()
                    .map_err(|_| Error::Validation(format!("'{}' is not a number", part)))?;
                if value == 0.0 {
                    Ok(0)
                } else if value == 1.0 {
                    Ok(1)
                } else {
                    Err(Error::Validation(format!(
                        "'{}' is not a valid vote, only 0 or 1 allowed",
                        part
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[i64] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the chosen slot
    pub fn choice(&self) -> usize {
        self.entries.iter().position(|v| *v == 1).unwrap_or(0)
    }

    /// Secret-share the ballot; returns one vector per node
    pub fn split(&self, key: &dyn SecretSharing) -> Result<Vec<Vec<i64>>> {
        let values: Vec<f64> = self.entries.iter().map(|v| *v as f64).collect();
        let entry_shares = encrypt_vector(key, &values)?;
        shares_by_node(&entry_shares, key.share_count())
    }
}

impl FromStr for Ballot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ballot::parse(s)
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.entries.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
