//! Per-node fan-out
//!
//! Runs one future per node and always waits for every one of them, so a
//! failing node never leaves its siblings un-awaited.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, error};

use super::node::NodeAddress;
use crate::error::Result;

/// Outcome of one node's part of a fan-out
#[derive(Debug)]
pub struct NodeOutcome<T> {
    /// Position of the node in the cluster
    pub index: usize,
    /// Node url
    pub node: String,
    /// What the node's task produced
    pub result: Result<T>,
}

impl<T> NodeOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `op` against every node concurrently and join all of them.
///
/// Outcomes come back in node order.
pub async fn fan_out<'a, N, T, F, Fut>(nodes: &'a [N], op: F) -> Vec<NodeOutcome<T>>
where
    N: NodeAddress,
    F: Fn(usize, &'a N) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let futures = nodes.iter().enumerate().map(|(index, node)| {
        let task = op(index, node);
        async move {
            NodeOutcome {
                index,
                node: node.url().to_string(),
                result: task.await,
            }
        }
    });

    join_all(futures).await
}

/// Nodes whose task succeeded
pub fn succeeded_nodes<T>(outcomes: &[NodeOutcome<T>]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| o.node.clone())
        .collect()
}

/// Fold outcomes into per-node values, or the lowest-index failure.
///
/// Every failure is logged; only the first one is returned.
pub fn collect_all<T>(outcomes: Vec<NodeOutcome<T>>, operation: &str) -> Result<Vec<T>> {
    let total = outcomes.len();
    let mut values = Vec::with_capacity(total);
    let mut first_error = None;

    for outcome in outcomes {
        match outcome.result {
            Ok(value) => values.push(value),
            Err(e) => {
                error!(
                    "{} failed on node {} ({}): {}",
                    operation, outcome.index, outcome.node, e
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    debug!("{} succeeded on all {} nodes", operation, total);
    Ok(values)
}
