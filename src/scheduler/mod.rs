//! Node-selection strategies (§4.4). Each plugin picks which
//! [`NodeInfo`] a host should pin against, for both single-host and
//! batch dispatch. Algorithms and tie-break rules are transcribed
//! verbatim from the original scheduler plugins.

mod greedy;
mod least_load;
mod least_load_random;
mod load_weighted_random;

pub use greedy::Greedy;
pub use least_load::LeastLoad;
pub use least_load_random::LeastLoadRandom;
pub use load_weighted_random::LoadWeightedRandom;

use crate::error::{Error, Result};
use crate::model::NodeInfo;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// A node-selection strategy. Implementors must not mutate the nodes they
/// are given — capacity bookkeeping happens in the caller once a
/// selection is committed.
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick one node with spare capacity for `host`. Most strategies
    /// ignore the host identity; `load_weighted_random` hashes it into its
    /// selection weights to keep repeated picks for the same host stable.
    fn select_one(&self, nodes: &[NodeInfo], host: &str) -> Result<NodeInfo>;

    /// Pick one node per host in `hosts.len()`, honoring each node's
    /// remaining capacity across the whole batch.
    fn select_batch(&self, nodes: &[NodeInfo], host_count: usize) -> Result<Vec<NodeInfo>>;
}

/// Total remaining capacity across all candidate nodes, used by every
/// plugin to raise `WorkerUnavailable` up front (§4.4, §7).
pub(crate) fn total_remaining(nodes: &[NodeInfo]) -> u32 {
    nodes.iter().map(NodeInfo::remaining).sum()
}

pub(crate) fn require_capacity(nodes: &[NodeInfo], needed: usize) -> Result<()> {
    if nodes.is_empty() || (total_remaining(nodes) as usize) < needed {
        return Err(Error::WorkerUnavailable(format!(
            "no node can accept {needed} more host(s)"
        )));
    }
    Ok(())
}

type Registry = HashMap<&'static str, Arc<dyn Scheduler>>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut m: Registry = HashMap::new();
    let plugins: Vec<Arc<dyn Scheduler>> = vec![
        Arc::new(Greedy),
        Arc::new(LeastLoad),
        Arc::new(LeastLoadRandom),
        Arc::new(LoadWeightedRandom),
    ];
    for plugin in plugins {
        m.insert(plugin.name(), plugin);
    }
    m
});

/// Resolve a scheduler by its configured name (compiled-in registry,
/// replacing dynamic plugin directory loading).
pub fn resolve(name: &str) -> Result<Arc<dyn Scheduler>> {
    REGISTRY
        .get(name)
        .cloned()
        .ok_or_else(|| Error::Config(format!("unknown scheduler '{name}'")))
}
