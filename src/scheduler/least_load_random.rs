//! Same load-tiering as `least_load`, but breaks ties with a random pick
//! instead of hostname ordering.

use super::{require_capacity, Scheduler};
use crate::error::{Error, Result};
use crate::model::NodeInfo;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

pub struct LeastLoadRandom;

impl Scheduler for LeastLoadRandom {
    fn name(&self) -> &'static str {
        "least_load_random"
    }

    fn select_one(&self, nodes: &[NodeInfo], _host: &str) -> Result<NodeInfo> {
        let min_count = nodes
            .iter()
            .filter(|n| n.has_capacity())
            .map(|n| n.count)
            .min()
            .ok_or_else(|| Error::WorkerUnavailable("no node has spare capacity".to_string()))?;

        let max_remaining = nodes
            .iter()
            .filter(|n| n.has_capacity() && n.count == min_count)
            .map(NodeInfo::remaining)
            .max()
            .unwrap();

        let tied: Vec<&NodeInfo> = nodes
            .iter()
            .filter(|n| n.has_capacity() && n.count == min_count && n.remaining() == max_remaining)
            .collect();

        let mut rng = rand::thread_rng();
        Ok(tied.choose(&mut rng).unwrap().clone().clone())
    }

    fn select_batch(&self, nodes: &[NodeInfo], host_count: usize) -> Result<Vec<NodeInfo>> {
        require_capacity(nodes, host_count)?;

        let mut pool: Vec<NodeInfo> = nodes.to_vec();
        let mut picks = Vec::with_capacity(host_count);
        let mut rng = rand::thread_rng();

        for _ in 0..host_count {
            let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (i, n) in pool.iter().enumerate() {
                if n.has_capacity() {
                    groups.entry(n.count).or_default().push(i);
                }
            }
            let Some((_, idxs)) = groups.into_iter().next() else {
                return Err(Error::WorkerUnavailable(
                    "ran out of capacity mid-batch".to_string(),
                ));
            };
            let max_remaining = idxs.iter().map(|&i| pool[i].remaining()).max().unwrap();
            let tied: Vec<usize> = idxs
                .into_iter()
                .filter(|&i| pool[i].remaining() == max_remaining)
                .collect();
            let chosen = *tied.choose(&mut rng).unwrap();
            pool[chosen].count += 1;
            picks.push(pool[chosen].clone());
        }
        Ok(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(h: &str, count: u32, cap: u32) -> NodeInfo {
        let mut n = NodeInfo::new(h, cap, format!("NodeQ_{h}"));
        n.count = count;
        n
    }

    #[test]
    fn single_picks_among_lowest_count_ties() {
        let nodes = vec![node("a", 1, 5), node("b", 1, 5), node("c", 3, 5)];
        let picked = LeastLoadRandom.select_one(&nodes, "h1").unwrap();
        assert_ne!(picked.hostname, "c");
    }

    #[test]
    fn unavailable_when_no_capacity() {
        let nodes = vec![node("a", 2, 2)];
        assert!(LeastLoadRandom.select_one(&nodes, "h1").is_err());
    }
}
