//! Minimizes `count` first, then maximizes remaining headroom, with
//! hostname as the final tiebreak.

use super::{require_capacity, Scheduler};
use crate::error::{Error, Result};
use crate::model::NodeInfo;
use std::collections::BTreeMap;

fn pick_min(nodes: &[NodeInfo]) -> Option<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.has_capacity())
        .min_by(|(_, a), (_, b)| {
            a.count
                .cmp(&b.count)
                .then_with(|| b.remaining().cmp(&a.remaining()))
                .then_with(|| a.hostname.cmp(&b.hostname))
        })
        .map(|(i, _)| i)
}

pub struct LeastLoad;

impl Scheduler for LeastLoad {
    fn name(&self) -> &'static str {
        "least_load"
    }

    fn select_one(&self, nodes: &[NodeInfo], _host: &str) -> Result<NodeInfo> {
        let idx = pick_min(nodes)
            .ok_or_else(|| Error::WorkerUnavailable("no node has spare capacity".to_string()))?;
        Ok(nodes[idx].clone())
    }

    fn select_batch(&self, nodes: &[NodeInfo], host_count: usize) -> Result<Vec<NodeInfo>> {
        require_capacity(nodes, host_count)?;

        // Group by current count (least-loaded group first); within a
        // group sort by (-remaining, hostname) and fill each node to its
        // remaining capacity before moving to the next node/group. Groups
        // are precomputed once, not recomputed per pick.
        let mut groups: BTreeMap<u32, Vec<NodeInfo>> = BTreeMap::new();
        for n in nodes {
            groups.entry(n.count).or_default().push(n.clone());
        }

        let mut picks = Vec::with_capacity(host_count);
        'outer: for (_, mut group) in groups {
            group.sort_by(|a, b| {
                b.remaining()
                    .cmp(&a.remaining())
                    .then_with(|| a.hostname.cmp(&b.hostname))
            });
            for node in group.iter_mut() {
                while node.has_capacity() && picks.len() < host_count {
                    node.count += 1;
                    picks.push(node.clone());
                }
                if picks.len() == host_count {
                    break 'outer;
                }
            }
        }

        if picks.len() < host_count {
            return Err(Error::WorkerUnavailable(
                "ran out of capacity mid-batch".to_string(),
            ));
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
    fn single_picks_lowest_count() {
        let nodes = vec![node("a", 3, 5), node("b", 1, 5)];
        let picked = LeastLoad.select_one(&nodes, "h1").unwrap();
        assert_eq!(picked.hostname, "b");
    }

    #[test]
    fn batch_fills_one_node_to_capacity_before_advancing() {
        let nodes = vec![node("a", 0, 3), node("b", 0, 3)];
        let picks = LeastLoad.select_batch(&nodes, 2).unwrap();
        let hosts: Vec<_> = picks.iter().map(|n| n.hostname.clone()).collect();
        assert_eq!(hosts, vec!["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn batch_advances_to_next_node_once_capacity_exhausted() {
        let nodes = vec![node("a", 0, 2), node("b", 0, 3)];
        let picks = LeastLoad.select_batch(&nodes, 3).unwrap();
        let hosts: Vec<_> = picks.iter().map(|n| n.hostname.clone()).collect();
        assert_eq!(hosts, vec!["a".to_string(), "a".to_string(), "b".to_string()]);
    }

    #[test]
    fn batch_processes_least_loaded_group_before_more_loaded() {
        let nodes = vec![node("a", 1, 3), node("b", 0, 3)];
        let picks = LeastLoad.select_batch(&nodes, 2).unwrap();
        let hosts: Vec<_> = picks.iter().map(|n| n.hostname.clone()).collect();
        assert_eq!(hosts, vec!["b".to_string(), "b".to_string()]);
    }
}
