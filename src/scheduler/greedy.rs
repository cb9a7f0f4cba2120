//! First-fit scheduler: single-host picks the first node with spare
//! capacity; batch sorts candidates by load before filling.

use super::{require_capacity, Scheduler};
use crate::error::{Error, Result};
use crate::model::NodeInfo;

pub struct Greedy;

impl Scheduler for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select_one(&self, nodes: &[NodeInfo], _host: &str) -> Result<NodeInfo> {
        nodes
            .iter()
            .find(|n| n.has_capacity())
            .cloned()
            .ok_or_else(|| Error::WorkerUnavailable("no node has spare capacity".to_string()))
    }

    fn select_batch(&self, nodes: &[NodeInfo], host_count: usize) -> Result<Vec<NodeInfo>> {
        require_capacity(nodes, host_count)?;

        // Sort by (-count, -remaining, hostname) so the busiest-but-roomiest
        // nodes fill first, ties broken lexically for determinism.
        let mut pool: Vec<NodeInfo> = nodes.to_vec();
        pool.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.remaining().cmp(&a.remaining()))
                .then_with(|| a.hostname.cmp(&b.hostname))
        });

        let mut picks = Vec::with_capacity(host_count);
        'outer: for _ in 0..host_count {
            for node in pool.iter_mut() {
                if node.has_capacity() {
                    node.count += 1;
                    picks.push(node.clone());
                    continue 'outer;
                }
            }
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
    fn single_picks_first_with_capacity() {
        let nodes = vec![node("a", 2, 2), node("b", 0, 2)];
        let picked = Greedy.select_one(&nodes, "h1").unwrap();
        assert_eq!(picked.hostname, "b");
    }

    #[test]
    fn batch_fills_busiest_roomiest_first() {
        let nodes = vec![node("a", 0, 4), node("b", 3, 4)];
        let picks = Greedy.select_batch(&nodes, 2).unwrap();
        assert_eq!(picks[0].hostname, "b");
    }

    #[test]
    fn unavailable_when_capacity_exhausted() {
        let nodes = vec![node("a", 2, 2)];
        assert!(Greedy.select_one(&nodes, "h1").is_err());
        assert!(Greedy.select_batch(&nodes, 1).is_err());
    }

    proptest::proptest! {
        #[test]
        fn batch_never_overfills_a_node(
            caps in proptest::collection::vec(1u32..6, 1..6),
            host_count in 1usize..10,
        ) {
            let nodes: Vec<NodeInfo> = caps
                .iter()
                .enumerate()
                .map(|(i, &cap)| node(&format!("n{i}"), 0, cap))
                .collect();
            let total: u32 = caps.iter().sum();

            match Greedy.select_batch(&nodes, host_count) {
                Ok(picks) => {
                    proptest::prop_assert_eq!(picks.len(), host_count);
                    for n in &nodes {
                        let used = picks.iter().filter(|p| p.hostname == n.hostname).count() as u32;
                        proptest::prop_assert!(used <= n.capacity);
                    }
                }
                Err(_) => proptest::prop_assert!((host_count as u32) > total),
            }
        }
    }
}
