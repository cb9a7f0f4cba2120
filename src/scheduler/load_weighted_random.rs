//! Weighted-random scheduler. Single-host weight is `capacity - count`
//! perturbed by a stable per-host hash so repeated scheduling decisions
//! for the same host lean toward the same node; batch weight is
//! `(remaining + 1)^2` with independent noise per pick, remaining updated
//! immediately after each draw.

use super::{require_capacity, Scheduler};
use crate::error::{Error, Result};
use crate::model::NodeInfo;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn host_hash_unit(host: &str) -> f64 {
    let mut hasher = DefaultHasher::new();
    host.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

pub struct LoadWeightedRandom;

impl Scheduler for LoadWeightedRandom {
    fn name(&self) -> &'static str {
        "load_weighted_random"
    }

    fn select_one(&self, nodes: &[NodeInfo], host: &str) -> Result<NodeInfo> {
        let candidates: Vec<&NodeInfo> = nodes.iter().filter(|n| n.has_capacity()).collect();
        if candidates.is_empty() {
            return Err(Error::WorkerUnavailable(
                "no node has spare capacity".to_string(),
            ));
        }

        let host_hash = host_hash_unit(host);
        let n = candidates.len() as f64;
        let weights: Vec<f64> = candidates
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let base = f64::from(node.remaining());
                let noise = 0.95 + 0.1 * ((host_hash + i as f64 / n) % 1.0);
                (base * noise).max(0.0)
            })
            .collect();

        let idx = weighted_pick(&weights);
        Ok(candidates[idx].clone())
    }

    fn select_batch(&self, nodes: &[NodeInfo], host_count: usize) -> Result<Vec<NodeInfo>> {
        require_capacity(nodes, host_count)?;

        let mut pool: Vec<NodeInfo> = nodes.to_vec();
        let mut picks = Vec::with_capacity(host_count);
        let mut rng = rand::thread_rng();

        for _ in 0..host_count {
            let candidate_idxs: Vec<usize> = pool
                .iter()
                .enumerate()
                .filter(|(_, n)| n.has_capacity())
                .map(|(i, _)| i)
                .collect();
            if candidate_idxs.is_empty() {
                return Err(Error::WorkerUnavailable(
                    "ran out of capacity mid-batch".to_string(),
                ));
            }

            let weights: Vec<f64> = candidate_idxs
                .iter()
                .map(|&i| {
                    let remaining = f64::from(pool[i].remaining());
                    let noise: f64 = rng.gen_range(0.95..=1.05);
                    (remaining + 1.0).powi(2) * noise
                })
                .collect();

            let pick_in_candidates = weighted_pick(&weights);
            let chosen = candidate_idxs[pick_in_candidates];
            pool[chosen].count += 1;
            picks.push(pool[chosen].clone());
        }
        Ok(picks)
    }
}

/// Roulette-wheel pick over non-negative weights. Falls back to uniform
/// selection if every weight collapses to zero.
fn weighted_pick(weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let mut rng = rand::thread_rng();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut draw: f64 = rng.gen_range(0.0..total);
    for (i, w) in weights.iter().enumerate() {
        if draw < *w {
            return i;
        }
        draw -= w;
    }
    weights.len() - 1
}
