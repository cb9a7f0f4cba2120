//! Exact queue/key-naming functions, recovered from the original
//! `AppConfig` static methods (§11 of `SPEC_FULL.md`).

pub fn fifo_queue_name() -> String {
    "FifoQ".to_string()
}

pub fn node_queue_name(hostname: &str) -> String {
    format!("NodeQ_{hostname}")
}

pub fn host_queue_name(host: &str) -> String {
    format!("HostQ_{host}")
}

pub const HOST_TO_NODE_MAP: &str = "netpulse:host_to_node_map";
pub const NODE_INFO_MAP: &str = "netpulse:node_info_map";

/// Registry key for a queue's per-status job id list, e.g.
/// `netpulse:registry:FifoQ:finished`.
pub fn registry_key(queue: &str, status: &str) -> String {
    format!("netpulse:registry:{queue}:{status}")
}

/// Key under which a job's full JSON payload is stored.
pub fn job_key(job_id: &str) -> String {
    format!("netpulse:job:{job_id}")
}

/// Key under which a worker's registry record is stored.
pub fn worker_key(name: &str) -> String {
    format!("netpulse:worker:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_queue_names() {
        assert_eq!(fifo_queue_name(), "FifoQ");
        assert_eq!(node_queue_name("node-a"), "NodeQ_node-a");
        assert_eq!(host_queue_name("10.0.0.1"), "HostQ_10.0.0.1");
    }
}
