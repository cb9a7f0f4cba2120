//! Driver interface (§4.5): the seam between the execute pipeline and a
//! concrete device protocol. Concrete SSH/NETCONF transports are out of
//! scope here — this module only defines the contract and a couple of
//! deterministic built-ins used by tests and the identity-renderer round
//! trip.

mod noop;

pub use noop::NoopDriver;

use crate::error::Result;
use crate::model::{DriverConnectionArgs, DriverExecutionResult};
use async_trait::async_trait;

/// Information returned by [`Driver::test`] describing a reachability
/// probe, independent of running any command.
#[derive(Debug, Clone)]
pub struct DeviceTestInfo {
    pub reachable: bool,
    pub detail: String,
}

/// Hook a session-oriented driver can implement to decide whether an
/// already-open session may be reused for a new set of connection args,
/// instead of tearing down and reconnecting (§4.3 `PinnedWorker`
/// "session_reused" telemetry).
pub trait SessionReusable {
    fn reusable_with(&self, new_args: &DriverConnectionArgs) -> bool;
}

/// Protocol driver contract. A driver instance owns at most one open
/// session at a time; the executor always calls `connect` before
/// `send`/`config` and `disconnect` afterward, even on error paths
/// (§4.7).
#[async_trait]
pub trait Driver: Send + Sync {
    fn driver_name(&self) -> &'static str;

    /// Session-oriented drivers are reused across jobs pinned to the same
    /// host by the `PinnedWorker`; stateless ones are constructed fresh
    /// per job.
    fn is_session_oriented(&self) -> bool {
        false
    }

    async fn connect(&mut self, args: &DriverConnectionArgs) -> Result<()>;

    async fn send(&mut self, commands: &[String]) -> Result<Vec<DriverExecutionResult>>;

    async fn apply_config(&mut self, config_lines: &[String]) -> Result<Vec<DriverExecutionResult>>;

    /// Tear down the session. `reset` requests a hard reconnect even for
    /// a session-oriented driver that would otherwise try to reuse state.
    async fn disconnect(&mut self, reset: bool) -> Result<()>;

    async fn test(&mut self, args: &DriverConnectionArgs) -> Result<DeviceTestInfo>;

    /// Whether this driver supports a background keepalive probe on an
    /// open session (§4.3, §9 "Keepalive"). Stateless drivers do not.
    fn supports_keepalive(&self) -> bool {
        false
    }

    /// Send a minimal keepalive probe on the currently open session.
    /// Only invoked when `supports_keepalive()` is true and a session is
    /// open; a returned error tells the `PinnedWorker` the session is
    /// unhealthy so it can terminate itself and let the node rebind the
    /// host to a fresh worker.
    async fn keepalive(&mut self) -> Result<()> {
        Ok(())
    }

    /// Bridge to the optional [`SessionReusable`] hook. Drivers that don't
    /// implement it return `None`, which a `PinnedWorker` treats as
    /// "always reconnect" rather than risk reusing a stale session.
    fn as_session_reusable(&self) -> Option<&dyn SessionReusable> {
        None
    }
}

/// Construct the driver implementation for a tag. Concrete
/// napalm/netmiko/paramiko/pyeapi transports are not implemented by this
/// crate; callers wire in their own `Driver` impls via this same
/// function for now all tags resolve to the identity [`NoopDriver`],
/// which is sufficient for the render/parse/queue/worker pipeline this
/// crate owns.
pub fn resolve(_name: crate::model::DriverName) -> Box<dyn Driver> {
    Box::new(NoopDriver::default())
}
