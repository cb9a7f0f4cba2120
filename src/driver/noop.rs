//! Deterministic, protocol-less driver used by the executor's own tests
//! and the identity render/parse round trip (§8 law 8). Concrete
//! napalm/netmiko/paramiko/pyeapi transports are out of scope (§1); this
//! is the only built-in `Driver`.

use super::{DeviceTestInfo, Driver, SessionReusable};
use crate::error::Result;
use crate::model::{DriverConnectionArgs, DriverExecutionResult};
use async_trait::async_trait;
use serde_json::json;

#[derive(Debug, Default)]
pub struct NoopDriver {
    session: Option<DriverConnectionArgs>,
    session_oriented: bool,
}

impl NoopDriver {
    pub fn session_oriented() -> Self {
        Self {
            session: None,
            session_oriented: true,
        }
    }
}

#[async_trait]
impl Driver for NoopDriver {
    fn driver_name(&self) -> &'static str {
        "noop"
    }

    fn is_session_oriented(&self) -> bool {
        self.session_oriented
    }

    async fn connect(&mut self, args: &DriverConnectionArgs) -> Result<()> {
        self.session = Some(args.clone());
        Ok(())
    }

    async fn send(&mut self, commands: &[String]) -> Result<Vec<DriverExecutionResult>> {
        Ok(commands
            .iter()
            .map(|c| DriverExecutionResult::success(json!(c.clone())))
            .collect())
    }

    async fn apply_config(&mut self, config_lines: &[String]) -> Result<Vec<DriverExecutionResult>> {
        let joined = config_lines.join("\n");
        Ok(vec![DriverExecutionResult::success(json!(joined))])
    }

    async fn disconnect(&mut self, reset: bool) -> Result<()> {
        if reset {
            self.session = None;
        }
        Ok(())
    }

    async fn test(&mut self, args: &DriverConnectionArgs) -> Result<DeviceTestInfo> {
        Ok(DeviceTestInfo {
            reachable: true,
            detail: format!("noop probe ok for {}", args.host.clone().unwrap_or_default()),
        })
    }

    fn supports_keepalive(&self) -> bool {
        self.session_oriented
    }

    async fn keepalive(&mut self) -> Result<()> {
        if self.session.is_some() {
            Ok(())
        } else {
            Err(crate::error::Error::Driver("keepalive on closed session".into()))
        }
    }

    fn as_session_reusable(&self) -> Option<&dyn SessionReusable> {
        Some(self)
    }
}

impl SessionReusable for NoopDriver {
    fn reusable_with(&self, new_args: &DriverConnectionArgs) -> bool {
        match &self.session {
            Some(current) => {
                current.host == new_args.host
                    && current.username == new_args.username
                    && current.device_type == new_args.device_type
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(host: &str) -> DriverConnectionArgs {
        DriverConnectionArgs {
            device_type: Some("cisco_ios".into()),
            host: Some(host.into()),
            username: Some("admin".into()),
            password: Some("admin".into()),
            credential_ref: None,
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn echoes_each_command() {
        let mut d = NoopDriver::default();
        d.connect(&args("10.0.0.1")).await.unwrap();
        let results = d
            .send(&["show version".to_string(), "show clock".to_string()])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
    }

    #[tokio::test]
    async fn config_is_applied_as_one_joined_unit() {
        let mut d = NoopDriver::default();
        d.connect(&args("10.0.0.1")).await.unwrap();
        let results = d
            .apply_config(&["interface eth0".to_string(), "no shutdown".to_string()])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].output, json!("interface eth0\nno shutdown"));
    }

    #[tokio::test]
    async fn reusable_only_when_connection_args_match() {
        let mut d = NoopDriver::default();
        d.connect(&args("10.0.0.1")).await.unwrap();
        assert!(d.reusable_with(&args("10.0.0.1")));
        assert!(!d.reusable_with(&args("10.0.0.2")));
    }

    #[tokio::test]
    async fn reset_disconnect_clears_session() {
        let mut d = NoopDriver::default();
        d.connect(&args("10.0.0.1")).await.unwrap();
        d.disconnect(true).await.unwrap();
        assert!(!d.reusable_with(&args("10.0.0.1")));
    }
}
