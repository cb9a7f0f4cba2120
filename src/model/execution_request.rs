//! [`ExecutionRequest`] and its connection-argument/credential-reference
//! companions, with the construction-time invariants from §3.

use crate::error::{Error, Result};
use crate::model::{DriverName, QueueStrategy, WebHook};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Reference to credentials held by an external credential provider (vault
/// plugins are out of scope; only the reference shape is modeled so
/// `connection_args` round-trips through the dispatcher untouched).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialReference {
    #[serde(default = "CredentialReference::default_provider")]
    pub provider: String,
    pub path: String,
    #[serde(default = "CredentialReference::default_username_key")]
    pub username_key: Option<String>,
    #[serde(default = "CredentialReference::default_password_key")]
    pub password_key: Option<String>,
}

impl CredentialReference {
    fn default_provider() -> String {
        "vault".to_string()
    }
    fn default_username_key() -> Option<String> {
        Some("username".to_string())
    }
    fn default_password_key() -> Option<String> {
        Some("password".to_string())
    }

    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            provider: Self::default_provider(),
            path: path.into(),
            username_key: Self::default_username_key(),
            password_key: Self::default_password_key(),
        }
    }
}

/// Connection arguments passed through to a driver. Field checking is
/// loosened here (everything but the mutual-exclusion rule is optional);
/// `host` is required once a request is about to be dispatched, checked by
/// [`DriverConnectionArgs::enforced_field_check`] since batch APIs may
/// auto-fill it after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConnectionArgs {
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub credential_ref: Option<CredentialReference>,
    /// Anything else the driver wants, preserved opaquely.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl DriverConnectionArgs {
    /// §3 invariant: must provide direct credentials or a credential
    /// reference, but not both (username-only is acceptable, e.g. key
    /// auth — password is not required).
    pub fn validate_credentials(&self) -> Result<()> {
        let has_direct = self.username.is_some();
        let has_ref = self.credential_ref.is_some();
        if !has_direct && !has_ref {
            return Err(Error::Validation(
                "must provide username or credential reference".into(),
            ));
        }
        if has_direct && has_ref {
            return Err(Error::Validation(
                "cannot provide both direct credentials and credential reference".into(),
            ));
        }
        Ok(())
    }

    /// `connection_args` can be auto-filled in batch APIs after
    /// construction; callers must re-check before dispatch.
    pub fn enforced_field_check(&self) -> Result<()> {
        if self.host.is_none() {
            return Err(Error::Validation("host is required".into()));
        }
        Ok(())
    }
}

/// Either a single command/config string, or a list of them, or (only
/// alongside a [`RenderSpec`]) a template context object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Single(String),
    Many(Vec<String>),
    Context(serde_json::Map<String, Value>),
}

impl Payload {
    pub fn is_context(&self) -> bool {
        matches!(self, Payload::Context(_))
    }

    /// Normalize to a list of strings. Only valid for non-context payloads
    /// (a context payload must be rendered first — see `executor::pipeline`).
    pub fn into_list(self) -> Vec<String> {
        match self {
            Payload::Single(s) => vec![s],
            Payload::Many(v) => v,
            Payload::Context(_) => Vec::new(),
        }
    }
}

/// Named renderer invocation plus the template source and context override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSpec {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Map<String, Value>>,
}

/// Named parser invocation plus the parser's own template/grammar source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseSpec {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
}

/// Generic bag of extra driver arguments (e.g. `script_content`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverArgs {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl DriverArgs {
    pub fn script_content(&self) -> Option<&str> {
        self.fields.get("script_content").and_then(Value::as_str)
    }
}

/// Typed request payload for `/device/execute` and the expanded per-device
/// requests inside `/device/bulk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub driver: DriverName,
    pub connection_args: DriverConnectionArgs,
    #[serde(default)]
    pub command: Option<Payload>,
    #[serde(default)]
    pub config: Option<Payload>,
    #[serde(default)]
    pub driver_args: Option<DriverArgs>,
    #[serde(default)]
    pub rendering: Option<RenderSpec>,
    #[serde(default)]
    pub parsing: Option<ParseSpec>,
    #[serde(default)]
    pub queue_strategy: Option<QueueStrategy>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub webhook: Option<WebHook>,
}

impl ExecutionRequest {
    /// Runs the §3 construction-time invariants and fills in
    /// driver-dependent defaults. Call this once after deserializing.
    pub fn validate_and_normalize(mut self) -> Result<Self> {
        self.connection_args.validate_credentials()?;

        let has_command = self.command.is_some();
        let has_config = self.config.is_some();
        if has_command == has_config {
            return Err(Error::Validation(
                "exactly one of 'command' or 'config' must be set".into(),
            ));
        }

        let payload_is_context = self
            .command
            .as_ref()
            .or(self.config.as_ref())
            .map(Payload::is_context)
            .unwrap_or(false);
        if payload_is_context && self.rendering.is_none() {
            return Err(Error::Validation(
                "a dict payload requires a matching 'rendering' section".into(),
            ));
        }

        if self.queue_strategy.is_none() {
            self.queue_strategy = Some(self.driver.default_queue_strategy());
        }

        if let Some(ttl) = self.ttl {
            if ttl == 0 || ttl > 86_400 {
                return Err(Error::Validation(
                    "ttl must be between 1 and 86400 seconds".into(),
                ));
            }
        }

        Ok(self)
    }

    pub fn queue_strategy(&self) -> QueueStrategy {
        self.queue_strategy
            .unwrap_or_else(|| self.driver.default_queue_strategy())
    }

    pub fn host(&self) -> Option<&str> {
        self.connection_args.host.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_conn() -> DriverConnectionArgs {
        DriverConnectionArgs {
            device_type: Some("cisco_ios".into()),
            host: Some("10.0.0.1".into()),
            username: Some("admin".into()),
            password: Some("admin".into()),
            credential_ref: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn rejects_both_command_and_config() {
        let req = ExecutionRequest {
            driver: DriverName::Pyeapi,
            connection_args: base_conn(),
            command: Some(Payload::Single("show version".into())),
            config: Some(Payload::Single("interface eth0".into())),
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook: None,
        };
        assert!(req.validate_and_normalize().is_err());
    }

    #[test]
    fn context_payload_requires_rendering() {
        let mut ctx = serde_json::Map::new();
        ctx.insert("cmd".into(), Value::String("show version".into()));
        let req = ExecutionRequest {
            driver: DriverName::Pyeapi,
            connection_args: base_conn(),
            command: Some(Payload::Context(ctx)),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook: None,
        };
        assert!(req.validate_and_normalize().is_err());
    }

    #[test]
    fn default_queue_strategy_by_driver() {
        let req = ExecutionRequest {
            driver: DriverName::Netmiko,
            connection_args: base_conn(),
            command: Some(Payload::Single("echo 1".into())),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook: None,
        }
        .validate_and_normalize()
        .unwrap();
        assert_eq!(req.queue_strategy(), QueueStrategy::Pinned);
    }

    #[test]
    fn credential_ref_and_direct_creds_conflict() {
        let mut conn = base_conn();
        conn.credential_ref = Some(CredentialReference::from_path("sites/hq/readonly"));
        assert!(conn.validate_credentials().is_err());
    }
}
