//! Request/response DTOs for the REST surface (§6). Success bodies share
//! the `{code:0, message, data}` envelope used throughout
//! `examples/original_source/netpulse/models/response.py`; [`ApiError`]
//! (in [`super::error`]) covers the failure envelope.

use crate::model::{BatchFailedItem, DriverConnectionArgs, DriverName, ExecutionRequest, Job};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// One device override inside a `/device/bulk` request body, merged onto
/// `connection_args` the same way the original's `device.model_dump` patch
/// is applied per entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceOverride {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DeviceOverride {
    pub fn apply_onto(&self, base: &DriverConnectionArgs) -> DriverConnectionArgs {
        let mut merged = base.clone();
        if self.host.is_some() {
            merged.host = self.host.clone();
        }
        if self.device_type.is_some() {
            merged.device_type = self.device_type.clone();
        }
        if self.username.is_some() {
            merged.username = self.username.clone();
        }
        if self.password.is_some() {
            merged.password = self.password.clone();
        }
        merged
    }
}

/// `POST /device/bulk` body: one shared request template plus a list of
/// per-device connection overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeviceRequest {
    #[serde(flatten)]
    pub base: ExecutionRequest,
    pub devices: Vec<DeviceOverride>,
}

impl BulkDeviceRequest {
    pub fn expand(self) -> Vec<ExecutionRequest> {
        self.devices
            .iter()
            .map(|d| {
                let mut req = self.base.clone();
                req.connection_args = d.apply_onto(&self.base.connection_args);
                req
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSubmitData {
    pub succeeded: Vec<Job>,
    pub failed: Vec<BatchFailedItem>,
}

/// `POST /device/test-connection` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionTestRequest {
    pub driver: DriverName,
    pub connection_args: DriverConnectionArgs,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestData {
    pub success: bool,
    pub connection_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `GET /job` query filters. `id` overrides every other filter, same as
/// the original route's precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobQuery {
    pub id: Option<String>,
    pub queue: Option<String>,
    pub status: Option<String>,
    pub node: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDeleteQuery {
    pub id: Option<String>,
    pub queue: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerQuery {
    pub queue: Option<String>,
    pub node: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerDeleteQuery {
    pub name: Option<String>,
    pub queue: Option<String>,
    pub node: Option<String>,
    pub host: Option<String>,
}

/// `POST /template/render[/{name}]` body.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRenderRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub template: String,
    #[serde(default)]
    pub context: Option<serde_json::Map<String, Value>>,
}

/// `POST /template/parse[/{name}]` body.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateParseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    pub context: Value,
}
