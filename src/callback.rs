//! Name-based callback registry (§4.8, §9 "Callbacks by name"). A job
//! stores `on_success`/`on_failure` as a [`crate::model::CallbackRef`]
//! (name + timeout) rather than a function pointer; a worker resolves it
//! against this static registry once the job leaves `started`.

use crate::error::{Error, Result};
use crate::model::{Job, JobResult, JobResultKind, WebHook};
use once_cell::sync::Lazy;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, warn};

/// §4.8: normalize an error into `job.meta.error`. Never fails the
/// worker — if `meta` can't be interpreted, it leaves the job untouched
/// rather than propagating.
pub fn rpc_exception_callback(job: &mut Job, exc_type: &str, exc_value: &str) {
    job.meta.error = Some((exc_type.to_string(), exc_value.to_string()));
}

/// §4.8: the standard webhook callback. Builds `{id, result, status,
/// driver, device, command}` from the *original* request (command/config
/// as submitted, before rendering) and POSTs it per the job's `WebHook`
/// spec. On a failed job it first runs [`rpc_exception_callback`] to
/// normalize the error before reporting it. HTTP delivery failures are
/// logged and re-raised (§7: this is the one callback path that
/// propagates).
pub async fn rpc_webhook_callback(job: &mut Job) -> Result<()> {
    let Some(webhook) = job.payload.webhook.clone() else {
        return Ok(());
    };

    let (status, result_value) = match job.result.clone() {
        Some(JobResult {
            kind: JobResultKind::Successful,
            retval,
            ..
        }) => ("finished", retval.unwrap_or(serde_json::Value::Null)),
        Some(JobResult { error, .. }) => {
            let exc_value = error
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            rpc_exception_callback(job, "JobFailed", &exc_value);
            ("failed", serde_json::json!(exc_value))
        }
        None => return Ok(()),
    };

    let command = job
        .payload
        .command
        .clone()
        .or_else(|| job.payload.config.clone())
        .map(|p| serde_json::to_value(p).unwrap_or(serde_json::Value::Null))
        .unwrap_or(serde_json::Value::Null);

    let body = serde_json::json!({
        "id": job.id.to_string(),
        "result": result_value,
        "status": status,
        "driver": job.payload.driver.as_str(),
        "device": job.payload.connection_args.host,
        "command": command,
    });

    let job_id = job.id;
    deliver(&webhook, &body).await.map_err(|e| {
        error!(job = %job_id, url = %webhook.url, error = %e, "webhook delivery failed");
        e
    })
}

async fn deliver(webhook: &WebHook, body: &serde_json::Value) -> Result<()> {
    let client = Client::new();
    let mut builder = client
        .request(webhook.method.as_http_method(), &webhook.url)
        .json(body)
        .timeout(Duration::from_secs_f64(webhook.clamped_timeout()));

    if let Some(headers) = &webhook.headers {
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
    }
    if let Some((user, pass)) = &webhook.auth {
        builder = builder.basic_auth(user, Some(pass));
    }
    if let Some(cookies) = &webhook.cookies {
        let cookie_header = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        if !cookie_header.is_empty() {
            builder = builder.header(reqwest::header::COOKIE, cookie_header);
        }
    }

    let response = builder.send().await.map_err(|e| Error::Webhook(e.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::Webhook(format!(
            "webhook endpoint returned status {}",
            response.status()
        )));
    }
    Ok(())
}

type Registry = HashMap<&'static str, &'static str>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut m: Registry = HashMap::new();
    m.insert("rpc_webhook_callback", "rpc_webhook_callback");
    m
});

/// Resolve a callback name against the static registry. `None` means an
/// unresolved name, which [`fire`] treats as a failed callback rather
/// than a worker crash (§8 law 6).
pub fn resolve(name: &str) -> Option<&'static str> {
    REGISTRY.get(name).copied()
}

/// Run whichever callback `job`'s terminal state calls for. Unresolved
/// names and delivery failures are both absorbed here — the job's own
/// status is unaffected by callback outcome.
pub async fn fire(job: &mut Job) {
    let callback_ref = match job.result.as_ref().map(|r| r.kind) {
        Some(JobResultKind::Successful) => job.on_success.clone(),
        Some(_) => job.on_failure.clone(),
        None => return,
    };
    let Some(callback_ref) = callback_ref else {
        return;
    };
    if resolve(&callback_ref.name).is_none() {
        warn!(job = %job.id, callback = %callback_ref.name, "unresolved callback name");
        let message = format!("unknown callback '{}'", callback_ref.name);
        rpc_exception_callback(job, "CallbackResolutionError", &message);
        return;
    }
    if let Err(e) = rpc_webhook_callback(job).await {
        warn!(job = %job.id, error = %e, "callback delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CallbackRef, DriverConnectionArgs, DriverName, ExecutionRequest, Job, Payload, WebHookMethod,
    };
    use std::collections::HashMap as StdHashMap;

    fn base_job(webhook: Option<WebHook>, on_success: Option<CallbackRef>) -> Job {
        let payload = ExecutionRequest {
            driver: DriverName::Pyeapi,
            connection_args: DriverConnectionArgs {
                device_type: None,
                host: Some("10.0.0.1".into()),
                username: Some("admin".into()),
                password: Some("admin".into()),
                credential_ref: None,
                extra: StdHashMap::new(),
            },
            command: Some(Payload::Single("show version".into())),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook,
        };
        let mut job = Job::new("FifoQ", payload, 1800, 300, 300);
        job.on_success = on_success;
        job
    }

    #[test]
    fn rpc_exception_callback_writes_normalized_meta() {
        let mut job = base_job(None, None);
        rpc_exception_callback(&mut job, "ValueError", "bad host");
        assert_eq!(
            job.meta.error,
            Some(("ValueError".to_string(), "bad host".to_string()))
        );
    }

    #[tokio::test]
    async fn webhook_callback_is_noop_without_a_spec() {
        let mut job = base_job(None, None);
        job.mark_finished(JobResult {
            kind: JobResultKind::Successful,
            retval: Some(serde_json::json!({"show version": "ok"})),
            error: None,
        });
        assert!(rpc_webhook_callback(&mut job).await.is_ok());
    }

    #[tokio::test]
    async fn fire_absorbs_unresolved_callback_name() {
        let mut job = base_job(
            None,
            Some(CallbackRef {
                name: "not_a_real_callback".into(),
                timeout_seconds: 5,
            }),
        );
        job.mark_finished(JobResult {
            kind: JobResultKind::Successful,
            retval: Some(serde_json::json!({})),
            error: None,
        });
        fire(&mut job).await;
        assert!(job.meta.error.is_some());
    }

    #[test]
    fn webhook_method_default_is_post() {
        assert_eq!(WebHookMethod::default(), WebHookMethod::Post);
    }

    #[tokio::test]
    async fn webhook_callback_posts_result_to_configured_url() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = WebHook {
            name: "test".into(),
            url: format!("{}/hook", server.uri()),
            method: WebHookMethod::Post,
            headers: None,
            auth: None,
            cookies: None,
            timeout: 5.0,
        };
        let mut job = base_job(Some(webhook), None);
        job.mark_finished(JobResult {
            kind: JobResultKind::Successful,
            retval: Some(serde_json::json!({"show version": "ok"})),
            error: None,
        });

        rpc_webhook_callback(&mut job).await.unwrap();
    }

    #[tokio::test]
    async fn webhook_callback_surfaces_non_success_status() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let webhook = WebHook {
            name: "test".into(),
            url: format!("{}/hook", server.uri()),
            method: WebHookMethod::Post,
            headers: None,
            auth: None,
            cookies: None,
            timeout: 5.0,
        };
        let mut job = base_job(Some(webhook), None);
        job.mark_finished(JobResult {
            kind: JobResultKind::Successful,
            retval: Some(serde_json::json!({})),
            error: None,
        });

        assert!(rpc_webhook_callback(&mut job).await.is_err());
    }
}
