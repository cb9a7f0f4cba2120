//! REST handlers for the NetPulse surface (§6), grounded one-to-one on
//! `examples/original_source/netpulse/routes/{device,manage,template}.py`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;

use super::auth::ApiKey;
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use super::types::*;
use crate::executor::{parse as parse_registry, render as render_registry};
use crate::model::{ExecutionRequest, JobStatus};
use crate::queue::EnqueueOptions;

fn parse_status(raw: &str) -> ApiResult<JobStatus> {
    match raw {
        "queued" => Ok(JobStatus::Queued),
        "started" => Ok(JobStatus::Started),
        "finished" => Ok(JobStatus::Finished),
        "failed" => Ok(JobStatus::Failed),
        "canceled" => Ok(JobStatus::Canceled),
        other => Err(ApiError::bad_request(format!("unknown job status '{other}'"))),
    }
}

/// `host`/`node`/`queue` filters resolve to a single queue name, with
/// `queue` taking precedence over `node` over `host` — the same
/// last-write-wins order as the original route's sequential `if` block.
fn resolve_queue_name(queue: Option<&str>, node: Option<&str>, host: Option<&str>) -> Option<String> {
    let mut q_name = host.map(crate::store::keys::host_queue_name);
    if let Some(node) = node {
        q_name = Some(crate::store::keys::node_queue_name(node));
    }
    if let Some(queue) = queue {
        q_name = Some(queue.to_string());
    }
    q_name
}

pub async fn execute_device(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecutionRequest>,
) -> ApiResult<Json<Envelope<crate::model::Job>>> {
    let job = state.manager.execute_on_device(req, EnqueueOptions::default()).await?;
    Ok(Json(Envelope::ok(job)))
}

pub async fn bulk_device(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkDeviceRequest>,
) -> ApiResult<Json<Envelope<BatchSubmitData>>> {
    let expanded = req.expand();
    let (succeeded, failed) = state
        .manager
        .execute_on_bulk_devices(expanded, EnqueueOptions::default())
        .await?;
    Ok(Json(Envelope::ok(BatchSubmitData { succeeded, failed })))
}

pub async fn test_connection(
    _key: ApiKey,
    Json(req): Json<ConnectionTestRequest>,
) -> ApiResult<Json<Envelope<ConnectionTestData>>> {
    req.connection_args
        .enforced_field_check()
        .map_err(ApiError::from)?;

    let mut driver = crate::driver::resolve(req.driver);
    let start = Instant::now();
    let (success, error_message, detail) = match driver.test(&req.connection_args).await {
        Ok(info) => (info.reachable, None, Some(info.detail)),
        Err(e) => (false, Some(e.to_string()), None),
    };
    let connection_time = start.elapsed().as_secs_f64();

    let data = ConnectionTestData {
        success,
        connection_time,
        error_message,
        detail,
        timestamp: chrono::Utc::now(),
    };
    let message = if success { "Connection test completed" } else { "Connection test failed" };
    Ok(Json(Envelope::ok_with_message(message, data)))
}

pub async fn get_jobs(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(q): Query<JobQuery>,
) -> ApiResult<Json<Envelope<Vec<crate::model::Job>>>> {
    if let Some(id) = q.id {
        let job = state.manager.get_job(&id).await?;
        return Ok(Json(Envelope::ok(job.into_iter().collect())));
    }

    let queue_name = resolve_queue_name(q.queue.as_deref(), q.node.as_deref(), q.host.as_deref());
    let status = q.status.as_deref().map(parse_status).transpose()?;
    let jobs = state.manager.list_jobs(queue_name.as_deref(), status).await?;
    Ok(Json(Envelope::ok(jobs)))
}

pub async fn delete_jobs(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(q): Query<JobDeleteQuery>,
) -> ApiResult<Json<Envelope<Vec<String>>>> {
    if let Some(id) = q.id {
        let canceled = state.manager.cancel_job(Some(&id), None).await?;
        return Ok(Json(Envelope::ok(canceled)));
    }
    let queue_name = resolve_queue_name(q.queue.as_deref(), None, q.host.as_deref());
    let canceled = state.manager.cancel_job(None, queue_name.as_deref()).await?;
    Ok(Json(Envelope::ok(canceled)))
}

pub async fn get_workers(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkerQuery>,
) -> ApiResult<Json<Envelope<Vec<crate::store::WorkerRecord>>>> {
    let queue_name = resolve_queue_name(q.queue.as_deref(), q.node.as_deref(), q.host.as_deref());
    let workers = state.manager.list_workers(queue_name.as_deref()).await?;
    Ok(Json(Envelope::ok(workers)))
}

pub async fn delete_workers(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkerDeleteQuery>,
) -> ApiResult<Json<Envelope<Vec<String>>>> {
    let queue_name = if q.name.is_some() {
        None
    } else {
        resolve_queue_name(q.queue.as_deref(), q.node.as_deref(), q.host.as_deref())
    };
    let killed = state.manager.kill_worker(q.name.as_deref(), queue_name.as_deref()).await?;
    Ok(Json(Envelope::ok(killed)))
}

pub async fn health() -> Json<Envelope<&'static str>> {
    Json(Envelope::ok("ok"))
}

pub async fn render_template(
    name: Option<AxumPath<String>>,
    Json(mut req): Json<TemplateRenderRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(AxumPath(name)) = name {
        req.name = Some(name);
    }
    let name = req.name.ok_or_else(|| ApiError::bad_request("Renderer name is required"))?;
    if req.template.is_empty() {
        return Err(ApiError::bad_request("Template source is required"));
    }
    let renderer = render_registry::resolve(&name)
        .ok_or_else(|| ApiError::not_found(format!("Renderer {name} not found")))?;
    let rendered = renderer
        .render(&req.template, req.context.as_ref())
        .map_err(ApiError::from)?;
    Ok(Json(serde_json::json!(rendered)))
}

pub async fn parse_template(
    name: Option<AxumPath<String>>,
    Json(mut req): Json<TemplateParseRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(AxumPath(name)) = name {
        req.name = Some(name);
    }
    let name = req.name.ok_or_else(|| ApiError::bad_request("Parser name is required"))?;
    let parser = parse_registry::resolve(&name)
        .ok_or_else(|| ApiError::not_found(format!("Parser {name} not found")))?;
    let parsed = parser
        .parse(req.template.as_deref(), &req.context)
        .map_err(ApiError::from)?;
    Ok(Json(parsed))
}
