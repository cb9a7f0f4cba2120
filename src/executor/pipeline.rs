//! The execute pipeline (§4.7): render -> normalize -> connect ->
//! send/config -> disconnect -> parse -> return. Runs once per job, on
//! whichever worker popped it.

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::executor::{parse, render};
use crate::model::{ExecutionRequest, Payload};
use serde_json::{Map, Value};
use std::time::Instant;

/// Render `req`'s command/config against its `rendering` spec (if any),
/// replacing the payload with the rendered string and clearing
/// `rendering` so downstream steps see a concrete value (§4.7 step 2).
fn render_payload(req: &mut ExecutionRequest) -> Result<()> {
    let Some(spec) = req.rendering.take() else {
        return Ok(());
    };
    let renderer = render::resolve(&spec.name)
        .ok_or_else(|| Error::Validation(format!("unknown renderer '{}'", spec.name)))?;

    let payload_slot = if req.command.is_some() {
        &mut req.command
    } else {
        &mut req.config
    };
    let payload = payload_slot
        .take()
        .ok_or_else(|| Error::Validation("rendering present with no command/config".into()))?;

    let (template_source, context) = match payload {
        Payload::Context(map) => {
            let mut merged = spec.context.clone().unwrap_or_default();
            for (k, v) in map {
                merged.insert(k, v);
            }
            let template = spec
                .template
                .clone()
                .ok_or_else(|| Error::Validation("dict payload requires a template source".into()))?;
            (template, Some(merged))
        }
        Payload::Single(s) => (s, spec.context.clone()),
        Payload::Many(items) => (items.join("\n"), spec.context.clone()),
    };

    let rendered = renderer.render(&template_source, context.as_ref())?;
    *payload_slot = Some(Payload::Single(rendered));

    if let Some(driver_args) = req.driver_args.as_mut() {
        if let Some(script) = driver_args.script_content() {
            let rendered_script = renderer.render(script, context.as_ref())?;
            driver_args
                .fields
                .insert("script_content".to_string(), Value::String(rendered_script));
        }
    }

    Ok(())
}

/// Normalize the (already-rendered) payload into a flat command list plus
/// whether it targets `Config` vs `Send` (§4.7 step 3).
fn normalize(req: &ExecutionRequest) -> Result<(Vec<String>, bool)> {
    match (&req.command, &req.config) {
        (Some(p), None) => Ok((p.clone().into_list(), false)),
        (None, Some(p)) => Ok((p.clone().into_list(), true)),
        _ => Err(Error::Validation(
            "exactly one of 'command' or 'config' must be set after rendering".into(),
        )),
    }
}

/// Run the full pipeline for one job and return the result map keyed by
/// command string (or, for a config payload, by the joined config
/// string), matching `result.retval["show version"]` in the spec's
/// worked examples.
///
/// `session_reused` reflects whatever the caller (a `PinnedWorker`)
/// decided about the driver session before invoking this function; it is
/// stamped onto every result's telemetry.
pub async fn run(
    mut req: ExecutionRequest,
    driver: &mut dyn Driver,
    session_reused: bool,
) -> Result<Value> {
    render_payload(&mut req)?;
    let (commands, is_config) = normalize(&req)?;
    let host = req.connection_args.host.clone().unwrap_or_default();

    let started = Instant::now();
    let connect_result = driver.connect(&req.connection_args).await;

    let mut outcomes: Vec<(String, crate::model::DriverExecutionResult)> = Vec::new();
    match connect_result {
        Ok(()) => {
            let exec_result = if is_config {
                driver.apply_config(&commands).await
            } else {
                driver.send(&commands).await
            };
            match exec_result {
                Ok(results) if is_config => {
                    let key = commands.join("\n");
                    outcomes.push((key, results.into_iter().next().unwrap_or_default()));
                }
                Ok(results) => {
                    outcomes.extend(commands.iter().cloned().zip(results));
                }
                // Driver exceptions are folded into the result, never re-raised
                // (§4.7 step 4), so other commands in the same job still get
                // a result.
                Err(e) => push_failures(&mut outcomes, &commands, is_config, &e.to_string()),
            }
        }
        Err(e) => push_failures(&mut outcomes, &commands, is_config, &e.to_string()),
    }

    // Disconnect always runs, success or failure (§4.7 step 4).
    if let Err(e) = driver.disconnect(false).await {
        tracing::warn!(%host, error = %e, "disconnect after execute failed");
    }

    let duration_seconds = started.elapsed().as_secs_f64();
    for (_, result) in outcomes.iter_mut() {
        result
            .telemetry
            .insert("duration_seconds".to_string(), serde_json::json!(duration_seconds));
        result.telemetry.insert("host".to_string(), serde_json::json!(host));
        result
            .telemetry
            .insert("session_reused".to_string(), serde_json::json!(session_reused));
    }

    if let Some(spec) = &req.parsing {
        let parser = parse::resolve(&spec.name)
            .ok_or_else(|| Error::Validation(format!("unknown parser '{}'", spec.name)))?;
        for (_, result) in outcomes.iter_mut() {
            if result.is_success() {
                result.parsed = Some(parser.parse(spec.template.as_deref(), &result.output)?);
            }
        }
    }

    let mut obj = Map::new();
    for (key, result) in outcomes {
        obj.insert(key, serde_json::to_value(result)?);
    }
    Ok(Value::Object(obj))
}

fn push_failures(
    outcomes: &mut Vec<(String, crate::model::DriverExecutionResult)>,
    commands: &[String],
    is_config: bool,
    error: &str,
) {
    if is_config {
        outcomes.push((
            commands.join("\n"),
            crate::model::DriverExecutionResult::failure(error),
        ));
    } else {
        for cmd in commands {
            outcomes.push((cmd.clone(), crate::model::DriverExecutionResult::failure(error)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NoopDriver;
    use crate::model::{DriverConnectionArgs, DriverName, ParseSpec, RenderSpec};
    use std::collections::HashMap;

    fn base_request() -> ExecutionRequest {
        ExecutionRequest {
            driver: DriverName::Pyeapi,
            connection_args: DriverConnectionArgs {
                device_type: None,
                host: Some("10.0.0.1".into()),
                username: Some("admin".into()),
                password: Some("admin".into()),
                credential_ref: None,
                extra: HashMap::new(),
            },
            command: Some(Payload::Single("show version".into())),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook: None,
        }
    }

    #[tokio::test]
    async fn plain_command_round_trips_through_noop_driver() {
        let mut driver = NoopDriver::default();
        let result = run(base_request(), &mut driver, false).await.unwrap();
        let entry = result.get("show version").unwrap();
        assert_eq!(entry["exit_status"], 0);
    }

    #[tokio::test]
    async fn render_then_identity_parse_round_trips() {
        let mut req = base_request();
        req.command = Some(Payload::Single("show version".into()));
        req.rendering = Some(RenderSpec {
            name: "identity".into(),
            template: None,
            context: None,
        });
        req.parsing = Some(ParseSpec {
            name: "identity".into(),
            template: None,
        });

        let mut driver = NoopDriver::default();
        let result = run(req, &mut driver, false).await.unwrap();
        let entry = result.get("show version").unwrap();
        assert_eq!(entry["output"], entry["parsed"]);
    }

    #[tokio::test]
    async fn dict_payload_renders_through_jinja2() {
        let mut ctx = serde_json::Map::new();
        ctx.insert("cmd".into(), serde_json::json!("show version"));
        let mut req = base_request();
        req.command = Some(Payload::Context(ctx));
        req.rendering = Some(RenderSpec {
            name: "jinja2".into(),
            template: Some("{{ cmd }}".into()),
            context: None,
        });

        let mut driver = NoopDriver::default();
        let result = run(req, &mut driver, false).await.unwrap();
        assert!(result.get("show version").is_some());
    }

    #[tokio::test]
    async fn config_payload_is_applied_as_one_joined_unit() {
        let mut req = base_request();
        req.command = None;
        req.config = Some(Payload::Many(vec![
            "interface eth0".into(),
            "no shutdown".into(),
        ]));

        let mut driver = NoopDriver::default();
        let result = run(req, &mut driver, false).await.unwrap();
        assert!(result.get("interface eth0\nno shutdown").is_some());
    }

    #[tokio::test]
    async fn session_reused_telemetry_is_stamped() {
        let mut driver = NoopDriver::default();
        let result = run(base_request(), &mut driver, true).await.unwrap();
        let entry = &result["show version"];
        assert_eq!(entry["telemetry"]["session_reused"], true);
    }
}
