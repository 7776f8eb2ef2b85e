use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::agents::{AgentId, profile};
use crate::backend::{AvailableModel, HttpBackend, ModelBackend};
use crate::config::RuntimeConfig;
use crate::executor::{WorkflowRequest, WorkflowResult};
use crate::history::AgentStats;
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::selector::select_model_with_source;
use crate::telemetry::TelemetrySink;

pub fn parse_context_arg(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(Map::new());
    };
    let value = serde_json::from_str::<Value>(raw)
        .with_context(|| format!("failed to parse --context '{raw}'"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!(
            "context must be a JSON object, got {}",
            match other {
                Value::Array(_) => "an array",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "null",
            }
        )),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Bare(Vec<WorkflowRequest>),
    Wrapped { requests: Vec<WorkflowRequest> },
}

pub fn parse_batch_json(content: &str) -> Result<Vec<WorkflowRequest>> {
    let parsed = serde_json::from_str::<BatchFile>(content)
        .context("batch file must be a JSON array of requests or {\"requests\": [...]}")?;
    let requests = match parsed {
        BatchFile::Bare(requests) | BatchFile::Wrapped { requests } => requests,
    };
    if requests.is_empty() {
        return Err(anyhow::anyhow!("batch file has no requests"));
    }
    Ok(requests)
}

pub fn build_orchestrator(cfg: &RuntimeConfig, telemetry: &TelemetrySink) -> Result<Orchestrator> {
    let backend = HttpBackend::from_config(cfg)?;
    tracing::info!(backend = backend.name(), "Using model backend");
    Ok(
        Orchestrator::new(Arc::new(backend), OrchestratorOptions::from_config(cfg))
            .with_telemetry(telemetry.clone()),
    )
}

pub fn print_workflow_result(result: &WorkflowResult) {
    let status = if result.success { "ok" } else { "unsuccessful" };
    println!(
        "{} {} via {} [{}] ({})",
        result.metadata.emoji,
        result.agent_used,
        result.model_used,
        result.workflow_id,
        status
    );
    println!();
    println!("{}", result.content.trim());
}

pub fn print_agent_stats(rows: &[(AgentId, AgentStats)], overall: AgentStats) {
    println!(
        "{:<16} {:>9} {:>14} {:>12}",
        "agent", "workflows", "avg_ms", "success_rate"
    );
    for (agent, stats) in rows {
        println!(
            "{} {:<13} {:>9} {:>14.1} {:>12.3}",
            profile(*agent).emoji,
            agent.label(),
            stats.workflows,
            stats.average_duration_ms,
            stats.success_rate
        );
    }
    println!(
        "{:<16} {:>9} {:>14.1} {:>12.3}",
        "total", overall.workflows, overall.average_duration_ms, overall.success_rate
    );
}

pub async fn run_route(
    orchestrator: &Orchestrator,
    request: WorkflowRequest,
    as_json: bool,
) -> Result<()> {
    let result = orchestrator.route_workflow(&request).await?;
    if as_json {
        let payload = serde_json::to_string_pretty(&result)
            .context("failed to serialize workflow result")?;
        println!("{payload}");
    } else {
        print_workflow_result(&result);
    }
    Ok(())
}

pub async fn run_batch(orchestrator: &Orchestrator, path: &str, keep_going: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file '{path}'"))?;
    let requests = parse_batch_json(&content)
        .with_context(|| format!("invalid batch file json at '{path}'"))?;

    let mut failures = 0usize;
    for (idx, request) in requests.iter().enumerate() {
        match orchestrator.route_workflow(request).await {
            Ok(result) => println!(
                "[{}/{}] {} {} -> {} ({})",
                idx + 1,
                requests.len(),
                result.metadata.emoji,
                request.task,
                result.model_used,
                if result.success { "ok" } else { "unsuccessful" }
            ),
            Err(err) if keep_going => {
                failures += 1;
                println!("[{}/{}] {} failed: {err:#}", idx + 1, requests.len(), request.task);
            }
            Err(err) => return Err(err),
        }
    }

    println!();
    orchestrator.with_history(|history| print_agent_stats(&history.per_agent(), history.overall()));
    if failures > 0 {
        return Err(anyhow::anyhow!(
            "{failures} of {} batch requests failed",
            requests.len()
        ));
    }
    Ok(())
}

pub async fn run_select_model(
    cfg: &RuntimeConfig,
    agent: AgentId,
    available: Option<Vec<String>>,
) -> Result<()> {
    let available = match available {
        Some(ids) => ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(AvailableModel::new)
            .collect::<Vec<AvailableModel>>(),
        None => HttpBackend::from_config(cfg)?.available_models().await?,
    };

    let (model, source) = select_model_with_source(profile(agent), &available);
    println!(
        "{} {} -> {} ({} of {} available)",
        profile(agent).emoji,
        agent,
        model,
        source.label(),
        available.len()
    );
    Ok(())
}
