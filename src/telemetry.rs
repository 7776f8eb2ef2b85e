use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agents::AgentId;
use crate::config::RuntimeConfig;
use crate::router::TaskKind;

pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
pub const WORKFLOW_FAILED: &str = "workflow.failed";

pub fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Payload of `workflow.completed` / `workflow.failed`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowEvent<'a> {
    pub workflow_id: &'a str,
    pub agent: AgentId,
    pub task: TaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Serialize)]
struct Envelope<'a, P: Serialize> {
    ts_unix_ms: u128,
    event: &'a str,
    run_id: &'a str,
    command: &'a str,
    profile: &'a str,
    #[serde(flatten)]
    payload: P,
}

/// Append-only JSONL event log for one CLI invocation.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    enabled: bool,
    path: PathBuf,
    run_id: String,
    command: String,
    profile: String,
    file_lock: Arc<std::sync::Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        Self {
            enabled: cfg.telemetry_enabled,
            path: PathBuf::from(&cfg.telemetry_path),
            run_id: format!("run-{}-{}", unix_ms_now(), std::process::id()),
            command,
            profile: cfg.profile.clone(),
            file_lock: Arc::new(std::sync::Mutex::new(())),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// `payload` must serialize to a map; its fields are merged into the record.
    pub fn emit<P: Serialize>(&self, event: &str, payload: P) {
        if !self.enabled {
            return;
        }

        let envelope = Envelope {
            ts_unix_ms: unix_ms_now(),
            event,
            run_id: &self.run_id,
            command: &self.command,
            profile: &self.profile,
            payload,
        };
        let written = serde_json::to_string(&envelope)
            .with_context(|| format!("failed to serialize telemetry event '{event}'"))
            .and_then(|line| self.append_line(&line));
        if let Err(err) = written {
            tracing::warn!(
                event,
                path = %self.path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }

    pub fn emit_workflow(&self, event: &str, payload: &WorkflowEvent<'_>) {
        self.emit(event, payload);
    }

    fn append_line(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open telemetry path '{}'", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to '{}'", self.path.display()))
    }
}

/// Fields the report reads back; everything else in a record is ignored.
#[derive(Debug, Deserialize)]
struct EventLine {
    #[serde(default)]
    event: String,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    command: String,
    agent: Option<AgentId>,
    ts_unix_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TelemetrySummary {
    pub total_lines: usize,
    pub parsed_events: usize,
    pub parse_errors: usize,
    pub unique_runs: BTreeSet<String>,
    pub command_counts: BTreeMap<String, usize>,
    pub command_completed: usize,
    pub command_failed: usize,
    pub workflow_completed: usize,
    pub workflow_failed: usize,
    pub agent_workflows: BTreeMap<String, usize>,
    pub last_event_ts_unix_ms: Option<u128>,
}

impl TelemetrySummary {
    fn observe(&mut self, line: EventLine) {
        self.parsed_events += 1;
        if !line.run_id.is_empty() {
            self.unique_runs.insert(line.run_id);
        }
        if !line.command.is_empty() {
            *self.command_counts.entry(line.command).or_default() += 1;
        }
        if let Some(ts) = line.ts_unix_ms.map(u128::from) {
            self.last_event_ts_unix_ms = Some(self.last_event_ts_unix_ms.map_or(ts, |t| t.max(ts)));
        }

        match line.event.as_str() {
            "command.completed" => self.command_completed += 1,
            "command.failed" => self.command_failed += 1,
            WORKFLOW_COMPLETED => {
                self.workflow_completed += 1;
                if let Some(agent) = line.agent {
                    *self.agent_workflows.entry(agent.label().to_string()).or_default() += 1;
                }
            }
            WORKFLOW_FAILED => self.workflow_failed += 1,
            _ => {}
        }
    }
}

/// Summarizes the newest `limit` lines of a telemetry log.
pub fn summarize_telemetry_lines(lines: Vec<String>, limit: usize) -> TelemetrySummary {
    let mut summary = TelemetrySummary {
        total_lines: lines.len(),
        ..TelemetrySummary::default()
    };

    for line in lines.iter().rev().take(limit.max(1)) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLine>(line) {
            Ok(parsed) => summary.observe(parsed),
            Err(_) => summary.parse_errors += 1,
        }
    }
    summary
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?;
    let summary = summarize_telemetry_lines(content.lines().map(str::to_string).collect(), limit);

    println!("Telemetry report for {}", path.display());
    println!(
        "{} lines, {} events analyzed, {} unparseable, {} runs",
        summary.total_lines,
        summary.parsed_events,
        summary.parse_errors,
        summary.unique_runs.len()
    );
    println!(
        "Commands: completed={} failed={}",
        summary.command_completed, summary.command_failed
    );
    for (command, count) in &summary.command_counts {
        println!("  {command:<18} {count}");
    }
    println!(
        "Workflows: completed={} failed={}",
        summary.workflow_completed, summary.workflow_failed
    );
    for (agent, count) in &summary.agent_workflows {
        println!("  {agent:<18} {count}");
    }
    if let Some(last_ts) = summary.last_event_ts_unix_ms {
        println!("Last event ts_unix_ms: {last_ts}");
    }
    Ok(())
}
