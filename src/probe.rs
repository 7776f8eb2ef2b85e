use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::agents::{AgentId, profile, registry};
use crate::backend::load_service_descriptor;
use crate::config::RuntimeConfig;
use crate::modeltest::{is_active_status, load_models_file};
use crate::router::{TaskKind, routing_table};
use crate::telemetry::TelemetrySink;

pub const REPORT_JSON_FILE: &str = "capability-report.json";
pub const REPORT_MARKDOWN_FILE: &str = "capability-report.md";

const WORKSPACE_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "Dockerfile",
    "docker-compose.yml",
    "README.md",
    ".gitignore",
];
const PROVIDER_KEY_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_API_KEY",
    "DEEPSEEK_API_KEY",
];
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".agent-router"];
const MAX_WALK_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    Manifests,
    SourceTree,
    ModelsRegistry,
    BackendService,
    AgentRegistry,
    RoutingTable,
    Credentials,
    Docker,
    ReportsDir,
    TelemetryLog,
}

impl ProbeStep {
    pub const ALL: [ProbeStep; 10] = [
        ProbeStep::Manifests,
        ProbeStep::SourceTree,
        ProbeStep::ModelsRegistry,
        ProbeStep::BackendService,
        ProbeStep::AgentRegistry,
        ProbeStep::RoutingTable,
        ProbeStep::Credentials,
        ProbeStep::Docker,
        ProbeStep::ReportsDir,
        ProbeStep::TelemetryLog,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProbeStep::Manifests => "workspace_manifests",
            ProbeStep::SourceTree => "source_tree",
            ProbeStep::ModelsRegistry => "models_registry",
            ProbeStep::BackendService => "backend_service",
            ProbeStep::AgentRegistry => "agent_registry",
            ProbeStep::RoutingTable => "routing_table",
            ProbeStep::Credentials => "provider_credentials",
            ProbeStep::Docker => "docker_engine",
            ProbeStep::ReportsDir => "reports_directory",
            ProbeStep::TelemetryLog => "telemetry_log",
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            ProbeStep::Manifests => "Add a project manifest (Cargo.toml, package.json, ...) at the workspace root.",
            ProbeStep::SourceTree => "Create a src/ directory so workspace context can be collected.",
            ProbeStep::ModelsRegistry => "Create the models registry JSON (see --models-path) listing available models.",
            ProbeStep::BackendService => "Create the backend service descriptor JSON with base_url and endpoints.",
            ProbeStep::AgentRegistry => "Every agent needs non-empty preferred and fallback model lists.",
            ProbeStep::RoutingTable => "Route every task to an agent that has a registry profile.",
            ProbeStep::Credentials => "Export the backend API key env var or a provider key (e.g. OPENAI_API_KEY).",
            ProbeStep::Docker => "Install Docker and start the daemon to enable containerised backends.",
            ProbeStep::ReportsDir => "Run discover without --no-save to create the reports directory.",
            ProbeStep::TelemetryLog => "Enable telemetry and run a workflow to start the event log.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeSection {
    pub name: String,
    pub configured: bool,
    pub count: usize,
    pub details: Vec<String>,
    pub error: Option<String>,
}

impl ProbeSection {
    fn new(step: ProbeStep, configured: bool, count: usize, details: Vec<String>) -> Self {
        Self {
            name: step.label().to_string(),
            configured,
            count,
            details,
            error: None,
        }
    }

    fn failed(step: ProbeStep, err: &anyhow::Error) -> Self {
        Self {
            name: step.label().to_string(),
            configured: false,
            count: 0,
            details: Vec::new(),
            error: Some(format!("{err:#}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub generated_at: String,
    pub root: String,
    pub sections: Vec<ProbeSection>,
    pub configured_count: usize,
    pub total_sections: usize,
    pub readiness_percent: u32,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub root: PathBuf,
    pub models_path: PathBuf,
    pub service_path: PathBuf,
    pub reports_dir: PathBuf,
    pub telemetry_path: PathBuf,
    pub api_key_env: String,
    pub docker_binary: String,
    pub docker_timeout: Duration,
}

impl ProbeContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            models_path: root.join(crate::config::DEFAULT_MODELS_PATH),
            service_path: root.join(crate::config::DEFAULT_SERVICE_PATH),
            reports_dir: root.join(crate::config::DEFAULT_REPORTS_DIR),
            telemetry_path: root.join(crate::config::DEFAULT_TELEMETRY_PATH),
            api_key_env: crate::config::DEFAULT_API_KEY_ENV.to_string(),
            docker_binary: "docker".to_string(),
            docker_timeout: Duration::from_secs(5),
            root,
        }
    }

    pub fn from_config(cfg: &RuntimeConfig) -> Result<Self> {
        let root = std::env::current_dir().context("failed to resolve current directory")?;
        let resolve = |path: &str| {
            let candidate = PathBuf::from(path);
            if candidate.is_absolute() {
                candidate
            } else {
                root.join(candidate)
            }
        };
        Ok(Self {
            models_path: resolve(&cfg.models_path),
            service_path: resolve(&cfg.service_path),
            reports_dir: resolve(&cfg.reports_dir),
            telemetry_path: resolve(&cfg.telemetry_path),
            api_key_env: cfg.api_key_env.clone(),
            docker_binary: "docker".to_string(),
            docker_timeout: Duration::from_secs(5),
            root,
        })
    }
}

fn finish_step(step: ProbeStep, outcome: Result<ProbeSection>) -> ProbeSection {
    match outcome {
        Ok(section) => {
            tracing::debug!(
                step = step.label(),
                configured = section.configured,
                count = section.count,
                "probe step finished"
            );
            section
        }
        Err(err) => {
            tracing::warn!(step = step.label(), error = %err, "probe step failed");
            ProbeSection::failed(step, &err)
        }
    }
}

/// Steps that only touch the filesystem, env vars or static tables.
fn run_local_step(ctx: &ProbeContext, step: ProbeStep) -> Result<ProbeSection> {
    match step {
        ProbeStep::Manifests => probe_manifests(ctx),
        ProbeStep::SourceTree => probe_source_tree(ctx),
        ProbeStep::ModelsRegistry => probe_models_registry(ctx),
        ProbeStep::BackendService => probe_backend_service(ctx),
        ProbeStep::AgentRegistry => probe_agent_registry(),
        ProbeStep::RoutingTable => probe_routing_table(),
        ProbeStep::Credentials => probe_credentials(ctx),
        ProbeStep::ReportsDir => probe_reports_dir(ctx),
        ProbeStep::TelemetryLog => probe_telemetry_log(ctx),
        ProbeStep::Docker => Err(anyhow::anyhow!(
            "docker step launches child processes and runs on the async runtime"
        )),
    }
}

async fn run_step(ctx: &ProbeContext, step: ProbeStep) -> ProbeSection {
    let outcome = match step {
        ProbeStep::Docker => probe_docker(ctx).await,
        local => run_local_step(ctx, local),
    };
    finish_step(step, outcome)
}

/// Local steps go to the blocking pool while the Docker step awaits its child processes.
async fn run_parallel(ctx: &ProbeContext) -> Vec<ProbeSection> {
    let handles = ProbeStep::ALL
        .into_iter()
        .filter(|step| *step != ProbeStep::Docker)
        .map(|step| {
            let ctx = ctx.clone();
            let handle =
                tokio::task::spawn_blocking(move || finish_step(step, run_local_step(&ctx, step)));
            (step, handle)
        })
        .collect::<Vec<_>>();
    let mut docker = Some(run_step(ctx, ProbeStep::Docker).await);
    let mut handles = handles.into_iter();
    let mut sections = Vec::with_capacity(ProbeStep::ALL.len());
    for step in ProbeStep::ALL {
        if step == ProbeStep::Docker {
            sections.extend(docker.take());
            continue;
        }
        let Some((spawned, handle)) = handles.next() else {
            break;
        };
        let section = match handle.await {
            Ok(section) => section,
            Err(err) => ProbeSection::failed(
                spawned,
                &anyhow::anyhow!("probe step task did not complete: {err}"),
            ),
        };
        sections.push(section);
    }
    sections
}

/// Runs every probe step. Report order is fixed regardless of `parallel`.
pub async fn run_discovery(ctx: &ProbeContext, parallel: bool) -> CapabilityReport {
    let sections = if parallel {
        run_parallel(ctx).await
    } else {
        let mut sections = Vec::with_capacity(ProbeStep::ALL.len());
        for step in ProbeStep::ALL {
            sections.push(run_step(ctx, step).await);
        }
        sections
    };

    build_report(ctx, sections)
}

pub fn build_report(ctx: &ProbeContext, sections: Vec<ProbeSection>) -> CapabilityReport {
    let total_sections = sections.len();
    let configured_count = sections.iter().filter(|s| s.configured).count();
    let readiness_percent = if total_sections == 0 {
        0
    } else {
        (configured_count * 100 / total_sections) as u32
    };
    let recommendations = ProbeStep::ALL
        .iter()
        .filter(|step| {
            sections
                .iter()
                .any(|section| section.name == step.label() && !section.configured)
        })
        .map(|step| step.recommendation().to_string())
        .collect::<Vec<String>>();

    CapabilityReport {
        generated_at: Utc::now().to_rfc3339(),
        root: ctx.root.display().to_string(),
        sections,
        configured_count,
        total_sections,
        readiness_percent,
        recommendations,
    }
}

fn probe_manifests(ctx: &ProbeContext) -> Result<ProbeSection> {
    let found = WORKSPACE_MANIFESTS
        .iter()
        .filter(|name| ctx.root.join(name).is_file())
        .map(|name| name.to_string())
        .collect::<Vec<String>>();
    Ok(ProbeSection::new(
        ProbeStep::Manifests,
        !found.is_empty(),
        found.len(),
        found,
    ))
}

fn count_files_by_extension(
    dir: &Path,
    depth: usize,
    counts: &mut BTreeMap<String, usize>,
) -> Result<()> {
    if depth > MAX_WALK_DEPTH {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat '{}'", path.display()))?;
        if file_type.is_dir() {
            let name = entry.file_name();
            if SKIPPED_DIRS.iter().any(|skip| name == *skip) {
                continue;
            }
            count_files_by_extension(&path, depth + 1, counts)?;
        } else if file_type.is_file() {
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_else(|| "<none>".to_string());
            *counts.entry(ext).or_insert(0) += 1;
        }
    }
    Ok(())
}

fn probe_source_tree(ctx: &ProbeContext) -> Result<ProbeSection> {
    let src = ctx.root.join("src");
    if !src.is_dir() {
        return Ok(ProbeSection::new(
            ProbeStep::SourceTree,
            false,
            0,
            vec!["src/ not found".to_string()],
        ));
    }

    let mut counts = BTreeMap::<String, usize>::new();
    count_files_by_extension(&src, 0, &mut counts)?;
    let total = counts.values().sum::<usize>();
    let details = counts
        .iter()
        .map(|(ext, count)| format!("{ext}: {count}"))
        .collect::<Vec<String>>();
    Ok(ProbeSection::new(
        ProbeStep::SourceTree,
        total > 0,
        total,
        details,
    ))
}

fn probe_models_registry(ctx: &ProbeContext) -> Result<ProbeSection> {
    if !ctx.models_path.is_file() {
        return Ok(ProbeSection::new(
            ProbeStep::ModelsRegistry,
            false,
            0,
            vec![format!("{} not found", ctx.models_path.display())],
        ));
    }

    let models = load_models_file(&ctx.models_path)?;
    let mut by_provider = BTreeMap::<String, usize>::new();
    let mut active = 0usize;
    for entry in models.values() {
        *by_provider.entry(entry.provider.clone()).or_insert(0) += 1;
        if is_active_status(&entry.status) {
            active += 1;
        }
    }
    let mut details = vec![format!("active: {active}")];
    details.extend(
        by_provider
            .iter()
            .map(|(provider, count)| format!("provider {provider}: {count}")),
    );
    Ok(ProbeSection::new(
        ProbeStep::ModelsRegistry,
        active > 0,
        models.len(),
        details,
    ))
}

fn probe_backend_service(ctx: &ProbeContext) -> Result<ProbeSection> {
    if !ctx.service_path.is_file() {
        return Ok(ProbeSection::new(
            ProbeStep::BackendService,
            false,
            0,
            vec![format!("{} not found", ctx.service_path.display())],
        ));
    }

    let descriptor = load_service_descriptor(&ctx.service_path)?;
    let mut endpoints = Vec::<String>::new();
    if let Some(models) = descriptor.endpoints.models.as_deref() {
        endpoints.push(format!("models={models}"));
    }
    if let Some(chat) = descriptor.endpoints.chat.as_deref() {
        endpoints.push(format!("chat={chat}"));
    }
    let mut other = descriptor.endpoints.other.keys().cloned().collect::<Vec<String>>();
    other.sort();
    endpoints.extend(other);

    let enabled_flags = |flags: &std::collections::HashMap<String, serde_json::Value>| {
        flags
            .values()
            .filter(|value| value.as_bool().unwrap_or(false))
            .count()
    };
    let mut details = vec![
        format!("base_url: {}", crate::error::redact_url_credentials(&descriptor.base_url)),
        format!("security flags enabled: {}", enabled_flags(&descriptor.security)),
        format!("monitoring flags enabled: {}", enabled_flags(&descriptor.monitoring)),
    ];
    details.extend(endpoints.iter().map(|e| format!("endpoint {e}")));

    Ok(ProbeSection::new(
        ProbeStep::BackendService,
        !descriptor.base_url.trim().is_empty(),
        endpoints.len(),
        details,
    ))
}

fn probe_agent_registry() -> Result<ProbeSection> {
    let profiles = registry();
    let incomplete = profiles
        .iter()
        .filter(|p| p.preferred_models.is_empty() || p.fallback_models.is_empty())
        .map(|p| p.id.label().to_string())
        .collect::<Vec<String>>();
    let mut details = profiles
        .iter()
        .map(|p| format!("{} {} ({} preferred, {} fallback)", p.emoji, p.id, p.preferred_models.len(), p.fallback_models.len()))
        .collect::<Vec<String>>();
    if !incomplete.is_empty() {
        details.push(format!("incomplete: {}", incomplete.join(", ")));
    }
    Ok(ProbeSection::new(
        ProbeStep::AgentRegistry,
        incomplete.is_empty() && profiles.len() == AgentId::ALL.len(),
        profiles.len(),
        details,
    ))
}

fn probe_routing_table() -> Result<ProbeSection> {
    let table = routing_table();
    let mut agents = table
        .iter()
        .flat_map(|(_, row)| row.iter().copied())
        .collect::<Vec<AgentId>>();
    agents.sort();
    agents.dedup();
    let details = agents
        .iter()
        .map(|agent| format!("{} {}", profile(*agent).emoji, agent))
        .collect::<Vec<String>>();
    Ok(ProbeSection::new(
        ProbeStep::RoutingTable,
        table.len() == TaskKind::ALL.len(),
        table.len(),
        details,
    ))
}

fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

fn probe_credentials(ctx: &ProbeContext) -> Result<ProbeSection> {
    let mut keys = vec![ctx.api_key_env.as_str()];
    keys.extend(PROVIDER_KEY_VARS.iter().copied().filter(|key| *key != ctx.api_key_env));
    let details = keys
        .iter()
        .map(|key| {
            let status = if env_present(key) { "set" } else { "missing" };
            format!("{key}: {status}")
        })
        .collect::<Vec<String>>();
    let present = keys.iter().filter(|key| env_present(key)).count();
    Ok(ProbeSection::new(
        ProbeStep::Credentials,
        present > 0,
        present,
        details,
    ))
}

pub async fn run_command_with_timeout(
    binary: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Option<std::process::Output>> {
    let child = tokio::process::Command::new(binary)
        .args(args)
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(Some(output)),
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Ok(Err(err)) => Err(err).with_context(|| format!("failed to launch '{binary}'")),
        Err(_) => Err(anyhow::anyhow!(
            "'{binary} {}' timed out after {}s",
            args.join(" "),
            timeout.as_secs()
        )),
    }
}

async fn probe_docker(ctx: &ProbeContext) -> Result<ProbeSection> {
    let Some(version) = run_command_with_timeout(
        &ctx.docker_binary,
        &["version", "--format", "{{.Client.Version}}"],
        ctx.docker_timeout,
    )
    .await?
    else {
        return Ok(ProbeSection::new(
            ProbeStep::Docker,
            false,
            0,
            vec!["docker CLI not installed".to_string()],
        ));
    };

    let client_version = String::from_utf8_lossy(&version.stdout).trim().to_string();
    let mut details = vec![format!(
        "client: {}",
        if client_version.is_empty() { "unknown" } else { client_version.as_str() }
    )];

    let info = run_command_with_timeout(
        &ctx.docker_binary,
        &["info", "--format", "{{.ContainersRunning}}"],
        ctx.docker_timeout,
    )
    .await?;
    match info {
        Some(output) if output.status.success() => {
            let running = String::from_utf8_lossy(&output.stdout)
                .trim()
                .parse::<usize>()
                .unwrap_or(0);
            details.push(format!("daemon: reachable ({running} running containers)"));
            Ok(ProbeSection::new(ProbeStep::Docker, true, running, details))
        }
        _ => {
            details.push("daemon: unreachable".to_string());
            Ok(ProbeSection::new(ProbeStep::Docker, false, 0, details))
        }
    }
}

fn probe_reports_dir(ctx: &ProbeContext) -> Result<ProbeSection> {
    if !ctx.reports_dir.is_dir() {
        return Ok(ProbeSection::new(
            ProbeStep::ReportsDir,
            false,
            0,
            vec![format!("{} not found", ctx.reports_dir.display())],
        ));
    }
    let mut names = std::fs::read_dir(&ctx.reports_dir)
        .with_context(|| format!("failed to list reports dir '{}'", ctx.reports_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect::<Vec<String>>();
    names.sort();
    Ok(ProbeSection::new(
        ProbeStep::ReportsDir,
        true,
        names.len(),
        names,
    ))
}

fn probe_telemetry_log(ctx: &ProbeContext) -> Result<ProbeSection> {
    if !ctx.telemetry_path.is_file() {
        return Ok(ProbeSection::new(
            ProbeStep::TelemetryLog,
            false,
            0,
            vec![format!("{} not found", ctx.telemetry_path.display())],
        ));
    }
    let content = std::fs::read_to_string(&ctx.telemetry_path).with_context(|| {
        format!(
            "failed to read telemetry log '{}'",
            ctx.telemetry_path.display()
        )
    })?;
    let events = content.lines().filter(|line| !line.trim().is_empty()).count();
    Ok(ProbeSection::new(
        ProbeStep::TelemetryLog,
        true,
        events,
        vec![format!("events: {events}")],
    ))
}

pub fn render_markdown(report: &CapabilityReport) -> String {
    let mut out = String::new();
    out.push_str("# Capability Report\n\n");
    out.push_str(&format!("- Generated: {}\n", report.generated_at));
    out.push_str(&format!("- Root: `{}`\n", report.root));
    out.push_str(&format!(
        "- Readiness: {}% ({}/{} sections configured)\n\n",
        report.readiness_percent, report.configured_count, report.total_sections
    ));
    out.push_str("| Section | Configured | Count |\n|---|---|---|\n");
    for section in &report.sections {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            section.name,
            if section.configured { "yes" } else { "no" },
            section.count
        ));
    }

    for section in &report.sections {
        out.push_str(&format!("\n## {}\n\n", section.name));
        if let Some(error) = section.error.as_deref() {
            out.push_str(&format!("Error: {error}\n"));
        }
        for detail in &section.details {
            out.push_str(&format!("- {detail}\n"));
        }
    }

    if !report.recommendations.is_empty() {
        out.push_str("\n## Recommendations\n\n");
        for recommendation in &report.recommendations {
            out.push_str(&format!("- {recommendation}\n"));
        }
    }
    out
}

pub fn write_reports(report: &CapabilityReport, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create reports directory '{}'", dir.display()))?;
    let json_path = dir.join(REPORT_JSON_FILE);
    let markdown_path = dir.join(REPORT_MARKDOWN_FILE);

    let payload = serde_json::to_string_pretty(report)
        .context("failed to serialize capability report to json")?;
    std::fs::write(&json_path, payload)
        .with_context(|| format!("failed to write report to '{}'", json_path.display()))?;
    std::fs::write(&markdown_path, render_markdown(report))
        .with_context(|| format!("failed to write report to '{}'", markdown_path.display()))?;
    Ok((json_path, markdown_path))
}

pub async fn run_discover(
    cfg: &RuntimeConfig,
    parallel: bool,
    no_save: bool,
    telemetry: &TelemetrySink,
) -> Result<()> {
    let ctx = ProbeContext::from_config(cfg)?;
    let report = run_discovery(&ctx, parallel).await;

    println!(
        "Capability report for {} (readiness {}%, {}/{} configured)",
        report.root, report.readiness_percent, report.configured_count, report.total_sections
    );
    for section in &report.sections {
        let marker = if section.configured { "ok " } else { "-- " };
        match section.error.as_deref() {
            Some(error) => println!("{marker} {:<22} error: {error}", section.name),
            None => println!("{marker} {:<22} count={}", section.name, section.count),
        }
    }
    if !report.recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in &report.recommendations {
            println!("- {recommendation}");
        }
    }

    if !no_save {
        let (json_path, markdown_path) = write_reports(&report, &ctx.reports_dir)?;
        println!(
            "Reports written to {} and {}",
            json_path.display(),
            markdown_path.display()
        );
    }

    telemetry.emit(
        "discover.completed",
        json!({
            "readiness_percent": report.readiness_percent,
            "configured": report.configured_count,
            "total": report.total_sections,
            "parallel": parallel
        }),
    );
    Ok(())
}
