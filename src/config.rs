use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_MODELS_PATH: &str = "config/models.json";
pub const DEFAULT_SERVICE_PATH: &str = "config/backend-service.json";
pub const DEFAULT_API_KEY_ENV: &str = "AGENT_ROUTER_API_KEY";
pub const DEFAULT_REPORTS_DIR: &str = "reports";
pub const DEFAULT_TELEMETRY_PATH: &str = ".agent-router/telemetry.jsonl";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub backend_url: Option<String>,
    pub api_key_env: String,
    pub models_path: String,
    pub service_path: String,
    pub reports_dir: String,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub availability_ttl_secs: u64,
    pub history_capacity: usize,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub show_sensitive_config: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub backend_url: Option<String>,
    pub api_key_env: Option<String>,
    pub models_path: Option<String>,
    pub service_path: Option<String>,
    pub reports_dir: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub availability_ttl_secs: Option<u64>,
    pub history_capacity: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and value types.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        backend_url: cli
            .backend_url
            .clone()
            .or(profile.backend_url)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        api_key_env: cli
            .api_key_env
            .clone()
            .or(profile.api_key_env)
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        models_path: cli
            .models_path
            .clone()
            .or(profile.models_path)
            .unwrap_or_else(|| DEFAULT_MODELS_PATH.to_string()),
        service_path: cli
            .service_path
            .clone()
            .or(profile.service_path)
            .unwrap_or_else(|| DEFAULT_SERVICE_PATH.to_string()),
        reports_dir: cli
            .reports_dir
            .clone()
            .or(profile.reports_dir)
            .unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()),
        request_timeout_secs: cli
            .request_timeout_secs
            .or(profile.request_timeout_secs)
            .unwrap_or(60)
            .max(1),
        retry_attempts: cli
            .retry_attempts
            .or(profile.retry_attempts)
            .unwrap_or(1)
            .max(1),
        retry_delay_ms: cli
            .retry_delay_ms
            .or(profile.retry_delay_ms)
            .unwrap_or(500),
        availability_ttl_secs: cli
            .availability_ttl_secs
            .or(profile.availability_ttl_secs)
            .unwrap_or(30),
        history_capacity: cli
            .history_capacity
            .or(profile.history_capacity)
            .unwrap_or(1000),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
        show_sensitive_config: cli.show_sensitive_config,
    })
}

pub fn display_backend_url(cfg: &RuntimeConfig) -> String {
    match cfg.backend_url.as_deref() {
        None => format!("<from {}>", cfg.service_path),
        Some(url) if cfg.show_sensitive_config => url.to_string(),
        Some(url) => crate::error::redact_url_credentials(url),
    }
}
