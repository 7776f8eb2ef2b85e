use std::path::Path;

use anyhow::Result;

use crate::backend::{HttpBackend, ModelBackend};
use crate::config::{RuntimeConfig, display_backend_url};
use crate::modeltest::load_models_file;

fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

pub async fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let key_status = if env_present(&cfg.api_key_env) {
        "set"
    } else {
        "missing"
    };
    println!("API key env {}: {}", cfg.api_key_env, key_status);

    let models_path = Path::new(&cfg.models_path);
    if models_path.exists() {
        match load_models_file(models_path) {
            Ok(models) => println!("Models file: ok ({} models, {})", models.len(), cfg.models_path),
            Err(err) => println!("Models file: invalid ({err:#})"),
        }
    } else {
        println!("Models file: missing ({})", cfg.models_path);
    }

    let service_status = if Path::new(&cfg.service_path).exists() {
        "present"
    } else {
        "missing"
    };
    println!("Service descriptor: {} ({})", service_status, cfg.service_path);
    println!("Backend URL: {}", display_backend_url(cfg));
    println!(
        "Orchestration: retry_attempts={} retry_delay_ms={} availability_ttl_secs={} history_capacity={} timeout_secs={}",
        cfg.retry_attempts,
        cfg.retry_delay_ms,
        cfg.availability_ttl_secs,
        cfg.history_capacity,
        cfg.request_timeout_secs
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    match HttpBackend::from_config(cfg) {
        Ok(backend) => match backend.available_models().await {
            Ok(models) => println!("Backend reachability: ok ({} models available)", models.len()),
            Err(err) => {
                println!("Backend reachability: failed");
                tracing::warn!(error = %err, "backend availability check failed");
                println!(
                    "Detail: {}",
                    crate::error::render_error_message(&err, cfg.show_sensitive_config)
                );
            }
        },
        Err(err) => println!("Backend reachability: not configured ({err})"),
    }

    Ok(())
}
