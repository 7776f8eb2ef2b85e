use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig, display_backend_url};

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Backend URL: {}", display_backend_url(cfg));
    println!("API key env: {}", cfg.api_key_env);
    println!("Models path: {}", cfg.models_path);
    println!("Service descriptor path: {}", cfg.service_path);
    println!("Reports dir: {}", cfg.reports_dir);
    println!("Request timeout (secs): {}", cfg.request_timeout_secs);
    println!("Retry attempts: {}", cfg.retry_attempts);
    println!("Retry delay (ms): {}", cfg.retry_delay_ms);
    println!("Availability TTL (secs): {}", cfg.availability_ttl_secs);
    println!(
        "History capacity: {}",
        if cfg.history_capacity == 0 {
            "unbounded".to_string()
        } else {
            cfg.history_capacity.to_string()
        }
    );
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
