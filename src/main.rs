use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use agent_router::agents::{run_agents_list, run_agents_show};
use agent_router::cli::{AgentCommands, Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use agent_router::config::{load_profiles, resolve_runtime_config};
use agent_router::doctor::run_doctor;
use agent_router::error::{categorize_error, format_cli_error};
use agent_router::executor::WorkflowRequest;
use agent_router::modeltest::run_model_test;
use agent_router::probe::run_discover;
use agent_router::profiles::{run_profiles_list, run_profiles_show};
use agent_router::router::run_tasks_table;
use agent_router::telemetry::{TelemetrySink, run_telemetry_report};
use agent_router::workflow::{
    build_orchestrator, parse_context_arg, run_batch, run_route, run_select_model,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_sensitive_config = cli.show_sensitive_config;
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err, show_sensitive_config));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));
    let started = Instant::now();

    let outcome = match cli.command {
        Commands::Route {
            task,
            complexity,
            priority,
            context,
            json,
            input,
        } => {
            let request = WorkflowRequest {
                task,
                complexity,
                priority,
                user_input: input.join(" "),
                context: parse_context_arg(context.as_deref())?,
            };
            let orchestrator = build_orchestrator(&cfg, &telemetry)?;
            run_route(&orchestrator, request, json).await
        }
        Commands::Batch { path, keep_going } => {
            let orchestrator = build_orchestrator(&cfg, &telemetry)?;
            run_batch(&orchestrator, &path, keep_going).await
        }
        Commands::Agents { command } => match command {
            AgentCommands::List => run_agents_list(),
            AgentCommands::Show { name } => run_agents_show(&name),
        },
        Commands::Tasks => run_tasks_table(),
        Commands::SelectModel { agent, available } => {
            run_select_model(&cfg, agent, available).await
        }
        Commands::Discover { parallel, no_save } => {
            run_discover(&cfg, parallel, no_save, &telemetry).await
        }
        Commands::ModelTest {
            models,
            seed,
            delay_scale,
            fail_under,
            output,
        } => {
            let models_path = models.unwrap_or_else(|| cfg.models_path.clone());
            run_model_test(
                &models_path,
                &cfg.reports_dir,
                output,
                seed,
                delay_scale,
                fail_under,
                &telemetry,
            )
            .await
        }
        Commands::Doctor => run_doctor(&cfg).await,
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(()) => telemetry.emit("command.completed", json!({ "duration_ms": duration_ms })),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({
                "duration_ms": duration_ms,
                "category": categorize_error(err).code()
            }),
        ),
    }
    outcome
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
