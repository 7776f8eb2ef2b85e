use clap::{Parser, Subcommand};

use crate::agents::AgentId;
use crate::router::{Complexity, Priority, TaskKind};

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    #[command(about = "List the built-in agent registry")]
    List,
    #[command(about = "Show one agent's persona, specialties, and ranked models")]
    Show {
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  agent-router route --task code-generation --complexity simple \"Write a slugify helper\"\n\
  agent-router route --task optimization --complexity expert --context '{\"language\":\"rust\"}' \"Speed up this parser\"\n\
  agent-router batch requests.json\n\
  agent-router tasks\n\
  agent-router agents show --name deep-thinker\n\
  agent-router select-model --agent precision --available gpt-4o,gemini-1.5-pro\n\
  agent-router discover --parallel\n\
  agent-router model-test --seed 7 --delay-scale 0 --fail-under 0.75\n\
  agent-router doctor\n\
  agent-router telemetry report --limit 2000\n\
\n\
Routing behavior:\n\
  - The task and complexity pick an agent through a fixed routing table (see `tasks`).\n\
  - The agent's preferred models are tried in order against the backend's available list,\n\
    then its fallback models, then the default model.";

#[derive(Debug, Parser)]
#[command(name = "agent-router")]
#[command(about = "Route developer tasks to agent personas and hosted LLM models")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "AGENT_ROUTER_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "AGENT_ROUTER_CONFIG", default_value = ".agent-router/config.toml")]
    pub config_path: String,

    #[arg(long, env = "AGENT_ROUTER_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_API_KEY_ENV")]
    pub api_key_env: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_MODELS_PATH")]
    pub models_path: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_SERVICE_PATH")]
    pub service_path: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_REPORTS_DIR")]
    pub reports_dir: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "AGENT_ROUTER_RETRY_ATTEMPTS")]
    pub retry_attempts: Option<u32>,

    #[arg(long, env = "AGENT_ROUTER_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    #[arg(long, env = "AGENT_ROUTER_AVAILABILITY_TTL_SECS")]
    pub availability_ttl_secs: Option<u64>,

    #[arg(long, env = "AGENT_ROUTER_HISTORY_CAPACITY")]
    pub history_capacity: Option<usize>,

    #[arg(long, env = "AGENT_ROUTER_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "AGENT_ROUTER_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "AGENT_ROUTER_SHOW_SENSITIVE_CONFIG", default_value_t = false)]
    pub show_sensitive_config: bool,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Route one request to an agent and model, then print the result")]
    Route {
        #[arg(long, value_enum)]
        task: TaskKind,
        #[arg(long, value_enum, default_value_t = Complexity::Moderate)]
        complexity: Complexity,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, help = "JSON object passed to the agent as structured context")]
        context: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(required = true)]
        input: Vec<String>,
    },
    #[command(about = "Route every request in a JSON file and print per-agent statistics")]
    Batch {
        path: String,
        #[arg(long, default_value_t = false)]
        keep_going: bool,
    },
    #[command(about = "Inspect the built-in agent registry")]
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    #[command(about = "Print the task routing table")]
    Tasks,
    #[command(about = "Select a model for an agent from a given or live availability list")]
    SelectModel {
        #[arg(long, value_enum)]
        agent: AgentId,
        #[arg(long, value_delimiter = ',')]
        available: Option<Vec<String>>,
    },
    #[command(about = "Probe workspace, config files, and Docker; write a capability report")]
    Discover {
        #[arg(
            long,
            default_value_t = false,
            help = "Run filesystem checks on the blocking pool alongside the Docker check"
        )]
        parallel: bool,
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    #[command(about = "Run simulated tests against the models registry file")]
    ModelTest {
        #[arg(long)]
        models: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1.0)]
        delay_scale: f64,
        #[arg(long, default_value_t = 0.0)]
        fail_under: f64,
        #[arg(long)]
        output: Option<String>,
    },
    #[command(about = "Validate credentials, config files, and backend reachability")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Route { .. } => "route".to_string(),
        Commands::Batch { .. } => "batch".to_string(),
        Commands::Agents { command } => match command {
            AgentCommands::List => "agents.list".to_string(),
            AgentCommands::Show { .. } => "agents.show".to_string(),
        },
        Commands::Tasks => "tasks".to_string(),
        Commands::SelectModel { .. } => "select-model".to_string(),
        Commands::Discover { .. } => "discover".to_string(),
        Commands::ModelTest { .. } => "model-test".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
