use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Openai,
    Deepseek,
    Groq,
    Ollama,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum CrewCommands {
    #[command(about = "Show the built-in agents and tasks of the generator crew")]
    Show {
        #[arg(long, help = "Agent key (doc_specialist, needs_analyst, crew_architect, code_developer)")]
        agent: Option<String>,
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
  crewforge \"Créer une crew pour analyser des données financières\"\n\
  crewforge --provider openai --model gpt-4o-mini --output-folder ./out \"Veille technologique\"\n\
  crewforge --search-enabled false \"Support client multilingue\"\n\
  crewforge crew show --agent code_developer\n\
  crewforge profiles show\n\
  crewforge doctor\n\
  crewforge telemetry report --limit 2000\n\
\n\
Behavior:\n\
  - Words after the flags are joined into the need description.\n\
  - With no need and no subcommand, the description is read interactively.\n\
  - Credentials are read from the environment and from a .env file in the working directory.";

#[derive(Debug, Parser)]
#[command(name = "crewforge")]
#[command(about = "Generate a CrewAI project from a need description with a four-agent LLM crew")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "CREWFORGE_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "CREWFORGE_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "CREWFORGE_TEMPERATURE")]
    pub temperature: Option<f32>,

    #[arg(long, env = "CREWFORGE_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "CREWFORGE_CONFIG", default_value = ".crewforge/config.toml")]
    pub config_path: String,

    #[arg(long, env = "CREWFORGE_OUTPUT_FOLDER")]
    pub output_folder: Option<String>,

    #[arg(long, env = "CREWFORGE_SEARCH_ENABLED", action = clap::ArgAction::Set)]
    pub search_enabled: Option<bool>,

    #[arg(long, env = "CREWFORGE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "CREWFORGE_SHOW_SENSITIVE_CONFIG", default_value_t = false)]
    pub show_sensitive_config: bool,

    #[arg(long, env = "CREWFORGE_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "CREWFORGE_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(help = "Need description; words are joined with spaces")]
    pub need: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Validate provider environment, search tool and output folder")]
    Doctor,
    #[command(about = "Inspect the generator crew")]
    Crew {
        #[command(subcommand)]
        command: CrewCommands,
    },
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

pub fn command_label(command: Option<&Commands>) -> String {
    match command {
        None => "generate".to_string(),
        Some(Commands::Doctor) => "doctor".to_string(),
        Some(Commands::Crew { command }) => match command {
            CrewCommands::Show { .. } => "crew.show".to_string(),
        },
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Some(Commands::Telemetry { command }) => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
