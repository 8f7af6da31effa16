use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use crewforge::cli::{Cli, Commands, CrewCommands, ProfileCommands, TelemetryCommands, command_label};
use crewforge::config::{ProviderCredentials, load_env_file, load_profiles, resolve_runtime_config};
use crewforge::crew::{build_crew, run_crew_show};
use crewforge::doctor::run_doctor;
use crewforge::error::{categorize_error, format_cli_error};
use crewforge::generator::{resolve_need, run_generate};
use crewforge::profiles::{run_profiles_list, run_profiles_show};
use crewforge::telemetry::{TelemetrySink, run_telemetry_report};
use crewforge::tools::build_documentation_tool;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed flags see its values.
    let env_file = load_env_file();
    let cli = Cli::parse();
    let show_sensitive_config = cli.show_sensitive_config;
    if let Err(err) = run_cli(cli, env_file).await {
        eprintln!("{}", format_cli_error(&err, show_sensitive_config));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli, env_file: Option<std::path::PathBuf>) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    if let Some(path) = env_file.as_ref() {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles, ProviderCredentials::from_env())?;
    let command = command_label(cli.command.as_ref());
    let telemetry = TelemetrySink::new(&cfg, command.clone());
    telemetry.emit("command.started", json!({ "provider": format!("{:?}", cfg.provider) }));

    let outcome = match cli.command {
        None => match resolve_need(&cli.need) {
            Ok(need) => run_generate(&cfg, &need, &telemetry).await.map(|_| ()),
            Err(err) => Err(err),
        },
        Some(Commands::Doctor) => run_doctor(&cfg, env_file.as_deref()),
        Some(Commands::Crew { command }) => match command {
            CrewCommands::Show { agent } => {
                let crew = build_crew(build_documentation_tool(&cfg));
                run_crew_show(&crew, agent)
            }
        },
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Some(Commands::Telemetry { command }) => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    match &outcome {
        Ok(()) => telemetry.emit("command.completed", json!({})),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({ "category": categorize_error(err).code() }),
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
