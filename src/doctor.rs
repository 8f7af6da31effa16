use std::path::Path;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::provider::{default_model_for, detect_provider};
use crate::tools::{DOCUMENTATION_URL, build_documentation_tool};

pub fn run_doctor(cfg: &RuntimeConfig, env_file: Option<&Path>) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );
    match env_file {
        Some(path) => println!("Environment file: {}", path.display()),
        None => println!("Environment file: <none found>"),
    }

    println!("Provider environment check:");
    for (key, ok) in cfg.credentials.presence() {
        let status = if ok { "set" } else { "missing" };
        println!("- {key}: {status}");
    }

    match detect_provider(&cfg.credentials) {
        Some(provider) => println!(
            "Auto provider resolution: {:?} (default model: {})",
            provider,
            default_model_for(provider)
        ),
        None => {
            println!("Auto provider resolution: none");
            println!("Tip: add a provider key to .env or run with --provider ollama");
        }
    }
    println!(
        "Configured provider: {:?}, model_override={}, temperature={}",
        cfg.provider,
        cfg.model.as_deref().unwrap_or("<provider-default>"),
        cfg.temperature
    );

    let tool = build_documentation_tool(cfg);
    if tool.is_fallback() {
        println!("Documentation tool: fallback (static link to {DOCUMENTATION_URL})");
    } else {
        println!("Documentation tool: DuckDuckGo search");
    }

    let output = Path::new(&cfg.output_folder);
    if output.is_dir() {
        let writable = std::fs::metadata(output)
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false);
        println!(
            "Output folder: {} ({})",
            output.display(),
            if writable { "writable" } else { "read-only" }
        );
    } else if output.exists() {
        println!("Output folder: {} (exists but is not a directory)", output.display());
    } else {
        println!("Output folder: {} (will be created)", output.display());
    }

    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );
    Ok(())
}
