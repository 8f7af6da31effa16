use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use crate::artifacts::{ProjectArtifact, write_project};
use crate::config::RuntimeConfig;
use crate::crew::{Crew, build_crew};
use crate::engine::{CrewEngine, SequentialEngine};
use crate::provider::resolve_model;
use crate::telemetry::TelemetrySink;
use crate::tools::build_documentation_tool;

pub const NEED_PROMPT: &str =
    "Décrivez le besoin pour lequel vous souhaitez créer une équipe d'agents CrewAI: ";

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: ProjectArtifact,
    pub result: String,
}

/// Joins CLI words into a need description, or asks for one interactively.
///
/// The text is kept as typed. An empty need is valid and yields a
/// `crew_custom_crew_*` project.
pub fn resolve_need(words: &[String]) -> Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }

    let mut editor = rustyline::DefaultEditor::new().context("failed to read input: no terminal")?;
    editor
        .readline(NEED_PROMPT)
        .context("failed to read input for the need description")
}

/// Appends the need to the crew, runs it once, and persists the final text.
///
/// Engine errors are returned as-is. Only the write stage has a fallback.
pub async fn create_custom_crew(
    crew: &mut Crew,
    engine: &dyn CrewEngine,
    output_folder: &Path,
    need: &str,
) -> Result<GenerationOutcome> {
    crew.append_need(need);

    let output = engine.kickoff(crew).await?;

    let now = chrono::Local::now().naive_local();
    let artifact = write_project(output_folder, need, &output.raw, now)?;
    Ok(GenerationOutcome {
        artifact,
        result: output.raw,
    })
}

pub async fn run_generate(cfg: &RuntimeConfig, need: &str, telemetry: &TelemetrySink) -> Result<PathBuf> {
    println!("Création d'une crew personnalisée pour le besoin: {need}");

    let (model, provider, model_name) = resolve_model(cfg)?;
    tracing::info!(provider = ?provider, model = %model_name, temperature = cfg.temperature, "Using model");

    let mut crew = build_crew(build_documentation_tool(cfg));
    let engine = SequentialEngine::new(model).with_telemetry(telemetry.clone());

    let outcome = create_custom_crew(&mut crew, &engine, Path::new(&cfg.output_folder), need).await?;

    telemetry.emit(
        "project.written",
        json!({
            "kind": outcome.artifact.kind.label(),
            "files": outcome.artifact.files.len(),
            "result_chars": outcome.result.len(),
        }),
    );
    tracing::info!(
        dir = %outcome.artifact.dir.display(),
        kind = outcome.artifact.kind.label(),
        files = outcome.artifact.files.len(),
        "project written"
    );

    println!();
    println!(
        "Crew personnalisée générée avec succès dans: {}",
        outcome.artifact.dir.display()
    );
    Ok(outcome.artifact.dir)
}
