//! Optional JSONL log of generator runs and the `telemetry report` summary.
//!
//! Every line carries `ts`, `event`, `run_id` and `command`, plus the event
//! payload. The engine writes `task.started`/`task.completed` (with
//! `elapsed_ms`), the generator writes `project.written` (with the artifact
//! `kind`) and `main` writes the `command.*` outcome.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::RuntimeConfig;

#[derive(Debug, Clone)]
pub struct TelemetrySink {
    /// `None` when telemetry is disabled.
    path: Option<PathBuf>,
    run_id: String,
    command: String,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        let started = chrono::Utc::now();
        Self {
            path: cfg
                .telemetry_enabled
                .then(|| PathBuf::from(&cfg.telemetry_path)),
            run_id: format!(
                "run-{}-{}",
                started.format("%Y%m%dT%H%M%S%.3f"),
                std::process::id()
            ),
            command,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: &str, payload: Value) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let mut record = json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "event": event,
            "run_id": self.run_id,
            "command": self.command,
        });
        if let Some(fields) = record.as_object_mut()
            && let Value::Object(extra) = payload
        {
            fields.extend(extra);
        }

        if let Err(err) = append_record(path, &record) {
            tracing::warn!(event, path = %path.display(), error = %err, "telemetry write failed");
        }
    }
}

fn append_record(path: &Path, record: &Value) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create telemetry directory '{}'", parent.display())
        })?;
    }

    let mut line = serde_json::to_string(record).context("failed to serialize telemetry event")?;
    line.push('\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .with_context(|| format!("failed to append to telemetry file '{}'", path.display()))
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    event: String,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    elapsed_ms: Option<u64>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub completed: usize,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl TaskTiming {
    pub fn average_ms(&self) -> u64 {
        if self.completed == 0 {
            return 0;
        }
        self.total_ms / self.completed as u64
    }
}

#[derive(Debug, Default)]
pub struct CrewRunReport {
    pub events: usize,
    pub malformed: usize,
    pub runs: BTreeSet<String>,
    pub generations_completed: usize,
    pub generations_failed: usize,
    /// Failed commands keyed by error category code.
    pub failures: BTreeMap<String, usize>,
    /// Completed task timings keyed by task key.
    pub task_timings: BTreeMap<String, TaskTiming>,
    /// Written projects keyed by artifact kind (`code`, `raw_text`, `raw_dump`).
    pub artifacts: BTreeMap<String, usize>,
}

/// Builds a report from the most recent `limit` lines of the log.
pub fn summarize_events(lines: &[String], limit: usize) -> CrewRunReport {
    let mut report = CrewRunReport::default();
    let start = lines.len().saturating_sub(limit.max(1));

    for line in lines[start..].iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let Ok(record) = serde_json::from_str::<EventRecord>(line) else {
            report.malformed += 1;
            continue;
        };
        report.events += 1;
        if let Some(run_id) = record.run_id.filter(|id| !id.is_empty()) {
            report.runs.insert(run_id);
        }
        let is_generate = record.command.as_deref() == Some("generate");

        match record.event.as_str() {
            "task.completed" => {
                if let Some(task) = record.task {
                    let elapsed = record.elapsed_ms.unwrap_or_default();
                    let timing = report.task_timings.entry(task).or_default();
                    timing.completed += 1;
                    timing.total_ms += elapsed;
                    timing.max_ms = timing.max_ms.max(elapsed);
                }
            }
            "project.written" => {
                let kind = record.kind.unwrap_or_else(|| "unknown".to_string());
                *report.artifacts.entry(kind).or_default() += 1;
            }
            "command.completed" if is_generate => report.generations_completed += 1,
            "command.failed" => {
                if is_generate {
                    report.generations_failed += 1;
                }
                let category = record.category.unwrap_or_else(|| "UNKNOWN".to_string());
                *report.failures.entry(category).or_default() += 1;
            }
            _ => {}
        }
    }

    report
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?;
    let lines = content.lines().map(str::to_string).collect::<Vec<String>>();
    let report = summarize_events(&lines, limit);

    println!("Crew telemetry: {}", path.display());
    println!(
        "Events: {} (malformed={}) across {} run(s)",
        report.events,
        report.malformed,
        report.runs.len()
    );
    println!(
        "Generations: completed={} failed={}",
        report.generations_completed, report.generations_failed
    );

    if !report.failures.is_empty() {
        let failures = report
            .failures
            .iter()
            .map(|(category, count)| format!("{category}={count}"))
            .collect::<Vec<String>>();
        println!("Failures by category: {}", failures.join(" "));
    }

    if !report.task_timings.is_empty() {
        println!("Task timings:");
        for (task, timing) in &report.task_timings {
            println!(
                "- {task}: {} completed, avg {} ms, max {} ms",
                timing.completed,
                timing.average_ms(),
                timing.max_ms
            );
        }
    }

    let kinds = ["code", "raw_text", "raw_dump"]
        .iter()
        .map(|kind| format!("{kind}={}", report.artifacts.get(*kind).copied().unwrap_or(0)))
        .collect::<Vec<String>>();
    println!("Projects written: {}", kinds.join(" "));
    Ok(())
}
