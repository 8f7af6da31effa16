use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::crew::{AgentSpec, Crew, TaskId, TaskSpec};
use crate::provider::{Llm, LlmRequest};
use crate::telemetry::TelemetrySink;
use crate::tools::ToolRef;

/// Search keywords for the documentation a task needs.
pub fn documentation_query(task: TaskId) -> &'static str {
    match task {
        TaskId::ExtractDoc => "agents tasks crew tools",
        TaskId::AnalyzeNeeds => "agents roles goals",
        TaskId::DesignCrew => "crew process tasks context",
        TaskId::DevelopCode => "python crew kickoff example",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub task: TaskId,
    pub agent_role: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewOutput {
    /// Output of the last task; this is what gets post-processed.
    pub raw: String,
    pub task_outputs: Vec<TaskOutput>,
}

#[async_trait]
pub trait CrewEngine: Send + Sync {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput>;
}

/// Runs every task once, in registry order, feeding earlier outputs forward.
pub struct SequentialEngine {
    model: Arc<dyn Llm>,
    telemetry: Option<TelemetrySink>,
}

impl SequentialEngine {
    pub fn new(model: Arc<dyn Llm>) -> Self {
        Self {
            model,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(sink) = self.telemetry.as_ref() {
            sink.emit(event, payload);
        }
    }

    /// Each tool the agent carries is invoked once with the task's query.
    async fn gather_tool_observations(
        &self,
        crew: &Crew,
        agent: &AgentSpec,
        task: &TaskSpec,
    ) -> Vec<String> {
        let query = documentation_query(task.id);
        let mut observations = Vec::with_capacity(agent.tools.len());
        for tool in &agent.tools {
            match tool {
                ToolRef::Documentation => {
                    let doc_tool = crew.documentation_tool();
                    tracing::info!(tool = doc_tool.name(), query, "invoking tool");
                    let observation = doc_tool.invoke(query).await;
                    observations.push(format!("{} ({query}):\n{observation}", doc_tool.name()));
                }
            }
        }
        observations
    }
}

#[async_trait]
impl CrewEngine for SequentialEngine {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput> {
        if crew.tasks().is_empty() {
            return Err(anyhow::anyhow!("crew has no tasks to execute"));
        }

        let mut task_outputs: Vec<TaskOutput> = Vec::with_capacity(crew.tasks().len());
        for task in crew.tasks() {
            let agent = crew.agent(task.assigned_agent);
            let started = Instant::now();
            tracing::info!(task = task.id.key(), agent = %agent.role, "task started");
            self.emit(
                "task.started",
                json!({ "task": task.id.key(), "agent": agent.id.key() }),
            );

            let observations = self.gather_tool_observations(crew, agent, task).await;
            let request = LlmRequest::new(
                render_agent_system_prompt(agent),
                render_task_prompt(task, &task_outputs, &observations),
            );
            let output = self
                .model
                .generate(&request)
                .await
                .with_context(|| format!("task '{}' failed", task.id.key()))?;

            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::info!(
                task = task.id.key(),
                chars = output.len(),
                elapsed_ms,
                "task completed"
            );
            self.emit(
                "task.completed",
                json!({
                    "task": task.id.key(),
                    "agent": agent.id.key(),
                    "output_chars": output.len(),
                    "elapsed_ms": elapsed_ms,
                }),
            );

            task_outputs.push(TaskOutput {
                task: task.id,
                agent_role: agent.role.clone(),
                output,
            });
        }

        let raw = task_outputs
            .last()
            .map(|last| last.output.clone())
            .unwrap_or_default();
        Ok(CrewOutput { raw, task_outputs })
    }
}

pub fn render_agent_system_prompt(agent: &AgentSpec) -> String {
    format!(
        "Vous êtes {}. {}\nVotre objectif personnel est: {}",
        agent.role, agent.backstory, agent.goal
    )
}

pub fn render_task_prompt(
    task: &TaskSpec,
    previous: &[TaskOutput],
    observations: &[String],
) -> String {
    let mut out = String::new();
    out.push_str("Tâche actuelle: ");
    out.push_str(&task.description);
    out.push_str("\n\nCritères de sortie attendus: ");
    out.push_str(&task.expected_output);
    out.push('\n');

    if !task.context.is_empty() {
        out.push_str("\nContexte:\n");
        for entry in &task.context {
            out.push_str("- ");
            out.push_str(entry);
            out.push('\n');
        }
    }

    if !previous.is_empty() {
        out.push_str("\nRésultats des tâches précédentes:\n");
        for prior in previous {
            out.push_str(&format!("### {}\n{}\n", prior.agent_role, prior.output.trim()));
        }
    }

    if !observations.is_empty() {
        out.push_str("\nObservations des outils:\n");
        for observation in observations {
            out.push_str(observation.trim());
            out.push_str("\n\n");
        }
    }

    out.push_str("\nC'est parti ! Donnez votre réponse finale complète.");
    out
}
