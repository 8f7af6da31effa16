use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::Parser;
use tempfile::tempdir;

use crate::artifacts::*;
use crate::cli::*;
use crate::config::*;
use crate::crew::*;
use crate::engine::*;
use crate::error::*;
use crate::generator::*;
use crate::naming::*;
use crate::provider::*;
use crate::telemetry::*;
use crate::tools::*;

fn base_cfg() -> RuntimeConfig {
    RuntimeConfig {
        profile: "default".to_string(),
        config_path: ".crewforge/config.toml".to_string(),
        provider: Provider::Auto,
        model: None,
        temperature: DEFAULT_TEMPERATURE,
        output_folder: DEFAULT_OUTPUT_FOLDER.to_string(),
        search_enabled: false,
        request_timeout_secs: 30,
        show_sensitive_config: false,
        telemetry_enabled: false,
        telemetry_path: ".crewforge/test-telemetry.jsonl".to_string(),
        credentials: ProviderCredentials::default(),
    }
}

fn fixed_time() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(13, 45, 9))
        .expect("valid timestamp")
}

fn offline_crew() -> Crew {
    build_crew(DocumentationTool::Fallback)
}

struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<String> {
        self.requests.lock().expect("lock").push(request.clone());
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted model ran out of responses"))
    }
}

struct FailingLlm;

#[async_trait]
impl Llm for FailingLlm {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: &LlmRequest) -> Result<String> {
        Err(anyhow::anyhow!("chat completion request returned 500"))
    }
}

struct FixedEngine(String);

#[async_trait]
impl CrewEngine for FixedEngine {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput> {
        assert_eq!(crew.tasks().len(), 4);
        Ok(CrewOutput {
            raw: self.0.clone(),
            task_outputs: Vec::new(),
        })
    }
}

struct FailingEngine;

#[async_trait]
impl CrewEngine for FailingEngine {
    async fn kickoff(&self, _crew: &Crew) -> Result<CrewOutput> {
        Err(anyhow::anyhow!("language model backend unreachable"))
    }
}

fn file_names(artifact: &ProjectArtifact) -> Vec<String> {
    artifact
        .files
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// naming
// ---------------------------------------------------------------------------

#[test]
fn keywords_skip_stopwords_and_keep_accented_words() {
    let keywords = extract_keywords("Créer une crew pour analyser des données financières");
    assert_eq!(keywords, vec!["analyser", "données", "financières"]);
    for stop in STOPWORDS {
        assert!(!keywords.iter().any(|k| k == stop));
    }
}

#[test]
fn keywords_fall_back_when_only_stopwords_remain() {
    assert_eq!(
        extract_keywords("Une crew pour les agent avec des"),
        vec!["custom", "crew"]
    );
    assert_eq!(extract_keywords(""), vec!["custom", "crew"]);
}

#[test]
fn keywords_are_capped_and_ignore_short_tokens() {
    assert_eq!(
        extract_keywords("ab IA veille marché concurrence prix stocks"),
        vec!["veille", "marché", "concurrence"]
    );
    assert_eq!(extract_keywords("go v2 rag3 xyz"), vec!["xyz"]);
}

#[test]
fn overlong_keywords_are_truncated_so_the_project_can_be_written() {
    let long_word = "a".repeat(300);
    let keywords = extract_keywords(&long_word);
    assert_eq!(keywords, vec!["a".repeat(MAX_KEYWORD_CHARS)]);

    let need = format!("{} {} {}", "é".repeat(300), "b".repeat(300), "c".repeat(300));
    let dir = tempdir().expect("temp directory should create");
    let artifact = write_project(dir.path(), &need, "texte", fixed_time())
        .expect("project with long keywords should be written");
    assert_eq!(artifact.kind, ArtifactKind::RawText);
    assert!(artifact.dir.join(RESULT_FILE).is_file());
}

#[test]
fn project_name_is_deterministic_for_fixed_inputs() {
    let need = "Créer une crew pour analyser des données financières";
    let first = generate_project_name(need, fixed_time());
    let second = generate_project_name(need, fixed_time());
    assert_eq!(first, second);
    assert_eq!(first, "crew_analyser_données_financières_20240501_134509");
    assert_eq!(
        generate_project_name("pour", fixed_time()),
        "crew_custom_crew_20240501_134509"
    );
}

// ---------------------------------------------------------------------------
// artifacts
// ---------------------------------------------------------------------------

#[test]
fn extracts_single_python_block() {
    let blocks = extract_code_blocks("Some text ```python\nprint('hi')\n``` more text");
    assert_eq!(blocks, vec!["print('hi')"]);
}

#[test]
fn python_blocks_take_precedence_over_untagged_blocks() {
    let text = "```\nplain\n```\n```python\nimport os\n```";
    assert_eq!(extract_code_blocks(text), vec!["import os"]);
}

#[test]
fn untagged_blocks_are_used_when_no_python_block_exists() {
    let text = "intro\n```\n  first()\n```\nmiddle\n```bash\nls\n```";
    assert_eq!(extract_code_blocks(text), vec!["first()", "bash\nls"]);
    assert!(extract_code_blocks("no fences here").is_empty());
}

#[test]
fn writes_main_and_numbered_modules_for_each_block() {
    let dir = tempdir().expect("temp directory should create");
    let result = "Voici le code:\n```python\nfrom crewai import Crew\n```\n\
                  ```python\n\nclass Tools:\n    pass\n\n```\n```python\nCONFIG = {}\n```";

    let artifact = write_project(dir.path(), "veille marché", result, fixed_time())
        .expect("project should be written");

    assert_eq!(artifact.kind, ArtifactKind::Code { modules: 3 });
    assert_eq!(
        file_names(&artifact),
        vec!["main.py", "module_1.py", "module_2.py", "README.md"]
    );
    assert_eq!(
        artifact.dir,
        dir.path().join("crew_veille_marché_20240501_134509")
    );
    let main = std::fs::read_to_string(artifact.dir.join("main.py")).expect("main.py");
    assert_eq!(main, "from crewai import Crew");
    let module_1 = std::fs::read_to_string(artifact.dir.join("module_1.py")).expect("module_1");
    assert_eq!(module_1, "class Tools:\n    pass");
    let readme = std::fs::read_to_string(artifact.dir.join("README.md")).expect("readme");
    assert!(readme.contains("Crew générée pour le besoin: veille marché"));
    assert!(readme.contains("- `main.py`\n- `module_1.py`\n- `module_2.py`\n"));
    assert!(readme.contains("pip install crewai langchain langchain-community"));
    assert!(!artifact.dir.join(RESULT_FILE).exists());
}

#[test]
fn writes_result_text_when_no_block_is_found() {
    let dir = tempdir().expect("temp directory should create");
    let result = "Architecture proposée sans code.";

    let artifact =
        write_project(dir.path(), "support client", result, fixed_time()).expect("written");

    assert_eq!(artifact.kind, ArtifactKind::RawText);
    assert_eq!(file_names(&artifact), vec!["result.txt", "README.md"]);
    assert!(!artifact.dir.join(MAIN_FILE).exists());
    assert_eq!(
        std::fs::read_to_string(artifact.dir.join(RESULT_FILE)).expect("result"),
        result
    );
    let readme = std::fs::read_to_string(artifact.dir.join(README_FILE)).expect("readme");
    assert!(readme.starts_with("# Conception de Crew CrewAI"));
    assert!(readme.contains("Analyse pour le besoin: support client"));
}

#[test]
fn write_failure_falls_back_to_raw_dump() {
    let dir = tempdir().expect("temp directory should create");
    let need = "rapport hebdomadaire";
    let project_dir = dir.path().join(generate_project_name(need, fixed_time()));
    // A directory where main.py should go makes the file write fail.
    std::fs::create_dir_all(project_dir.join(MAIN_FILE)).expect("blocking directory");

    let result = "```python\nprint('x')\n```";
    let artifact = write_project(dir.path(), need, result, fixed_time()).expect("raw dump");

    assert_eq!(artifact.kind, ArtifactKind::RawDump);
    assert_eq!(file_names(&artifact), vec![RAW_DUMP_FILE]);
    assert_eq!(
        std::fs::read_to_string(project_dir.join(RAW_DUMP_FILE)).expect("raw"),
        result
    );
}

#[test]
fn project_directory_creation_failure_is_returned() {
    let dir = tempdir().expect("temp directory should create");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").expect("blocker file");

    let err = write_project(&blocker, "besoin", "text", fixed_time())
        .expect_err("creating a directory under a file must fail");
    assert!(format!("{err:#}").contains("failed to create project directory"));
}

// ---------------------------------------------------------------------------
// crew registry
// ---------------------------------------------------------------------------

#[test]
fn crew_has_four_fixed_agents_and_tasks() {
    let crew = offline_crew();
    let roles = crew
        .agents()
        .iter()
        .map(|a| a.role.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        roles,
        vec![
            "Spécialiste de la documentation CrewAI",
            "Analyste des besoins utilisateur",
            "Architecte de Crews",
            "Développeur de code CrewAI",
        ]
    );

    let tasks = crew
        .tasks()
        .iter()
        .map(|t| (t.id.key(), t.assigned_agent.key()))
        .collect::<Vec<_>>();
    assert_eq!(
        tasks,
        vec![
            ("extract_doc", "doc_specialist"),
            ("analyze_needs", "needs_analyst"),
            ("design_crew", "crew_architect"),
            ("develop_code", "code_developer"),
        ]
    );

    for task in crew.tasks() {
        assert_eq!(crew.agent(task.assigned_agent).id, task.assigned_agent);
    }
    assert!(crew.agents().iter().all(|a| a.allow_delegation));
}

#[test]
fn only_documentation_specialist_carries_the_search_tool() {
    let crew = offline_crew();
    for agent in crew.agents() {
        if agent.id == AgentId::DocSpecialist {
            assert_eq!(agent.tools, vec![ToolRef::Documentation]);
        } else {
            assert!(agent.tools.is_empty());
        }
    }
}

#[test]
fn append_need_adds_exactly_one_context_entry() {
    let mut crew = offline_crew();
    let before = crew
        .task(TaskId::AnalyzeNeeds)
        .expect("analyze task")
        .context
        .clone();
    assert_eq!(before.len(), 2);

    crew.append_need("suivi des tickets");

    let after = &crew.task(TaskId::AnalyzeNeeds).expect("analyze task").context;
    assert_eq!(after.len(), 3);
    assert_eq!(after[..2], before[..]);
    assert_eq!(after[2], "Besoin utilisateur: suivi des tickets");
    assert!(
        crew.task(TaskId::ExtractDoc)
            .expect("extract task")
            .context
            .is_empty()
    );
}

#[test]
fn agent_keys_round_trip() {
    for id in AgentId::ALL {
        assert_eq!(AgentId::from_key(id.key()), Some(id));
    }
    assert_eq!(AgentId::from_key("reviewer"), None);
}

#[test]
fn crew_show_rejects_unknown_agent() {
    let crew = offline_crew();
    let err = run_crew_show(&crew, Some("reviewer".to_string())).expect_err("unknown agent");
    assert!(err.to_string().contains("Available agents: doc_specialist"));
    run_crew_show(&crew, Some("code_developer".to_string())).expect("known agent");
}

// ---------------------------------------------------------------------------
// tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fallback_tool_returns_static_documentation_link() {
    let tool = DocumentationTool::Fallback;
    assert_eq!(tool.name(), "CrewAIDocumentation");
    let answer = tool.invoke("agents").await;
    assert_eq!(answer, FALLBACK_RESPONSE);
    assert!(answer.contains(DOCUMENTATION_URL));
}

#[test]
fn disabled_search_builds_fallback_tool() {
    let cfg = base_cfg();
    assert!(build_documentation_tool(&cfg).is_fallback());
}

#[test]
fn parses_duckduckgo_html_results() {
    let html = r#"
        <div class="result">
          <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.crewai.com%2Fconcepts%2Fagents&rut=abc">CrewAI <b>Agents</b></a>
          <a class="result__snippet" href="x">Agents are &amp; autonomous units.</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://example.com/tasks">Tasks</a>
          <a class="result__snippet" href="y">Define tasks.</a>
        </div>
    "#;
    let hits = parse_search_results(html, 5);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "CrewAI Agents");
    assert_eq!(hits[0].url, "https://docs.crewai.com/concepts/agents");
    assert_eq!(hits[0].snippet, "Agents are & autonomous units.");
    assert_eq!(hits[1].url, "https://example.com/tasks");

    assert_eq!(parse_search_results(html, 1).len(), 1);
    let rendered = render_hits(&hits);
    assert!(rendered.starts_with("[1] CrewAI Agents\nhttps://docs.crewai.com/concepts/agents"));
}

// ---------------------------------------------------------------------------
// engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_engine_runs_each_task_once_in_order() {
    let llm = Arc::new(ScriptedLlm::new(&[
        "résumé de la documentation",
        "spécifications",
        "architecture",
        "```python\nprint('crew')\n```",
    ]));
    let engine = SequentialEngine::new(llm.clone());
    let mut crew = offline_crew();
    crew.append_need("analyser des factures");

    let output = engine.kickoff(&crew).await.expect("kickoff should succeed");

    assert_eq!(output.raw, "```python\nprint('crew')\n```");
    assert_eq!(
        output.task_outputs.iter().map(|t| t.task).collect::<Vec<_>>(),
        vec![
            TaskId::ExtractDoc,
            TaskId::AnalyzeNeeds,
            TaskId::DesignCrew,
            TaskId::DevelopCode
        ]
    );

    let requests = llm.requests();
    assert_eq!(requests.len(), 4);
    assert!(
        requests[0]
            .system
            .contains("Spécialiste de la documentation CrewAI")
    );
    assert_eq!(requests[0].prompt.matches(FALLBACK_RESPONSE).count(), 1);
    assert!(
        requests[0]
            .prompt
            .contains("CrewAIDocumentation (agents tasks crew tools)")
    );
    assert!(!requests[1].prompt.contains(FALLBACK_RESPONSE));
    assert!(
        requests[1]
            .prompt
            .contains("Besoin utilisateur: analyser des factures")
    );
    assert!(requests[2].prompt.contains("résumé de la documentation"));
    assert!(requests[2].prompt.contains("spécifications"));
    assert!(requests[3].prompt.contains("architecture"));
    assert!(requests[3].system.contains("Développeur de code CrewAI"));
}

#[tokio::test]
async fn engine_errors_propagate_with_task_context() {
    let engine = SequentialEngine::new(Arc::new(FailingLlm));
    let err = engine
        .kickoff(&offline_crew())
        .await
        .expect_err("model failure must propagate");
    let rendered = format!("{err:#}");
    assert!(rendered.contains("task 'extract_doc' failed"));
    assert_eq!(categorize_error(&err), ErrorCategory::Provider);
}

#[test]
fn task_prompt_lists_context_and_previous_outputs() {
    let crew = offline_crew();
    let task = crew.task(TaskId::DesignCrew).expect("design task");
    let previous = vec![TaskOutput {
        task: TaskId::AnalyzeNeeds,
        agent_role: "Analyste des besoins utilisateur".to_string(),
        output: "  deux agents  ".to_string(),
    }];
    let prompt = render_task_prompt(task, &previous, &[]);
    assert!(prompt.starts_with("Tâche actuelle: Concevoir l'architecture"));
    assert!(prompt.contains("- Votre tâche est de concevoir l'architecture optimale pour la crew.\n"));
    assert!(prompt.contains("### Analyste des besoins utilisateur\ndeux agents\n"));
    assert!(!prompt.contains("Observations des outils"));
}

// ---------------------------------------------------------------------------
// generator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_custom_crew_writes_project_from_engine_output() {
    let dir = tempdir().expect("temp directory should create");
    let mut crew = offline_crew();
    let engine = FixedEngine("```python\nprint('hi')\n```".to_string());

    let outcome = create_custom_crew(&mut crew, &engine, dir.path(), "veille brevets")
        .await
        .expect("generation should succeed");

    assert_eq!(outcome.result, "```python\nprint('hi')\n```");
    assert!(outcome.artifact.dir.starts_with(dir.path()));
    let name = outcome
        .artifact
        .dir
        .file_name()
        .expect("dir name")
        .to_string_lossy()
        .to_string();
    assert!(name.starts_with("crew_veille_brevets_"));
    assert_eq!(
        std::fs::read_to_string(outcome.artifact.dir.join(MAIN_FILE)).expect("main"),
        "print('hi')"
    );
    assert_eq!(
        crew.task(TaskId::AnalyzeNeeds).expect("task").context.last(),
        Some(&"Besoin utilisateur: veille brevets".to_string())
    );
}

#[tokio::test]
async fn engine_failure_writes_nothing() {
    let dir = tempdir().expect("temp directory should create");
    let output = dir.path().join("generated");
    let mut crew = offline_crew();

    let err = create_custom_crew(&mut crew, &FailingEngine, &output, "besoin")
        .await
        .expect_err("engine failure must propagate");
    assert!(err.to_string().contains("unreachable"));
    assert!(!output.exists());
}

#[test]
fn need_words_are_joined_verbatim() {
    let words = vec!["analyser".to_string(), "des".to_string(), "ventes ".to_string()];
    assert_eq!(resolve_need(&words).expect("need"), "analyser des ventes ");
    assert_eq!(resolve_need(&["".to_string()]).expect("empty need"), "");
}

#[tokio::test]
async fn empty_need_generates_custom_crew_project() {
    let dir = tempdir().expect("temp directory should create");
    let mut crew = offline_crew();
    let engine = FixedEngine("plan sans code".to_string());
    let need = resolve_need(&["".to_string()]).expect("empty need");

    let outcome = create_custom_crew(&mut crew, &engine, dir.path(), &need)
        .await
        .expect("generation should succeed");

    let name = outcome
        .artifact
        .dir
        .file_name()
        .expect("dir name")
        .to_string_lossy()
        .to_string();
    assert!(name.starts_with("crew_custom_crew_"), "got {name}");
    assert_eq!(outcome.artifact.kind, ArtifactKind::RawText);
    assert_eq!(
        crew.task(TaskId::AnalyzeNeeds).expect("task").context.last(),
        Some(&"Besoin utilisateur: ".to_string())
    );
}

// ---------------------------------------------------------------------------
// cli + config
// ---------------------------------------------------------------------------

#[test]
fn cli_joins_positional_need_and_parses_subcommands() {
    let cli = Cli::try_parse_from(["crewforge", "--output-folder", "out", "analyser", "des", "logs"])
        .expect("cli should parse");
    assert!(cli.command.is_none());
    assert_eq!(cli.need.join(" "), "analyser des logs");
    assert_eq!(cli.output_folder.as_deref(), Some("out"));

    let cli = Cli::try_parse_from(["crewforge", "crew", "show", "--agent", "needs_analyst"])
        .expect("subcommand should parse");
    assert!(matches!(
        cli.command,
        Some(Commands::Crew {
            command: CrewCommands::Show { agent: Some(ref a) }
        }) if a == "needs_analyst"
    ));
    assert_eq!(command_label(cli.command.as_ref()), "crew.show");
    assert_eq!(command_label(None), "generate");
}

#[test]
fn profile_values_apply_and_cli_overrides_them() {
    let profiles = parse_profiles(
        r#"
        [profiles.fast]
        provider = "groq"
        model = "llama-3.1-8b-instant"
        temperature = 0.2
        output_folder = "./fast_crews"
        search_enabled = false
        "#,
    )
    .expect("profiles should parse");

    let cli = Cli::try_parse_from(["crewforge", "--profile", "fast", "--temperature", "0.9"])
        .expect("cli should parse");
    let cfg = resolve_runtime_config(&cli, &profiles, ProviderCredentials::default())
        .expect("config should resolve");

    assert_eq!(cfg.provider, Provider::Groq);
    assert_eq!(cfg.model.as_deref(), Some("llama-3.1-8b-instant"));
    assert_eq!(cfg.temperature, 0.9);
    assert_eq!(cfg.output_folder, "./fast_crews");
    assert!(!cfg.search_enabled);
}

#[test]
fn unknown_profile_and_bad_temperature_are_rejected() {
    let profiles = ProfilesFile::default();
    let cli = Cli::try_parse_from(["crewforge", "--profile", "missing"]).expect("cli");
    let err = resolve_runtime_config(&cli, &profiles, ProviderCredentials::default())
        .expect_err("missing profile");
    assert!(err.to_string().contains("No profiles are defined yet"));

    let cli = Cli::try_parse_from(["crewforge", "--temperature", "3.5"]).expect("cli");
    let err = resolve_runtime_config(&cli, &profiles, ProviderCredentials::default())
        .expect_err("bad temperature");
    assert_eq!(categorize_error(&err), ErrorCategory::Input);
}

#[test]
fn profile_file_rejects_unknown_fields() {
    let err = parse_profiles("[profiles.default]\nsession_backend = \"sqlite\"\n")
        .expect_err("unknown field");
    assert!(format!("{err:#}").contains("unknown field"));
}

#[test]
fn missing_profile_file_yields_defaults() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("absent.toml");
    let profiles = load_profiles(&path.to_string_lossy()).expect("defaults");
    assert!(profiles.profiles.is_empty());
}

// ---------------------------------------------------------------------------
// provider + errors
// ---------------------------------------------------------------------------

#[test]
fn provider_model_validation() {
    assert!(validate_model_for_provider(Provider::Openai, "gpt-4o-mini").is_ok());
    assert!(validate_model_for_provider(Provider::Openai, "deepseek-chat").is_err());
    assert!(validate_model_for_provider(Provider::Deepseek, "deepseek-reasoner").is_ok());
    assert!(validate_model_for_provider(Provider::Ollama, " ").is_err());
    for provider in [Provider::Openai, Provider::Deepseek, Provider::Groq, Provider::Ollama] {
        assert!(validate_model_for_provider(provider, default_model_for(provider)).is_ok());
    }
}

#[test]
fn credentials_are_read_from_the_lookup_and_blank_values_ignored() {
    let credentials = ProviderCredentials::from_lookup(|key| match key {
        "DEEPSEEK_API_KEY" => Some("sk-deep".to_string()),
        "GROQ_API_KEY" => Some("   ".to_string()),
        "OLLAMA_HOST" => Some("http://gpu-box:11434/".to_string()),
        _ => None,
    });
    assert_eq!(credentials.deepseek_api_key.as_deref(), Some("sk-deep"));
    assert_eq!(credentials.groq_api_key, None);
    assert_eq!(
        credentials.presence(),
        [
            ("OPENAI_API_KEY", false),
            ("DEEPSEEK_API_KEY", true),
            ("GROQ_API_KEY", false),
            ("OLLAMA_HOST", true),
        ]
    );
    let debug = format!("{credentials:?}");
    assert!(!debug.contains("sk-deep"));
    assert!(debug.contains("gpu-box"));
}

#[test]
fn model_resolves_from_config_credentials() {
    let mut cfg = base_cfg();
    cfg.credentials.deepseek_api_key = Some("sk-deep".to_string());
    cfg.credentials.ollama_host = Some("http://gpu-box:11434/".to_string());

    let (model, provider, model_name) = resolve_model(&cfg).expect("auto provider");
    assert_eq!(provider, Provider::Deepseek);
    assert_eq!(model_name, "deepseek-chat");
    assert_eq!(model.name(), "deepseek-chat");

    let (base_url, key) =
        provider_endpoint(Provider::Ollama, &cfg.credentials).expect("ollama endpoint");
    assert_eq!(base_url, "http://gpu-box:11434/v1");
    assert_eq!(key, None);

    let mut other = base_cfg();
    other.credentials.openai_api_key = Some("sk-open".to_string());
    other.credentials.openai_base_url = Some("http://proxy.local/v1".to_string());
    let (_, provider, _) = resolve_model(&other).expect("openai provider");
    assert_eq!(provider, Provider::Openai);
    let (base_url, key) =
        provider_endpoint(Provider::Openai, &other.credentials).expect("openai endpoint");
    assert_eq!(base_url, "http://proxy.local/v1");
    assert_eq!(key.as_deref(), Some("sk-open"));
}

#[test]
fn missing_config_credentials_fail_as_provider_errors() {
    let cfg = base_cfg();
    let err = match resolve_model(&cfg) {
        Ok(_) => panic!("no credentials means no provider"),
        Err(err) => err,
    };
    assert_eq!(categorize_error(&err), ErrorCategory::Provider);

    let mut cfg = base_cfg();
    cfg.provider = Provider::Groq;
    let err = match resolve_model(&cfg) {
        Ok(_) => panic!("groq needs a key"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("GROQ_API_KEY is required"));
    assert_eq!(categorize_error(&err), ErrorCategory::Provider);
}

#[test]
fn missing_credentials_are_provider_errors() {
    let err = anyhow::anyhow!("environment variable not found")
        .context("OPENAI_API_KEY is required for OpenAI provider");
    assert_eq!(categorize_error(&err), ErrorCategory::Provider);
    let rendered = format_cli_error(&err, false);
    assert!(rendered.starts_with("[PROVIDER] OPENAI_API_KEY is required"));
    assert!(rendered.contains("Hint: Set provider credentials"));
}

#[test]
fn api_keys_are_redacted_from_error_text() {
    let text = "Incorrect API key provided: sk-proj-abc123. Header was Bearer gsk_zz9, task-based flow";
    let redacted = redact_sensitive_text(text);
    assert!(!redacted.contains("abc123"));
    assert!(!redacted.contains("zz9"));
    assert!(redacted.contains("sk-[REDACTED]"));
    assert!(redacted.contains("Bearer [REDACTED]"));
    assert!(redacted.contains("task-based flow"));
}

// ---------------------------------------------------------------------------
// telemetry
// ---------------------------------------------------------------------------

#[test]
fn telemetry_sink_appends_jsonl_when_enabled() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    cfg.telemetry_enabled = true;
    cfg.telemetry_path = dir
        .path()
        .join("nested/events.jsonl")
        .to_string_lossy()
        .to_string();

    let sink = TelemetrySink::new(&cfg, "generate".to_string());
    sink.emit(
        "task.completed",
        serde_json::json!({ "task": "extract_doc", "elapsed_ms": 40 }),
    );
    sink.emit("project.written", serde_json::json!({ "kind": "code" }));
    sink.emit("command.completed", serde_json::json!({}));

    let content = std::fs::read_to_string(Path::new(&cfg.telemetry_path)).expect("events");
    let lines = content.lines().map(str::to_string).collect::<Vec<String>>();
    assert_eq!(lines.len(), 3);
    let first: serde_json::Value = serde_json::from_str(&lines[0]).expect("json line");
    assert_eq!(first["event"], "task.completed");
    assert_eq!(first["task"], "extract_doc");
    assert_eq!(first["command"], "generate");
    assert_eq!(first["run_id"], sink.run_id());

    let report = summarize_events(&lines, 100);
    assert_eq!(report.events, 3);
    assert_eq!(report.runs.len(), 1);
    assert_eq!(report.generations_completed, 1);
    assert_eq!(report.artifacts.get("code"), Some(&1));
    assert_eq!(
        report.task_timings.get("extract_doc").map(|t| t.max_ms),
        Some(40)
    );
}

#[test]
fn telemetry_disabled_writes_nothing() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    cfg.telemetry_path = dir.path().join("events.jsonl").to_string_lossy().to_string();
    TelemetrySink::new(&cfg, "generate".to_string()).emit("command.started", serde_json::json!({}));
    assert!(!Path::new(&cfg.telemetry_path).exists());
}

#[test]
fn crew_report_aggregates_task_timings_artifacts_and_failures() {
    let lines = [
        r#"{"event":"task.completed","task":"extract_doc","elapsed_ms":100,"run_id":"r1","command":"generate"}"#,
        r#"{"event":"task.completed","task":"extract_doc","elapsed_ms":300,"run_id":"r2","command":"generate"}"#,
        r#"{"event":"task.completed","task":"develop_code","elapsed_ms":50,"run_id":"r1","command":"generate"}"#,
        r#"{"event":"project.written","kind":"raw_dump","run_id":"r1","command":"generate"}"#,
        r#"{"event":"command.completed","run_id":"r1","command":"generate"}"#,
        "not json",
        r#"{"event":"command.failed","category":"PROVIDER","run_id":"r2","command":"generate"}"#,
        r#"{"event":"command.failed","category":"INPUT","run_id":"r3","command":"profiles.show"}"#,
        r#"{"event":"command.completed","run_id":"r4","command":"doctor"}"#,
    ]
    .map(str::to_string);

    let report = summarize_events(&lines, 100);
    assert_eq!(report.events, 8);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.runs.len(), 4);
    assert_eq!(report.generations_completed, 1);
    assert_eq!(report.generations_failed, 1);
    assert_eq!(report.failures.get("PROVIDER"), Some(&1));
    assert_eq!(report.failures.get("INPUT"), Some(&1));
    assert_eq!(report.artifacts.get("raw_dump"), Some(&1));

    let extract = report.task_timings["extract_doc"];
    assert_eq!(extract.completed, 2);
    assert_eq!(extract.average_ms(), 200);
    assert_eq!(extract.max_ms, 300);
    assert_eq!(report.task_timings["develop_code"].average_ms(), 50);

    let recent = summarize_events(&lines, 2);
    assert_eq!(recent.events, 2);
    assert!(recent.task_timings.is_empty());
    assert_eq!(TaskTiming::default().average_ms(), 0);
}
