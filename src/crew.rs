//! Built-in generator crew: four agents and four tasks run in order.
//!
//! Prompts are static French text. The only mutation allowed after
//! construction is appending the user need to the needs-analysis context.

use anyhow::Result;

use crate::tools::{DocumentationTool, ToolRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentId {
    DocSpecialist,
    NeedsAnalyst,
    CrewArchitect,
    CodeDeveloper,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::DocSpecialist,
        AgentId::NeedsAnalyst,
        AgentId::CrewArchitect,
        AgentId::CodeDeveloper,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AgentId::DocSpecialist => "doc_specialist",
            AgentId::NeedsAnalyst => "needs_analyst",
            AgentId::CrewArchitect => "crew_architect",
            AgentId::CodeDeveloper => "code_developer",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    ExtractDoc,
    AnalyzeNeeds,
    DesignCrew,
    DevelopCode,
}

impl TaskId {
    pub fn key(self) -> &'static str {
        match self {
            TaskId::ExtractDoc => "extract_doc",
            TaskId::AnalyzeNeeds => "analyze_needs",
            TaskId::DesignCrew => "design_crew",
            TaskId::DevelopCode => "develop_code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub id: AgentId,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<ToolRef>,
    pub allow_delegation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub description: String,
    pub expected_output: String,
    pub assigned_agent: AgentId,
    pub context: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Crew {
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    documentation_tool: DocumentationTool,
}

impl Crew {
    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn documentation_tool(&self) -> &DocumentationTool {
        &self.documentation_tool
    }

    /// Every `AgentId` has exactly one `AgentSpec`, so this lookup cannot miss.
    pub fn agent(&self, id: AgentId) -> &AgentSpec {
        self.agents
            .iter()
            .find(|agent| agent.id == id)
            .unwrap_or_else(|| unreachable!("crew is built with every agent id"))
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskSpec> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn append_need(&mut self, need: &str) {
        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|task| task.id == TaskId::AnalyzeNeeds)
        {
            task.context.push(format!("Besoin utilisateur: {need}"));
        }
    }
}

pub fn build_crew(documentation_tool: DocumentationTool) -> Crew {
    Crew {
        agents: build_agents(),
        tasks: build_tasks(),
        documentation_tool,
    }
}

fn build_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec {
            id: AgentId::DocSpecialist,
            role: "Spécialiste de la documentation CrewAI".to_string(),
            goal: "Comprendre en profondeur la documentation de CrewAI et extraire les \
                   informations pertinentes"
                .to_string(),
            backstory: "Vous êtes un expert qui a étudié en détail la documentation de CrewAI. \
                        Vous connaissez parfaitement la structure des agents, tâches, outils et crews. \
                        Votre expertise permet d'identifier rapidement les fonctionnalités pertinentes \
                        pour un cas d'usage."
                .to_string(),
            tools: vec![ToolRef::Documentation],
            allow_delegation: true,
        },
        AgentSpec {
            id: AgentId::NeedsAnalyst,
            role: "Analyste des besoins utilisateur".to_string(),
            goal: "Analyser et comprendre précisément les besoins de l'utilisateur pour créer \
                   une crew adaptée"
                .to_string(),
            backstory: "Vous êtes un expert en analyse des besoins avec une capacité exceptionnelle \
                        à comprendre ce que les utilisateurs veulent réellement accomplir. \
                        Vous transformez des descriptions vagues en spécifications précises."
                .to_string(),
            tools: Vec::new(),
            allow_delegation: true,
        },
        AgentSpec {
            id: AgentId::CrewArchitect,
            role: "Architecte de Crews".to_string(),
            goal: "Concevoir la structure optimale d'une crew pour répondre aux besoins spécifiques"
                .to_string(),
            backstory: "Vous êtes un architecte créatif qui conçoit des équipes d'agents efficaces. \
                        Vous savez comment combiner différents types d'agents et structurer leurs \
                        interactions pour résoudre des problèmes complexes de manière optimale."
                .to_string(),
            tools: Vec::new(),
            allow_delegation: true,
        },
        AgentSpec {
            id: AgentId::CodeDeveloper,
            role: "Développeur de code CrewAI".to_string(),
            goal: "Générer un code Python fonctionnel et bien structuré qui implémente la crew conçue"
                .to_string(),
            backstory: "Vous êtes un développeur Python expérimenté spécialisé dans l'API CrewAI. \
                        Vous écrivez un code propre, bien documenté et facile à comprendre. \
                        Vous respectez les meilleures pratiques de programmation."
                .to_string(),
            tools: Vec::new(),
            allow_delegation: true,
        },
    ]
}

fn build_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            id: TaskId::ExtractDoc,
            description: "Extraire les informations pertinentes de la documentation CrewAI \
                          nécessaires pour créer une crew personnalisée. \
                          Vous devez chercher et résumer les informations sur:\n\
                          1. Comment créer et configurer des agents (paramètres importants, bonnes pratiques)\n\
                          2. Comment définir des tâches efficaces (structure, paramètres, assignation)\n\
                          3. Comment configurer une crew (processus, workflow, options)\n\
                          4. Outils disponibles et intégrations pertinentes\n\
                          Fournissez ces informations sous forme structurée."
                .to_string(),
            expected_output: "Un document structuré résumant les éléments clés de la documentation \
                              CrewAI pertinents pour créer une crew personnalisée"
                .to_string(),
            assigned_agent: AgentId::DocSpecialist,
            context: Vec::new(),
        },
        TaskSpec {
            id: TaskId::AnalyzeNeeds,
            description: "Analyser en détail le besoin utilisateur décrit et le transformer en \
                          spécifications techniques pour une crew CrewAI. Vous devez:\n\
                          1. Identifier le domaine et l'objectif principal\n\
                          2. Déterminer les compétences et connaissances requises\n\
                          3. Identifier les types d'agents nécessaires (rôles, buts, etc.)\n\
                          4. Définir les tâches principales à accomplir\n\
                          5. Identifier les outils et ressources nécessaires\n\
                          Fournissez ces spécifications sous forme structurée."
                .to_string(),
            expected_output: "Un document de spécifications techniques détaillant les agents, \
                              tâches et outils nécessaires pour répondre au besoin"
                .to_string(),
            assigned_agent: AgentId::NeedsAnalyst,
            context: vec![
                "L'utilisateur a besoin d'une équipe d'agents pour accomplir une tâche spécifique."
                    .to_string(),
                "Vous devez analyser ce besoin pour le transformer en spécifications techniques."
                    .to_string(),
            ],
        },
        TaskSpec {
            id: TaskId::DesignCrew,
            description: "Concevoir l'architecture complète d'une crew CrewAI basée sur les \
                          spécifications techniques. Vous devez:\n\
                          1. Définir précisément chaque agent (rôle, but, backstory)\n\
                          2. Définir chaque tâche (description, output attendu, contexte)\n\
                          3. Spécifier les outils nécessaires à chaque agent\n\
                          4. Déterminer le processus optimal (séquentiel, hiérarchique)\n\
                          5. Définir les flux de travail et interactions entre agents\n\
                          Fournissez un schéma détaillé de cette architecture."
                .to_string(),
            expected_output: "Un schéma d'architecture détaillé spécifiant tous les composants de \
                              la crew et leurs interactions"
                .to_string(),
            assigned_agent: AgentId::CrewArchitect,
            context: vec![
                "Vous disposez des spécifications techniques et des informations de la documentation."
                    .to_string(),
                "Votre tâche est de concevoir l'architecture optimale pour la crew.".to_string(),
            ],
        },
        TaskSpec {
            id: TaskId::DevelopCode,
            description: "Développer le code Python complet pour implémenter la crew CrewAI \
                          conçue. Vous devez:\n\
                          1. Créer une structure de projet claire et organisée\n\
                          2. Implémenter chaque agent avec tous ses paramètres\n\
                          3. Implémenter chaque tâche avec tous ses paramètres\n\
                          4. Configurer les outils nécessaires\n\
                          5. Assembler la crew avec le processus approprié\n\
                          6. Ajouter des commentaires et une documentation claire\n\
                          7. Créer un README expliquant comment utiliser le code\n\
                          Le code doit être complet, fonctionnel et prêt à l'emploi."
                .to_string(),
            expected_output: "Un code Python complet et documenté implémentant la crew conçue, \
                              ainsi qu'un README explicatif"
                .to_string(),
            assigned_agent: AgentId::CodeDeveloper,
            context: vec![
                "Vous disposez de l'architecture détaillée de la crew à implémenter.".to_string(),
                "Votre tâche est de transformer cette architecture en code Python fonctionnel."
                    .to_string(),
            ],
        },
    ]
}

pub fn run_crew_show(crew: &Crew, requested_agent: Option<String>) -> Result<()> {
    let selected = match requested_agent {
        Some(key) => Some(AgentId::from_key(&key).ok_or_else(|| {
            let names = AgentId::ALL
                .iter()
                .map(|id| id.key())
                .collect::<Vec<&str>>();
            anyhow::anyhow!(
                "agent '{}' not found. Available agents: {}",
                key,
                names.join(", ")
            )
        })?),
        None => None,
    };

    let tool = crew.documentation_tool();
    println!(
        "Documentation tool: {} ({})",
        tool.name(),
        if tool.is_fallback() { "fallback" } else { "search" }
    );

    for agent in crew.agents() {
        if selected.is_some_and(|id| id != agent.id) {
            continue;
        }
        println!();
        println!("Agent: {} [{}]", agent.role, agent.id.key());
        println!("Goal: {}", agent.goal);
        println!("Backstory: {}", agent.backstory);
        println!(
            "Tools: {}",
            if agent.tools.is_empty() {
                "<none>".to_string()
            } else {
                agent
                    .tools
                    .iter()
                    .map(|tool| tool.name())
                    .collect::<Vec<&str>>()
                    .join(", ")
            }
        );
        println!("Delegation allowed: {}", agent.allow_delegation);

        for task in crew
            .tasks()
            .iter()
            .filter(|task| task.assigned_agent == agent.id)
        {
            println!("Task: {}", task.id.key());
            println!("  Expected output: {}", task.expected_output);
            if task.context.is_empty() {
                println!("  Context: <none>");
            }
            for entry in &task.context {
                println!("  Context: {entry}");
            }
        }
    }
    Ok(())
}
