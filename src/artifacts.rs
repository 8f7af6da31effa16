//! Turns the crew's final text into files on disk.
//!
//! Code blocks are located with two regular expressions, not parsed. Nested
//! fences, tildes, indented fences and language tags other than `python` are
//! not understood: when the untagged fallback applies, a tag such as `bash`
//! stays as the first line of the captured block.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

use crate::naming::generate_project_name;

pub const MAIN_FILE: &str = "main.py";
pub const README_FILE: &str = "README.md";
pub const RESULT_FILE: &str = "result.txt";
pub const RAW_DUMP_FILE: &str = "result_raw.txt";

static PYTHON_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python\s*(.*?)\s*```").expect("python block regex"));
static ANY_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("fenced block regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Code { modules: usize },
    RawText,
    RawDump,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Code { .. } => "code",
            ArtifactKind::RawText => "raw_text",
            ArtifactKind::RawDump => "raw_dump",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectArtifact {
    pub dir: PathBuf,
    pub kind: ArtifactKind,
    pub files: Vec<PathBuf>,
}

/// Python-tagged blocks first; any fenced block when there are none.
pub fn extract_code_blocks(result: &str) -> Vec<String> {
    let python = captures(&PYTHON_BLOCK_RE, result);
    if !python.is_empty() {
        return python;
    }
    captures(&ANY_BLOCK_RE, result)
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn module_file_name(index: usize) -> String {
    if index == 0 {
        MAIN_FILE.to_string()
    } else {
        format!("module_{index}.py")
    }
}

/// Creates `<output_folder>/<project name>/` and writes the artifacts into it.
///
/// Failure to create the directory is returned. Any failure after that is
/// reported and replaced by a raw dump of `result`.
pub fn write_project(
    output_folder: &Path,
    need: &str,
    result: &str,
    now: NaiveDateTime,
) -> Result<ProjectArtifact> {
    let dir = output_folder.join(generate_project_name(need, now));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create project directory '{}'", dir.display()))?;

    match write_artifacts(&dir, need, result) {
        Ok(artifact) => Ok(artifact),
        Err(err) => {
            println!("Erreur lors de l'enregistrement des résultats: {err:#}");
            tracing::error!(dir = %dir.display(), error = %err, "writing artifacts failed; dumping raw result");
            let raw_path = dir.join(RAW_DUMP_FILE);
            fs::write(&raw_path, result)
                .with_context(|| format!("failed to write raw dump '{}'", raw_path.display()))?;
            Ok(ProjectArtifact {
                dir,
                kind: ArtifactKind::RawDump,
                files: vec![raw_path],
            })
        }
    }
}

pub fn write_artifacts(dir: &Path, need: &str, result: &str) -> Result<ProjectArtifact> {
    let blocks = extract_code_blocks(result);
    tracing::debug!(blocks = blocks.len(), "extracted code blocks");

    if blocks.is_empty() {
        let result_path = write_file(dir, RESULT_FILE, result)?;
        let readme_path = write_file(dir, README_FILE, &render_design_readme(need))?;
        return Ok(ProjectArtifact {
            dir: dir.to_path_buf(),
            kind: ArtifactKind::RawText,
            files: vec![result_path, readme_path],
        });
    }

    let mut files = Vec::with_capacity(blocks.len() + 1);
    for (index, code) in blocks.iter().enumerate() {
        files.push(write_file(dir, &module_file_name(index), code)?);
    }
    files.push(write_file(
        dir,
        README_FILE,
        &render_code_readme(need, blocks.len()),
    )?);

    Ok(ProjectArtifact {
        dir: dir.to_path_buf(),
        kind: ArtifactKind::Code {
            modules: blocks.len(),
        },
        files,
    })
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

pub fn render_code_readme(need: &str, modules: usize) -> String {
    let mut out = String::new();
    out.push_str("# Crew CrewAI personnalisée\n\n");
    let _ = write!(out, "Crew générée pour le besoin: {need}\n\n");
    out.push_str("## Structure du projet\n\n");
    for index in 0..modules {
        let _ = writeln!(out, "- `{}`", module_file_name(index));
    }
    out.push_str("\n## Installation\n\n");
    out.push_str("```bash\npip install crewai langchain langchain-community\n```\n\n");
    out.push_str("## Utilisation\n\n");
    out.push_str("```bash\npython main.py\n```\n");
    out
}

pub fn render_design_readme(need: &str) -> String {
    format!(
        "# Conception de Crew CrewAI\n\n\
         Analyse pour le besoin: {need}\n\n\
         Consultez le fichier result.txt pour les détails complets.\n"
    )
}
