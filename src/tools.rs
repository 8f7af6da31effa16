//! Documentation lookup tool given to the documentation specialist agent.
//!
//! Two variants exist: a live DuckDuckGo search and a static fallback that
//! points at the public documentation site. Both expose `invoke(query)`.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::RuntimeConfig;

pub const DOCUMENTATION_TOOL_NAME: &str = "CrewAIDocumentation";
pub const DOCUMENTATION_URL: &str = "https://docs.crewai.com/";
pub const FALLBACK_RESPONSE: &str = "Documentation CrewAI disponible sur: https://docs.crewai.com/";
const QUERY_PREFIX: &str = "CrewAI documentation";

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const SEARCH_TIMEOUT_SECS: u64 = 15;
const MAX_RESULTS: usize = 5;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]+class="result__a"[^>]+href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("title regex")
});
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]+class="result__snippet"[^>]*>(.*?)</a>"#).expect("snippet regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRef {
    Documentation,
}

impl ToolRef {
    pub fn name(self) -> &'static str {
        match self {
            ToolRef::Documentation => DOCUMENTATION_TOOL_NAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self { client })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        tracing::debug!(query = %query, "fetching DuckDuckGo results");
        let response = self
            .client
            .post(SEARCH_ENDPOINT)
            .header("Referer", "https://html.duckduckgo.com/")
            .form(&[("q", query)])
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("search endpoint returned {status}"));
        }

        let html = response
            .text()
            .await
            .context("failed to read search response body")?;
        if html.contains("anomaly-modal") {
            return Err(anyhow::anyhow!(
                "search blocked by DuckDuckGo bot detection"
            ));
        }
        Ok(parse_search_results(&html, MAX_RESULTS))
    }
}

#[derive(Debug, Clone)]
pub enum DocumentationTool {
    Search(DuckDuckGoSearch),
    Fallback,
}

impl DocumentationTool {
    pub fn name(&self) -> &'static str {
        DOCUMENTATION_TOOL_NAME
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocumentationTool::Search(_) => {
                "Recherche des informations dans la documentation CrewAI. \
                 Utilise DuckDuckGo pour trouver des détails sur l'API."
            }
            DocumentationTool::Fallback => {
                "Recherche des informations dans la documentation CrewAI."
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DocumentationTool::Fallback)
    }

    /// Runs the tool. Never fails: search errors degrade to the fallback text.
    pub async fn invoke(&self, query: &str) -> String {
        match self {
            DocumentationTool::Fallback => FALLBACK_RESPONSE.to_string(),
            DocumentationTool::Search(search) => {
                let full_query = format!("{QUERY_PREFIX} {}", query.trim());
                match search.search(&full_query).await {
                    Ok(hits) if hits.is_empty() => {
                        tracing::info!(query = %full_query, "search returned no results");
                        FALLBACK_RESPONSE.to_string()
                    }
                    Ok(hits) => render_hits(&hits),
                    Err(err) => {
                        tracing::warn!(query = %full_query, error = %err, "documentation search failed");
                        FALLBACK_RESPONSE.to_string()
                    }
                }
            }
        }
    }
}

/// Builds the documentation tool, degrading to the static fallback when search
/// is disabled or the HTTP client cannot be created.
pub fn build_documentation_tool(cfg: &RuntimeConfig) -> DocumentationTool {
    if !cfg.search_enabled {
        tracing::info!("documentation search disabled; using static fallback tool");
        return DocumentationTool::Fallback;
    }
    match DuckDuckGoSearch::new() {
        Ok(search) => DocumentationTool::Search(search),
        Err(err) => {
            println!("Erreur lors de la création de l'outil de recherche: {err:#}");
            tracing::warn!(error = %err, "search tool unavailable; using static fallback tool");
            DocumentationTool::Fallback
        }
    }
}

pub fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(index, hit)| {
            format!(
                "[{}] {}\n{}\n{}",
                index + 1,
                hit.title,
                hit.url,
                hit.snippet
            )
        })
        .collect::<Vec<String>>()
        .join("\n\n")
}

pub fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let titles = TITLE_RE
        .captures_iter(html)
        .map(|cap| {
            let url = extract_real_url(cap.get(1).map_or("", |m| m.as_str()));
            let title = strip_html_tags(cap.get(2).map_or("", |m| m.as_str()));
            (url, title)
        })
        .collect::<Vec<_>>();

    let snippets = SNIPPET_RE
        .captures_iter(html)
        .map(|cap| strip_html_tags(cap.get(1).map_or("", |m| m.as_str())))
        .collect::<Vec<String>>();

    titles
        .into_iter()
        .enumerate()
        .map(|(i, (url, title))| SearchHit {
            title,
            url,
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .filter(|hit| !hit.url.is_empty() && !hit.title.is_empty())
        .take(max_results)
        .collect()
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>&...`.
pub fn extract_real_url(raw: &str) -> String {
    let Some(pos) = raw.find("uddg=") else {
        return raw.to_string();
    };
    let rest = &raw[pos + 5..];
    let end = rest.find('&').unwrap_or(rest.len());
    urlencoding::decode(&rest[..end])
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| rest[..end].to_string())
}

fn strip_html_tags(fragment: &str) -> String {
    TAG_RE
        .replace_all(fragment, "")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .trim()
        .to_string()
}
