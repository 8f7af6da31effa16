#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Output,
    Tooling,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Output => "OUTPUT",
            ErrorCategory::Tooling => "TOOLING",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set provider credentials (for example OPENAI_API_KEY in .env) or run with --provider ollama."
            }
            ErrorCategory::Output => {
                "Check that --output-folder points to a writable directory."
            }
            ErrorCategory::Tooling => {
                "Retry with --search-enabled false or RUST_LOG=info for detailed search logs."
            }
            ErrorCategory::Input => "Run crewforge --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("no provider could be auto-detected")
        || msg.contains("provider")
        || msg.contains("chat completion")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("failed to read input")
        || msg.contains("profile")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("output folder") || msg.contains("project directory") {
        return ErrorCategory::Output;
    }

    if msg.contains("tool") || msg.contains("search") {
        return ErrorCategory::Tooling;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let category = categorize_error(err);
    let rendered_error = render_error_message(err, show_sensitive_config);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        rendered_error,
        category.hint()
    )
}

pub fn render_error_message(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let text = format!("{err:#}");
    if show_sensitive_config {
        text
    } else {
        redact_sensitive_text(&text)
    }
}

pub fn redact_sensitive_text(text: &str) -> String {
    redact_api_keys(text)
}

const SECRET_PREFIXES: [&str; 3] = ["Bearer ", "sk-", "gsk_"];

/// Replaces bearer tokens and provider API keys embedded in error bodies.
pub fn redact_api_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some((offset, prefix)) = next_secret(&text[cursor..]) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);

        let remainder = &text[start + prefix.len()..];
        let end = remainder
            .find(|ch: char| {
                ch.is_whitespace() || matches!(ch, '"' | '\'' | ',' | ';' | ')' | ']' | '}')
            })
            .unwrap_or(remainder.len());
        out.push_str(prefix);
        if end > 0 {
            out.push_str("[REDACTED]");
        }
        cursor = start + prefix.len() + end;
    }

    out.push_str(&text[cursor..]);
    out
}

fn next_secret(text: &str) -> Option<(usize, &'static str)> {
    SECRET_PREFIXES
        .iter()
        .filter_map(|prefix| {
            text.match_indices(prefix)
                .find(|(offset, _)| {
                    !text[..*offset]
                        .chars()
                        .next_back()
                        .is_some_and(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
                })
                .map(|(offset, _)| (offset, *prefix))
        })
        .min_by_key(|(offset, _)| *offset)
}
