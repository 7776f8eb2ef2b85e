use crate::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Backend,
    Config,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Backend => "BACKEND",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Backend => {
                "Check --backend-url or the service descriptor, the API key env var, and run agent-router doctor."
            }
            ErrorCategory::Config => {
                "Check .agent-router/config.toml and the models/service JSON files for typos or missing fields."
            }
            ErrorCategory::Input => "Run agent-router --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    if err.chain().any(|cause| cause.is::<BackendError>()) {
        return ErrorCategory::Backend;
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("backend")
        || msg.contains("available models")
        || msg.contains("message send")
    {
        return ErrorCategory::Backend;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("context must be")
        || msg.contains("not found. available")
        || msg.contains("failed to read input")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("profile")
        || msg.contains("config")
        || msg.contains("descriptor")
        || msg.contains("models file")
        || msg.contains("json")
    {
        return ErrorCategory::Config;
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
    text.split(' ')
        .map(|token| {
            if token.contains("://") {
                redact_url_credentials(token)
            } else if looks_like_api_key(token) {
                "[REDACTED]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn looks_like_api_key(token: &str) -> bool {
    let trimmed = token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_');
    (trimmed.starts_with("sk-") || trimmed.starts_with("AIza")) && trimmed.len() >= 20
}

/// Replaces `user:password@` in a URL with `[REDACTED]@`.
pub fn redact_url_credentials(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &url[authority_start..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!(
            "{}[REDACTED]{}",
            &url[..authority_start],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
