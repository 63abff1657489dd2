use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use skyrchitect_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const DEFAULT_PATHS: [&str; 2] = ["skyrchitect.toml", "config/skyrchitect.toml"];

struct Field {
    key: &'static str,
    env: &'static [&'static str],
    value: String,
}

/// Prints every effective setting with the layer it came from. Secrets are
/// redacted.
pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let file_path = config_path.map(Path::to_path_buf).or_else(detect_config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(field.key, field.env, file_doc.as_ref(), file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = match &config.llm.api_key {
        Some(secret) => redact_token(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    let modes = config
        .agent
        .enabled_modes
        .iter()
        .map(|mode| mode.as_str())
        .collect::<Vec<_>>()
        .join(",");

    vec![
        Field {
            key: "llm.provider",
            env: &["SKYRCHITECT_LLM_PROVIDER"],
            value: config.llm.provider.as_str().to_string(),
        },
        Field { key: "llm.model", env: &["SKYRCHITECT_LLM_MODEL"], value: config.llm.model.clone() },
        Field {
            key: "llm.base_url",
            env: &["SKYRCHITECT_LLM_BASE_URL"],
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        },
        Field {
            key: "llm.region",
            env: &["SKYRCHITECT_LLM_REGION", "AWS_REGION"],
            value: config.llm.region.clone().unwrap_or_else(|| "<unset>".to_string()),
        },
        Field { key: "llm.api_key", env: &["SKYRCHITECT_LLM_API_KEY"], value: api_key },
        Field {
            key: "llm.timeout_secs",
            env: &["SKYRCHITECT_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        Field {
            key: "llm.max_retries",
            env: &["SKYRCHITECT_LLM_MAX_RETRIES"],
            value: config.llm.max_retries.to_string(),
        },
        Field {
            key: "llm.retry_backoff_ms",
            env: &["SKYRCHITECT_LLM_RETRY_BACKOFF_MS"],
            value: config.llm.retry_backoff_ms.to_string(),
        },
        Field {
            key: "agent.max_iterations",
            env: &["SKYRCHITECT_AGENT_MAX_ITERATIONS"],
            value: config.agent.max_iterations.to_string(),
        },
        Field {
            key: "agent.wall_clock_secs",
            env: &["SKYRCHITECT_AGENT_WALL_CLOCK_SECS"],
            value: config.agent.wall_clock_secs.to_string(),
        },
        Field {
            key: "agent.history_turns",
            env: &["SKYRCHITECT_AGENT_HISTORY_TURNS"],
            value: config.agent.history_turns.to_string(),
        },
        Field { key: "agent.enabled_modes", env: &["SKYRCHITECT_AGENT_ENABLED_MODES"], value: modes },
        Field {
            key: "memory.retention_days",
            env: &["SKYRCHITECT_MEMORY_RETENTION_DAYS"],
            value: config.memory.retention_days.to_string(),
        },
        Field {
            key: "memory.max_turns_per_session",
            env: &["SKYRCHITECT_MEMORY_MAX_TURNS_PER_SESSION"],
            value: config.memory.max_turns_per_session.to_string(),
        },
        Field {
            key: "logging.level",
            env: &["SKYRCHITECT_LOGGING_LEVEL", "SKYRCHITECT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env: &["SKYRCHITECT_LOGGING_FORMAT", "SKYRCHITECT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_PATHS.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("sk-ant-abcdef"), "sk-***");
        assert_eq!(redact_token("plainsecret"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }
}
