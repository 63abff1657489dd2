use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::RequestKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub region: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub wall_clock_secs: u64,
    pub history_turns: usize,
    pub enabled_modes: Vec<RequestKind>,
}

#[derive(Clone, Debug)]
pub struct MemoryConfig {
    pub retention_days: u32,
    pub max_turns_per_session: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Bedrock,
    Anthropic,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid skyrchitect TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{name}}}` is referenced in the config file but not set")]
    UnsetVariable { name: String },
    #[error("`${{` without a closing `}}` in the config file")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                region: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                retry_backoff_ms: 250,
            },
            agent: AgentConfig {
                max_iterations: 12,
                wall_clock_secs: 60,
                history_turns: 10,
                enabled_modes: RequestKind::ALL.to_vec(),
            },
            memory: MemoryConfig { retention_days: 7, max_turns_per_session: 50 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bedrock" => Ok(Self::Bedrock),
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected bedrock|anthropic|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("skyrchitect.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(region) = llm.region {
                self.llm.region = Some(region);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_backoff_ms) = llm.retry_backoff_ms {
                self.llm.retry_backoff_ms = retry_backoff_ms;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
            if let Some(wall_clock_secs) = agent.wall_clock_secs {
                self.agent.wall_clock_secs = wall_clock_secs;
            }
            if let Some(history_turns) = agent.history_turns {
                self.agent.history_turns = history_turns;
            }
            if let Some(enabled_modes) = agent.enabled_modes {
                self.agent.enabled_modes = parse_modes("agent.enabled_modes", enabled_modes)?;
            }
        }

        if let Some(memory) = patch.memory {
            if let Some(retention_days) = memory.retention_days {
                self.memory.retention_days = retention_days;
            }
            if let Some(max_turns_per_session) = memory.max_turns_per_session {
                self.memory.max_turns_per_session = max_turns_per_session;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SKYRCHITECT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_REGION").or_else(|| read_env("AWS_REGION")) {
            self.llm.region = Some(value);
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SKYRCHITECT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SKYRCHITECT_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_LLM_RETRY_BACKOFF_MS") {
            self.llm.retry_backoff_ms = parse_u64("SKYRCHITECT_LLM_RETRY_BACKOFF_MS", &value)?;
        }

        if let Some(value) = read_env("SKYRCHITECT_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("SKYRCHITECT_AGENT_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_AGENT_WALL_CLOCK_SECS") {
            self.agent.wall_clock_secs = parse_u64("SKYRCHITECT_AGENT_WALL_CLOCK_SECS", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_AGENT_HISTORY_TURNS") {
            self.agent.history_turns = parse_usize("SKYRCHITECT_AGENT_HISTORY_TURNS", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_AGENT_ENABLED_MODES") {
            let modes = value.split(',').map(|mode| mode.trim().to_string()).collect();
            self.agent.enabled_modes = parse_modes("SKYRCHITECT_AGENT_ENABLED_MODES", modes)?;
        }

        if let Some(value) = read_env("SKYRCHITECT_MEMORY_RETENTION_DAYS") {
            self.memory.retention_days = parse_u32("SKYRCHITECT_MEMORY_RETENTION_DAYS", &value)?;
        }
        if let Some(value) = read_env("SKYRCHITECT_MEMORY_MAX_TURNS_PER_SESSION") {
            self.memory.max_turns_per_session =
                parse_usize("SKYRCHITECT_MEMORY_MAX_TURNS_PER_SESSION", &value)?;
        }

        let log_level =
            read_env("SKYRCHITECT_LOGGING_LEVEL").or_else(|| read_env("SKYRCHITECT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SKYRCHITECT_LOGGING_FORMAT").or_else(|| read_env("SKYRCHITECT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_memory(&self.memory)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("skyrchitect.toml"), PathBuf::from("config/skyrchitect.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${NAME}` references from the process environment.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &tail[..end];
        let value =
            env::var(name).map_err(|_| ConfigError::UnsetVariable { name: name.to_owned() })?;
        output.push_str(&value);
        rest = &tail[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
        LlmProvider::Bedrock => {
            let missing = llm.region.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.region is required for bedrock provider (or set AWS_REGION)".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_iterations == 0 || agent.max_iterations > 100 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be in range 1..=100".to_string(),
        ));
    }
    if agent.wall_clock_secs == 0 || agent.wall_clock_secs > 3_600 {
        return Err(ConfigError::Validation(
            "agent.wall_clock_secs must be in range 1..=3600".to_string(),
        ));
    }
    if agent.history_turns == 0 {
        return Err(ConfigError::Validation(
            "agent.history_turns must be greater than zero".to_string(),
        ));
    }
    if agent.enabled_modes.is_empty() {
        return Err(ConfigError::Validation(
            "agent.enabled_modes must list at least one request kind".to_string(),
        ));
    }
    Ok(())
}

fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
    if memory.retention_days == 0 {
        return Err(ConfigError::Validation(
            "memory.retention_days must be greater than zero".to_string(),
        ));
    }
    if memory.max_turns_per_session < 2 {
        return Err(ConfigError::Validation(
            "memory.max_turns_per_session must be at least 2 (one exchange)".to_string(),
        ));
    }
    Ok(())
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        return Ok(());
    }
    Err(ConfigError::Validation(format!(
        "logging.level `{}` is not one of {}",
        logging.level,
        LOG_LEVELS.join("|")
    )))
}

fn parse_modes(key: &str, values: Vec<String>) -> Result<Vec<RequestKind>, ConfigError> {
    let mut modes = Vec::with_capacity(values.len());
    for value in values.into_iter().filter(|value| !value.trim().is_empty()) {
        let mode = value
            .parse::<RequestKind>()
            .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value })?;
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    Ok(modes)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    memory: Option<MemoryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    region: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_iterations: Option<u32>,
    wall_clock_secs: Option<u64>,
    history_turns: Option<usize>,
    enabled_modes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryPatch {
    retention_days: Option<u32>,
    max_turns_per_session: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, LlmProvider, LoadOptions, LogFormat};
    use crate::domain::request::RequestKind;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_budgets() -> Result<(), String> {
        let config = AppConfig::default();
        ensure(config.agent.max_iterations == 12, "default iteration budget is 12")?;
        ensure(config.agent.wall_clock_secs == 60, "default wall clock budget is 60s")?;
        ensure(config.agent.history_turns == 10, "default history window is 10 turns")?;
        ensure(config.memory.retention_days == 7, "default retention is 7 days")?;
        ensure(config.agent.enabled_modes.len() == RequestKind::ALL.len(), "all request kinds enabled by default")?;
        config.validate().map_err(|err| format!("defaults must validate: {err}"))
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SKYRCHITECT_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("skyrchitect.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "anthropic"
api_key = "${TEST_SKYRCHITECT_API_KEY}"
model = "claude-3-5-sonnet"

[agent]
enabled_modes = ["architecture_generation", "code_generation"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions { config_path: Some(path), require_file: true })
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("sk-from-env".to_string()),
                "api key should be loaded from environment",
            )?;
            ensure(config.llm.provider == LlmProvider::Anthropic, "provider from file")?;
            ensure(
                config.agent.enabled_modes
                    == vec![RequestKind::ArchitectureGeneration, RequestKind::CodeGeneration],
                "enabled modes from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SKYRCHITECT_API_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_LOG_LEVEL", "warn");
        env::set_var("SKYRCHITECT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SKYRCHITECT_LOG_LEVEL", "SKYRCHITECT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn env_beats_file_beats_defaults() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_AGENT_MAX_ITERATIONS", "20");
        env::set_var("SKYRCHITECT_MEMORY_RETENTION_DAYS", "3");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("skyrchitect.toml");
            fs::write(
                &path,
                r#"
[agent]
max_iterations = 8
wall_clock_secs = 90

[memory]
retention_days = 14

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                require_file: true,
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.agent.max_iterations == 20, "env iteration budget should beat file")?;
            ensure(config.memory.retention_days == 3, "env retention should beat file")?;
            ensure(config.agent.wall_clock_secs == 90, "file wall clock should beat default")?;
            ensure(config.logging.level == "warn", "file log level should beat default")?;
            ensure(config.agent.history_turns == 10, "untouched values keep their defaults")?;
            Ok(())
        })();

        clear_vars(&["SKYRCHITECT_AGENT_MAX_ITERATIONS", "SKYRCHITECT_MEMORY_RETENTION_DAYS"]);
        result
    }

    #[test]
    fn unset_interpolation_variable_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["SKYRCHITECT_TEST_NEVER_SET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("skyrchitect.toml");
        fs::write(&path, "[llm]\nmodel = \"${SKYRCHITECT_TEST_NEVER_SET}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), require_file: true }) {
            Err(ConfigError::UnsetVariable { name }) => {
                ensure(name == "SKYRCHITECT_TEST_NEVER_SET", "error names the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("unset variable must fail the load".to_string()),
        }
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["SKYRCHITECT_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn out_of_range_iteration_budget_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_AGENT_MAX_ITERATIONS", "0");
        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("max_iterations"), "validation failure should mention max_iterations")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("zero iterations must be rejected".to_string()),
        };

        clear_vars(&["SKYRCHITECT_AGENT_MAX_ITERATIONS"]);
        result
    }

    #[test]
    fn unknown_mode_in_env_is_an_invalid_override() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_AGENT_ENABLED_MODES", "code_generation,telepathy");
        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "SKYRCHITECT_AGENT_ENABLED_MODES", "error names the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("unknown mode must fail".to_string()),
        };

        clear_vars(&["SKYRCHITECT_AGENT_ENABLED_MODES"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SKYRCHITECT_LLM_PROVIDER", "anthropic");
        env::set_var("SKYRCHITECT_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["SKYRCHITECT_LLM_PROVIDER", "SKYRCHITECT_LLM_API_KEY"]);
        result
    }
}
