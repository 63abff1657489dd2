use serde_json::Value;
use skyrchitect_agent::tools::{ToolCallRequest, ToolName, ToolRegistry};

use crate::commands::{CommandResult, EXIT_DOMAIN, EXIT_INPUT, EXIT_RUNTIME};

/// Lists every registered tool with its JSON parameter schema.
pub fn list() -> CommandResult {
    let registry = ToolRegistry::global();
    let schemas = registry
        .list()
        .iter()
        .map(|schema| schema.to_json_schema())
        .collect::<Vec<Value>>();
    CommandResult::with_data("tools", format!("{} tools registered", schemas.len()), &schemas)
}

/// Invokes one tool the way the orchestration loop would and prints its result.
pub fn call(name: &str, arguments: &str) -> CommandResult {
    if ToolName::parse(name).is_none() {
        return CommandResult::failure(
            "tools.call",
            "unknown_tool",
            format!("no tool named `{name}`"),
            EXIT_INPUT,
        );
    }
    let arguments = match serde_json::from_str::<Value>(arguments) {
        Ok(arguments) => arguments,
        Err(error) => {
            return CommandResult::failure(
                "tools.call",
                "input",
                format!("tool arguments must be JSON: {error}"),
                EXIT_INPUT,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "tools.call",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let request =
        ToolCallRequest { request_id: "cli-0".to_string(), name: name.to_string(), arguments };
    let result = runtime.block_on(async { ToolRegistry::global().invoke(&request).await });
    tracing::debug!(
        event_name = "cli.tool.invoked",
        tool = %name,
        success = result.success,
        "tool invoked from cli"
    );

    match result.error_kind() {
        None => CommandResult::with_data("tools.call", format!("{name} succeeded"), &result),
        Some(kind) => CommandResult::failure(
            "tools.call",
            kind.as_str(),
            result.error.map(|failure| failure.message).unwrap_or_default(),
            EXIT_DOMAIN,
        ),
    }
}
