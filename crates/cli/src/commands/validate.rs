use std::path::Path;

use skyrchitect_core::cloud::CloudToolkit;

use crate::commands::input::{describe, read_architecture};
use crate::commands::{CommandResult, EXIT_INPUT};

/// Scores an architecture file on security, scalability and reliability.
pub fn run(path: &Path) -> CommandResult {
    let architecture = match read_architecture(path) {
        Ok(architecture) => architecture,
        Err(error) => {
            return CommandResult::failure("validate", "input", describe(&error), EXIT_INPUT)
        }
    };

    let toolkit = CloudToolkit::default();
    for node in architecture.nodes() {
        if let Err(error) = toolkit.catalog().require(&node.service) {
            return CommandResult::domain_failure("validate", &error);
        }
    }

    let report = toolkit.validate(&architecture);
    let scores = &report.scores;
    let message = format!(
        "security {} / scalability {} / reliability {}, {} findings",
        scores.security,
        scores.scalability,
        scores.reliability,
        report.findings.len()
    );
    CommandResult::with_data("validate", message, &report)
}
