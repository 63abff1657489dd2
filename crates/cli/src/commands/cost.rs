use std::path::Path;

use skyrchitect_core::cloud::CloudToolkit;
use skyrchitect_core::domain::budget::BudgetHint;

use crate::commands::input::{describe, read_architecture};
use crate::commands::{CommandResult, EXIT_INPUT};

/// Prices an architecture file and checks it against a budget hint.
pub fn run(path: &Path, budget: &str) -> CommandResult {
    let budget = match budget.parse::<BudgetHint>() {
        Ok(budget) => budget,
        Err(error) => return CommandResult::failure("cost", "input", error, EXIT_INPUT),
    };
    let architecture = match read_architecture(path) {
        Ok(architecture) => architecture,
        Err(error) => return CommandResult::failure("cost", "input", describe(&error), EXIT_INPUT),
    };

    let toolkit = CloudToolkit::default();
    match toolkit.evaluate(&architecture, budget) {
        Ok(evaluation) => {
            let message = if evaluation.budget.within_budget {
                format!("{} per month, within the {} budget", evaluation.cost.total, budget.label())
            } else {
                format!("{} per month, over the {} budget", evaluation.cost.total, budget.label())
            };
            CommandResult::with_data("cost", message, &evaluation)
        }
        Err(error) => CommandResult::domain_failure("cost", &error),
    }
}
