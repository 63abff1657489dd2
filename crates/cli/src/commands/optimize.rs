use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::cloud::optimizer::{suggest_alternatives, CapabilityRequirements};

use crate::commands::input::{describe, parse_category};
use crate::commands::{CommandResult, EXIT_INPUT};

/// Cheaper catalog alternatives for one service.
pub fn run(category: &str, service: &str, required: &[String], optional: &[String]) -> CommandResult {
    let category = match parse_category(category) {
        Ok(category) => category,
        Err(error) => {
            return CommandResult::failure("optimize", "input", describe(&error), EXIT_INPUT)
        }
    };

    let catalog = ServiceCatalog::global();
    let current = match catalog.lookup(category, service) {
        Ok(entry) => entry,
        Err(error) => return CommandResult::domain_failure("optimize", &error),
    };
    let requirements = CapabilityRequirements::mandatory(required.iter().map(String::as_str))
        .with_optional(optional.iter().map(String::as_str));

    let suggestions = suggest_alternatives(&catalog, current, &requirements);
    let message = match suggestions.first() {
        Some(best) => format!(
            "{} cheaper alternatives to {}; best is {} ({})",
            suggestions.len(),
            current.id,
            best.alternative.id,
            best.cost_delta
        ),
        None => format!("no cheaper alternative to {} meets the requirements", current.id),
    };
    CommandResult::with_data("optimize", message, &suggestions)
}
