use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::domain::service::ServiceEntry;

use crate::commands::input::{describe, parse_category, parse_provider};
use crate::commands::{CommandResult, EXIT_INPUT};

pub fn run(provider: Option<&str>, category: Option<&str>) -> CommandResult {
    let provider = match provider.map(parse_provider).transpose() {
        Ok(provider) => provider,
        Err(error) => return CommandResult::failure("catalog", "input", describe(&error), EXIT_INPUT),
    };
    let category = match category.map(parse_category).transpose() {
        Ok(category) => category,
        Err(error) => return CommandResult::failure("catalog", "input", describe(&error), EXIT_INPUT),
    };

    let catalog = ServiceCatalog::global();
    let entries = catalog
        .entries()
        .iter()
        .filter(|entry| provider.map_or(true, |provider| entry.provider == provider))
        .filter(|entry| category.map_or(true, |category| entry.category == category))
        .collect::<Vec<&ServiceEntry>>();

    CommandResult::with_data("catalog", format!("{} catalog entries", entries.len()), &entries)
}
