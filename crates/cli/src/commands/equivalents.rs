use std::collections::BTreeMap;

use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::cloud::equivalence::equivalents;

use crate::commands::input::{describe, parse_category, parse_providers};
use crate::commands::{CommandResult, EXIT_INPUT};

/// Maps a service to its counterpart in each requested provider.
pub fn run(category: &str, service: &str, providers: &[String]) -> CommandResult {
    let inputs = parse_category(category).and_then(|category| {
        parse_providers(providers).map(|providers| (category, providers))
    });
    let (category, providers) = match inputs {
        Ok(inputs) => inputs,
        Err(error) => {
            return CommandResult::failure("equivalents", "input", describe(&error), EXIT_INPUT)
        }
    };

    let catalog = ServiceCatalog::global();
    let entry = match catalog.lookup(category, service) {
        Ok(entry) => entry,
        Err(error) => return CommandResult::domain_failure("equivalents", &error),
    };

    let mapping = equivalents(&catalog, entry, &providers)
        .into_iter()
        .map(|(provider, resolved)| (provider.as_str(), resolved.map(|peer| peer.id.as_str())))
        .collect::<BTreeMap<_, _>>();
    let unmatched = mapping.values().filter(|resolved| resolved.is_none()).count();
    let message = format!(
        "{} resolved across {} providers ({} without a counterpart)",
        entry.id,
        mapping.len(),
        unmatched
    );
    CommandResult::with_data("equivalents", message, &mapping)
}
