use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use skyrchitect_core::domain::architecture::Architecture;
use skyrchitect_core::domain::service::{Category, Provider};

/// Reads an architecture document (`{"nodes": [...], "edges": [...]}`) from disk.
pub fn read_architecture(path: &Path) -> Result<Architecture> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read architecture file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a valid architecture", path.display()))
}

pub fn parse_category(value: &str) -> Result<Category> {
    value.parse::<Category>().map_err(|error| anyhow!(error))
}

pub fn parse_provider(value: &str) -> Result<Provider> {
    value.parse::<Provider>().map_err(|error| anyhow!(error))
}

/// Parses a comma-separated provider list; empty input means every provider.
pub fn parse_providers(values: &[String]) -> Result<BTreeSet<Provider>> {
    if values.is_empty() {
        return Ok(Provider::ALL.into_iter().collect());
    }
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse_provider)
        .collect()
}

/// Renders an error chain on one line, outermost context first.
pub fn describe(error: &anyhow::Error) -> String {
    format!("{error:#}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_lists_accept_commas_and_repeats() {
        let providers =
            parse_providers(&["aws, gcp".to_string(), "azure".to_string()]).expect("valid list");
        assert_eq!(providers.len(), 3);

        let everything = parse_providers(&[]).expect("default");
        assert_eq!(everything, Provider::ALL.into_iter().collect());
    }

    #[test]
    fn unknown_provider_is_reported() {
        let error = parse_providers(&["oracle".to_string()]).expect_err("unsupported");
        assert!(describe(&error).contains("unsupported provider `oracle`"));
    }

    #[test]
    fn missing_architecture_file_names_the_path() {
        let error = read_architecture(Path::new("/nonexistent/arch.json")).expect_err("missing");
        assert!(describe(&error).contains("/nonexistent/arch.json"));
    }
}
