use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cloud::catalog::ServiceCatalog;
use crate::domain::service::ServiceEntry;

/// Capabilities an alternative must (mandatory) or should (optional) carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequirements {
    #[serde(default)]
    pub mandatory: BTreeSet<String>,
    #[serde(default)]
    pub optional: BTreeSet<String>,
}

impl CapabilityRequirements {
    pub fn mandatory<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { mandatory: tags.into_iter().map(Into::into).collect(), optional: BTreeSet::new() }
    }

    pub fn with_optional<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(tags.into_iter().map(Into::into));
        self
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.mandatory.iter().chain(self.optional.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub alternative: ServiceEntry,
    pub cost_delta: Decimal,
    /// Required tags (mandatory or optional) the alternative does not carry.
    pub capability_gap: BTreeSet<String>,
}

pub trait OptimizationAdvisor: Send + Sync {
    fn suggest(&self, current: &ServiceEntry, required: &CapabilityRequirements)
        -> Vec<Suggestion>;
}

pub struct CatalogOptimizationAdvisor<'a> {
    catalog: &'a ServiceCatalog,
}

impl<'a> CatalogOptimizationAdvisor<'a> {
    pub fn new(catalog: &'a ServiceCatalog) -> Self {
        Self { catalog }
    }
}

impl OptimizationAdvisor for CatalogOptimizationAdvisor<'_> {
    fn suggest(
        &self,
        current: &ServiceEntry,
        required: &CapabilityRequirements,
    ) -> Vec<Suggestion> {
        suggest_alternatives(self.catalog, current, required)
    }
}

/// Cheaper same-category alternatives covering every mandatory capability.
///
/// Ranked by cost delta, then by gap size, then by id. Tags outside the
/// requirement set never count against a candidate.
pub fn suggest_alternatives(
    catalog: &ServiceCatalog,
    current: &ServiceEntry,
    required: &CapabilityRequirements,
) -> Vec<Suggestion> {
    let mut suggestions = catalog
        .list_by_category(current.category)
        .into_iter()
        .filter(|candidate| candidate.id != current.id)
        .filter(|candidate| required.mandatory.iter().all(|tag| candidate.has_capability(tag)))
        .map(|candidate| Suggestion {
            cost_delta: candidate.base_monthly_cost - current.base_monthly_cost,
            capability_gap: required
                .all()
                .filter(|tag| !candidate.has_capability(tag))
                .cloned()
                .collect(),
            alternative: candidate.clone(),
        })
        .filter(|suggestion| suggestion.cost_delta < Decimal::ZERO)
        .collect::<Vec<_>>();

    suggestions.sort_by(|left, right| {
        left.cost_delta
            .cmp(&right.cost_delta)
            .then_with(|| left.capability_gap.len().cmp(&right.capability_gap.len()))
            .then_with(|| left.alternative.id.cmp(&right.alternative.id))
    });
    suggestions
}
