use serde::{Deserialize, Serialize};

use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::domain::architecture::Architecture;
use skyrchitect_core::domain::budget::BudgetAssessment;
use skyrchitect_core::domain::service::Provider;

/// Post-checks applied to a proposal the loop already accepted.
///
/// A degraded proposal is still returned to the caller, with the reason attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardrailDecision {
    Allow,
    Degrade { reason_code: String, user_message: String },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub enforce_provider: bool,
    pub enforce_budget: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { enforce_provider: true, enforce_budget: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(
        &self,
        catalog: &ServiceCatalog,
        architecture: &Architecture,
        provider: Provider,
        budget: &BudgetAssessment,
    ) -> GuardrailDecision {
        if self.enforce_provider {
            let foreign = architecture
                .nodes()
                .iter()
                .filter(|node| {
                    catalog.get(&node.service).is_some_and(|entry| entry.provider != provider)
                })
                .map(|node| node.service.to_string())
                .collect::<Vec<_>>();
            if !foreign.is_empty() {
                return GuardrailDecision::Degrade {
                    reason_code: "provider_mismatch".to_owned(),
                    user_message: format!(
                        "The proposal uses services outside {provider}: {}.",
                        foreign.join(", ")
                    ),
                };
            }
        }

        if self.enforce_budget && !budget.within_budget {
            return GuardrailDecision::Degrade {
                reason_code: "over_budget".to_owned(),
                user_message: format!(
                    "Estimated cost ${}/month exceeds the {} budget by ${}.",
                    budget.total,
                    budget.hint.label(),
                    budget.overrun
                ),
            };
        }

        GuardrailDecision::Allow
    }
}
