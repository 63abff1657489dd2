pub mod catalog;
pub mod cost;
pub mod equivalence;
pub mod optimizer;
pub mod validator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::architecture::Architecture;
use crate::domain::budget::{BudgetAssessment, BudgetHint};
use crate::errors::DomainError;

use self::{
    catalog::ServiceCatalog,
    cost::{architecture_cost, CostBreakdown},
    validator::{ArchitectureValidator, ValidationReport},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureEvaluation {
    pub cost: CostBreakdown,
    pub validation: ValidationReport,
    pub budget: BudgetAssessment,
}

/// Deterministic tools bundled over one shared catalog.
pub struct CloudToolkit {
    catalog: Arc<ServiceCatalog>,
    validator: ArchitectureValidator,
}

impl CloudToolkit {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog, validator: ArchitectureValidator::default() }
    }

    pub fn with_validator(catalog: Arc<ServiceCatalog>, validator: ArchitectureValidator) -> Self {
        Self { catalog, validator }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn shared_catalog(&self) -> Arc<ServiceCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn validator(&self) -> &ArchitectureValidator {
        &self.validator
    }

    pub fn validate(&self, architecture: &Architecture) -> ValidationReport {
        self.validator.validate(&self.catalog, architecture)
    }

    /// Cost, validation and budget fit of a proposed architecture.
    pub fn evaluate(
        &self,
        architecture: &Architecture,
        budget: BudgetHint,
    ) -> Result<ArchitectureEvaluation, DomainError> {
        let cost = architecture_cost(&self.catalog, architecture)?;
        let validation = self.validate(architecture);
        let budget = BudgetAssessment::assess(budget, cost.total);
        Ok(ArchitectureEvaluation { cost, validation, budget })
    }
}

impl Default for CloudToolkit {
    fn default() -> Self {
        Self::new(ServiceCatalog::global())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::CloudToolkit;
    use crate::domain::architecture::{Architecture, ArchitectureEdge, ArchitectureNode};
    use crate::domain::budget::BudgetHint;

    #[test]
    fn evaluation_returns_cost_validation_and_budget_fit() {
        let toolkit = CloudToolkit::default();
        let architecture = Architecture::new(
            vec![
                ArchitectureNode::new("cdn", "aws-cloudfront", 1),
                ArchitectureNode::new("site", "aws-s3", 1),
                ArchitectureNode::new("db", "aws-dynamodb", 1),
            ],
            vec![ArchitectureEdge::new("cdn", "site"), ArchitectureEdge::new("cdn", "db")],
        )
        .expect("valid architecture");

        let evaluation = toolkit.evaluate(&architecture, BudgetHint::Low).expect("known services");

        assert_eq!(evaluation.cost.total, Decimal::new(5_250, 2));
        assert!(evaluation.budget.within_budget);
        assert!(!evaluation.validation.has_critical());
        assert_eq!(evaluation.validation.scores.security, 100);
    }

    #[test]
    fn evaluation_fails_for_unknown_services() {
        let toolkit = CloudToolkit::default();
        let architecture =
            Architecture::new(vec![ArchitectureNode::new("x", "aws-quantum", 1)], Vec::new())
                .expect("structurally valid");
        assert!(toolkit.evaluate(&architecture, BudgetHint::High).is_err());
    }
}
