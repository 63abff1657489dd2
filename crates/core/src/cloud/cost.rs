use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cloud::catalog::ServiceCatalog;
use crate::domain::architecture::Architecture;
use crate::domain::service::{Category, ServiceEntry, ServiceId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub service: ServiceEntry,
    pub quantity: i64,
}

impl ServiceSelection {
    pub fn new(service: ServiceEntry, quantity: i64) -> Self {
        Self { service, quantity }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub service: ServiceId,
    pub category: Category,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: Decimal,
    pub by_category: BTreeMap<Category, Decimal>,
    /// One line per distinct service id, ordered by id.
    pub lines: Vec<CostLine>,
}

pub trait CostCalculator: Send + Sync {
    fn calculate(&self, selections: &[ServiceSelection]) -> Result<CostBreakdown, DomainError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicCostCalculator;

impl CostCalculator for DeterministicCostCalculator {
    fn calculate(&self, selections: &[ServiceSelection]) -> Result<CostBreakdown, DomainError> {
        calculate_cost(selections)
    }
}

pub fn calculate_cost(selections: &[ServiceSelection]) -> Result<CostBreakdown, DomainError> {
    let mut merged: BTreeMap<&ServiceId, (&ServiceEntry, i64)> = BTreeMap::new();
    for selection in selections {
        if selection.quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                service: selection.service.id.to_string(),
                quantity: selection.quantity,
            });
        }
        let slot = merged.entry(&selection.service.id).or_insert((&selection.service, 0));
        slot.1 = slot.1.checked_add(selection.quantity).ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "quantity overflow for `{}`",
                selection.service.id
            ))
        })?;
    }

    let mut breakdown = CostBreakdown::default();
    for (id, (entry, quantity)) in merged {
        let subtotal = entry.base_monthly_cost * Decimal::from(quantity);
        breakdown.total += subtotal;
        *breakdown.by_category.entry(entry.category).or_insert(Decimal::ZERO) += subtotal;
        breakdown.lines.push(CostLine {
            service: id.clone(),
            category: entry.category,
            quantity,
            unit_cost: entry.base_monthly_cost,
            subtotal,
        });
    }

    Ok(breakdown)
}

/// Resolves every node's service against the catalog into a selection list.
pub fn architecture_selections(
    catalog: &ServiceCatalog,
    architecture: &Architecture,
) -> Result<Vec<ServiceSelection>, DomainError> {
    architecture
        .nodes()
        .iter()
        .map(|node| {
            catalog
                .require(&node.service)
                .map(|entry| ServiceSelection::new(entry.clone(), i64::from(node.quantity)))
        })
        .collect()
}

pub fn architecture_cost(
    catalog: &ServiceCatalog,
    architecture: &Architecture,
) -> Result<CostBreakdown, DomainError> {
    calculate_cost(&architecture_selections(catalog, architecture)?)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{architecture_cost, calculate_cost, ServiceSelection};
    use crate::cloud::catalog::ServiceCatalog;
    use crate::domain::architecture::{Architecture, ArchitectureEdge, ArchitectureNode};
    use crate::domain::service::{Category, ServiceEntry, ServiceId};
    use crate::errors::DomainError;

    fn entry(catalog: &ServiceCatalog, id: &str) -> ServiceEntry {
        catalog.get(&ServiceId::new(id)).cloned().expect("seeded service")
    }

    #[test]
    fn total_and_category_subtotals_follow_base_cost_times_quantity() {
        let catalog = ServiceCatalog::builtin();
        let breakdown = calculate_cost(&[
            ServiceSelection::new(entry(&catalog, "aws-ec2"), 2),
            ServiceSelection::new(entry(&catalog, "aws-rds"), 1),
            ServiceSelection::new(entry(&catalog, "aws-s3"), 1),
        ])
        .expect("valid selections");

        assert_eq!(breakdown.total, Decimal::new(11_670, 2));
        assert_eq!(breakdown.by_category[&Category::Compute], Decimal::new(5_840, 2));
        assert_eq!(breakdown.by_category[&Category::Database], Decimal::new(4_580, 2));
        assert!(!breakdown.by_category.contains_key(&Category::Network));
    }

    #[test]
    fn reordering_selections_does_not_change_the_breakdown() {
        let catalog = ServiceCatalog::builtin();
        let forward = vec![
            ServiceSelection::new(entry(&catalog, "aws-lambda"), 3),
            ServiceSelection::new(entry(&catalog, "aws-dynamodb"), 1),
            ServiceSelection::new(entry(&catalog, "aws-cloudfront"), 1),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(calculate_cost(&forward), calculate_cost(&reversed));
    }

    #[test]
    fn split_selections_of_the_same_service_are_additive() {
        let catalog = ServiceCatalog::builtin();
        let whole = calculate_cost(&[ServiceSelection::new(entry(&catalog, "aws-ec2"), 5)])
            .expect("whole");
        let split = calculate_cost(&[
            ServiceSelection::new(entry(&catalog, "aws-ec2"), 2),
            ServiceSelection::new(entry(&catalog, "aws-ec2"), 3),
        ])
        .expect("split");

        assert_eq!(whole, split);
        assert_eq!(split.lines.len(), 1);
        assert_eq!(split.lines[0].quantity, 5);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let catalog = ServiceCatalog::builtin();
        for quantity in [0, -1] {
            let error =
                calculate_cost(&[ServiceSelection::new(entry(&catalog, "aws-s3"), quantity)])
                    .expect_err("quantity must be positive");
            assert!(matches!(error, DomainError::InvalidQuantity { quantity: q, .. } if q == quantity));
        }
    }

    #[test]
    fn empty_selection_costs_nothing() {
        let breakdown = calculate_cost(&[]).expect("empty is valid");
        assert_eq!(breakdown.total, Decimal::ZERO);
        assert!(breakdown.lines.is_empty());
    }

    #[test]
    fn architecture_cost_resolves_nodes_through_the_catalog() {
        let catalog = ServiceCatalog::builtin();
        let architecture = Architecture::new(
            vec![
                ArchitectureNode::new("cdn", "aws-cloudfront", 1),
                ArchitectureNode::new("site", "aws-s3", 1),
                ArchitectureNode::new("db", "aws-dynamodb", 1),
            ],
            vec![ArchitectureEdge::new("cdn", "site")],
        )
        .expect("valid architecture");

        let breakdown = architecture_cost(&catalog, &architecture).expect("known services");
        assert_eq!(breakdown.total, Decimal::new(5_250, 2));

        let unknown =
            Architecture::new(vec![ArchitectureNode::new("x", "aws-mainframe", 1)], Vec::new())
                .expect("structurally valid");
        assert!(matches!(
            architecture_cost(&catalog, &unknown),
            Err(DomainError::UnknownService(_))
        ));
    }
}
