use std::collections::{BTreeMap, BTreeSet};

use crate::cloud::catalog::ServiceCatalog;
use crate::domain::service::{Provider, ServiceEntry};

/// Maps `entry` to its equivalence-group member in each requested provider.
///
/// Providers without a member map to `None`; the entry's own provider maps to
/// the entry itself.
pub fn equivalents<'a>(
    catalog: &'a ServiceCatalog,
    entry: &'a ServiceEntry,
    targets: &BTreeSet<Provider>,
) -> BTreeMap<Provider, Option<&'a ServiceEntry>> {
    let peers = catalog.equivalents_of(entry);
    targets
        .iter()
        .map(|provider| {
            let resolved = if *provider == entry.provider {
                Some(entry)
            } else {
                peers
                    .iter()
                    .filter(|peer| peer.provider == *provider)
                    .min_by(|left, right| left.id.cmp(&right.id))
                    .copied()
            };
            (*provider, resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::equivalents;
    use crate::cloud::catalog::ServiceCatalog;
    use crate::domain::service::{Category, Provider, ServiceEntry, ServiceId};

    #[test]
    fn resolves_each_requested_provider() {
        let catalog = ServiceCatalog::builtin();
        let dynamodb = catalog.get(&ServiceId::new("aws-dynamodb")).expect("seeded");
        let targets = BTreeSet::from(Provider::ALL);

        let resolved = equivalents(&catalog, dynamodb, &targets);

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[&Provider::Aws].map(|e| e.id.as_str()), Some("aws-dynamodb"));
        assert_eq!(resolved[&Provider::Azure].map(|e| e.id.as_str()), Some("azure-cosmosdb"));
        assert_eq!(resolved[&Provider::Gcp].map(|e| e.id.as_str()), Some("gcp-firestore"));
    }

    #[test]
    fn missing_equivalents_are_none_not_errors() {
        let catalog = ServiceCatalog::builtin();
        let aurora = catalog.get(&ServiceId::new("aws-aurora")).expect("seeded");
        let resolved =
            equivalents(&catalog, aurora, &BTreeSet::from([Provider::Azure, Provider::Gcp]));
        assert_eq!(resolved.get(&Provider::Azure), Some(&None));
        assert_eq!(resolved.get(&Provider::Gcp), Some(&None));
        assert!(!resolved.contains_key(&Provider::Aws));
    }

    #[test]
    fn entries_outside_the_catalog_still_resolve_by_group() {
        let catalog = ServiceCatalog::builtin();
        let custom = ServiceEntry {
            id: ServiceId::new("oci-object-storage"),
            provider: Provider::Aws,
            category: Category::Storage,
            name: "Custom Object Storage".to_owned(),
            description: String::new(),
            base_monthly_cost: Decimal::ONE,
            capabilities: BTreeSet::new(),
            equivalence_group: "object-storage".to_owned(),
        };
        let resolved = equivalents(&catalog, &custom, &BTreeSet::from([Provider::Gcp]));
        assert_eq!(resolved[&Provider::Gcp].map(|e| e.id.as_str()), Some("gcp-cloud-storage"));
    }
}
