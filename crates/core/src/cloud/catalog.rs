use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use rust_decimal::Decimal;

use crate::domain::service::{Category, Provider, ServiceEntry, ServiceId};
use crate::errors::DomainError;

#[derive(Debug, Clone, Copy)]
struct ServiceSeed {
    id: &'static str,
    provider: Provider,
    category: Category,
    name: &'static str,
    description: &'static str,
    monthly_cost_cents: i64,
    capabilities: &'static [&'static str],
    group: &'static str,
}

const fn seed(
    id: &'static str,
    provider: Provider,
    category: Category,
    name: &'static str,
    description: &'static str,
    monthly_cost_cents: i64,
    capabilities: &'static [&'static str],
    group: &'static str,
) -> ServiceSeed {
    ServiceSeed { id, provider, category, name, description, monthly_cost_cents, capabilities, group }
}

use Category::{Compute, Database, Network, Other, Storage};
use Provider::{Aws, Azure, Gcp};

const SERVICE_SEEDS: &[ServiceSeed] = &[
    // aws
    seed("aws-ec2", Aws, Compute, "EC2", "Virtual servers", 2_920, &["vm", "autoscaling", "stateful"], "vm"),
    seed("aws-lambda", Aws, Compute, "Lambda", "Serverless compute", 830, &["serverless", "event-driven", "autoscaling"], "functions"),
    seed("aws-ecs", Aws, Compute, "ECS", "Container orchestration", 4_500, &["containers", "autoscaling"], "containers"),
    seed("aws-s3", Aws, Storage, "S3", "Object storage", 1_250, &["object", "encrypted", "static-hosting", "durable"], "object-storage"),
    seed("aws-s3-glacier", Aws, Storage, "S3 Glacier", "Archival object storage", 400, &["object", "archive", "encrypted", "durable"], "archive-storage"),
    seed("aws-ebs", Aws, Storage, "EBS", "Block storage", 2_000, &["block", "encrypted"], "block-storage"),
    seed("aws-instance-store", Aws, Storage, "Instance Store", "Ephemeral host-attached block storage", 600, &["block", "ephemeral"], "ephemeral-storage"),
    seed("aws-efs", Aws, Storage, "EFS", "File storage", 3_500, &["file", "encrypted", "shared"], "file-storage"),
    seed("aws-rds", Aws, Database, "RDS", "Relational database", 4_580, &["relational", "managed", "encrypted", "backups"], "relational-db"),
    seed("aws-aurora", Aws, Database, "Aurora", "High-performance relational database", 5_500, &["relational", "managed", "encrypted", "backups", "high-availability"], "relational-db-ha"),
    seed("aws-aurora-serverless", Aws, Database, "Aurora Serverless", "Relational database that scales to zero", 4_000, &["relational", "managed", "serverless", "encrypted", "backups"], "serverless-relational-db"),
    seed("aws-dynamodb", Aws, Database, "DynamoDB", "NoSQL database", 2_500, &["nosql", "managed", "serverless", "encrypted", "backups"], "nosql-db"),
    seed("aws-alb", Aws, Network, "Application Load Balancer", "Load balancing", 1_800, &["load-balancer", "internet-facing", "tls"], "load-balancer"),
    seed("aws-cloudfront", Aws, Network, "CloudFront", "CDN", 1_500, &["cdn", "internet-facing", "tls"], "cdn"),
    seed("aws-api-gateway", Aws, Network, "API Gateway", "Managed HTTP APIs", 350, &["api", "internet-facing", "tls"], "api-gateway"),
    seed("aws-vpc", Aws, Network, "VPC", "Virtual private cloud", 0, &["private-network"], "private-network"),
    seed("aws-elasticache", Aws, Other, "ElastiCache", "In-memory cache", 1_300, &["cache", "in-memory"], "cache"),
    seed("aws-cloudwatch", Aws, Other, "CloudWatch", "Monitoring and logs", 300, &["monitoring"], "monitoring"),
    // azure
    seed("azure-vm", Azure, Compute, "Virtual Machines", "Virtual servers", 3_040, &["vm", "autoscaling", "stateful"], "vm"),
    seed("azure-functions", Azure, Compute, "Azure Functions", "Serverless compute", 790, &["serverless", "event-driven", "autoscaling"], "functions"),
    seed("azure-aks", Azure, Compute, "Azure Kubernetes Service", "Container orchestration", 4_800, &["containers", "autoscaling"], "containers"),
    seed("azure-blob", Azure, Storage, "Blob Storage", "Object storage", 1_180, &["object", "encrypted", "static-hosting", "durable"], "object-storage"),
    seed("azure-archive", Azure, Storage, "Archive Storage", "Archival object storage", 350, &["object", "archive", "encrypted", "durable"], "archive-storage"),
    seed("azure-managed-disks", Azure, Storage, "Managed Disks", "Block storage", 1_920, &["block", "encrypted"], "block-storage"),
    seed("azure-files", Azure, Storage, "Azure Files", "File storage", 3_300, &["file", "encrypted", "shared"], "file-storage"),
    seed("azure-sql", Azure, Database, "Azure SQL Database", "Relational database", 4_900, &["relational", "managed", "encrypted", "backups"], "relational-db"),
    seed("azure-cosmosdb", Azure, Database, "Cosmos DB", "NoSQL database", 2_750, &["nosql", "managed", "serverless", "encrypted", "backups"], "nosql-db"),
    seed("azure-app-gateway", Azure, Network, "Application Gateway", "Load balancing", 2_050, &["load-balancer", "internet-facing", "tls"], "load-balancer"),
    seed("azure-cdn", Azure, Network, "Azure CDN", "CDN", 1_400, &["cdn", "internet-facing", "tls"], "cdn"),
    seed("azure-api-management", Azure, Network, "API Management", "Managed HTTP APIs", 480, &["api", "internet-facing", "tls"], "api-gateway"),
    seed("azure-vnet", Azure, Network, "Virtual Network", "Virtual private network", 0, &["private-network"], "private-network"),
    seed("azure-cache-redis", Azure, Other, "Azure Cache for Redis", "In-memory cache", 1_500, &["cache", "in-memory"], "cache"),
    seed("azure-monitor", Azure, Other, "Azure Monitor", "Monitoring and logs", 280, &["monitoring"], "monitoring"),
    // gcp
    seed("gcp-compute-engine", Gcp, Compute, "Compute Engine", "Virtual servers", 2_750, &["vm", "autoscaling", "stateful"], "vm"),
    seed("gcp-cloud-functions", Gcp, Compute, "Cloud Functions", "Serverless compute", 750, &["serverless", "event-driven", "autoscaling"], "functions"),
    seed("gcp-gke", Gcp, Compute, "Google Kubernetes Engine", "Container orchestration", 4_400, &["containers", "autoscaling"], "containers"),
    seed("gcp-cloud-storage", Gcp, Storage, "Cloud Storage", "Object storage", 1_200, &["object", "encrypted", "static-hosting", "durable"], "object-storage"),
    seed("gcp-archive-storage", Gcp, Storage, "Archive Storage Class", "Archival object storage", 380, &["object", "archive", "encrypted", "durable"], "archive-storage"),
    seed("gcp-persistent-disk", Gcp, Storage, "Persistent Disk", "Block storage", 1_700, &["block", "encrypted"], "block-storage"),
    seed("gcp-filestore", Gcp, Storage, "Filestore", "File storage", 6_000, &["file", "encrypted", "shared"], "file-storage"),
    seed("gcp-cloud-sql", Gcp, Database, "Cloud SQL", "Relational database", 4_200, &["relational", "managed", "encrypted", "backups"], "relational-db"),
    seed("gcp-firestore", Gcp, Database, "Firestore", "NoSQL database", 2_200, &["nosql", "managed", "serverless", "encrypted", "backups"], "nosql-db"),
    seed("gcp-load-balancing", Gcp, Network, "Cloud Load Balancing", "Load balancing", 1_850, &["load-balancer", "internet-facing", "tls"], "load-balancer"),
    seed("gcp-cloud-cdn", Gcp, Network, "Cloud CDN", "CDN", 1_200, &["cdn", "internet-facing", "tls"], "cdn"),
    seed("gcp-api-gateway", Gcp, Network, "Cloud API Gateway", "Managed HTTP APIs", 300, &["api", "internet-facing", "tls"], "api-gateway"),
    seed("gcp-vpc", Gcp, Network, "VPC Network", "Virtual private cloud", 0, &["private-network"], "private-network"),
    seed("gcp-memorystore", Gcp, Other, "Memorystore", "In-memory cache", 1_400, &["cache", "in-memory"], "cache"),
    seed("gcp-cloud-monitoring", Gcp, Other, "Cloud Monitoring", "Monitoring and logs", 250, &["monitoring"], "monitoring"),
];

impl ServiceSeed {
    fn to_entry(self) -> ServiceEntry {
        ServiceEntry {
            id: ServiceId::new(self.id),
            provider: self.provider,
            category: self.category,
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            base_monthly_cost: Decimal::new(self.monthly_cost_cents, 2),
            capabilities: self.capabilities.iter().map(|tag| (*tag).to_owned()).collect(),
            equivalence_group: self.group.to_owned(),
        }
    }
}

/// Process-wide, read-only knowledge base of cloud services.
#[derive(Debug, Default)]
pub struct ServiceCatalog {
    entries: Vec<ServiceEntry>,
    by_id: BTreeMap<ServiceId, usize>,
}

static BUILTIN: OnceLock<Arc<ServiceCatalog>> = OnceLock::new();

impl ServiceCatalog {
    pub fn new(entries: Vec<ServiceEntry>) -> Result<Self, DomainError> {
        let mut by_id = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.base_monthly_cost < Decimal::ZERO {
                return Err(DomainError::InvariantViolation(format!(
                    "service `{}` has a negative base cost",
                    entry.id
                )));
            }
            if by_id.insert(entry.id.clone(), index).is_some() {
                return Err(DomainError::InvariantViolation(format!(
                    "duplicate service id `{}` in catalog",
                    entry.id
                )));
            }
        }
        Ok(Self { entries, by_id })
    }

    pub fn builtin() -> Self {
        let entries = SERVICE_SEEDS.iter().map(|seed| seed.to_entry()).collect::<Vec<_>>();
        let by_id =
            entries.iter().enumerate().map(|(index, entry)| (entry.id.clone(), index)).collect();
        Self { entries, by_id }
    }

    /// Shared instance of the built-in catalog, initialised on first use.
    pub fn global() -> Arc<ServiceCatalog> {
        Arc::clone(BUILTIN.get_or_init(|| {
            let catalog = Self::builtin();
            tracing::debug!(
                event_name = "core.catalog.loaded",
                entries = catalog.len(),
                "built-in service catalog initialised"
            );
            Arc::new(catalog)
        }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn get(&self, id: &ServiceId) -> Option<&ServiceEntry> {
        self.by_id.get(id).map(|index| &self.entries[*index])
    }

    pub fn require(&self, id: &ServiceId) -> Result<&ServiceEntry, DomainError> {
        self.get(id).ok_or_else(|| DomainError::UnknownService(id.to_string()))
    }

    /// Finds a service in `category` by id or display name.
    ///
    /// Matching ignores case, spaces, dashes and underscores, so `"ec2"`,
    /// `"aws-ec2"` and `"EC2"` all resolve to the same entry.
    pub fn lookup(&self, category: Category, name: &str) -> Result<&ServiceEntry, DomainError> {
        let wanted = normalize(name);
        let in_category = || self.entries.iter().filter(|entry| entry.category == category);

        in_category()
            .find(|entry| normalize(entry.id.as_str()) == wanted)
            .or_else(|| in_category().find(|entry| normalize(&entry.name) == wanted))
            .or_else(|| {
                in_category().find(|entry| {
                    normalize(entry.id.as_str())
                        .strip_prefix(normalize(entry.provider.as_str()).as_str())
                        .is_some_and(|short| short == wanted)
                })
            })
            .ok_or_else(|| DomainError::NotFound { category, name: name.to_owned() })
    }

    pub fn list_by_category(&self, category: Category) -> Vec<&ServiceEntry> {
        self.entries.iter().filter(|entry| entry.category == category).collect()
    }

    /// Members of the entry's equivalence group across all providers, minus the entry.
    pub fn equivalents_of(&self, entry: &ServiceEntry) -> Vec<&ServiceEntry> {
        self.entries
            .iter()
            .filter(|candidate| {
                candidate.equivalence_group == entry.equivalence_group && candidate.id != entry.id
            })
            .collect()
    }

    pub fn providers(&self) -> BTreeSet<Provider> {
        self.entries.iter().map(|entry| entry.provider).collect()
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|character| !matches!(character, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::{ServiceCatalog, SERVICE_SEEDS};
    use crate::domain::service::{tags, Category, Provider, ServiceId};
    use crate::errors::DomainError;

    #[test]
    fn builtin_seed_ids_are_unique() {
        let ids = SERVICE_SEEDS.iter().map(|seed| seed.id).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), SERVICE_SEEDS.len());
        assert_eq!(ServiceCatalog::builtin().len(), SERVICE_SEEDS.len());
    }

    #[test]
    fn lookup_matches_id_short_key_and_display_name() {
        let catalog = ServiceCatalog::builtin();
        let by_id = catalog.lookup(Category::Compute, "aws-ec2").expect("by id");
        let by_short = catalog.lookup(Category::Compute, "ec2").expect("by short key");
        let by_name = catalog.lookup(Category::Database, "azure sql database").expect("by name");

        assert_eq!(by_id.id, ServiceId::new("aws-ec2"));
        assert_eq!(by_short.id, by_id.id);
        assert_eq!(by_name.id, ServiceId::new("azure-sql"));
        assert_eq!(by_id.base_monthly_cost, Decimal::new(2_920, 2));
    }

    #[test]
    fn lookup_in_wrong_category_is_not_found() {
        let catalog = ServiceCatalog::builtin();
        let error = catalog.lookup(Category::Storage, "ec2").expect_err("ec2 is compute");
        assert!(matches!(error, DomainError::NotFound { category: Category::Storage, .. }));
    }

    #[test]
    fn list_by_category_is_never_an_error() {
        let catalog = ServiceCatalog::new(Vec::new()).expect("empty catalog is valid");
        assert!(catalog.list_by_category(Category::Network).is_empty());

        let builtin = ServiceCatalog::builtin();
        let storage = builtin.list_by_category(Category::Storage);
        assert!(storage.iter().all(|entry| entry.category == Category::Storage));
        assert!(!storage.is_empty());
    }

    #[test]
    fn equivalents_span_providers_and_exclude_self() {
        let catalog = ServiceCatalog::builtin();
        let s3 = catalog.get(&ServiceId::new("aws-s3")).expect("s3 seeded");
        let equivalents = catalog.equivalents_of(s3);

        let providers = equivalents.iter().map(|entry| entry.provider).collect::<BTreeSet<_>>();
        assert_eq!(providers, BTreeSet::from([Provider::Azure, Provider::Gcp]));
        assert!(equivalents.iter().all(|entry| entry.id != s3.id));
    }

    #[test]
    fn cheapest_object_storage_on_aws_is_encrypted() {
        let catalog = ServiceCatalog::builtin();
        let s3 = catalog.lookup(Category::Storage, "s3").expect("s3 seeded");
        assert!(s3.has_capability(tags::ENCRYPTED));
        assert!(s3.has_capability("static-hosting"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let builtin = ServiceCatalog::builtin();
        let mut entries = builtin.entries().to_vec();
        entries.push(entries[0].clone());
        assert!(ServiceCatalog::new(entries).is_err());
    }
}
