use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" | "google" => Ok(Self::Gcp),
            other => Err(format!("unsupported provider `{other}` (expected aws|azure|gcp)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Compute,
    Storage,
    Database,
    Network,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Compute,
        Category::Storage,
        Category::Database,
        Category::Network,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
            Self::Network => "network",
            Self::Other => "other",
        }
    }

    /// Storage and database nodes hold data at rest.
    pub fn holds_data(&self) -> bool {
        matches!(self, Self::Storage | Self::Database)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compute" => Ok(Self::Compute),
            "storage" => Ok(Self::Storage),
            "database" => Ok(Self::Database),
            "network" => Ok(Self::Network),
            "other" => Ok(Self::Other),
            other => Err(format!(
                "unsupported category `{other}` (expected compute|storage|database|network|other)"
            )),
        }
    }
}

/// Capability tags the validator and advisor reason about.
pub mod tags {
    pub const ENCRYPTED: &str = "encrypted";
    pub const INTERNET_FACING: &str = "internet-facing";
    pub const LOAD_BALANCER: &str = "load-balancer";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: ServiceId,
    pub provider: Provider,
    pub category: Category,
    pub name: String,
    pub description: String,
    pub base_monthly_cost: Decimal,
    pub capabilities: BTreeSet<String>,
    pub equivalence_group: String,
}

impl ServiceEntry {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Provider};

    #[test]
    fn provider_and_category_parse_case_insensitively() {
        assert_eq!("AWS".parse::<Provider>(), Ok(Provider::Aws));
        assert_eq!(" gcp ".parse::<Provider>(), Ok(Provider::Gcp));
        assert_eq!("Database".parse::<Category>(), Ok(Category::Database));
        assert!("mainframe".parse::<Category>().is_err());
        assert!("oracle".parse::<Provider>().is_err());
    }

    #[test]
    fn only_storage_and_database_hold_data() {
        let holders =
            Category::ALL.iter().filter(|category| category.holds_data()).collect::<Vec<_>>();
        assert_eq!(holders, vec![&Category::Storage, &Category::Database]);
    }
}
