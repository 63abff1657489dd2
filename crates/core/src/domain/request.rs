use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ArchitectureGeneration,
    ArchitectureOptimization,
    CodeGeneration,
    ImageExtraction,
    Question,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        RequestKind::ArchitectureGeneration,
        RequestKind::ArchitectureOptimization,
        RequestKind::CodeGeneration,
        RequestKind::ImageExtraction,
        RequestKind::Question,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchitectureGeneration => "architecture_generation",
            Self::ArchitectureOptimization => "architecture_optimization",
            Self::CodeGeneration => "code_generation",
            Self::ImageExtraction => "image_extraction",
            Self::Question => "question",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "architecture_generation" | "generate" => Ok(Self::ArchitectureGeneration),
            "architecture_optimization" | "optimize" => Ok(Self::ArchitectureOptimization),
            "code_generation" | "code" => Ok(Self::CodeGeneration),
            "image_extraction" | "image" => Ok(Self::ImageExtraction),
            "question" | "chat" => Ok(Self::Question),
            other => Err(format!("unsupported request kind `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IacFormat {
    #[default]
    Terraform,
    Cloudformation,
}

impl IacFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Cloudformation => "cloudformation",
        }
    }
}

impl std::str::FromStr for IacFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "terraform" | "tf" => Ok(Self::Terraform),
            "cloudformation" | "cfn" => Ok(Self::Cloudformation),
            other => Err(format!(
                "unsupported iac format `{other}` (expected terraform|cloudformation)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    Cost,
    Performance,
    #[default]
    Balanced,
}

impl OptimizationGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Performance => "performance",
            Self::Balanced => "balanced",
        }
    }
}

impl std::str::FromStr for OptimizationGoal {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cost" => Ok(Self::Cost),
            "performance" => Ok(Self::Performance),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!(
                "unsupported optimization goal `{other}` (expected cost|performance|balanced)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IacFormat, OptimizationGoal, RequestKind};

    #[test]
    fn request_kinds_round_trip_through_their_names() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>(), Ok(kind));
        }
        assert_eq!("code".parse::<RequestKind>(), Ok(RequestKind::CodeGeneration));
        assert_eq!("chat".parse::<RequestKind>(), Ok(RequestKind::Question));
        assert!("video_extraction".parse::<RequestKind>().is_err());
    }

    #[test]
    fn defaults_follow_the_common_case() {
        assert_eq!(IacFormat::default(), IacFormat::Terraform);
        assert_eq!(OptimizationGoal::default(), OptimizationGoal::Balanced);
        assert_eq!("CFN".parse::<IacFormat>(), Ok(IacFormat::Cloudformation));
    }
}
