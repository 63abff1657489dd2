use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller-supplied spending hint for an architecture request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetHint {
    Low,
    Medium,
    High,
    Amount(Decimal),
}

impl BudgetHint {
    /// Monthly ceiling the proposal total is checked against.
    pub fn ceiling(&self) -> Decimal {
        match self {
            Self::Low => Decimal::new(100, 0),
            Self::Medium => Decimal::new(500, 0),
            Self::High => Decimal::new(2_000, 0),
            Self::Amount(amount) => *amount,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Low => "low".to_owned(),
            Self::Medium => "medium".to_owned(),
            Self::High => "high".to_owned(),
            Self::Amount(amount) => format!("${amount}/month"),
        }
    }
}

impl Default for BudgetHint {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAssessment {
    pub hint: BudgetHint,
    pub ceiling: Decimal,
    pub total: Decimal,
    pub within_budget: bool,
    /// Positive when the total exceeds the ceiling.
    pub overrun: Decimal,
}

impl BudgetAssessment {
    pub fn assess(hint: BudgetHint, total: Decimal) -> Self {
        let ceiling = hint.ceiling();
        let overrun = (total - ceiling).max(Decimal::ZERO);
        Self { hint, ceiling, total, within_budget: total <= ceiling, overrun }
    }
}

impl std::str::FromStr for BudgetHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => return Ok(Self::Low),
            "medium" | "moderate" => return Ok(Self::Medium),
            "high" => return Ok(Self::High),
            _ => {}
        }

        let amount = normalized
            .trim_start_matches('$')
            .trim_end_matches("/month")
            .trim_end_matches("/mo")
            .replace(',', "");
        match amount.parse::<Decimal>() {
            Ok(parsed) if parsed > Decimal::ZERO => Ok(Self::Amount(parsed)),
            _ => Err(format!(
                "unsupported budget hint `{value}` (expected low|medium|high or a positive amount)"
            )),
        }
    }
}
