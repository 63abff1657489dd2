pub mod audit;
pub mod cloud;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use cloud::{
    catalog::ServiceCatalog,
    cost::{CostBreakdown, CostCalculator, DeterministicCostCalculator, ServiceSelection},
    optimizer::{CapabilityRequirements, OptimizationAdvisor, Suggestion},
    validator::{ArchitectureValidator, Finding, Severity, ValidationReport},
    ArchitectureEvaluation, CloudToolkit,
};
pub use domain::architecture::{Architecture, ArchitectureEdge, ArchitectureNode, NodeId};
pub use domain::budget::{BudgetAssessment, BudgetHint};
pub use domain::request::{IacFormat, OptimizationGoal, RequestKind};
pub use domain::service::{Category, Provider, ServiceEntry, ServiceId};
pub use domain::session::{Session, SessionId, Turn, TurnRole};
pub use errors::{DomainError, ErrorKind};
pub use flows::{LoopState, LoopStateMachine};
