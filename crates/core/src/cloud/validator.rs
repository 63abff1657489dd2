use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::cloud::catalog::ServiceCatalog;
use crate::domain::architecture::{Architecture, ArchitectureNode, NodeId};
use crate::domain::service::{tags, Category, ServiceEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn penalty(&self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warning => 5,
            Self::Critical => 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Security,
    Scalability,
    Reliability,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    pub dimension: Dimension,
    pub severity: Severity,
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub message: String,
}

impl Finding {
    fn new(
        rule: &str,
        dimension: Dimension,
        severity: Severity,
        node: Option<&NodeId>,
        message: String,
    ) -> Self {
        Self { dimension, severity, rule: rule.to_owned(), node: node.cloned(), message }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub security: u8,
    pub scalability: u8,
    pub reliability: u8,
}

impl Default for DimensionScores {
    fn default() -> Self {
        Self { security: 100, scalability: 100, reliability: 100 }
    }
}

impl DimensionScores {
    fn penalize(&mut self, finding: &Finding) {
        let score = match finding.dimension {
            Dimension::Security => &mut self.security,
            Dimension::Scalability => &mut self.scalability,
            Dimension::Reliability => &mut self.reliability,
        };
        *score = score.saturating_sub(finding.severity.penalty());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub scores: DimensionScores,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn from_findings(mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|left, right| {
            left.node
                .cmp(&right.node)
                .then_with(|| left.rule.cmp(&right.rule))
                .then_with(|| right.severity.cmp(&left.severity))
                .then_with(|| left.dimension.cmp(&right.dimension))
                .then_with(|| left.message.cmp(&right.message))
        });
        let mut scores = DimensionScores::default();
        for finding in &findings {
            scores.penalize(finding);
        }
        Self { scores, findings }
    }

    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(|finding| finding.severity == Severity::Critical)
    }

    pub fn findings_for(&self, rule: &str) -> impl Iterator<Item = &Finding> {
        let rule = rule.to_owned();
        self.findings.iter().filter(move |finding| finding.rule == rule)
    }
}

/// An architecture with each node's catalog entry resolved up front.
pub struct ValidationContext<'a> {
    pub architecture: &'a Architecture,
    entries: BTreeMap<&'a NodeId, &'a ServiceEntry>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(catalog: &'a ServiceCatalog, architecture: &'a Architecture) -> Self {
        let entries = architecture
            .nodes()
            .iter()
            .filter_map(|node| catalog.get(&node.service).map(|entry| (&node.id, entry)))
            .collect();
        Self { architecture, entries }
    }

    pub fn entry(&self, node: &NodeId) -> Option<&'a ServiceEntry> {
        self.entries.get(node).copied()
    }

    pub fn category(&self, node: &NodeId) -> Option<Category> {
        self.entry(node).map(|entry| entry.category)
    }

    pub fn has_tag(&self, node: &NodeId, tag: &str) -> bool {
        self.entry(node).is_some_and(|entry| entry.has_capability(tag))
    }

    fn compute_nodes(&self) -> impl Iterator<Item = &'a ArchitectureNode> + '_ {
        self.architecture
            .nodes()
            .iter()
            .filter(|node| self.category(&node.id) == Some(Category::Compute))
    }
}

pub trait ValidationRule: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, context: &ValidationContext<'_>) -> Vec<Finding>;
}

pub struct ConnectivityRule;

impl ValidationRule for ConnectivityRule {
    fn id(&self) -> &'static str {
        "connectivity"
    }

    fn evaluate(&self, context: &ValidationContext<'_>) -> Vec<Finding> {
        let architecture = context.architecture;
        let mut reached = BTreeSet::new();
        let mut queue = architecture
            .nodes()
            .iter()
            .map(|node| &node.id)
            .filter(|id| context.has_tag(id, tags::INTERNET_FACING))
            .collect::<VecDeque<_>>();
        reached.extend(queue.iter().copied());

        while let Some(current) = queue.pop_front() {
            for next in architecture.successors(current) {
                if reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        architecture
            .nodes()
            .iter()
            .filter(|node| !reached.contains(&node.id))
            .map(|node| {
                Finding::new(
                    self.id(),
                    Dimension::Reliability,
                    Severity::Warning,
                    Some(&node.id),
                    format!("node `{}` is not reachable from any internet-facing entry", node.id),
                )
            })
            .collect()
    }
}

pub struct SinglePointOfFailureRule;

impl ValidationRule for SinglePointOfFailureRule {
    fn id(&self) -> &'static str {
        "single_point_of_failure"
    }

    fn evaluate(&self, context: &ValidationContext<'_>) -> Vec<Finding> {
        let degrees = context.architecture.degrees();
        context
            .compute_nodes()
            .filter(|node| node.quantity == 1)
            .filter(|node| {
                degrees.get(&node.id).is_some_and(|(incoming, outgoing)| {
                    *incoming == 0 || *outgoing == 0
                })
            })
            .map(|node| {
                Finding::new(
                    self.id(),
                    Dimension::Scalability,
                    Severity::Warning,
                    Some(&node.id),
                    format!("compute node `{}` is a single instance at the edge of the graph", node.id),
                )
            })
            .collect()
    }
}

pub struct EncryptionAtRestRule;

impl ValidationRule for EncryptionAtRestRule {
    fn id(&self) -> &'static str {
        "encryption_at_rest"
    }

    fn evaluate(&self, context: &ValidationContext<'_>) -> Vec<Finding> {
        context
            .architecture
            .nodes()
            .iter()
            .filter(|node| context.category(&node.id).is_some_and(|category| category.holds_data()))
            .filter(|node| !context.has_tag(&node.id, tags::ENCRYPTED))
            .map(|node| {
                Finding::new(
                    self.id(),
                    Dimension::Security,
                    Severity::Critical,
                    Some(&node.id),
                    format!("data node `{}` ({}) is not encrypted at rest", node.id, node.service),
                )
            })
            .collect()
    }
}

pub struct RedundancyRule;

impl ValidationRule for RedundancyRule {
    fn id(&self) -> &'static str {
        "redundancy"
    }

    fn evaluate(&self, context: &ValidationContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for node in context.compute_nodes() {
            if node.quantity == 1 {
                findings.push(Finding::new(
                    self.id(),
                    Dimension::Scalability,
                    Severity::Warning,
                    Some(&node.id),
                    format!("compute node `{}` runs a single instance", node.id),
                ));
                continue;
            }

            let balanced = context
                .architecture
                .predecessors(&node.id)
                .any(|predecessor| context.has_tag(predecessor, tags::LOAD_BALANCER));
            if !balanced {
                findings.push(Finding::new(
                    self.id(),
                    Dimension::Reliability,
                    Severity::Warning,
                    Some(&node.id),
                    format!(
                        "compute node `{}` has {} instances but no load balancer in front",
                        node.id, node.quantity
                    ),
                ));
            }
        }
        findings
    }
}

pub struct ArchitectureValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ArchitectureValidator {
    fn default() -> Self {
        Self::with_rules(vec![
            Box::new(ConnectivityRule),
            Box::new(SinglePointOfFailureRule),
            Box::new(EncryptionAtRestRule),
            Box::new(RedundancyRule),
        ])
    }
}

impl ArchitectureValidator {
    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    pub fn validate(&self, catalog: &ServiceCatalog, architecture: &Architecture) -> ValidationReport {
        let context = ValidationContext::new(catalog, architecture);
        let mut findings = self
            .rules
            .iter()
            .flat_map(|rule| rule.evaluate(&context))
            .collect::<Vec<_>>();

        for node in architecture.nodes() {
            if context.entry(&node.id).is_none() {
                findings.push(Finding::new(
                    "catalog",
                    Dimension::Reliability,
                    Severity::Info,
                    Some(&node.id),
                    format!("node `{}` references unknown service `{}`", node.id, node.service),
                ));
            }
        }

        let report = ValidationReport::from_findings(findings);
        tracing::debug!(
            event_name = "core.validator.scored",
            nodes = architecture.nodes().len(),
            findings = report.findings.len(),
            security = report.scores.security,
            scalability = report.scores.scalability,
            reliability = report.scores.reliability,
            "architecture validated"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ArchitectureValidator, ConnectivityRule, Dimension, EncryptionAtRestRule, RedundancyRule,
        Severity, SinglePointOfFailureRule,
    };
    use crate::cloud::catalog::ServiceCatalog;
    use crate::domain::architecture::{Architecture, ArchitectureEdge, ArchitectureNode, NodeId};

    fn architecture(nodes: Vec<ArchitectureNode>, edges: Vec<ArchitectureEdge>) -> Architecture {
        Architecture::new(nodes, edges).expect("valid architecture")
    }

    fn balanced_web_stack() -> Architecture {
        architecture(
            vec![
                ArchitectureNode::new("lb", "aws-alb", 1),
                ArchitectureNode::new("app", "aws-ec2", 3),
                ArchitectureNode::new("db", "aws-rds", 1),
            ],
            vec![ArchitectureEdge::new("lb", "app"), ArchitectureEdge::new("app", "db")],
        )
    }

    #[test]
    fn balanced_encrypted_stack_scores_perfectly() {
        let report = ArchitectureValidator::default()
            .validate(&ServiceCatalog::builtin(), &balanced_web_stack());
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.scores.security, 100);
        assert_eq!(report.scores.scalability, 100);
        assert_eq!(report.scores.reliability, 100);
    }

    #[test]
    fn unencrypted_storage_is_a_critical_security_finding() {
        let report = ArchitectureValidator::default().validate(
            &ServiceCatalog::builtin(),
            &architecture(
                vec![
                    ArchitectureNode::new("api", "aws-api-gateway", 1),
                    ArchitectureNode::new("scratch", "aws-instance-store", 1),
                ],
                vec![ArchitectureEdge::new("api", "scratch")],
            ),
        );

        let critical = report.findings_for("encryption_at_rest").collect::<Vec<_>>();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].severity, Severity::Critical);
        assert_eq!(critical[0].node, Some(NodeId::new("scratch")));
        assert_eq!(report.scores.security, 80);
    }

    #[test]
    fn unreachable_nodes_reduce_reliability() {
        let report = ArchitectureValidator::default().validate(
            &ServiceCatalog::builtin(),
            &architecture(
                vec![
                    ArchitectureNode::new("cdn", "aws-cloudfront", 1),
                    ArchitectureNode::new("site", "aws-s3", 1),
                    ArchitectureNode::new("orphan", "aws-dynamodb", 1),
                ],
                vec![ArchitectureEdge::new("cdn", "site")],
            ),
        );

        let unreachable = report.findings_for("connectivity").collect::<Vec<_>>();
        assert_eq!(unreachable.len(), 1);
        assert_eq!(unreachable[0].node, Some(NodeId::new("orphan")));
        assert_eq!(report.scores.reliability, 95);
        assert!(!report.has_critical());
    }

    #[test]
    fn lone_compute_triggers_spof_and_redundancy_warnings() {
        let report = ArchitectureValidator::default().validate(
            &ServiceCatalog::builtin(),
            &architecture(
                vec![
                    ArchitectureNode::new("lb", "aws-alb", 1),
                    ArchitectureNode::new("worker", "aws-ec2", 1),
                ],
                vec![ArchitectureEdge::new("lb", "worker")],
            ),
        );

        assert_eq!(report.findings_for("single_point_of_failure").count(), 1);
        assert_eq!(report.findings_for("redundancy").count(), 1);
        assert!(report
            .findings
            .iter()
            .all(|finding| finding.dimension == Dimension::Scalability));
        assert_eq!(report.scores.scalability, 90);
    }

    #[test]
    fn replicated_compute_without_balancer_hurts_reliability() {
        let report = ArchitectureValidator::default().validate(
            &ServiceCatalog::builtin(),
            &architecture(
                vec![
                    ArchitectureNode::new("api", "aws-api-gateway", 1),
                    ArchitectureNode::new("fleet", "aws-ec2", 4),
                ],
                vec![ArchitectureEdge::new("api", "fleet")],
            ),
        );
        let redundancy = report.findings_for("redundancy").collect::<Vec<_>>();
        assert_eq!(redundancy.len(), 1);
        assert_eq!(redundancy[0].dimension, Dimension::Reliability);
    }

    #[test]
    fn scores_floor_at_zero() {
        let nodes = (0..6)
            .map(|index| ArchitectureNode::new(format!("disk-{index}"), "aws-instance-store", 1))
            .collect();
        let report = ArchitectureValidator::default()
            .validate(&ServiceCatalog::builtin(), &architecture(nodes, Vec::new()));
        assert_eq!(report.scores.security, 0);
    }

    #[test]
    fn validation_is_idempotent_and_rule_order_independent() {
        let catalog = ServiceCatalog::builtin();
        let subject = architecture(
            vec![
                ArchitectureNode::new("worker", "aws-ec2", 1),
                ArchitectureNode::new("fleet", "aws-ecs", 2),
                ArchitectureNode::new("scratch", "aws-instance-store", 1),
                ArchitectureNode::new("ghost", "aws-mainframe", 1),
            ],
            vec![ArchitectureEdge::new("worker", "scratch")],
        );
        let forward = ArchitectureValidator::default();
        let reversed = ArchitectureValidator::with_rules(vec![
            Box::new(RedundancyRule),
            Box::new(EncryptionAtRestRule),
            Box::new(SinglePointOfFailureRule),
            Box::new(ConnectivityRule),
        ]);

        let first = forward.validate(&catalog, &subject);
        assert_eq!(first, forward.validate(&catalog, &subject));
        assert_eq!(first, reversed.validate(&catalog, &subject));
        assert!(first.findings.iter().any(|finding| finding.rule == "catalog"));
    }
}
