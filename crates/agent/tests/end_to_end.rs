use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use skyrchitect_agent::guardrails::GuardrailDecision;
use skyrchitect_agent::llm::ContextEntry;
use skyrchitect_agent::{AgentRuntime, ModelTurn, ScriptedModel};
use skyrchitect_core::domain::architecture::{Architecture, ArchitectureEdge, ArchitectureNode};
use skyrchitect_core::domain::budget::BudgetHint;
use skyrchitect_core::domain::request::OptimizationGoal;
use skyrchitect_core::domain::service::{Category, Provider};
use skyrchitect_core::domain::session::SessionId;
use skyrchitect_core::{ServiceCatalog, Severity};

#[tokio::test]
async fn static_website_with_managed_database_fits_a_low_budget() {
    let final_text = format!(
        "Static assets sit in an encrypted S3 bucket behind CloudFront; the API runs on \
         Lambda and stores data in DynamoDB.\n```json\n{}\n```",
        json!({
            "architecture": {
                "nodes": [
                    {"id": "cdn", "service": "aws-cloudfront", "position": {"x": 100.0, "y": 50.0}},
                    {"id": "site", "service": "aws-s3"},
                    {"id": "api", "service": "aws-api-gateway"},
                    {"id": "fn", "service": "aws-lambda"},
                    {"id": "db", "service": "aws-dynamodb"}
                ],
                "edges": [
                    {"from": "cdn", "to": "site"},
                    {"from": "api", "to": "fn"},
                    {"from": "fn", "to": "db"}
                ]
            }
        })
    );
    let model = Arc::new(ScriptedModel::new([
        ModelTurn::call(
            "get_aws_service_info",
            json!({"service_category": "storage", "service_name": "S3"}),
        ),
        ModelTurn::call(
            "calculate_architecture_cost",
            json!({"services": [
                {"category": "network", "service": "cloudfront"},
                {"category": "storage", "service": "s3"},
                {"category": "database", "service": "dynamodb"}
            ]}),
        ),
        ModelTurn::text(final_text),
    ]));
    let runtime = AgentRuntime::new(model.clone());

    let proposal = runtime
        .run_architecture_generation(
            SessionId::new("e2e"),
            "static website with a managed database",
            Provider::Aws,
            BudgetHint::Low,
        )
        .await
        .expect("proposal");

    let catalog = ServiceCatalog::builtin();
    let categories = proposal
        .architecture
        .nodes()
        .iter()
        .filter_map(|node| catalog.get(&node.service).map(|entry| entry.category))
        .collect::<Vec<_>>();
    assert!(categories.contains(&Category::Storage));
    assert!(categories.contains(&Category::Database));

    assert_eq!(proposal.cost.total, Decimal::new(6_430, 2));
    assert!(proposal.cost.total <= BudgetHint::Low.ceiling());
    assert!(proposal.budget.within_budget);
    assert!(proposal
        .validation
        .findings
        .iter()
        .all(|finding| !(finding.rule == "encryption_at_rest" && finding.severity == Severity::Critical)));
    assert_eq!(proposal.validation.scores.security, 100);
    assert_eq!(proposal.guardrail, GuardrailDecision::Allow);
    assert!(proposal.reasoning.starts_with("Static assets sit in an encrypted S3 bucket"));
    assert_eq!(proposal.run.tool_rounds, 2);

    let cost_result = model.calls()[2]
        .context
        .iter()
        .filter_map(|entry| match entry {
            ContextEntry::ToolResult { result } if result.tool == "calculate_architecture_cost" => {
                result.payload.clone()
            }
            _ => None,
        })
        .next()
        .expect("cost tool result in context");
    assert_eq!(cost_result["total"], "52.50");
}

#[tokio::test]
async fn optimization_flags_a_proposal_that_leaves_the_provider() {
    let current = Architecture::new(
        vec![
            ArchitectureNode::new("lb", "aws-alb", 1),
            ArchitectureNode::new("app", "aws-ec2", 2),
            ArchitectureNode::new("db", "aws-rds", 1),
        ],
        vec![ArchitectureEdge::new("lb", "app"), ArchitectureEdge::new("app", "db")],
    )
    .expect("valid");
    let model = Arc::new(ScriptedModel::new([
        ModelTurn::call(
            "suggest_cost_optimization",
            json!({"current_service": "rds", "category": "database", "required_capabilities": ["relational"]}),
        ),
        ModelTurn::structured(json!({
            "architecture": {
                "nodes": [
                    {"id": "lb", "service": "aws-alb"},
                    {"id": "app", "service": "aws-ec2", "quantity": 2},
                    {"id": "db", "service": "gcp-cloud-sql"}
                ],
                "edges": [{"from": "lb", "to": "app"}, {"from": "app", "to": "db"}]
            },
            "reasoning": "Cloud SQL is the cheapest relational option."
        })),
    ]));
    let runtime = AgentRuntime::new(model.clone());

    let proposal = runtime
        .run_architecture_optimization(
            SessionId::new("opt"),
            current,
            OptimizationGoal::Cost,
            Provider::Aws,
            BudgetHint::Medium,
        )
        .await
        .expect("proposal");

    let GuardrailDecision::Degrade { reason_code, .. } = &proposal.guardrail else {
        panic!("expected a degraded proposal, got {:?}", proposal.guardrail);
    };
    assert_eq!(reason_code, "provider_mismatch");
    assert!(matches!(&model.calls()[0].context[1], ContextEntry::User { content } if content.contains("goal `cost`")));
}

#[tokio::test]
async fn image_extraction_builds_an_architecture_from_the_diagram() {
    let model = Arc::new(ScriptedModel::new([ModelTurn::text(
        json!({
            "provider": "azure",
            "detected_components": [
                {"service": "Application Gateway", "category": "network", "confidence": 92},
                {"service": "Virtual Machines", "category": "compute", "confidence": 85, "quantity": 2},
                {"service": "Azure SQL Database", "category": "database", "confidence": 81},
                {"service": "Sticky Note", "category": "other", "confidence": 30}
            ],
            "connections": [{"from": 0, "to": 1}, {"from": 1, "to": 2}, {"from": 2, "to": 3}],
            "complexity": "moderate"
        })
        .to_string(),
    )]));
    let runtime = AgentRuntime::new(model.clone());

    let extraction = runtime
        .run_image_extraction(vec![0x89, b'P', b'N', b'G'], "image/png")
        .await
        .expect("extraction");

    assert_eq!(extraction.provider, Provider::Azure);
    let services = extraction
        .architecture
        .nodes()
        .iter()
        .map(|node| (node.service.as_str(), node.quantity))
        .collect::<Vec<_>>();
    assert_eq!(services, vec![("azure-app-gateway", 1), ("azure-vm", 2), ("azure-sql", 1)]);
    assert_eq!(extraction.architecture.edge_count(), 2);
    assert_eq!(extraction.dropped_low_confidence, vec!["Sticky Note".to_owned()]);
    assert!(extraction.unresolved.is_empty());

    let call = &model.calls()[0];
    assert!(call.tools.is_empty());
    assert!(call
        .context
        .iter()
        .any(|entry| matches!(entry, ContextEntry::Image { mime_type, .. } if mime_type == "image/png")));
}
