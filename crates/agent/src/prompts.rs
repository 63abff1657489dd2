use skyrchitect_core::domain::architecture::Architecture;
use skyrchitect_core::domain::budget::BudgetHint;
use skyrchitect_core::domain::request::{IacFormat, OptimizationGoal, RequestKind};
use skyrchitect_core::domain::service::Provider;

const PROPOSAL_CONTRACT: &str = "\
Finish with a single JSON object in a ```json fence:
{\"architecture\": {\"nodes\": [{\"id\": \"web\", \"service\": \"aws-s3\", \"quantity\": 1}],
                  \"edges\": [{\"from\": \"cdn\", \"to\": \"web\"}]},
 \"reasoning\": \"why this design fits the requirements\"}
Node services must be catalog ids such as aws-ec2, azure-sql or gcp-cloud-storage.
Never invent prices; use calculate_architecture_cost and validate_architecture.";

pub fn system_prompt(kind: RequestKind) -> String {
    match kind {
        RequestKind::ArchitectureGeneration => format!(
            "You design secure, cost-effective cloud architectures on AWS, Azure and Google Cloud.\n\
             Look services up with the tools before choosing them, check the total against the \
             budget and run validation before answering.\n{PROPOSAL_CONTRACT}"
        ),
        RequestKind::ArchitectureOptimization => format!(
            "You review existing cloud architectures and propose an improved one for the stated \
             goal. Use suggest_cost_optimization and get_service_alternatives to find cheaper or \
             stronger services and keep every capability the workload needs.\n{PROPOSAL_CONTRACT}"
        ),
        RequestKind::CodeGeneration => "You write infrastructure-as-code for a given cloud \
             architecture. Reply with the complete code in one fenced block and nothing else."
            .to_owned(),
        RequestKind::ImageExtraction => "You read cloud architecture diagrams. Reply with one \
             JSON object: {\"provider\": \"aws|azure|gcp\", \"detected_components\": \
             [{\"service\": \"name\", \"category\": \"compute|storage|database|network|other\", \
             \"confidence\": 0-100, \"quantity\": 1}], \"connections\": [{\"from\": 0, \"to\": 1}], \
             \"complexity\": \"simple|moderate|complex\"}. Connections refer to component indexes."
            .to_owned(),
        RequestKind::Question => "You are a cloud architecture consultant for AWS, Azure and \
             Google Cloud. Answer questions clearly and practically. Use the tools when service \
             facts, prices or validation results would make the answer more accurate, and never \
             invent prices. Reply in plain prose."
            .to_owned(),
    }
}

pub fn generation_request(requirements: &str, provider: Provider, budget: BudgetHint) -> String {
    format!(
        "Design a cloud architecture for these requirements:\n\n{}\n\n\
         Preferred provider: {provider}\nBudget: {} (ceiling {} USD per month)",
        requirements.trim(),
        budget.label(),
        budget.ceiling()
    )
}

pub fn optimization_request(
    architecture: &Architecture,
    goal: OptimizationGoal,
    provider: Provider,
    budget: BudgetHint,
) -> String {
    format!(
        "Optimize this architecture with goal `{}`.\n\nCurrent architecture:\n{}\n\n\
         Preferred provider: {provider}\nBudget: {} (ceiling {} USD per month)",
        goal.as_str(),
        architecture_json(architecture),
        budget.label(),
        budget.ceiling()
    )
}

pub fn code_request(architecture: &Architecture, format: IacFormat) -> String {
    format!(
        "Generate {} code deploying this architecture:\n\n{}",
        format.as_str(),
        architecture_json(architecture)
    )
}

pub fn image_request(mime_type: &str) -> String {
    format!("Extract the cloud architecture shown in the attached {mime_type} diagram.")
}

pub fn question_request(question: &str, context: Option<&str>) -> String {
    let question = question.trim();
    match context.map(str::trim).filter(|context| !context.is_empty()) {
        Some(context) => format!(
            "Context: {context}\n\nQuestion: {question}\n\n\
             Provide a clear, practical answer using tools if needed."
        ),
        None => question.to_owned(),
    }
}

fn architecture_json(architecture: &Architecture) -> String {
    serde_json::to_string_pretty(architecture).unwrap_or_else(|_| "{}".to_owned())
}

#[cfg(test)]
mod tests {
    use skyrchitect_core::domain::architecture::{Architecture, ArchitectureNode};
    use skyrchitect_core::domain::budget::BudgetHint;
    use skyrchitect_core::domain::request::{IacFormat, RequestKind};
    use skyrchitect_core::domain::service::Provider;

    use super::{code_request, generation_request, question_request, system_prompt};

    #[test]
    fn architecture_prompts_carry_the_output_contract() {
        for kind in [RequestKind::ArchitectureGeneration, RequestKind::ArchitectureOptimization] {
            assert!(system_prompt(kind).contains("\"reasoning\""));
        }
        assert!(!system_prompt(RequestKind::CodeGeneration).contains("\"reasoning\""));
    }

    #[test]
    fn requests_render_budget_and_format() {
        let text = generation_request("  static site  ", Provider::Aws, BudgetHint::Low);
        assert!(text.contains("static site\n"));
        assert!(text.contains("Budget: low (ceiling 100 USD per month)"));

        let architecture =
            Architecture::new(vec![ArchitectureNode::new("site", "aws-s3", 1)], Vec::new())
                .expect("valid");
        let code = code_request(&architecture, IacFormat::Cloudformation);
        assert!(code.starts_with("Generate cloudformation code"));
        assert!(code.contains("aws-s3"));
    }

    #[test]
    fn question_context_is_optional() {
        assert_eq!(question_request(" What is S3? ", None), "What is S3?");
        assert_eq!(question_request("What is S3?", Some("  ")), "What is S3?");

        let framed = question_request("Which database?", Some("A payments API"));
        assert!(framed.starts_with("Context: A payments API\n\nQuestion: Which database?"));
        assert!(framed.ends_with("using tools if needed."));
    }
}
