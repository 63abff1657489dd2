use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use skyrchitect_core::cloud::{
    cost::{calculate_cost, ServiceSelection},
    equivalence::equivalents,
    optimizer::{suggest_alternatives, CapabilityRequirements},
    CloudToolkit,
};
use skyrchitect_core::domain::architecture::ArchitectureSpec;
use skyrchitect_core::domain::service::{Category, Provider};
use skyrchitect_core::errors::{DomainError, ErrorKind};
use skyrchitect_core::Architecture;

use crate::errors::ToolError;

/// Closed set of tools the model may call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ToolName {
    #[serde(rename = "get_aws_service_info")]
    ServiceInfo,
    #[serde(rename = "calculate_architecture_cost")]
    ArchitectureCost,
    #[serde(rename = "suggest_cost_optimization")]
    CostOptimization,
    #[serde(rename = "get_service_alternatives")]
    ServiceAlternatives,
    #[serde(rename = "validate_architecture")]
    ValidateArchitecture,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::ServiceInfo,
        ToolName::ArchitectureCost,
        ToolName::CostOptimization,
        ToolName::ServiceAlternatives,
        ToolName::ValidateArchitecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceInfo => "get_aws_service_info",
            Self::ArchitectureCost => "calculate_architecture_cost",
            Self::CostOptimization => "suggest_cost_optimization",
            Self::ServiceAlternatives => "get_service_alternatives",
            Self::ValidateArchitecture => "validate_architecture",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == value)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Array,
    Object,
}

impl ParamKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

const fn param(
    name: &'static str,
    kind: ParamKind,
    required: bool,
    description: &'static str,
) -> ParamSpec {
    ParamSpec { name, kind, required, description }
}

/// Declared argument schema of a tool, as handed to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// JSON-schema rendering used by provider adapters.
    pub fn to_json_schema(&self) -> Value {
        let properties = self
            .params
            .iter()
            .map(|spec| {
                (
                    spec.name.to_owned(),
                    json!({ "type": spec.kind.json_type(), "description": spec.description }),
                )
            })
            .collect::<Map<_, _>>();
        let required =
            self.params.iter().filter(|spec| spec.required).map(|spec| spec.name).collect::<Vec<_>>();
        json!({
            "name": self.name.as_str(),
            "description": self.description,
            "input_schema": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }
        })
    }

    /// Structural check of `args` against the declared params.
    pub fn check(&self, args: &Value) -> Result<(), ToolError> {
        let tool = self.name.as_str();
        let Some(object) = args.as_object() else {
            return Err(ToolError::schema(tool, "arguments must be a JSON object"));
        };

        for key in object.keys() {
            if !self.params.iter().any(|spec| spec.name == key) {
                return Err(ToolError::schema(tool, format!("unexpected argument `{key}`")));
            }
        }
        for spec in &self.params {
            match object.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ToolError::schema(
                        tool,
                        format!("missing required argument `{}`", spec.name),
                    ));
                }
                Some(value) if !value.is_null() && !spec.kind.matches(value) => {
                    return Err(ToolError::schema(
                        tool,
                        format!("argument `{}` must be of type {}", spec.name, spec.kind.json_type()),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A tool call after the loop assigned its request id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub request_id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub request_id: String,
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolCallResult {
    fn ok(request: &ToolCallRequest, payload: Value) -> Self {
        Self {
            request_id: request.request_id.clone(),
            tool: request.name.clone(),
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    fn failed(request: &ToolCallRequest, error: &ToolError) -> Self {
        Self {
            request_id: request.request_id.clone(),
            tool: request.name.clone(),
            success: false,
            payload: None,
            error: Some(ToolFailure { kind: error.kind(), message: error.to_string() }),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|failure| failure.kind)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;
    fn schema(&self) -> ToolSchema;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Box<dyn Tool>>,
}

static STANDARD: OnceLock<Arc<ToolRegistry>> = OnceLock::new();

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// The five catalog-backed tools over `toolkit`.
    pub fn standard(toolkit: Arc<CloudToolkit>) -> Self {
        let mut registry = Self::default();
        registry.register(ServiceInfoTool { toolkit: Arc::clone(&toolkit) });
        registry.register(ArchitectureCostTool { toolkit: Arc::clone(&toolkit) });
        registry.register(CostOptimizationTool { toolkit: Arc::clone(&toolkit) });
        registry.register(ServiceAlternativesTool { toolkit: Arc::clone(&toolkit) });
        registry.register(ValidateArchitectureTool { toolkit });
        registry
    }

    /// Process-wide standard registry over the built-in catalog.
    pub fn global() -> Arc<ToolRegistry> {
        Arc::clone(
            STANDARD.get_or_init(|| Arc::new(Self::standard(Arc::new(CloudToolkit::default())))),
        )
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of every registered tool, ordered by tool name.
    pub fn list(&self) -> Vec<ToolSchema> {
        let mut names = self.tools.keys().copied().collect::<Vec<_>>();
        names.sort();
        self.schemas(&names)
    }

    pub fn schemas(&self, subset: &[ToolName]) -> Vec<ToolSchema> {
        subset.iter().filter_map(|name| self.tools.get(name)).map(|tool| tool.schema()).collect()
    }

    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolCallResult {
        self.invoke_exposed(request, &ToolName::ALL).await
    }

    /// Runs `request` if it names a registered tool within `exposed`.
    ///
    /// Every failure is folded into the returned result.
    pub async fn invoke_exposed(
        &self,
        request: &ToolCallRequest,
        exposed: &[ToolName],
    ) -> ToolCallResult {
        let tool = ToolName::parse(&request.name)
            .filter(|name| exposed.contains(name))
            .and_then(|name| self.tools.get(&name));
        let Some(tool) = tool else {
            return ToolCallResult::failed(request, &ToolError::UnknownTool(request.name.clone()));
        };

        let outcome = match tool.schema().check(&request.arguments) {
            Ok(()) => tool.execute(request.arguments.clone()).await,
            Err(error) => Err(error),
        };
        match outcome {
            Ok(payload) => ToolCallResult::ok(request, payload),
            Err(error) => ToolCallResult::failed(request, &error),
        }
    }
}

fn typed_args<T: DeserializeOwned>(tool: ToolName, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|error| ToolError::schema(tool.as_str(), error.to_string()))
}

fn parse_category(value: &str) -> Result<Category, ToolError> {
    value.parse::<Category>().map_err(|_| DomainError::UnknownCategory(value.to_owned()).into())
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|error| DomainError::InvariantViolation(error.to_string()).into())
}

struct ServiceInfoTool {
    toolkit: Arc<CloudToolkit>,
}

#[derive(Deserialize)]
struct ServiceInfoArgs {
    service_category: String,
    service_name: String,
}

#[async_trait]
impl Tool for ServiceInfoTool {
    fn name(&self) -> ToolName {
        ToolName::ServiceInfo
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: "Look up a cloud service by category and name; returns cost, provider and capabilities.",
            params: vec![
                param("service_category", ParamKind::String, true, "compute|storage|database|network|other"),
                param("service_name", ParamKind::String, true, "service id or display name, e.g. ec2, s3, rds"),
            ],
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: ServiceInfoArgs = typed_args(self.name(), input)?;
        let category = parse_category(&args.service_category)?;
        let entry = self.toolkit.catalog().lookup(category, &args.service_name)?;
        to_payload(entry)
    }
}

struct ArchitectureCostTool {
    toolkit: Arc<CloudToolkit>,
}

#[derive(Deserialize)]
struct ArchitectureCostArgs {
    services: Vec<CostItemArgs>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CostItemArgs {
    category: String,
    service: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[async_trait]
impl Tool for ArchitectureCostTool {
    fn name(&self) -> ToolName {
        ToolName::ArchitectureCost
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: "Total and per-category monthly cost for a list of {category, service, quantity} selections.",
            params: vec![param(
                "services",
                ParamKind::Array,
                true,
                "selections, e.g. [{\"category\": \"compute\", \"service\": \"ec2\", \"quantity\": 2}]",
            )],
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: ArchitectureCostArgs = typed_args(self.name(), input)?;
        let catalog = self.toolkit.catalog();
        let selections = args
            .services
            .iter()
            .map(|item| {
                let category = parse_category(&item.category)?;
                let entry = catalog.lookup(category, &item.service)?;
                Ok(ServiceSelection::new(entry.clone(), item.quantity))
            })
            .collect::<Result<Vec<_>, ToolError>>()?;
        to_payload(&calculate_cost(&selections)?)
    }
}

struct CostOptimizationTool {
    toolkit: Arc<CloudToolkit>,
}

#[derive(Deserialize)]
struct CostOptimizationArgs {
    current_service: String,
    category: String,
    #[serde(default)]
    required_capabilities: BTreeSet<String>,
    #[serde(default)]
    optional_capabilities: BTreeSet<String>,
}

#[async_trait]
impl Tool for CostOptimizationTool {
    fn name(&self) -> ToolName {
        ToolName::CostOptimization
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: "Cheaper same-category alternatives that keep every required capability.",
            params: vec![
                param("current_service", ParamKind::String, true, "service id or display name"),
                param("category", ParamKind::String, true, "category of the current service"),
                param("required_capabilities", ParamKind::Array, false, "capability tags an alternative must carry"),
                param("optional_capabilities", ParamKind::Array, false, "capability tags reported in the gap when missing"),
            ],
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: CostOptimizationArgs = typed_args(self.name(), input)?;
        let category = parse_category(&args.category)?;
        let catalog = self.toolkit.catalog();
        let current = catalog.lookup(category, &args.current_service)?;
        let requirements = CapabilityRequirements {
            mandatory: args.required_capabilities,
            optional: args.optional_capabilities,
        };
        let suggestions = suggest_alternatives(catalog, current, &requirements);
        to_payload(&json!({
            "current": current.id,
            "current_monthly_cost": current.base_monthly_cost,
            "suggestions": suggestions,
        }))
    }
}

struct ServiceAlternativesTool {
    toolkit: Arc<CloudToolkit>,
}

#[derive(Deserialize)]
struct ServiceAlternativesArgs {
    service_name: String,
    category: String,
    #[serde(default)]
    target_providers: Vec<String>,
}

#[async_trait]
impl Tool for ServiceAlternativesTool {
    fn name(&self) -> ToolName {
        ToolName::ServiceAlternatives
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: "Functionally equivalent services in other providers; null where a provider has none.",
            params: vec![
                param("service_name", ParamKind::String, true, "service id or display name"),
                param("category", ParamKind::String, true, "category of the service"),
                param("target_providers", ParamKind::Array, false, "aws|azure|gcp; defaults to all"),
            ],
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: ServiceAlternativesArgs = typed_args(self.name(), input)?;
        let category = parse_category(&args.category)?;
        let catalog = self.toolkit.catalog();
        let entry = catalog.lookup(category, &args.service_name)?;

        let targets = if args.target_providers.is_empty() {
            Provider::ALL.into_iter().collect::<BTreeSet<_>>()
        } else {
            args.target_providers
                .iter()
                .map(|value| {
                    value.parse::<Provider>().map_err(|reason| ToolError::schema(self.name().as_str(), reason))
                })
                .collect::<Result<BTreeSet<_>, _>>()?
        };

        let resolved = equivalents(catalog, entry, &targets)
            .into_iter()
            .map(|(provider, found)| (provider.as_str().to_owned(), json!(found)))
            .collect::<Map<_, _>>();
        to_payload(&json!({ "service": entry.id, "equivalents": resolved }))
    }
}

struct ValidateArchitectureTool {
    toolkit: Arc<CloudToolkit>,
}

#[derive(Deserialize)]
struct ValidateArchitectureArgs {
    architecture: ArchitectureSpec,
}

#[async_trait]
impl Tool for ValidateArchitectureTool {
    fn name(&self) -> ToolName {
        ToolName::ValidateArchitecture
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: "Security, scalability and reliability scores plus findings for an architecture graph.",
            params: vec![param(
                "architecture",
                ParamKind::Object,
                true,
                "{\"nodes\": [{\"id\", \"service\", \"quantity\"}], \"edges\": [{\"from\", \"to\"}]}",
            )],
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: ValidateArchitectureArgs = typed_args(self.name(), input)?;
        let architecture = Architecture::try_from(args.architecture)?;
        for node in architecture.nodes() {
            self.toolkit.catalog().require(&node.service)?;
        }
        to_payload(&self.toolkit.validate(&architecture))
    }
}
