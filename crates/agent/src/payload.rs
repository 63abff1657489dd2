//! Shape checks for terminal model payloads.
//!
//! Model output is untrusted. Every terminal payload passes through one of the
//! parsers here before the loop may enter TERMINAL; any mismatch is reported as
//! `MalformedOutput`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::domain::architecture::{
    Architecture, ArchitectureEdge, ArchitectureNode, ArchitectureSpec,
};
use skyrchitect_core::domain::service::{Category, Provider, ServiceEntry};

use crate::errors::LoopFailure;
use crate::llm::TerminalPayload;

/// Components below this confidence are not placed on the diagram.
pub const MIN_COMPONENT_CONFIDENCE: f64 = 70.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    ArchitectureProposal,
    CodeArtifact,
    ExtractionRecord,
    Answer,
}

impl PayloadShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchitectureProposal => "architecture_proposal",
            Self::CodeArtifact => "code_artifact",
            Self::ExtractionRecord => "extraction_record",
            Self::Answer => "answer",
        }
    }
}

/// Terminal payload after its shape has been checked.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedPayload {
    Proposal(ParsedProposal),
    Code(String),
    Extraction(ExtractionRecord),
    Answer(String),
}

impl ParsedPayload {
    /// Text stored as the assistant turn in stateful mode.
    pub fn summary(&self) -> String {
        match self {
            Self::Proposal(proposal) => proposal.reasoning.clone(),
            Self::Code(code) | Self::Answer(code) => code.clone(),
            Self::Extraction(record) => format!(
                "extracted {} components and {} connections",
                record.detected_components.len(),
                record.connections.len()
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedProposal {
    pub architecture: Architecture,
    pub reasoning: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub provider: Provider,
    pub detected_components: Vec<DetectedComponent>,
    #[serde(default)]
    pub connections: Vec<ComponentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedComponent {
    #[serde(alias = "service_name")]
    pub service: String,
    pub category: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Connection between two components, by index into `detected_components`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLink {
    pub from: usize,
    pub to: usize,
}

/// Architecture recovered from an extraction record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageExtraction {
    pub architecture: Architecture,
    pub provider: Provider,
    /// Confident components with no catalog match, as `service (category)`.
    pub unresolved: Vec<String>,
    pub dropped_low_confidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
}

pub fn parse_terminal(
    shape: PayloadShape,
    payload: &TerminalPayload,
    catalog: &ServiceCatalog,
) -> Result<ParsedPayload, LoopFailure> {
    match shape {
        PayloadShape::ArchitectureProposal => {
            parse_proposal(payload, catalog).map(ParsedPayload::Proposal)
        }
        PayloadShape::CodeArtifact => parse_code(payload).map(ParsedPayload::Code),
        PayloadShape::ExtractionRecord => {
            parse_extraction(payload).map(ParsedPayload::Extraction)
        }
        PayloadShape::Answer => parse_answer(payload).map(ParsedPayload::Answer),
    }
}

/// Splits a JSON object embedded in `text` from the prose around it.
///
/// Looks for a ```json fence first, then any fence holding a JSON object,
/// then the first balanced `{...}` that parses.
pub fn extract_json(text: &str) -> Option<(Value, String)> {
    fenced_json(text, true).or_else(|| fenced_json(text, false)).or_else(|| balanced_json(text))
}

fn fenced_json(text: &str, json_only: bool) -> Option<(Value, String)> {
    let mut cursor = 0;
    while let Some(open_rel) = text[cursor..].find("```") {
        let open = cursor + open_rel;
        let after_ticks = open + 3;
        let line_end = text[after_ticks..].find('\n').map(|idx| after_ticks + idx)?;
        let language = text[after_ticks..line_end].trim();
        let close = text[line_end..].find("```").map(|idx| line_end + idx)?;
        let body = &text[line_end + 1..close];

        let wanted = !json_only || language.eq_ignore_ascii_case("json");
        if wanted {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body.trim()) {
                let rest = format!("{}{}", &text[..open], &text[close + 3..]);
                return Some((value, rest.trim().to_owned()));
            }
        }
        cursor = close + 3;
    }
    None
}

fn balanced_json(text: &str) -> Option<(Value, String)> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(open_rel) = text[start..].find('{') {
        let open = start + open_rel;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[open..=close]) {
                let rest = format!("{}{}", &text[..open], &text[close + 1..]);
                return Some((value, rest.trim().to_owned()));
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[open..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// JSON object of a terminal payload plus any prose that surrounded it.
fn object_of(payload: &TerminalPayload) -> Result<(Value, String), LoopFailure> {
    match payload {
        TerminalPayload::Structured(value @ Value::Object(_)) => Ok((value.clone(), String::new())),
        TerminalPayload::Structured(_) => {
            Err(LoopFailure::malformed("terminal payload must be a JSON object"))
        }
        TerminalPayload::Text(text) => extract_json(text)
            .ok_or_else(|| LoopFailure::malformed("terminal text does not contain a JSON object")),
    }
}

pub fn parse_proposal(
    payload: &TerminalPayload,
    catalog: &ServiceCatalog,
) -> Result<ParsedProposal, LoopFailure> {
    let (value, prose) = object_of(payload)?;
    let spec = match value.get("architecture") {
        Some(raw @ Value::Object(_)) => serde_json::from_value::<ArchitectureSpec>(raw.clone())
            .map_err(|error| LoopFailure::malformed(format!("invalid architecture: {error}")))?,
        Some(_) => return Err(LoopFailure::malformed("field `architecture` must be an object")),
        None => return Err(LoopFailure::malformed("missing field `architecture`")),
    };
    let architecture = Architecture::try_from(spec)
        .map_err(|error| LoopFailure::malformed(format!("invalid architecture: {error}")))?;
    for node in architecture.nodes() {
        if catalog.get(&node.service).is_none() {
            return Err(LoopFailure::malformed(format!(
                "node `{}` references unknown service `{}`",
                node.id, node.service
            )));
        }
    }

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .unwrap_or(prose);
    if reasoning.trim().is_empty() {
        return Err(LoopFailure::malformed("missing field `reasoning`"));
    }

    Ok(ParsedProposal { architecture, reasoning })
}

pub fn parse_code(payload: &TerminalPayload) -> Result<String, LoopFailure> {
    let code = match payload {
        TerminalPayload::Structured(value) => value
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| LoopFailure::malformed("missing field `code`"))?,
        TerminalPayload::Text(text) => strip_fence(text),
    };
    if code.trim().is_empty() {
        return Err(LoopFailure::malformed("generated code is empty"));
    }
    Ok(code)
}

/// Free-text answer; a structured payload must carry it under `answer`.
pub fn parse_answer(payload: &TerminalPayload) -> Result<String, LoopFailure> {
    let answer = match payload {
        TerminalPayload::Structured(value) => value
            .get("answer")
            .and_then(Value::as_str)
            .ok_or_else(|| LoopFailure::malformed("missing field `answer`"))?,
        TerminalPayload::Text(text) => text.as_str(),
    };
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(LoopFailure::malformed("answer is empty"));
    }
    Ok(answer.to_owned())
}

/// Body of the first fenced block, or the whole text when there is none.
fn strip_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_owned();
    };
    let after_ticks = open + 3;
    let Some(line_end) = trimmed[after_ticks..].find('\n').map(|idx| after_ticks + idx) else {
        return trimmed.to_owned();
    };
    match trimmed[line_end..].find("```") {
        Some(close) => trimmed[line_end + 1..line_end + close].trim_end().to_owned(),
        None => trimmed[line_end + 1..].trim_end().to_owned(),
    }
}

pub fn parse_extraction(payload: &TerminalPayload) -> Result<ExtractionRecord, LoopFailure> {
    let (value, _) = object_of(payload)?;
    let record = serde_json::from_value::<ExtractionRecord>(value)
        .map_err(|error| LoopFailure::malformed(format!("invalid extraction record: {error}")))?;

    let count = record.detected_components.len();
    for component in &record.detected_components {
        if !(0.0..=100.0).contains(&component.confidence) {
            return Err(LoopFailure::malformed(format!(
                "confidence {} for `{}` is outside 0..=100",
                component.confidence, component.service
            )));
        }
    }
    for link in &record.connections {
        if link.from >= count || link.to >= count {
            return Err(LoopFailure::malformed(format!(
                "connection {} -> {} references a component that does not exist",
                link.from, link.to
            )));
        }
    }
    Ok(record)
}

impl ExtractionRecord {
    /// Maps confident components onto catalog services and rebuilds the graph.
    pub fn resolve(&self, catalog: &ServiceCatalog) -> Result<ImageExtraction, LoopFailure> {
        let mut nodes = Vec::new();
        let mut node_ids = vec![None; self.detected_components.len()];
        let mut unresolved = Vec::new();
        let mut dropped_low_confidence = Vec::new();

        for (index, component) in self.detected_components.iter().enumerate() {
            if component.confidence < MIN_COMPONENT_CONFIDENCE {
                dropped_low_confidence.push(component.service.clone());
                continue;
            }
            let Some(entry) = self.lookup(catalog, component) else {
                unresolved.push(format!("{} ({})", component.service, component.category));
                continue;
            };
            let id = format!("{}-{index}", entry.id);
            let quantity = component.quantity.filter(|quantity| *quantity > 0).unwrap_or(1);
            nodes.push(ArchitectureNode::new(id.clone(), entry.id.as_str(), quantity));
            node_ids[index] = Some(id);
        }

        let edges = self
            .connections
            .iter()
            .filter(|link| link.from != link.to)
            .filter_map(|link| {
                let from = node_ids.get(link.from)?.as_ref()?;
                let to = node_ids.get(link.to)?.as_ref()?;
                Some(ArchitectureEdge::new(from.as_str(), to.as_str()))
            })
            .collect::<Vec<_>>();

        let architecture = Architecture::new(nodes, edges)
            .map_err(|error| LoopFailure::malformed(format!("extracted diagram: {error}")))?;

        Ok(ImageExtraction {
            architecture,
            provider: self.provider,
            unresolved,
            dropped_low_confidence,
            complexity: self.complexity.clone(),
        })
    }

    fn lookup<'a>(
        &self,
        catalog: &'a ServiceCatalog,
        component: &DetectedComponent,
    ) -> Option<&'a ServiceEntry> {
        let category = component.category.parse::<Category>().ok()?;
        let scoped = format!("{}-{}", self.provider.as_str(), component.service);
        catalog.lookup(category, &scoped).or_else(|_| catalog.lookup(category, &component.service)).ok()
    }
}
