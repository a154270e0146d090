//! The JSON report shape the model is asked to produce, and the salvage
//! path for responses that only partially conform.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelReport {
    #[serde(default)]
    pub findings: Vec<ModelFinding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
}

/// One finding element as the model reports it. Everything but the
/// category is optional; the analyzer fills gaps from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFinding {
    pub category: String,

    #[serde(default)]
    pub line: Option<u64>,

    #[serde(default)]
    pub severity: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default, alias = "description")]
    pub rationale: Option<String>,

    #[serde(default)]
    pub snippet: Option<String>,
}

/// A decoded report plus how many elements had to be dropped on the way.
#[derive(Debug, Default)]
pub struct ParsedReport {
    pub findings: Vec<ModelFinding>,
    pub summary: Option<String>,
    pub discarded: usize,
}

impl ParsedReport {
    /// Nothing salvageable: every element was dropped, or there were
    /// none to begin with and the report carried no summary either.
    pub fn unusable(&self) -> bool {
        self.findings.is_empty() && self.discarded > 0
    }
}

/// Decodes a model response. Malformed findings elements are dropped
/// individually; only a response with no decodable object at all is an
/// error.
pub fn parse_report(content: &str) -> Result<ParsedReport, ModelError> {
    let json_text = extract_json(content);
    let value: serde_json::Value = serde_json::from_str(json_text)
        .map_err(|e| ModelError::UnusableResponse(format!("response is not JSON: {e}")))?;
    let Some(object) = value.as_object() else {
        return Err(ModelError::UnusableResponse(
            "response is not a JSON object".to_string(),
        ));
    };

    let summary = object
        .get("analysis_summary")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut findings = Vec::new();
    let mut discarded = 0;
    match object.get("findings") {
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                match serde_json::from_value::<ModelFinding>(item.clone()) {
                    Ok(finding) => findings.push(finding),
                    Err(err) => {
                        debug!(error = %err, "dropping malformed findings element");
                        discarded += 1;
                    }
                }
            }
        }
        Some(other) => {
            warn!(kind = json_kind(other), "findings field is not an array");
            discarded += 1;
        }
        None => {}
    }

    Ok(ParsedReport {
        findings,
        summary,
        discarded,
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Pulls the JSON payload out of a response that wraps it in a markdown
/// fence or surrounds it with prose. Endpoints honoring the JSON response
/// format pass through unchanged.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;
        for (i, &byte) in text.as_bytes()[start..].iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return &text[start..start + i + 1];
                    }
                }
                _ => {}
            }
        }
    }

    text
}
