//! Strict-JSON parsing for structured replies.
//!
//! Providers wrap JSON in code fences, preambles, and trailing prose
//! often enough that a plain `serde_json::from_str` on the raw reply is
//! a coin flip. The extractor strips fences and takes the outermost
//! `{...}` span before parsing; when that still fails, one repair
//! completion is attempted, and a second failure surfaces as a typed
//! error carrying the unparseable text.

use serde_json::Value;
use tracing::debug;

use crate::completion::CompletionProvider;
use crate::error::{Error, Result};
use crate::models::ChatTurn;

const REPAIR_INSTRUCTION: &str = "Fix the following reply so it becomes valid JSON strictly \
     following the schema from the original instructions. Return only the JSON, with no \
     commentary and no code fences.";

/// Strip code fences and cut the reply down to its outermost JSON object.
///
/// Returns the raw trimmed text when no `{...}` span is present, letting
/// the parse fail with the original content in hand.
pub fn extract_json_object(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

/// Parse a reply as JSON, asking the provider to repair it once on failure.
pub async fn parse_or_repair(
    completer: &dyn CompletionProvider,
    system_prompt: &str,
    raw: &str,
    temperature: f64,
    model: Option<&str>,
) -> Result<Value> {
    let candidate = extract_json_object(raw);
    match serde_json::from_str::<Value>(&candidate) {
        Ok(value) => return Ok(value),
        Err(e) => debug!(error = %e, "structured reply failed to parse, attempting repair"),
    }

    let turns = vec![
        ChatTurn::system(system_prompt),
        ChatTurn::user(format!("{REPAIR_INSTRUCTION}\n\n{raw}")),
    ];
    let repaired = completer.complete(&turns, temperature, model).await?;

    let candidate = extract_json_object(&repaired);
    serde_json::from_str::<Value>(&candidate).map_err(|_| {
        Error::StructuredOutput(if repaired.trim().is_empty() {
            raw.trim().to_string()
        } else {
            repaired.trim().to_string()
        })
    })
}
