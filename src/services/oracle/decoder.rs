//! Response Decoder
//!
//! Turns raw oracle text into an `OracleResponse`. The payload may arrive
//! wrapped in prose or a code fence; the decoder strips the fence, parses the
//! first JSON object it finds and validates the fields the declared kind
//! needs. Anything short of that is a `MalformedResponse`, never a partially
//! coerced value.

use prompt_forge_core::{ChangeAction, OracleResponse, ResponseKind};
use thiserror::Error;

/// Max characters of offending text carried in an error
pub const SNIPPET_CHARS: usize = 200;

/// The oracle answered with something that is not a valid structured response.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed oracle response: {reason}")]
pub struct MalformedResponse {
    pub reason: String,
    /// Leading part of the raw text
    pub snippet: String,
}

impl MalformedResponse {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            snippet: raw.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// Stateless decoder for oracle output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, raw: &str) -> Result<OracleResponse, MalformedResponse> {
        if raw.trim().is_empty() {
            return Err(MalformedResponse::new("empty response", raw));
        }

        let candidate = extract_fenced(raw).unwrap_or(raw);
        let start = candidate
            .find('{')
            .ok_or_else(|| MalformedResponse::new("no JSON object found", raw))?;

        let mut stream =
            serde_json::Deserializer::from_str(&candidate[start..]).into_iter::<serde_json::Value>();
        let mut value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(MalformedResponse::new(format!("invalid JSON: {}", e), raw)),
            None => return Err(MalformedResponse::new("no JSON object found", raw)),
        };

        let object = value
            .as_object_mut()
            .ok_or_else(|| MalformedResponse::new("payload is not an object", raw))?;
        let tag = object
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| MalformedResponse::new("missing response type", raw))?;
        let kind = ResponseKind::from_tag(tag)
            .ok_or_else(|| MalformedResponse::new(format!("unknown response type '{}'", tag), raw))?;
        object.insert("type".to_string(), serde_json::Value::from(kind.tag()));

        let response: OracleResponse = serde_json::from_value(value).map_err(|e| {
            MalformedResponse::new(format!("{} response is incomplete: {}", kind, e), raw)
        })?;

        validate(&response).map_err(|reason| MalformedResponse::new(reason, raw))?;
        Ok(response)
    }
}

/// Body of the first fenced block that opens with an object.
///
/// The body is not cut at the closing fence: the JSON parser decides where the
/// value ends, so fences inside string content stay intact.
fn extract_fenced(raw: &str) -> Option<&str> {
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        // skip the info string (e.g. "json")
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_open[body_start..];
        if body.trim_start().starts_with('{') {
            return Some(body);
        }
        let close = body.find("```")?;
        rest = &body[close + 3..];
    }
    None
}

/// Semantic checks serde cannot express.
fn validate(response: &OracleResponse) -> Result<(), String> {
    match response {
        OracleResponse::Chat { message } => {
            if message.trim().is_empty() {
                return Err("CHAT response has an empty message".to_string());
            }
        }
        OracleResponse::Plan { plan, .. } => {
            if plan.name.trim().is_empty() {
                return Err("PLAN response has an empty plan name".to_string());
            }
        }
        OracleResponse::ModifyCode { modification, .. } => {
            for (i, change) in modification.changes.iter().enumerate() {
                if change.path.trim().is_empty() {
                    return Err(format!("change #{} has an empty path", i + 1));
                }
                if change.action != ChangeAction::Delete && change.content.is_none() {
                    return Err(format!(
                        "{} of '{}' carries no content",
                        change.action, change.path
                    ));
                }
            }
        }
    }
    Ok(())
}
