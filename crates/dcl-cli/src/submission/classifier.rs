//! Classification of raw batch-submission responses
//!
//! The submission service answers overload conditions with plain text (proxy
//! error pages, truncated bodies) instead of JSON, so overload is detected by
//! substring match against [`OVERLOAD_MARKERS`] before any parsing. This is a
//! compatibility heuristic tied to the phrases the service and its proxies
//! are known to emit; a new phrasing upstream will be classified as
//! unparseable rather than as overload.

use serde::Deserialize;
use serde_json::Value;

/// Phrases that mark a response as transient overload
pub const OVERLOAD_MARKERS: &[&str] = &[
    "Request Timeout",
    "413 Request Entity Too Large",
    "Connection aborted.",
    "service failure - try again later",
];

/// One entity as reported back by the submission service
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedEntity {
    pub submitter_id: String,
    pub valid: bool,
    /// Present for invalid entities
    pub errors: Option<Value>,
}

impl SubmittedEntity {
    /// Error detail rendered for the `invalid` bucket
    pub fn error_text(&self) -> String {
        match &self.errors {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// What a response means for the submission loop
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Server is overloaded; shrink the chunk and retry
    TransientOverload { marker: &'static str },

    /// Payload is not a response shape the client understands
    Unparseable {
        reason: String,
        payload: Option<Value>,
    },

    /// Code 400/403/404: some entities invalid, the rest valid but not committed
    PartialFailure {
        code: u16,
        entities: Vec<SubmittedEntity>,
    },

    /// Code 200: every entity committed
    Success { entities: Vec<SubmittedEntity> },

    /// Code 500
    ServerError { message: Option<String> },
}

#[derive(Deserialize)]
struct RawEntity {
    #[serde(default)]
    unique_keys: Vec<RawUniqueKey>,
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    errors: Option<Value>,
}

#[derive(Deserialize)]
struct RawUniqueKey {
    submitter_id: Option<String>,
}

/// The overload marker contained in `text`, if any
pub fn overload_marker(text: &str) -> Option<&'static str> {
    OVERLOAD_MARKERS.iter().copied().find(|marker| text.contains(marker))
}

/// Classify a raw response body
pub fn classify(text: &str) -> Classification {
    if let Some(marker) = overload_marker(text) {
        return Classification::TransientOverload { marker };
    }

    let json: Value = match serde_json::from_str(text) {
        Ok(json) => json,
        Err(e) => {
            return Classification::Unparseable {
                reason: format!("unable to parse API response as JSON: {}", e),
                payload: Some(Value::String(text.to_string())),
            }
        },
    };

    let Some(object) = json.as_object() else {
        return Classification::Unparseable {
            reason: "API response is not a JSON object".to_string(),
            payload: Some(json),
        };
    };

    let Some(code) = object.get("code") else {
        return match object.get("message") {
            Some(message) => Classification::Unparseable {
                reason: format!("no code in the API response: {}", display_message(message)),
                payload: Some(object.get("transactional_errors").cloned().unwrap_or(Value::Null)),
            },
            None => Classification::Unparseable {
                reason: "unhandled API response".to_string(),
                payload: Some(json.clone()),
            },
        };
    };

    let Some(code) = code.as_u64().and_then(|c| u16::try_from(c).ok()) else {
        return Classification::Unparseable {
            reason: format!("API response code is not a status code: {}", code),
            payload: Some(json.clone()),
        };
    };

    match code {
        200 => match parse_entities(object.get("entities")) {
            Ok(entities) => Classification::Success { entities },
            Err(reason) => Classification::Unparseable {
                reason,
                payload: Some(json.clone()),
            },
        },
        400 | 403 | 404 => match parse_entities(object.get("entities")) {
            Ok(entities) => Classification::PartialFailure { code, entities },
            Err(reason) => Classification::Unparseable {
                reason,
                payload: Some(json.clone()),
            },
        },
        500 => Classification::ServerError {
            message: object.get("message").map(display_message),
        },
        other => Classification::Unparseable {
            reason: format!("unexpected API response code {}", other),
            payload: Some(json.clone()),
        },
    }
}

fn display_message(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_entities(entities: Option<&Value>) -> Result<Vec<SubmittedEntity>, String> {
    let Some(entities) = entities else {
        return Ok(Vec::new());
    };

    let raw: Vec<RawEntity> = serde_json::from_value(entities.clone())
        .map_err(|e| format!("malformed entities in API response: {}", e))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, entity)| {
            let submitter_id = entity
                .unique_keys
                .into_iter()
                .next()
                .and_then(|key| key.submitter_id)
                .ok_or_else(|| format!("entity {} in API response has no submitter_id", i))?;
            Ok(SubmittedEntity {
                submitter_id,
                valid: entity.valid,
                errors: entity.errors,
            })
        })
        .collect()
}
