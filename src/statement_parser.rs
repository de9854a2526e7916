//! Parser for the structuring model's reply.
//!
//! Models wrap JSON in markdown fences, prepend chatter, use single quotes,
//! or leave trailing commas. The parser locates the object, tries a strict
//! parse, applies a light repair pass, and only then gives up with a
//! [`StatementFailure`] carrying a truncated excerpt of the reply.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::statement::StatementRecord;

/// Longest reply excerpt kept on a failure.
pub const RAW_EXCERPT_CHARS: usize = 500;

static FENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced object pattern is valid")
});
static BARE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("bare object pattern is valid"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern is valid"));

/// Structuring failure returned as a value, never as a panic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementFailure {
    pub error: String,
    pub error_detail: String,
    pub raw_response: String,
}

impl StatementFailure {
    fn parse_error(detail: impl fmt::Display, raw: &str) -> Self {
        Self {
            error: "Failed to parse statement".to_string(),
            error_detail: format!(
                "JSON parsing error: {}. The AI response was not valid JSON.",
                detail
            ),
            raw_response: excerpt(raw),
        }
    }
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.error_detail)
    }
}

impl std::error::Error for StatementFailure {}

impl From<StatementFailure> for AppError {
    fn from(failure: StatementFailure) -> Self {
        AppError::ExtractionFailed(failure.error_detail)
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}

/// Picks the most likely JSON object out of a model reply.
fn locate_object(reply: &str) -> &str {
    if let Some(inner) = FENCED_OBJECT.captures(reply).and_then(|c| c.get(1)) {
        return inner.as_str();
    }
    if let Some(found) = BARE_OBJECT.find(reply) {
        return found.as_str();
    }
    reply
}

/// Single quotes to double quotes, then drop commas before a closer.
fn repair(candidate: &str) -> String {
    let quoted = candidate.replace('\'', "\"");
    TRAILING_COMMA.replace_all(&quoted, "$1").into_owned()
}

/// Parses a model reply into a [`StatementRecord`].
///
/// An object carrying an `error` key is treated as an authoritative failure
/// and none of its other fields are read.
pub fn parse_statement_reply(reply: &str) -> Result<StatementRecord, StatementFailure> {
    let reply = reply.trim();
    let candidate = locate_object(reply);

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(&repair(candidate))
            .map_err(|e| StatementFailure::parse_error(e, reply))?,
    };

    let Value::Object(fields) = &value else {
        return Err(StatementFailure::parse_error(
            "expected a JSON object",
            reply,
        ));
    };

    if let Some(error) = fields.get("error") {
        return Err(StatementFailure {
            error: error
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
            error_detail: fields
                .get("error_detail")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
            raw_response: excerpt(reply),
        });
    }

    serde_json::from_value(value).map_err(|e| StatementFailure::parse_error(e, reply))
}
