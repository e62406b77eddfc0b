//! Tolerant parsing of generation replies into suggestions.
//!
//! The service is asked for a JSON array but frequently wraps it in prose or
//! a code fence. The span between the first `[` and the last `]` is taken as
//! the answer; each object in it becomes one [`Suggestion`], with defaults for
//! missing fields.

use serde_json::{Map, Value};

use crate::errors::{EvolveError, EvolveResult};
use crate::models::{Goal, Impact, Suggestion};

pub const QUALITY_DEFAULT_TITLE: &str = "Code improvement";
pub const QUALITY_DEFAULT_PRIORITY: u32 = 3;
pub const INSTRUCTION_DEFAULT_PRIORITY: u32 = 1;

/// Field defaults for one reply, chosen by the path that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyDefaults {
    pub title: String,
    pub priority: u32,
}

impl ReplyDefaults {
    pub fn for_request(instructions: Option<&str>) -> Self {
        match instructions {
            Some(text) => Self {
                title: format!("Instruction: {}", text.trim()),
                priority: INSTRUCTION_DEFAULT_PRIORITY,
            },
            None => Self {
                title: QUALITY_DEFAULT_TITLE.to_string(),
                priority: QUALITY_DEFAULT_PRIORITY,
            },
        }
    }
}

/// The substring from the first `[` through the last `]`, if both exist in
/// that order.
pub fn bracketed_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn string_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn priority_field(value: Option<&Value>) -> Option<u32> {
    let raw = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(raw.clamp(1, u32::MAX as i64) as u32)
}

fn impact_field(value: Option<&Value>) -> Impact {
    match value {
        Some(Value::String(label)) => Impact::from_label(label).unwrap_or_default(),
        Some(Value::Number(score)) => score.as_f64().map(Impact::from_score).unwrap_or_default(),
        _ => Impact::default(),
    }
}

fn goals_field(value: Option<&Value>) -> Vec<Goal> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|label| Goal::parse(label).ok())
        .collect()
}

fn to_suggestion(object: &Map<String, Value>, defaults: &ReplyDefaults) -> Suggestion {
    let title = string_field(object, &["title"]).unwrap_or(&defaults.title);
    let description = string_field(object, &["description"]).unwrap_or_default();
    let code_sample = string_field(object, &["code_sample", "code_example", "code"]).unwrap_or_default();
    Suggestion::new(title, description)
        .with_code_sample(code_sample)
        .with_priority(priority_field(object.get("priority")).unwrap_or(defaults.priority))
        .with_impact(impact_field(object.get("impact")))
        .with_goals(goals_field(object.get("goals")))
}

/// Parse reply text into suggestions, in the order the service produced them.
///
/// No bracketed span is a valid empty answer. A span that is not a JSON
/// array is [`EvolveError::MalformedGenerationReply`].
pub fn parse_reply(text: &str, defaults: &ReplyDefaults) -> EvolveResult<Vec<Suggestion>> {
    let Some(span) = bracketed_span(text) else {
        return Ok(Vec::new());
    };
    let items: Vec<Value> = serde_json::from_str(span)
        .map_err(|e| EvolveError::MalformedGenerationReply(e.to_string()))?;
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|object| to_suggestion(object, defaults))
        .collect())
}
