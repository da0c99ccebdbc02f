//! Publish request payloads
//!
//! Each publish route accepts a fixed JSON schema. The parsers here check
//! that every required field is present and coerces to its expected type,
//! and rebuild the payload from those fields only. Unknown fields are
//! discarded.

use serde_json::{Map, Value};
use thiserror::Error;

/// Reason a publish body was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body is not valid JSON
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    /// Body is JSON but not an object
    #[error("body must be a JSON object")]
    NotAnObject,

    /// Required field absent
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Field present but of the wrong type
    #[error("field `{field}` must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Shape of a publish body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Prediction,
    Sub,
    Poll,
    PollAnswer,
}

impl PayloadKind {
    /// Validate a raw request body
    pub fn parse(self, body: &[u8]) -> Result<Value, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        match self {
            PayloadKind::Prediction => parse_prediction(object),
            PayloadKind::Sub => parse_sub(object),
            PayloadKind::Poll => parse_poll(object),
            PayloadKind::PollAnswer => parse_poll_answer(object),
        }
    }
}

/// Prediction update
pub fn parse_prediction(body: &Map<String, Value>) -> Result<Value, ValidationError> {
    let mut out = Map::new();
    for field in ["description", "optionOne", "optionTwo"] {
        out.insert(field.into(), Value::from(string_field(body, field)?));
    }
    for field in ["optionOnePoints", "optionTwoPoints"] {
        out.insert(field.into(), Value::from(int_field(body, field)?));
    }
    out.insert("endTime".into(), Value::from(string_field(body, "endTime")?));
    for field in ["acceptingEntries", "ended"] {
        out.insert(field.into(), Value::from(bool_field(body, field)?));
    }
    Ok(Value::Object(out))
}

/// Subscriber notification
pub fn parse_sub(body: &Map<String, Value>) -> Result<Value, ValidationError> {
    let mut out = Map::new();
    for field in ["name", "tier", "message"] {
        out.insert(field.into(), Value::from(string_field(body, field)?));
    }
    Ok(Value::Object(out))
}

/// New poll
///
/// ```json
/// { "title": "This is a sample poll", "options": ["Sample text", "123"] }
/// ```
pub fn parse_poll(body: &Map<String, Value>) -> Result<Value, ValidationError> {
    let title = string_field(body, "title")?;
    let options = array_field(body, "options")?
        .iter()
        .map(|option| {
            option
                .as_str()
                .map(str::to_string)
                .ok_or(ValidationError::InvalidType {
                    field: "options",
                    expected: "an array of strings",
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Map::new();
    out.insert("title".into(), Value::from(title));
    out.insert("options".into(), Value::from(options));
    Ok(Value::Object(out))
}

/// Answer to the active poll; `optionNumber` is 1-indexed
///
/// ```json
/// { "userID": 12938123, "optionNumber": 1, "userRoleIDs": [123, 823] }
/// ```
pub fn parse_poll_answer(body: &Map<String, Value>) -> Result<Value, ValidationError> {
    let user_id = int_field(body, "userID")?;
    let option_number = int_field(body, "optionNumber")?;
    let role_ids = array_field(body, "userRoleIDs")?
        .iter()
        .map(|id| {
            coerce_int(id).ok_or(ValidationError::InvalidType {
                field: "userRoleIDs",
                expected: "an array of integers",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Map::new();
    out.insert("userID".into(), Value::from(user_id));
    out.insert("optionNumber".into(), Value::from(option_number));
    out.insert("userRoleIDs".into(), Value::from(role_ids));
    Ok(Value::Object(out))
}

fn field<'a>(body: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, ValidationError> {
    body.get(name).ok_or(ValidationError::MissingField(name))
}

fn string_field(body: &Map<String, Value>, name: &'static str) -> Result<String, ValidationError> {
    field(body, name)?
        .as_str()
        .map(str::to_string)
        .ok_or(ValidationError::InvalidType {
            field: name,
            expected: "a string",
        })
}

fn bool_field(body: &Map<String, Value>, name: &'static str) -> Result<bool, ValidationError> {
    field(body, name)?.as_bool().ok_or(ValidationError::InvalidType {
        field: name,
        expected: "a boolean",
    })
}

fn int_field(body: &Map<String, Value>, name: &'static str) -> Result<i64, ValidationError> {
    coerce_int(field(body, name)?).ok_or(ValidationError::InvalidType {
        field: name,
        expected: "an integer",
    })
}

fn array_field<'a>(
    body: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a Vec<Value>, ValidationError> {
    field(body, name)?.as_array().ok_or(ValidationError::InvalidType {
        field: name,
        expected: "an array",
    })
}

/// Integer coercion accepting integers, finite floats (truncated toward
/// zero), booleans and base-10 integer strings
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.strip_prefix('+').unwrap_or(s).parse().ok()
        }
        _ => None,
    }
}
