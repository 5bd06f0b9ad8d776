//! Text forms of primitive values.
//!
//! Every stored field value is a string. Booleans use `True`/`False`,
//! timestamps are whole seconds since the Unix epoch in UTC and chars are a
//! single character. Unset nullable values format as the empty string.

use chrono::{DateTime, Utc};

use crate::value::{Value, ValueType};

/// Strings that parse to `true`. Everything else is `false`.
pub const TRUTHY: [&str; 3] = ["True", "true", "1"];

/// A text value does not parse as the expected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    pub expected: ValueType,
    pub text: String,
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub fn parse_bool(text: &str) -> bool {
    TRUTHY.contains(&text)
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.timestamp().to_string()
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let seconds = text.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}

pub fn format_char(value: char) -> String {
    value.to_string()
}

/// First character of the text; `None` when the text is empty.
pub fn parse_char(text: &str) -> Option<char> {
    text.chars().next()
}

/// Format a value as stored text.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Bool(v) => format_bool(*v).to_string(),
        Value::Timestamp(ts) => format_timestamp(ts),
        Value::Char(c) => format_char(*c),
        Value::List(items) => format_list(items, ","),
    }
}

/// Join list elements with the delimiter.
pub fn format_list(items: &[Value], delimiter: &str) -> String {
    items
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Parse stored text as a primitive.
///
/// `Ok(None)` means there is nothing to assign (an empty char).
pub fn parse_value(expected: &ValueType, text: &str) -> Result<Option<Value>, CodecError> {
    let fail = || CodecError {
        expected: expected.clone(),
        text: text.to_string(),
    };

    let value = match expected {
        ValueType::Text => Value::Text(text.to_string()),
        ValueType::Bool => Value::Bool(parse_bool(text)),
        ValueType::Int32 => Value::Int32(text.trim().parse().map_err(|_| fail())?),
        ValueType::Int64 => Value::Int64(text.trim().parse().map_err(|_| fail())?),
        ValueType::Timestamp => Value::Timestamp(parse_timestamp(text).ok_or_else(fail)?),
        ValueType::Char => match parse_char(text) {
            Some(c) => Value::Char(c),
            None => return Ok(None),
        },
        ValueType::List(_) | ValueType::Opaque(_) => return Err(fail()),
    };
    Ok(Some(value))
}

/// Split delimited text into a list of primitives.
///
/// Empty text is an empty list. Elements that carry the delimiter
/// themselves do not survive a round trip. One unparseable element fails
/// the whole list, including an empty element of a numeric list.
pub fn parse_list(element: &ValueType, text: &str, delimiter: &str) -> Result<Value, CodecError> {
    if text.is_empty() {
        return Ok(Value::List(Vec::new()));
    }

    let mut items = Vec::new();
    for piece in text.split(delimiter) {
        match parse_value(element, piece)? {
            Some(value) => items.push(value),
            None => items.push(Value::Null),
        }
    }
    Ok(Value::List(items))
}
