//! Decoding of property payloads into typed [`FieldValue`]s.
//!
//! The data source hands back property items as loosely-typed JSON. Every
//! read goes through this module so the aggregator only ever sees a tagged
//! result: a typed value or a named [`FieldError`].
//!
//! Two payload shapes are accepted:
//!
//! ```text
//! { "object": "property_item", "type": "number", "number": 12.5 }
//! { "object": "list", "results": [ { "type": "title", "title": { "plain_text": "..." } }, ... ],
//!   "property_item": { "type": "title" } }
//! ```
//!
//! The paginated `list` form is what Notion returns for `title` and
//! `rich_text` properties; only the first page of fragments is read.

use serde_json::Value;

use crate::models::FieldValue;

/// Why a property payload could not be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// The row has no property with this name.
    #[error("property '{0}' not present on record")]
    Missing(String),

    /// The property exists but holds a different type.
    #[error("expected {expected} property, found {found}")]
    WrongType {
        expected: &'static str,
        found: String,
    },

    /// The property exists and has the right type but no value set.
    #[error("{0} property is empty")]
    Null(&'static str),

    /// The payload does not look like a property item at all.
    #[error("malformed property payload: {0}")]
    Malformed(String),
}

/// Decode a property item payload.
pub fn decode_field(value: &Value) -> Result<FieldValue, FieldError> {
    if value.get("object").and_then(Value::as_str) == Some("list") {
        return decode_list(value);
    }

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FieldError::Malformed("missing 'type'".to_string()))?;

    match kind {
        "select" => match value.get("select") {
            Some(Value::Null) | None => Ok(FieldValue::Empty),
            Some(sel) => sel
                .get("name")
                .and_then(Value::as_str)
                .map(|n| FieldValue::Select(n.to_string()))
                .ok_or_else(|| FieldError::Malformed("select without 'name'".to_string())),
        },
        "number" => match value.get("number") {
            Some(Value::Null) | None => Ok(FieldValue::Empty),
            Some(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| FieldError::Malformed(format!("number is not numeric: {}", n))),
        },
        "title" => Ok(FieldValue::Title(plain_text(value.get("title")))),
        "rich_text" => Ok(FieldValue::RichText(plain_text(value.get("rich_text")))),
        other => Err(FieldError::WrongType {
            expected: "select, number, title or rich_text",
            found: other.to_string(),
        }),
    }
}

fn decode_list(value: &Value) -> Result<FieldValue, FieldError> {
    let kind = value
        .pointer("/property_item/type")
        .and_then(Value::as_str)
        .ok_or_else(|| FieldError::Malformed("list without 'property_item.type'".to_string()))?;
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| FieldError::Malformed("list without 'results'".to_string()))?;

    let text: String = results
        .iter()
        .map(|item| plain_text(item.get(kind)))
        .collect();

    match kind {
        "title" => Ok(FieldValue::Title(text)),
        "rich_text" => Ok(FieldValue::RichText(text)),
        other => Err(FieldError::WrongType {
            expected: "title or rich_text",
            found: other.to_string(),
        }),
    }
}

/// Concatenate `plain_text` from a rich-text fragment or array of fragments.
fn plain_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(parts)) => parts.iter().map(|p| plain_text(Some(p))).collect(),
        Some(Value::Object(obj)) => obj
            .get("plain_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Read a select property's option name.
pub fn expect_select(value: &Value) -> Result<String, FieldError> {
    match decode_field(value)? {
        FieldValue::Select(name) => Ok(name),
        FieldValue::Empty => Err(FieldError::Null("select")),
        other => Err(FieldError::WrongType {
            expected: "select",
            found: type_name(&other).to_string(),
        }),
    }
}

/// Read a number property.
pub fn expect_number(value: &Value) -> Result<f64, FieldError> {
    match decode_field(value)? {
        FieldValue::Number(n) => Ok(n),
        FieldValue::Empty => Err(FieldError::Null("number")),
        other => Err(FieldError::WrongType {
            expected: "number",
            found: type_name(&other).to_string(),
        }),
    }
}

/// Read a label from a title, rich-text, or select property.
pub fn expect_label(value: &Value) -> Result<String, FieldError> {
    match decode_field(value)? {
        FieldValue::Title(s) | FieldValue::RichText(s) | FieldValue::Select(s) => Ok(s),
        FieldValue::Empty => Err(FieldError::Null("label")),
        other => Err(FieldError::WrongType {
            expected: "title",
            found: type_name(&other).to_string(),
        }),
    }
}

fn type_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Select(_) => "select",
        FieldValue::Number(_) => "number",
        FieldValue::Title(_) => "title",
        FieldValue::RichText(_) => "rich_text",
        FieldValue::Empty => "empty",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_select() {
        let v = json!({ "object": "property_item", "type": "select", "select": { "id": "x", "name": "Food", "color": "red" } });
        assert_eq!(decode_field(&v), Ok(FieldValue::Select("Food".into())));
        assert_eq!(expect_select(&v), Ok("Food".into()));
    }

    #[test]
    fn test_decode_unset_select_is_null() {
        let v = json!({ "object": "property_item", "type": "select", "select": null });
        assert_eq!(decode_field(&v), Ok(FieldValue::Empty));
        assert_eq!(expect_select(&v), Err(FieldError::Null("select")));
    }

    #[test]
    fn test_decode_number() {
        let v = json!({ "object": "property_item", "type": "number", "number": 12.5 });
        assert_eq!(expect_number(&v), Ok(12.5));
        let int = json!({ "object": "property_item", "type": "number", "number": 7 });
        assert_eq!(expect_number(&int), Ok(7.0));
    }

    #[test]
    fn test_number_wrong_type() {
        let v = json!({ "object": "property_item", "type": "select", "select": { "name": "A" } });
        assert_eq!(
            expect_number(&v),
            Err(FieldError::WrongType { expected: "number", found: "select".into() })
        );
    }

    #[test]
    fn test_non_numeric_number_is_malformed() {
        let v = json!({ "type": "number", "number": "ten" });
        assert!(matches!(expect_number(&v), Err(FieldError::Malformed(_))));
    }

    #[test]
    fn test_missing_type_is_malformed() {
        assert!(matches!(decode_field(&json!({ "number": 1 })), Err(FieldError::Malformed(_))));
    }

    #[test]
    fn test_unsupported_type() {
        let v = json!({ "type": "checkbox", "checkbox": true });
        assert!(matches!(decode_field(&v), Err(FieldError::WrongType { .. })));
    }

    #[test]
    fn test_decode_paginated_title() {
        let v = json!({
            "object": "list",
            "results": [
                { "object": "property_item", "type": "title", "title": { "plain_text": "Grocery " } },
                { "object": "property_item", "type": "title", "title": { "plain_text": "run" } }
            ],
            "property_item": { "id": "title", "type": "title", "title": {} }
        });
        assert_eq!(decode_field(&v), Ok(FieldValue::Title("Grocery run".into())));
        assert_eq!(expect_label(&v), Ok("Grocery run".into()));
    }

    #[test]
    fn test_inline_rich_text_array() {
        let v = json!({ "type": "rich_text", "rich_text": [ { "plain_text": "a" }, { "plain_text": "b" } ] });
        assert_eq!(decode_field(&v), Ok(FieldValue::RichText("ab".into())));
    }
}
