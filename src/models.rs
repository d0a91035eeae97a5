//! Core data models used throughout chartsplice.
//!
//! These types represent the rows, chart data, image references, and page
//! blocks that flow through the refresh pipeline.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Block type tag the splicer treats as replaceable.
pub const IMAGE_BLOCK: &str = "image";

/// Schema entry for one property on a database row.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    pub id: String,
    /// Notion property type (`select`, `number`, `title`, ...).
    pub kind: String,
}

/// One row returned by a database query.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub properties: BTreeMap<String, PropertyRef>,
}

impl Record {
    /// Look up the property id for a field name on this row.
    pub fn property_id(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.id.as_str())
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Select(String),
    Number(f64),
    Title(String),
    RichText(String),
    Empty,
}

/// How aggregated values are presented on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationMode {
    /// Summed amounts as-is.
    Raw,
    /// Each group as a share of the grand total, rounded to 2 decimals.
    #[default]
    Percentage,
}

impl PresentationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" | "amount" => Some(Self::Raw),
            "percentage" | "percent" => Some(Self::Percentage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Percentage => "percentage",
        }
    }
}

/// Chart-ready labeled data points.
///
/// `labels[i]` corresponds to `values[i]`. `skipped` counts rows that were
/// dropped because a field could not be read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationResult {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub skipped: usize,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Short-lived URL of a freshly rendered chart image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartReference(pub String);

/// Durable URL of a re-hosted image, safe to embed in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference(pub String);

impl ChartReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ImageReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One child block of a page, as returned by the block store.
///
/// `payload` is the type-specific object stored under the block's type key.
/// Only the type tag is interpreted; payloads of other types are opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub kind: String,
    pub payload: Value,
}

impl Block {
    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_BLOCK
    }

    /// The payload to re-create this block unchanged.
    pub fn to_payload(&self) -> BlockPayload {
        BlockPayload {
            kind: self.kind.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// A block to append, serialized as `{ "<kind>": <payload> }`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPayload {
    pub kind: String,
    pub payload: Value,
}

impl BlockPayload {
    /// An image block with an empty caption pointing at an external URL.
    pub fn external_image(image: &ImageReference) -> Self {
        Self {
            kind: IMAGE_BLOCK.to_string(),
            payload: json!({
                "caption": [],
                "type": "external",
                "external": { "url": image.as_str() },
            }),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_BLOCK
    }

    /// URL of an external image payload, if this is one.
    pub fn image_url(&self) -> Option<&str> {
        if !self.is_image() {
            return None;
        }
        self.payload.pointer("/external/url").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(self.kind.clone(), self.payload.clone());
        Value::Object(obj)
    }
}

impl Serialize for BlockPayload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.kind, &self.payload)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_image_payload_shape() {
        let block = BlockPayload::external_image(&ImageReference("https://i.imgur.com/a.png".into()));
        assert_eq!(
            block.to_json(),
            json!({
                "image": {
                    "caption": [],
                    "type": "external",
                    "external": { "url": "https://i.imgur.com/a.png" }
                }
            })
        );
        assert_eq!(block.image_url(), Some("https://i.imgur.com/a.png"));
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let block = BlockPayload {
            kind: "paragraph".into(),
            payload: json!({ "rich_text": [] }),
        };
        assert_eq!(serde_json::to_value(&block).unwrap(), block.to_json());
        assert_eq!(block.image_url(), None);
    }

    #[test]
    fn test_presentation_mode_parse() {
        assert_eq!(PresentationMode::parse("percentage"), Some(PresentationMode::Percentage));
        assert_eq!(PresentationMode::parse("raw"), Some(PresentationMode::Raw));
        assert_eq!(PresentationMode::parse("pie"), None);
    }
}
