//! Aggregation of database rows into chart-ready data points.
//!
//! Two variants are supported:
//!
//! - **Grouped**: bucket rows by a select property and sum a number
//!   property per bucket. Labels appear in first-seen order. In
//!   [`PresentationMode::Percentage`] each sum becomes its share of the
//!   grand total, rounded to two decimals.
//! - **Direct**: plot each row as-is, label from a title property and
//!   value from a number property, in row order.
//!
//! # Failure policy
//!
//! A row whose property is missing, empty, of the wrong type, or cannot be
//! retrieved is logged and skipped; the count ends up in
//! [`AggregationResult::skipped`]. A failing database query fails the
//! whole aggregation.
//!
//! # Concurrency
//!
//! Property retrievals fan out through a bounded, order-preserving stream
//! (`buffered`), so the output follows row order regardless of which
//! request finishes first. Accumulation happens after the fan-out, on a
//! single owner.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::collections::HashMap;

use crate::config::Config;
use crate::decode::{expect_label, expect_number, expect_select, FieldError};
use crate::models::{AggregationResult, PresentationMode, Record};
use crate::traits::DataSource;

/// What to aggregate and how.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationRequest {
    Grouped {
        database_id: String,
        group_by: String,
        amount_field: String,
        mode: PresentationMode,
    },
    Direct {
        database_id: String,
        label_field: String,
        value_field: String,
    },
}

impl AggregationRequest {
    /// Build the request described by the chart configuration.
    ///
    /// A configured `label_field` selects the direct variant.
    pub fn from_config(config: &Config) -> Self {
        let database_id = config.notion.database_id.clone();
        match &config.chart.label_field {
            Some(label_field) => Self::Direct {
                database_id,
                label_field: label_field.clone(),
                value_field: config.chart.amount_field.clone(),
            },
            None => Self::Grouped {
                database_id,
                group_by: config.chart.group_by.clone(),
                amount_field: config.chart.amount_field.clone(),
                mode: config.chart.presentation_mode(),
            },
        }
    }

    pub fn database_id(&self) -> &str {
        match self {
            Self::Grouped { database_id, .. } | Self::Direct { database_id, .. } => database_id,
        }
    }
}

/// Which decoder applies to a row's label property.
#[derive(Clone, Copy)]
enum LabelKind {
    Select,
    Title,
}

/// Query the data source and aggregate its rows.
pub async fn aggregate(
    source: &dyn DataSource,
    request: &AggregationRequest,
    concurrency: usize,
) -> Result<AggregationResult> {
    let database_id = request.database_id();
    let records = source
        .query(database_id)
        .await
        .with_context(|| format!("Failed to query database {}", database_id))?;

    let (label_field, value_field, kind) = match request {
        AggregationRequest::Grouped {
            group_by,
            amount_field,
            ..
        } => (group_by.as_str(), amount_field.as_str(), LabelKind::Select),
        AggregationRequest::Direct {
            label_field,
            value_field,
            ..
        } => (label_field.as_str(), value_field.as_str(), LabelKind::Title),
    };

    let rows: Vec<Result<(String, f64)>> = futures::stream::iter(
        records
            .iter()
            .map(|record| read_row(source, record, label_field, value_field, kind)),
    )
    .buffered(concurrency.max(1))
    .collect()
    .await;

    let mut points = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (record, row) in records.iter().zip(rows) {
        match row {
            Ok(point) => points.push(point),
            Err(e) => {
                tracing::warn!(record_id = %record.id, "skipping row: {:#}", e);
                skipped += 1;
            }
        }
    }

    let (labels, values) = match request {
        AggregationRequest::Grouped { mode, .. } => group_sum(points, *mode),
        AggregationRequest::Direct { .. } => points.into_iter().unzip(),
    };

    tracing::info!(
        rows = records.len(),
        points = labels.len(),
        skipped,
        "aggregated database rows"
    );

    Ok(AggregationResult {
        labels,
        values,
        skipped,
    })
}

/// Retrieve and decode the label and value properties of one row.
async fn read_row(
    source: &dyn DataSource,
    record: &Record,
    label_field: &str,
    value_field: &str,
    kind: LabelKind,
) -> Result<(String, f64)> {
    let label_id = record
        .property_id(label_field)
        .ok_or_else(|| FieldError::Missing(label_field.to_string()))?;
    let value_id = record
        .property_id(value_field)
        .ok_or_else(|| FieldError::Missing(value_field.to_string()))?;

    let label_raw = source.get_field(&record.id, label_id).await?;
    let value_raw = source.get_field(&record.id, value_id).await?;

    let label = match kind {
        LabelKind::Select => expect_select(&label_raw),
        LabelKind::Title => expect_label(&label_raw),
    }
    .with_context(|| format!("property '{}'", label_field))?;
    let value = expect_number(&value_raw).with_context(|| format!("property '{}'", value_field))?;

    Ok((label, value))
}

/// Sum values per label, in first-seen order.
///
/// ```rust
/// use chartsplice::aggregate::group_sum;
/// use chartsplice::models::PresentationMode;
///
/// let rows = vec![("A".to_string(), 10.0), ("B".to_string(), 5.0), ("A".to_string(), 5.0)];
/// let (labels, values) = group_sum(rows, PresentationMode::Raw);
/// assert_eq!(labels, vec!["A", "B"]);
/// assert_eq!(values, vec![15.0, 5.0]);
/// ```
pub fn group_sum<I>(rows: I, mode: PresentationMode) -> (Vec<String>, Vec<f64>)
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut labels = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut total = 0.0;

    for (label, amount) in rows {
        total += amount;
        match index.get(&label) {
            Some(&i) => sums[i] += amount,
            None => {
                index.insert(label.clone(), labels.len());
                labels.push(label);
                sums.push(amount);
            }
        }
    }

    let values = match mode {
        PresentationMode::Raw => sums,
        PresentationMode::Percentage => sums.into_iter().map(|s| percentage(s, total)).collect(),
    };
    (labels, values)
}

/// `part / total * 100`, rounded to two decimals. Zero when the total is.
fn percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    (part / total * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::models::PropertyRef;

    /// Rows keyed by record id; each row maps property id to a raw item.
    struct FakeSource {
        records: Vec<Record>,
        fields: HashMap<(String, String), Value>,
        fail_query: bool,
        /// Earlier rows answer slower, to scramble completion order.
        stagger: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                records: Vec::new(),
                fields: HashMap::new(),
                fail_query: false,
                stagger: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_row(mut self, id: &str, props: &[(&str, &str, Value)]) -> Self {
            let mut properties = BTreeMap::new();
            for (name, prop_id, value) in props {
                properties.insert(
                    name.to_string(),
                    PropertyRef {
                        id: prop_id.to_string(),
                        kind: value["type"].as_str().unwrap_or_default().to_string(),
                    },
                );
                self.fields
                    .insert((id.to_string(), prop_id.to_string()), value.clone());
            }
            self.records.push(Record {
                id: id.to_string(),
                properties,
            });
            self
        }

        fn expense(self, id: &str, tag: &str, amount: f64) -> Self {
            self.with_row(
                id,
                &[
                    ("Tags", "tg", json!({ "type": "select", "select": { "name": tag } })),
                    ("Amount", "am", json!({ "type": "number", "number": amount })),
                ],
            )
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        async fn query(&self, _database_id: &str) -> Result<Vec<Record>> {
            if self.fail_query {
                anyhow::bail!("connection refused");
            }
            Ok(self.records.clone())
        }

        async fn get_field(&self, record_id: &str, property_id: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stagger {
                let pos = self
                    .records
                    .iter()
                    .position(|r| r.id == record_id)
                    .unwrap_or(0);
                let delay = (self.records.len() - pos) as u64 * 5;
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.fields
                .get(&(record_id.to_string(), property_id.to_string()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 404 for {}/{}", record_id, property_id))
        }

        async fn describe_schema(&self, _database_id: &str) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }
    }

    fn grouped(mode: PresentationMode) -> AggregationRequest {
        AggregationRequest::Grouped {
            database_id: "db".into(),
            group_by: "Tags".into(),
            amount_field: "Amount".into(),
            mode,
        }
    }

    #[test]
    fn test_group_sum_first_seen_order() {
        let rows = vec![
            ("A".to_string(), 10.0),
            ("B".to_string(), 5.0),
            ("A".to_string(), 5.0),
        ];
        let (labels, values) = group_sum(rows, PresentationMode::Raw);
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(values, vec![15.0, 5.0]);
    }

    #[test]
    fn test_group_sum_percentage_rounds() {
        let rows = vec![
            ("A".to_string(), 1.0),
            ("B".to_string(), 1.0),
            ("C".to_string(), 1.0),
        ];
        let (_, values) = group_sum(rows, PresentationMode::Percentage);
        assert_eq!(values, vec![33.33, 33.33, 33.33]);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let samples: Vec<Vec<f64>> = vec![
            vec![10.0, 5.0, 5.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            vec![0.01, 99.99],
            vec![12.34, 56.78, 9.1, 0.5],
        ];
        for amounts in samples {
            let n = amounts.len();
            let rows = amounts
                .into_iter()
                .enumerate()
                .map(|(i, a)| (format!("L{}", i), a));
            let (labels, values) = group_sum(rows, PresentationMode::Percentage);
            assert_eq!(labels.len(), values.len());
            let sum: f64 = values.iter().sum();
            // each value is off by at most half a cent
            assert!((sum - 100.0).abs() <= 0.005 * n as f64 + 1e-9, "sum = {}", sum);
        }
    }

    #[test]
    fn test_percentage_of_zero_total() {
        let rows = vec![("A".to_string(), 0.0), ("B".to_string(), 0.0)];
        let (_, values) = group_sum(rows, PresentationMode::Percentage);
        assert_eq!(values, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_aggregate_grouped_raw() {
        let source = FakeSource::new()
            .expense("r1", "A", 10.0)
            .expense("r2", "B", 5.0)
            .expense("r3", "A", 5.0);

        let result = aggregate(&source, &grouped(PresentationMode::Raw), 4)
            .await
            .unwrap();
        assert_eq!(result.labels, vec!["A", "B"]);
        assert_eq!(result.values, vec![15.0, 5.0]);
        assert_eq!(result.skipped, 0);
    }

    #[tokio::test]
    async fn test_aggregate_skips_bad_rows() {
        let source = FakeSource::new()
            .expense("r1", "A", 30.0)
            .with_row(
                "r2",
                &[
                    ("Tags", "tg", json!({ "type": "select", "select": null })),
                    ("Amount", "am", json!({ "type": "number", "number": 99 })),
                ],
            )
            .with_row(
                "r3",
                &[("Tags", "tg", json!({ "type": "select", "select": { "name": "B" } }))],
            )
            .with_row(
                "r4",
                &[
                    ("Tags", "tg", json!({ "type": "select", "select": { "name": "B" } })),
                    ("Amount", "am", json!({ "type": "rich_text", "rich_text": [] })),
                ],
            )
            .expense("r5", "B", 10.0);

        let result = aggregate(&source, &grouped(PresentationMode::Percentage), 2)
            .await
            .unwrap();
        assert_eq!(result.labels, vec!["A", "B"]);
        assert_eq!(result.values, vec![75.0, 25.0]);
        assert_eq!(result.skipped, 3);
    }

    #[tokio::test]
    async fn test_aggregate_field_fetch_error_skips_row() {
        let mut source = FakeSource::new().expense("r1", "A", 1.0).expense("r2", "B", 2.0);
        source
            .fields
            .remove(&("r2".to_string(), "am".to_string()));

        let result = aggregate(&source, &grouped(PresentationMode::Raw), 1)
            .await
            .unwrap();
        assert_eq!(result.labels, vec!["A"]);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn test_aggregate_query_failure_propagates() {
        let mut source = FakeSource::new().expense("r1", "A", 1.0);
        source.fail_query = true;

        let err = aggregate(&source, &grouped(PresentationMode::Raw), 4)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_preserves_row_order_under_concurrency() {
        let mut source = FakeSource::new();
        for i in 0..8 {
            source = source.with_row(
                &format!("r{}", i),
                &[
                    (
                        "Name",
                        "title",
                        json!({
                            "object": "list",
                            "results": [{ "type": "title", "title": { "plain_text": format!("item {}", i) } }],
                            "property_item": { "type": "title" }
                        }),
                    ),
                    ("Amount", "am", json!({ "type": "number", "number": i })),
                ],
            );
        }
        source.stagger = true;

        let request = AggregationRequest::Direct {
            database_id: "db".into(),
            label_field: "Name".into(),
            value_field: "Amount".into(),
        };
        let result = aggregate(&source, &request, 8).await.unwrap();

        let expected_labels: Vec<String> = (0..8).map(|i| format!("item {}", i)).collect();
        assert_eq!(result.labels, expected_labels);
        assert_eq!(result.values, (0..8).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_request_from_config() {
        let mut config = Config::default();
        config.notion.database_id = "db".into();
        assert!(matches!(
            AggregationRequest::from_config(&config),
            AggregationRequest::Grouped { mode: PresentationMode::Percentage, .. }
        ));

        config.chart.label_field = Some("Name".into());
        assert_eq!(
            AggregationRequest::from_config(&config),
            AggregationRequest::Direct {
                database_id: "db".into(),
                label_field: "Name".into(),
                value_field: "Amount".into(),
            }
        );
    }
}
