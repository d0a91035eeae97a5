//! Chart specification and Chart.js config construction.

use serde_json::{json, Value};

use crate::config::ChartConfig;
use crate::models::AggregationResult;

/// Fixed visual settings for a rendered chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// Chart.js chart type (`pie`, `bar`, `doughnut`, ...).
    pub chart_type: String,
    pub series_label: String,
    pub width: u32,
    pub height: u32,
    /// Background color; `transparent` for none.
    pub background: String,
}

impl ChartSpec {
    pub fn from_config(config: &ChartConfig) -> Self {
        Self {
            chart_type: config.chart_type.clone(),
            series_label: config.series_label.clone(),
            width: config.width,
            height: config.height,
            background: config.background.clone(),
        }
    }

    /// Build the Chart.js configuration for the given data.
    ///
    /// ```rust
    /// use chartsplice::chart::ChartSpec;
    /// use chartsplice::models::AggregationResult;
    ///
    /// let spec = ChartSpec {
    ///     chart_type: "pie".into(),
    ///     series_label: "Amount".into(),
    ///     width: 800,
    ///     height: 400,
    ///     background: "transparent".into(),
    /// };
    /// let data = AggregationResult { labels: vec!["A".into()], values: vec![1.0], skipped: 0 };
    /// let cfg = spec.to_chart_config(&data);
    /// assert_eq!(cfg["type"], "pie");
    /// assert_eq!(cfg["data"]["datasets"][0]["label"], "Amount");
    /// ```
    pub fn to_chart_config(&self, data: &AggregationResult) -> Value {
        json!({
            "type": self.chart_type,
            "data": {
                "labels": data.labels,
                "datasets": [{
                    "label": self.series_label,
                    "data": data.values,
                }],
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_defaults() {
        let spec = ChartSpec::from_config(&ChartConfig::default());
        assert_eq!(spec.chart_type, "pie");
        assert_eq!(spec.width, 800);
        assert_eq!(spec.height, 400);
        assert_eq!(spec.background, "transparent");
    }

    #[test]
    fn test_chart_config_carries_labels_and_values() {
        let spec = ChartSpec::from_config(&ChartConfig::default());
        let data = AggregationResult {
            labels: vec!["Food".into(), "Rent".into()],
            values: vec![25.0, 75.0],
            skipped: 0,
        };
        let cfg = spec.to_chart_config(&data);
        assert_eq!(cfg["data"]["labels"], json!(["Food", "Rent"]));
        assert_eq!(cfg["data"]["datasets"][0]["data"], json!([25.0, 75.0]));
    }
}
