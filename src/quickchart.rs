//! QuickChart renderer.
//!
//! Turns an [`AggregationResult`] into a chart image URL using the
//! QuickChart service. Two modes are supported:
//!
//! - **`create`**: `POST /chart/create` with the Chart.js config; the
//!   service renders and stores the chart and answers with a short URL.
//!   Any HTTP error or `success: false` fails the run.
//! - **`url`**: encode the config into a `GET /chart?c=...` URL locally.
//!   Nothing is sent; the image is rendered when the URL is fetched.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::chart::ChartSpec;
use crate::config::{HttpConfig, QuickChartConfig};
use crate::models::{AggregationResult, ChartReference};
use crate::traits::ChartRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Create,
    Url,
}

pub struct QuickChartRenderer {
    client: reqwest::Client,
    base_url: String,
    mode: RenderMode,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    url: Option<String>,
}

impl QuickChartRenderer {
    pub fn new(config: &QuickChartConfig, http: &HttpConfig) -> Result<Self> {
        let mode = match config.mode.as_str() {
            "create" => RenderMode::Create,
            "url" => RenderMode::Url,
            other => bail!("Unknown quickchart.mode: '{}'", other),
        };
        let client = reqwest::Client::builder().timeout(http.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mode,
        })
    }

    /// Build a self-contained `GET /chart` URL for the data.
    pub fn chart_url(&self, spec: &ChartSpec, data: &AggregationResult) -> Result<ChartReference> {
        let config = spec.to_chart_config(data).to_string();
        let url = url::Url::parse_with_params(
            &format!("{}/chart", self.base_url),
            &[
                ("c", config),
                ("w", spec.width.to_string()),
                ("h", spec.height.to_string()),
                ("bkg", spec.background.clone()),
                ("f", "png".to_string()),
            ],
        )
        .context("Failed to build QuickChart URL")?;
        Ok(ChartReference(url.to_string()))
    }

    async fn create(&self, spec: &ChartSpec, data: &AggregationResult) -> Result<ChartReference> {
        let body = json!({
            "chart": spec.to_chart_config(data),
            "width": spec.width,
            "height": spec.height,
            "backgroundColor": spec.background,
            "format": "png",
        });

        let resp = self
            .client
            .post(format!("{}/chart/create", self.base_url))
            .json(&body)
            .send()
            .await
            .context("QuickChart request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "QuickChart create failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let created: CreateResponse = resp
            .json()
            .await
            .context("QuickChart create returned invalid JSON")?;
        match created.url {
            Some(url) if created.success => Ok(ChartReference(url)),
            _ => bail!("QuickChart create did not return a chart URL"),
        }
    }
}

#[async_trait]
impl ChartRenderer for QuickChartRenderer {
    async fn render(&self, spec: &ChartSpec, data: &AggregationResult) -> Result<ChartReference> {
        tracing::debug!(chart_type = %spec.chart_type, points = data.len(), mode = ?self.mode, "rendering chart");
        match self.mode {
            RenderMode::Create => self.create(spec, data).await,
            RenderMode::Url => self.chart_url(spec, data),
        }
    }
}
