//! Runtime configuration.
//!
//! Configuration is assembled once at startup and passed by reference to
//! every component. Values are layered, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file (`--config`),
//! 3. process environment variables.
//!
//! # Example
//!
//! ```toml
//! [notion]
//! database_id = "0f1e..."
//! page_id = "9a8b..."
//!
//! [chart]
//! chart_type = "pie"
//! plot_type = "percentage"
//! group_by = "Tags"
//! amount_field = "Amount"
//! width = 800
//! height = 400
//!
//! [quickchart]
//! mode = "create"
//!
//! [imgur]
//! mode = "url"
//! ```
//!
//! # Environment Variables
//!
//! Secrets are read only from the environment:
//! - `NOTION_API_KEY` (required)
//! - `IMGUR_CLIENT_ID` (required)
//!
//! Deploy-time parameters override the file when set:
//! `NOTION_DATABASE_ID`, `NOTION_PAGE_ID`, `CHART_TYPE`, `PLOT_TYPE`,
//! `GROUP_BY`, `AMOUNT_FIELD`, `LABEL_FIELD`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::models::PresentationMode;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub notion: NotionConfig,
    pub chart: ChartConfig,
    pub quickchart: QuickChartConfig,
    pub imgur: ImgurConfig,
    pub http: HttpConfig,
    pub aggregate: AggregateConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct NotionConfig {
    #[serde(skip)]
    pub api_key: String,
    pub database_id: String,
    pub page_id: String,
    pub base_url: String,
    pub version: String,
    /// Children read from the page in one request (single page only).
    /// At most 99, leaving room for a trailing chart in the one append.
    pub block_page_size: usize,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_id: String::new(),
            page_id: String::new(),
            base_url: default_notion_base_url(),
            version: "2022-06-28".to_string(),
            block_page_size: 50,
        }
    }
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_key", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .field("page_id", &self.page_id)
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("block_page_size", &self.block_page_size)
            .finish()
    }
}

fn default_notion_base_url() -> String {
    "https://api.notion.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartConfig {
    pub chart_type: String,
    /// `percentage` or `raw`.
    pub plot_type: String,
    /// Select property used to bucket rows.
    pub group_by: String,
    /// Number property that is summed (or plotted directly).
    pub amount_field: String,
    /// When set, rows are plotted one-to-one using this title property as
    /// the label instead of being grouped.
    pub label_field: Option<String>,
    pub series_label: String,
    pub width: u32,
    pub height: u32,
    pub background: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            chart_type: "pie".to_string(),
            plot_type: "percentage".to_string(),
            group_by: "Tags".to_string(),
            amount_field: "Amount".to_string(),
            label_field: None,
            series_label: "Amount".to_string(),
            width: 800,
            height: 400,
            background: "transparent".to_string(),
        }
    }
}

impl ChartConfig {
    /// Presentation mode parsed from `plot_type`. Valid after [`load_config`].
    pub fn presentation_mode(&self) -> PresentationMode {
        PresentationMode::parse(&self.plot_type).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuickChartConfig {
    pub base_url: String,
    /// `create` posts the config and gets a hosted URL back; `url` encodes
    /// the config into a GET URL locally.
    pub mode: String,
}

impl Default for QuickChartConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quickchart.io".to_string(),
            mode: "create".to_string(),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ImgurConfig {
    #[serde(skip)]
    pub client_id: String,
    pub base_url: String,
    /// `url` lets the host fetch the chart; `bytes` downloads it first and
    /// uploads base64 content.
    pub mode: String,
}

impl Default for ImgurConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            base_url: "https://api.imgur.com".to_string(),
            mode: "url".to_string(),
        }
    }
}

impl fmt::Debug for ImgurConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImgurConfig")
            .field("client_id", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AggregateConfig {
    /// Property retrievals in flight at once.
    pub concurrency: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Load and validate configuration from an optional file and the process
/// environment.
///
/// When `required` is false a missing file is skipped and defaults are
/// used; when true (the user passed `--config` explicitly) it is an error.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    let config = read_config(path, required)?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`] without validation, for callers that layer more
/// overrides on top and call [`validate`] themselves.
pub fn read_config(path: &Path, required: bool) -> Result<Config> {
    let file = if path.exists() || required {
        Some(path)
    } else {
        None
    };
    read_config_with_env(file, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] but with an injectable environment lookup.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let config = read_config_with_env(path, env)?;
    validate(&config)?;
    Ok(config)
}

fn read_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("NOTION_API_KEY") {
        config.notion.api_key = v;
    }
    if let Some(v) = non_empty("IMGUR_CLIENT_ID") {
        config.imgur.client_id = v;
    }
    if let Some(v) = non_empty("NOTION_DATABASE_ID") {
        config.notion.database_id = v;
    }
    if let Some(v) = non_empty("NOTION_PAGE_ID") {
        config.notion.page_id = v;
    }
    if let Some(v) = non_empty("CHART_TYPE") {
        config.chart.chart_type = v;
    }
    if let Some(v) = non_empty("PLOT_TYPE") {
        config.chart.plot_type = v;
    }
    if let Some(v) = non_empty("GROUP_BY") {
        config.chart.group_by = v;
    }
    if let Some(v) = non_empty("AMOUNT_FIELD") {
        config.chart.amount_field = v;
    }
    if let Some(v) = non_empty("LABEL_FIELD") {
        config.chart.label_field = Some(v);
    }

    Ok(config)
}

/// Check value ranges and enumerations. Called by [`load_config`]; call
/// it after overriding fields of a [`read_config`] result.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chart
    if config.chart.chart_type.trim().is_empty() {
        bail!("chart.chart_type must not be empty");
    }
    if PresentationMode::parse(&config.chart.plot_type).is_none() {
        bail!(
            "Unknown chart.plot_type: '{}'. Must be percentage or raw.",
            config.chart.plot_type
        );
    }
    if config.chart.width == 0 || config.chart.height == 0 {
        bail!("chart.width and chart.height must be > 0");
    }
    if config.chart.amount_field.trim().is_empty() {
        bail!("chart.amount_field must not be empty");
    }
    if config.chart.label_field.is_none() && config.chart.group_by.trim().is_empty() {
        bail!("chart.group_by must not be empty");
    }

    // Validate services
    match config.quickchart.mode.as_str() {
        "create" | "url" => {}
        other => bail!("Unknown quickchart.mode: '{}'. Must be create or url.", other),
    }
    match config.imgur.mode.as_str() {
        "url" | "bytes" => {}
        other => bail!("Unknown imgur.mode: '{}'. Must be url or bytes.", other),
    }
    if !(1..=99).contains(&config.notion.block_page_size) {
        bail!("notion.block_page_size must be in [1, 99]");
    }
    if config.aggregate.concurrency == 0 {
        bail!("aggregate.concurrency must be >= 1");
    }
    if config.http.timeout_secs == 0 {
        bail!("http.timeout_secs must be > 0");
    }

    Ok(())
}

impl Config {
    /// Fail unless the credentials and ids a given command needs are present.
    pub fn require(&self, needs: Requirements) -> Result<()> {
        if needs.notion && self.notion.api_key.is_empty() {
            bail!("NOTION_API_KEY environment variable not set");
        }
        if needs.database && self.notion.database_id.is_empty() {
            bail!("Notion database id not set (NOTION_DATABASE_ID or [notion].database_id)");
        }
        if needs.page && self.notion.page_id.is_empty() {
            bail!("Notion page id not set (NOTION_PAGE_ID or [notion].page_id)");
        }
        if needs.imgur && self.imgur.client_id.is_empty() {
            bail!("IMGUR_CLIENT_ID environment variable not set");
        }
        Ok(())
    }
}

/// What a command needs from the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirements {
    pub notion: bool,
    pub database: bool,
    pub page: bool,
    pub imgur: bool,
}

impl Requirements {
    pub const ALL: Self = Self {
        notion: true,
        database: true,
        page: true,
        imgur: true,
    };
}
