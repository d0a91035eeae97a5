//! Service traits at the seams of the refresh pipeline.
//!
//! Each remote collaborator is reached through one trait so the pipeline
//! can run against the real HTTP clients or against in-memory doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌───────────┐   ┌────────────┐
//! │ DataSource │──▶│ ChartRenderer │──▶│ ImageHost │──▶│ BlockStore │
//! │  (Notion)  │   │ (QuickChart)  │   │  (Imgur)  │   │  (Notion)  │
//! └────────────┘   └───────────────┘   └───────────┘   └────────────┘
//! ```
//!
//! Built-in implementations:
//!
//! | Trait | Implementation |
//! |-------|----------------|
//! | [`DataSource`] | [`NotionClient`](crate::notion::NotionClient) |
//! | [`BlockStore`] | [`NotionClient`](crate::notion::NotionClient) |
//! | [`ChartRenderer`] | [`QuickChartRenderer`](crate::quickchart::QuickChartRenderer) |
//! | [`ImageHost`] | [`ImgurHost`](crate::imgur::ImgurHost) |

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::chart::ChartSpec;
use crate::models::{AggregationResult, Block, BlockPayload, ChartReference, ImageReference, Record};

// ═══════════════════════════════════════════════════════════════════════
// DataSource Trait
// ═══════════════════════════════════════════════════════════════════════

/// A remote tabular data source (one page of rows per query).
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Return the rows of a database. Only the first page is read.
    async fn query(&self, database_id: &str) -> Result<Vec<Record>>;

    /// Retrieve one property of one row as a raw property item.
    ///
    /// The payload is decoded by [`crate::decode`]; implementations do not
    /// interpret it.
    async fn get_field(&self, record_id: &str, property_id: &str) -> Result<Value>;

    /// Map each column name of a database to its property id.
    async fn describe_schema(&self, database_id: &str) -> Result<BTreeMap<String, String>>;
}

// ═══════════════════════════════════════════════════════════════════════
// BlockStore Trait
// ═══════════════════════════════════════════════════════════════════════

/// A remote store of ordered page children.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// List up to `page_size` children of a page, in order.
    async fn list_children(&self, page_id: &str, page_size: usize) -> Result<Vec<Block>>;

    /// Delete (archive) a single block.
    async fn delete_block(&self, block_id: &str) -> Result<()>;

    /// Append children to the end of a page in one batch.
    async fn append_children(&self, page_id: &str, children: &[BlockPayload]) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════
// ChartRenderer Trait
// ═══════════════════════════════════════════════════════════════════════

/// A remote chart-image renderer.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render the data and return a (possibly short-lived) image URL.
    async fn render(&self, spec: &ChartSpec, data: &AggregationResult) -> Result<ChartReference>;
}

// ═══════════════════════════════════════════════════════════════════════
// ImageHost Trait
// ═══════════════════════════════════════════════════════════════════════

/// A remote image host that turns a chart URL into a durable one.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, chart: &ChartReference) -> Result<ImageReference>;
}
