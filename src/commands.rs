//! Command implementations behind the `chartsplice` binary.
//!
//! Each `run_*` function builds the HTTP clients it needs from the
//! configuration, performs one operation, and prints its result to stdout.
//! Logs go to stderr.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{aggregate, AggregationRequest};
use crate::chart::ChartSpec;
use crate::config::{Config, Requirements};
use crate::imgur::ImgurHost;
use crate::models::{AggregationResult, ImageReference};
use crate::notion::NotionClient;
use crate::pipeline::{refresh_page, Services};
use crate::quickchart::QuickChartRenderer;
use crate::splice::replace_images;
use crate::traits::{BlockStore, ChartRenderer, DataSource};

/// Full refresh: aggregate, render, re-host, splice.
pub async fn run_refresh(config: &Config, cancel: &CancellationToken) -> Result<()> {
    config.require(Requirements::ALL)?;

    let notion = NotionClient::new(&config.notion, &config.http)?;
    let renderer = QuickChartRenderer::new(&config.quickchart, &config.http)?;
    let host = ImgurHost::new(&config.imgur, &config.http)?;
    let services = Services {
        source: &notion,
        renderer: &renderer,
        host: &host,
        store: &notion,
    };

    let outcome = refresh_page(&services, config, cancel).await?;

    println!("refresh {}", config.notion.page_id);
    println!("  data points: {}", outcome.data.len());
    if outcome.data.skipped > 0 {
        println!("  skipped rows: {}", outcome.data.skipped);
    }
    println!("  image: {}", outcome.image);
    println!("  blocks deleted: {}", outcome.splice.deleted);
    println!("  blocks appended: {}", outcome.splice.appended);
    for warning in &outcome.splice.warnings {
        println!("  warning: {}", warning);
    }
    println!("Success!");
    Ok(())
}

/// Aggregate only and print the data points.
pub async fn run_aggregate(config: &Config) -> Result<()> {
    let data = aggregate_with(config).await?;
    print_data(&data);
    Ok(())
}

/// Aggregate and render, printing the chart URL.
pub async fn run_render(config: &Config) -> Result<()> {
    let data = aggregate_with(config).await?;
    let renderer = QuickChartRenderer::new(&config.quickchart, &config.http)?;
    let chart = renderer
        .render(&ChartSpec::from_config(&config.chart), &data)
        .await?;
    println!("{}", chart);
    Ok(())
}

/// List the column names of the configured database.
pub async fn run_columns(config: &Config) -> Result<()> {
    config.require(Requirements {
        notion: true,
        database: true,
        ..Default::default()
    })?;
    let notion = NotionClient::new(&config.notion, &config.http)?;
    let schema = notion.describe_schema(&config.notion.database_id).await?;

    println!("{:<32} PROPERTY ID", "COLUMN");
    for (name, id) in &schema {
        println!("{:<32} {}", name, id);
    }
    Ok(())
}

/// List the child blocks of the configured page.
pub async fn run_blocks(config: &Config) -> Result<()> {
    config.require(Requirements {
        notion: true,
        page: true,
        ..Default::default()
    })?;
    let notion = NotionClient::new(&config.notion, &config.http)?;
    let blocks = notion
        .list_children(&config.notion.page_id, config.notion.block_page_size)
        .await?;

    println!("{:<4} {:<38} TYPE", "POS", "ID");
    for (i, block) in blocks.iter().enumerate() {
        println!("{:<4} {:<38} {}", i, block.id, block.kind);
    }
    Ok(())
}

/// Splice already-hosted image URLs into the page, skipping rendering.
pub async fn run_replace(config: &Config, urls: Vec<String>) -> Result<()> {
    config.require(Requirements {
        notion: true,
        page: true,
        ..Default::default()
    })?;
    let notion = NotionClient::new(&config.notion, &config.http)?;
    let images: Vec<ImageReference> = urls.into_iter().map(ImageReference).collect();

    let outcome = replace_images(
        &notion,
        &config.notion.page_id,
        &images,
        config.notion.block_page_size,
    )
    .await?;

    println!("replace {}", config.notion.page_id);
    println!("  positions: {:?}", outcome.filled_positions);
    println!("  blocks deleted: {}", outcome.deleted);
    println!("  blocks appended: {}", outcome.appended);
    for warning in &outcome.warnings {
        println!("  warning: {}", warning);
    }
    println!("ok");
    Ok(())
}

async fn aggregate_with(config: &Config) -> Result<AggregationResult> {
    config.require(Requirements {
        notion: true,
        database: true,
        ..Default::default()
    })?;
    let notion = NotionClient::new(&config.notion, &config.http)?;
    aggregate(
        &notion,
        &AggregationRequest::from_config(config),
        config.aggregate.concurrency,
    )
    .await
}

fn print_data(data: &AggregationResult) {
    println!("{:<32} VALUE", "LABEL");
    for (label, value) in data.iter() {
        println!("{:<32} {}", label, value);
    }
    if data.skipped > 0 {
        println!("({} rows skipped)", data.skipped);
    }
}
