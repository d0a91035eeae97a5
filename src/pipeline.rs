//! Refresh pipeline orchestration.
//!
//! Runs the four stages in order: aggregate → render → re-host → splice.
//! A failing stage stops the run and no later stage is called. The call
//! returns only after the page has been rewritten.
//!
//! Cancellation is checked before each stage and raced against every stage
//! up to the splice. Once the splice starts deleting blocks it runs to the
//! end, since stopping between delete and append would empty the page.

use anyhow::{bail, Context, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{aggregate, AggregationRequest};
use crate::chart::ChartSpec;
use crate::config::Config;
use crate::models::{AggregationResult, ChartReference, ImageReference};
use crate::splice::{replace_images, SpliceOutcome};
use crate::traits::{BlockStore, ChartRenderer, DataSource, ImageHost};

/// The remote collaborators a refresh talks to.
pub struct Services<'a> {
    pub source: &'a dyn DataSource,
    pub renderer: &'a dyn ChartRenderer,
    pub host: &'a dyn ImageHost,
    pub store: &'a dyn BlockStore,
}

/// Everything a completed refresh produced.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub data: AggregationResult,
    pub chart: ChartReference,
    pub image: ImageReference,
    pub splice: SpliceOutcome,
}

/// Regenerate the chart and splice it into the configured page.
pub async fn refresh_page(
    services: &Services<'_>,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<RefreshOutcome> {
    let request = AggregationRequest::from_config(config);
    let spec = ChartSpec::from_config(&config.chart);
    let page_id = config.notion.page_id.as_str();

    let data = stage(
        cancel,
        "aggregate",
        aggregate(services.source, &request, config.aggregate.concurrency),
    )
    .await?;
    if data.is_empty() {
        tracing::warn!("no data points; rendering an empty chart");
    }

    let chart = stage(cancel, "render", services.renderer.render(&spec, &data))
        .await
        .context("Chart rendering failed")?;
    tracing::info!(chart = %chart, "chart rendered");

    let image = stage(cancel, "upload", services.host.upload(&chart))
        .await
        .context("Image upload failed")?;
    tracing::info!(image = %image, "chart re-hosted");

    if cancel.is_cancelled() {
        bail!("Refresh cancelled before updating page {}", page_id);
    }
    let splice = replace_images(
        services.store,
        page_id,
        std::slice::from_ref(&image),
        config.notion.block_page_size,
    )
    .await?;
    tracing::info!(
        page_id,
        deleted = splice.deleted,
        appended = splice.appended,
        "page updated"
    );

    Ok(RefreshOutcome {
        data,
        chart,
        image,
        splice,
    })
}

/// Run one stage unless the token is (or becomes) cancelled.
async fn stage<T, F>(cancel: &CancellationToken, name: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        bail!("Refresh cancelled before {}", name);
    }
    tracing::debug!(stage = name, "starting stage");
    tokio::select! {
        biased;
        () = cancel.cancelled() => bail!("Refresh cancelled during {}", name),
        result = fut => result,
    }
}
