//! Block splicing: replace a page's image blocks with new images in place.
//!
//! The page's children are read once, a new child list is planned in
//! memory, and the page is rewritten with a destructive replace:
//!
//! ```text
//!   before:  [heading] [image] [paragraph] [image]
//!                         │                   │
//!   images:              r1                  r2
//!                         ▼                   ▼
//!   after:   [heading] [image r1] [paragraph] [image r2]
//! ```
//!
//! # Placement
//!
//! - Every non-image block keeps its position and its payload verbatim.
//! - Existing image positions are the targets, ascending; each consumes
//!   one new image in order.
//! - When the page has no image block, one trailing slot is appended.
//! - More targets than images: the unfilled targets are dropped.
//!   More images than targets: the surplus is not placed. Both are
//!   reported as [`SpliceWarning`]s, not errors.
//!
//! # Commit
//!
//! Every original block is deleted, one awaited call at a time, and only
//! then are the planned children appended in one batch. The replace is not
//! atomic: if the append fails after the deletes succeeded the page is left
//! without those blocks, and the returned error says so.
//!
//! A plan with more than [`MAX_APPEND_CHILDREN`] children is refused
//! before anything is deleted.
//!
//! Only the first page of children (`page_size`) is read; blocks beyond it
//! are neither deleted nor moved, so the new children end up after them.

use anyhow::{bail, Context, Result};

use crate::models::{Block, BlockPayload, ImageReference};
use crate::traits::BlockStore;

/// Most children Notion accepts in one append request.
pub const MAX_APPEND_CHILDREN: usize = 100;

/// A recoverable count mismatch found while planning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpliceWarning {
    /// Image positions left without a new image; they are removed.
    #[error("{} image position(s) had no new image and were removed: {positions:?}", .positions.len())]
    UnfilledSlots { positions: Vec<usize> },
    /// New images with no position to go to; they are not placed.
    #[error("{count} new image(s) had no position and were not placed")]
    UnusedImages { count: usize },
}

/// The in-memory result of planning a splice.
#[derive(Debug, Clone, PartialEq)]
pub struct SplicePlan {
    /// Ids of every fetched block, in page order.
    pub delete_ids: Vec<String>,
    /// The new child list, in order.
    pub children: Vec<BlockPayload>,
    /// Positions (in the original list) that received a new image.
    pub filled_positions: Vec<usize>,
    /// True when the page had no image and a trailing slot was used.
    pub appended_slot: bool,
    pub warnings: Vec<SpliceWarning>,
}

/// Summary of a committed splice.
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceOutcome {
    pub deleted: usize,
    pub appended: usize,
    pub filled_positions: Vec<usize>,
    pub appended_slot: bool,
    pub warnings: Vec<SpliceWarning>,
}

/// Plan the new child list for `blocks` with `images` substituted.
pub fn plan_splice(blocks: &[Block], images: &[ImageReference]) -> SplicePlan {
    let mut delete_ids = Vec::with_capacity(blocks.len());
    let mut targets = Vec::new();
    let mut slots: Vec<Option<BlockPayload>> = Vec::with_capacity(blocks.len() + 1);

    for (i, block) in blocks.iter().enumerate() {
        delete_ids.push(block.id.clone());
        if block.is_image() {
            targets.push(i);
            slots.push(None);
        } else {
            slots.push(Some(block.to_payload()));
        }
    }

    let appended_slot = targets.is_empty();
    if appended_slot {
        targets.push(slots.len());
        slots.push(None);
    }

    let mut filled_positions = Vec::new();
    for (&pos, image) in targets.iter().zip(images) {
        slots[pos] = Some(BlockPayload::external_image(image));
        filled_positions.push(pos);
    }

    let mut warnings = Vec::new();
    if targets.len() > images.len() {
        warnings.push(SpliceWarning::UnfilledSlots {
            positions: targets[images.len()..].to_vec(),
        });
    }
    if images.len() > targets.len() {
        warnings.push(SpliceWarning::UnusedImages {
            count: images.len() - targets.len(),
        });
    }

    SplicePlan {
        delete_ids,
        children: slots.into_iter().flatten().collect(),
        filled_positions,
        appended_slot,
        warnings,
    }
}

/// Replace the image blocks of a page with `images` and commit the result.
pub async fn replace_images(
    store: &dyn BlockStore,
    page_id: &str,
    images: &[ImageReference],
    page_size: usize,
) -> Result<SpliceOutcome> {
    if images.is_empty() {
        bail!("At least one image is required to splice into page {}", page_id);
    }

    let blocks = store
        .list_children(page_id, page_size)
        .await
        .with_context(|| format!("Failed to list children of page {}", page_id))?;

    let plan = plan_splice(&blocks, images);
    if plan.children.len() > MAX_APPEND_CHILDREN {
        bail!(
            "Page {} would need {} children but one append accepts at most {}; nothing was deleted",
            page_id,
            plan.children.len(),
            MAX_APPEND_CHILDREN
        );
    }
    for warning in &plan.warnings {
        tracing::warn!(page_id, "{}", warning);
    }
    tracing::info!(
        page_id,
        existing = blocks.len(),
        images = images.len(),
        positions = ?plan.filled_positions,
        appended_slot = plan.appended_slot,
        "planned block splice"
    );

    commit(store, page_id, &plan).await?;

    Ok(SpliceOutcome {
        deleted: plan.delete_ids.len(),
        appended: plan.children.len(),
        filled_positions: plan.filled_positions,
        appended_slot: plan.appended_slot,
        warnings: plan.warnings,
    })
}

/// Delete every planned id, then append the planned children.
async fn commit(store: &dyn BlockStore, page_id: &str, plan: &SplicePlan) -> Result<()> {
    let total = plan.delete_ids.len();
    for (done, id) in plan.delete_ids.iter().enumerate() {
        store.delete_block(id).await.with_context(|| {
            format!(
                "Failed to delete block {} on page {} ({} of {} already deleted)",
                id, page_id, done, total
            )
        })?;
        tracing::debug!(block_id = %id, "deleted block");
    }

    store
        .append_children(page_id, &plan.children)
        .await
        .with_context(|| {
            format!(
                "Failed to append {} blocks to page {} after deleting {} blocks; the page is missing its content",
                plan.children.len(),
                page_id,
                total
            )
        })?;

    Ok(())
}
