//! Offset pagination over fixed-size pages, and merging of the extended
//! observation subset into the primary result set.
//!
//! The backend signals the last page by returning fewer rows than the page
//! size. Pages are concatenated in arrival order.

use std::collections::HashSet;
use std::future::Future;

use perception_core::Observation;
use uuid::Uuid;

use crate::error::StoreError;

/// Fetches every page until a short page is returned.
///
/// `fetch_page` receives the zero-based page index. The loop yields to the
/// scheduler between pages so large result sets do not starve other tasks.
///
/// **All-or-nothing semantics**: on any page failure the rows already
/// collected are discarded and the error is returned.
///
/// # Errors
///
/// Propagates the first error from `fetch_page`. Returns
/// [`StoreError::PaginationLimit`] if more than `max_pages` full pages arrive.
pub async fn fetch_all_pages<T, F, Fut>(
    context: &str,
    page_size: u32,
    max_pages: usize,
    mut fetch_page: F,
) -> Result<Vec<T>, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    let mut all: Vec<T> = Vec::new();
    let mut page = 0u32;
    let mut page_count = 0usize;
    let page_len = page_size as usize;

    loop {
        page_count += 1;
        if page_count > max_pages {
            return Err(StoreError::PaginationLimit {
                context: context.to_owned(),
                max_pages,
            });
        }

        if page > 0 {
            tokio::task::yield_now().await;
        }

        let batch = fetch_page(page).await?;
        let is_last = batch.len() < page_len;
        tracing::debug!(context, page, rows = batch.len(), "fetched page");
        all.extend(batch);

        if is_last {
            break;
        }
        page += 1;
    }

    Ok(all)
}

/// Merges the extended subset into the primary observation set.
///
/// - Primary rows are de-duplicated by observation id, first seen wins.
/// - Extended rows are keyed by `(prompt_id, model)`; since pages arrive
///   newest first, the first row seen for a key is the latest one and any
///   later re-collection for the same key is dropped.
/// - Surviving extended rows whose id is already present in the primary set
///   are skipped; the rest are appended in first-seen order.
#[must_use]
pub fn merge_extended(primary: Vec<Observation>, extended: Vec<Observation>) -> Vec<Observation> {
    let mut seen_ids: HashSet<Uuid> = HashSet::with_capacity(primary.len() + extended.len());
    let mut merged: Vec<Observation> = Vec::with_capacity(primary.len() + extended.len());

    for obs in primary {
        if seen_ids.insert(obs.id) {
            merged.push(obs);
        }
    }

    let mut latest_keys: HashSet<(Uuid, String)> = HashSet::new();
    let mut dropped = 0usize;
    for obs in extended {
        if !latest_keys.insert((obs.prompt_id, obs.model.clone())) {
            dropped += 1;
            continue;
        }
        if seen_ids.insert(obs.id) {
            merged.push(obs);
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped duplicate extended observations");
    }

    merged
}
