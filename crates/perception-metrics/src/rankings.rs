//! Competitor and citation rankings.
//!
//! A non-empty precomputed ranking source is the fast path; otherwise counts
//! are derived from the observations. Either way entries are keyed
//! case-insensitively, sorted by count descending, ties in first-seen order.

use std::collections::HashMap;

use perception_core::{CitationSourceRow, CompetitorSourceRow, Observation};
use serde::{Deserialize, Serialize};

use crate::normalizer::Normalizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorRank {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRank {
    /// Aggregation key: the cited domain, trimmed and lowercased.
    pub domain: String,
    pub display_name: String,
    pub count: u64,
}

/// Insertion-ordered counter keyed case-insensitively.
#[derive(Debug, Default)]
struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl Tally {
    fn add(&mut self, label: String, count: u64) {
        let key = label.to_lowercase();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 += count;
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push((label, count));
        }
    }

    fn into_sorted(mut self) -> Vec<(String, u64)> {
        // Stable sort keeps first-seen order among equal counts.
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
    }
}

#[must_use]
pub fn competitor_ranking(
    normalizer: &Normalizer,
    observations: &[Observation],
    entity_name: &str,
    source: &[CompetitorSourceRow],
) -> Vec<CompetitorRank> {
    let mut tally = Tally::default();

    if source.is_empty() {
        for raw in observations.iter().filter_map(|o| o.competitors.as_deref()) {
            for name in normalizer.extract_competitors(raw, entity_name) {
                tally.add(name, 1);
            }
        }
    } else {
        for row in source {
            if let Some(name) = normalizer.normalize_competitor(&row.name, entity_name) {
                tally.add(name, row.count);
            }
        }
    }

    tally
        .into_sorted()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| CompetitorRank { name, count })
        .collect()
}

#[must_use]
pub fn citation_ranking(
    normalizer: &Normalizer,
    observations: &[Observation],
    source: &[CitationSourceRow],
) -> Vec<CitationRank> {
    let mut tally = Tally::default();

    if source.is_empty() {
        for key in observations
            .iter()
            .flat_map(|o| o.citations.iter())
            .filter_map(perception_core::CitationEntry::domain_key)
        {
            tally.add(key, 1);
        }
    } else {
        for row in source {
            let key = row.domain.trim().to_lowercase();
            if !key.is_empty() {
                tally.add(key, row.count);
            }
        }
    }

    tally
        .into_sorted()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(domain, count)| CitationRank {
            display_name: normalizer.display_name(&domain),
            domain,
            count,
        })
        .collect()
}
