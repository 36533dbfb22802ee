//! Harmonisation report statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::MatchError;
use crate::matrix::SimilarityMatrix;
use crate::models::{flatten_items, Instrument};

/// Aggregate figures for one harmonisation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonisationStatistics {
    pub total_items: usize,
    pub total_instruments: usize,
    /// Distinct unordered pairs considered.
    pub candidate_pairs: usize,
    /// Pairs with a positive score at or above the threshold.
    pub successful_matches: usize,
    /// Items that appear in at least one successful match.
    pub items_matched: usize,
    pub unmatched_items: usize,
    /// `items_matched / total_items`, `0.0` when there are no items.
    pub match_rate: f32,
    pub mean_match_score: Option<f32>,
    pub max_match_score: Option<f32>,
    pub per_instrument: Vec<InstrumentStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentStatistics {
    pub instrument_index: usize,
    pub instrument_name: String,
    pub total_items: usize,
    pub items_matched: usize,
    pub match_rate: f32,
}

/// Every unordered pair `(i, j)` with `i < j`, optionally restricted to
/// pairs spanning two instruments.
pub fn candidate_pairs(
    instruments: &[Instrument],
    allow_within_instrument: bool,
) -> Vec<(usize, usize)> {
    let items = flatten_items(instruments);
    let mut pairs = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if allow_within_instrument || items[i].instrument_index != items[j].instrument_index {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Summarise which of `pairs` matched in `matrix`.
///
/// Pairs are deduplicated as unordered pairs. Self-pairs and indices outside
/// the matrix are ignored. A pair counts as matched only when its score is
/// positive and `>= threshold`.
///
/// # Errors
///
/// [`MatchError::ShapeMismatch`] if the matrix size differs from the
/// number of items in `instruments`.
pub fn calculate_harmonisation_statistics(
    matrix: &SimilarityMatrix,
    instruments: &[Instrument],
    pairs: &[(usize, usize)],
    threshold: f32,
) -> Result<HarmonisationStatistics, MatchError> {
    let items = flatten_items(instruments);
    if matrix.size() != items.len() {
        return Err(MatchError::ShapeMismatch {
            expected: items.len(),
            actual: matrix.size(),
        });
    }

    // Unordered, without self-pairs; out-of-range pairs have no score and drop out.
    let distinct: BTreeMap<(usize, usize), f32> = pairs
        .iter()
        .filter(|(i, j)| i != j)
        .filter_map(|&(i, j)| {
            let key = (i.min(j), i.max(j));
            matrix.try_get(key.0, key.1).map(|score| (key, score))
        })
        .collect();

    let mut matched = vec![false; items.len()];
    let mut scores = Vec::new();
    for (&(i, j), &score) in &distinct {
        if score > 0.0 && score >= threshold {
            matched[i] = true;
            matched[j] = true;
            scores.push(score);
        }
    }

    let items_matched = matched.iter().filter(|m| **m).count();
    let per_instrument = instruments
        .iter()
        .enumerate()
        .map(|(idx, instrument)| {
            let (total, hit) = items
                .iter()
                .filter(|r| r.instrument_index == idx)
                .fold((0, 0), |(t, h), r| (t + 1, h + matched[r.index] as usize));
            InstrumentStatistics {
                instrument_index: idx,
                instrument_name: instrument.label().to_string(),
                total_items: total,
                items_matched: hit,
                match_rate: rate(hit, total),
            }
        })
        .collect();

    Ok(HarmonisationStatistics {
        total_items: items.len(),
        total_instruments: instruments.len(),
        candidate_pairs: distinct.len(),
        successful_matches: scores.len(),
        items_matched,
        unmatched_items: items.len() - items_matched,
        match_rate: rate(items_matched, items.len()),
        mean_match_score: (!scores.is_empty())
            .then(|| scores.iter().sum::<f32>() / scores.len() as f32),
        max_match_score: scores.iter().copied().reduce(f32::max),
        per_instrument,
    })
}

fn rate(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}
