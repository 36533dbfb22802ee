//! The `harmony match` pipeline and its output formats.
//!
//! Runs the matrix builder, then derives the crosswalk and statistics from
//! the same matrix so the three views always agree.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use harmony_core::crosswalk::{generate_crosswalk_table, CrosswalkOptions, CrosswalkRow};
use harmony_core::embedding::ModelKey;
use harmony_core::matrix::{MatchEngine, MatchOptions, SimilarityMatrix};
use harmony_core::models::{Instrument, ItemRef};
use harmony_core::stats::{
    calculate_harmonisation_statistics, candidate_pairs, HarmonisationStatistics,
};
use serde::Serialize;

use crate::config::MatchingConfig;

/// Everything one `harmony match` run produces.
#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub generated_at: DateTime<Utc>,
    pub model: ModelKey,
    pub threshold: f32,
    pub items: Vec<ItemRef>,
    pub matrix: SimilarityMatrix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_similarity: Option<Vec<f32>>,
    pub crosswalk: Vec<CrosswalkRow>,
    pub statistics: HarmonisationStatistics,
}

/// Settings for one run: config defaults with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub query: Option<String>,
    pub negate: bool,
    pub crosswalk: CrosswalkOptions,
}

impl From<&MatchingConfig> for RunOptions {
    fn from(matching: &MatchingConfig) -> Self {
        Self {
            query: None,
            negate: matching.negate,
            crosswalk: CrosswalkOptions {
                threshold: matching.threshold,
                allow_within_instrument: matching.allow_within_instrument,
                one_to_one: matching.one_to_one,
            },
        }
    }
}

/// Build the matrix, crosswalk and statistics for `instruments`.
pub async fn run_match(
    engine: &MatchEngine,
    instruments: &[Instrument],
    options: &RunOptions,
) -> Result<MatchReport> {
    let response = engine
        .match_instruments(
            instruments,
            &MatchOptions {
                is_negate: options.negate,
                query: options.query.clone(),
            },
        )
        .await?;

    let matrix = response.similarity_with_polarity;
    let crosswalk = generate_crosswalk_table(instruments, &matrix, &options.crosswalk)?;
    let pairs = candidate_pairs(instruments, options.crosswalk.allow_within_instrument);
    let statistics = calculate_harmonisation_statistics(
        &matrix,
        instruments,
        &pairs,
        options.crosswalk.threshold,
    )?;

    tracing::info!(
        matches = crosswalk.len(),
        match_rate = statistics.match_rate,
        "harmonisation complete"
    );

    Ok(MatchReport {
        generated_at: Utc::now(),
        model: response.model,
        threshold: options.crosswalk.threshold,
        items: response.items,
        matrix,
        query: response.query_similarity.as_ref().and(options.query.clone()),
        query_similarity: response.query_similarity,
        crosswalk,
        statistics,
    })
}

/// Pretty-printed JSON.
pub fn render_json(report: &MatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Human-readable text: items, matrix, crosswalk, then statistics.
pub fn render_table(report: &MatchReport) -> String {
    let mut out = String::new();
    let stats = &report.statistics;

    let _ = writeln!(out, "Harmony — Match Report");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Model:       {}", report.model);
    let _ = writeln!(out, "  Generated:   {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "  Threshold:   {:.2}", report.threshold);
    let _ = writeln!(out);

    let _ = writeln!(out, "  Items:");
    let _ = writeln!(out, "  {:>4}  {:<16} {:>4}  {}", "#", "INSTRUMENT", "NO", "TEXT");
    let _ = writeln!(out, "  {}", "-".repeat(76));
    for item in &report.items {
        let query = report
            .query_similarity
            .as_ref()
            .and_then(|q| q.get(item.index))
            .map(|s| format!("  [query {:+.3}]", s))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:>4}  {:<16} {:>4}  {}{}",
            item.index,
            truncate(&item.instrument_name, 16),
            item.question_no,
            truncate(&item.question_text, 48),
            query
        );
    }

    if !report.matrix.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Similarity with polarity:");
        let header: String = (0..report.matrix.size()).map(|j| format!("{:>7}", j)).collect();
        let _ = writeln!(out, "  {:>4} {}", "", header);
        for i in 0..report.matrix.size() {
            let row: String = report.matrix.row(i).iter().map(|v| format!("{:>7.3}", v)).collect();
            let _ = writeln!(out, "  {:>4} {}", i, row);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  Crosswalk ({} matches):", report.crosswalk.len());
    if !report.crosswalk.is_empty() {
        let _ = writeln!(out, "  {:<32} {:>7}  {}", "PAIR", "SCORE", "ITEMS");
        let _ = writeln!(out, "  {}", "-".repeat(76));
        for row in &report.crosswalk {
            let _ = writeln!(
                out,
                "  {:<32} {:>7.3}  {} ↔ {}",
                truncate(&row.pair_name, 32),
                row.match_score,
                truncate(&row.item_a.question_text, 18),
                truncate(&row.item_b.question_text, 18)
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  Statistics:");
    let _ = writeln!(out, "    Items:            {} in {} instruments", stats.total_items, stats.total_instruments);
    let _ = writeln!(out, "    Candidate pairs:  {}", stats.candidate_pairs);
    let _ = writeln!(out, "    Matches:          {}", stats.successful_matches);
    let _ = writeln!(
        out,
        "    Items matched:    {} / {} ({:.0}%)",
        stats.items_matched,
        stats.total_items,
        stats.match_rate * 100.0
    );
    if let (Some(mean), Some(max)) = (stats.mean_match_score, stats.max_match_score) {
        let _ = writeln!(out, "    Score:            mean {:.3}, max {:.3}", mean, max);
    }
    for inst in &stats.per_instrument {
        let _ = writeln!(
            out,
            "    {:<16} {} / {} matched ({:.0}%)",
            truncate(&inst.instrument_name, 16),
            inst.items_matched,
            inst.total_items,
            inst.match_rate * 100.0
        );
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
