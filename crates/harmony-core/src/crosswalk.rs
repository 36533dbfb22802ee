//! Crosswalk table generation.
//!
//! A crosswalk lists the item pairs considered equivalent across
//! instruments. Only positive scores qualify: a pair flagged as opposite
//! polarity is never a match, whatever the threshold.

use serde::Serialize;

use crate::error::MatchError;
use crate::matrix::SimilarityMatrix;
use crate::models::{flatten_items, Instrument, ItemRef};

/// Filters applied when selecting crosswalk rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosswalkOptions {
    pub threshold: f32,
    /// Also pair items belonging to the same instrument.
    pub allow_within_instrument: bool,
    /// Keep at most one row per item, chosen greedily by score.
    pub one_to_one: bool,
}

impl Default for CrosswalkOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            allow_within_instrument: false,
            one_to_one: false,
        }
    }
}

/// One matched pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosswalkRow {
    pub pair_name: String,
    pub item_a: ItemRef,
    pub item_b: ItemRef,
    pub match_score: f32,
}

/// Select matched pairs from `matrix`.
///
/// Rows are sorted by descending score, ties by `(i, j)`.
///
/// # Errors
///
/// [`MatchError::ShapeMismatch`] if the matrix size differs from the
/// number of items in `instruments`.
pub fn generate_crosswalk_table(
    instruments: &[Instrument],
    matrix: &SimilarityMatrix,
    options: &CrosswalkOptions,
) -> Result<Vec<CrosswalkRow>, MatchError> {
    let items = flatten_items(instruments);
    if matrix.size() != items.len() {
        return Err(MatchError::ShapeMismatch {
            expected: items.len(),
            actual: matrix.size(),
        });
    }

    let mut candidates: Vec<(usize, usize, f32)> = matrix
        .upper_triangle()
        .filter(|&(i, j, _)| {
            options.allow_within_instrument
                || items[i].instrument_index != items[j].instrument_index
        })
        .filter(|&(_, _, score)| score > 0.0 && score >= options.threshold)
        .collect();

    candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));

    if options.one_to_one {
        let mut used = vec![false; items.len()];
        candidates.retain(|&(i, j, _)| {
            if used[i] || used[j] {
                return false;
            }
            used[i] = true;
            used[j] = true;
            true
        });
    }

    Ok(candidates
        .into_iter()
        .map(|(i, j, score)| CrosswalkRow {
            pair_name: pair_name(instruments, &items[i], &items[j]),
            item_a: items[i].clone(),
            item_b: items[j].clone(),
            match_score: score,
        })
        .collect())
}

/// `"{instrument_a}_{qno_a}_{instrument_b}_{qno_b}"`
fn pair_name(instruments: &[Instrument], a: &ItemRef, b: &ItemRef) -> String {
    format!(
        "{}_{}_{}_{}",
        instruments[a.instrument_index].label(),
        a.question_no,
        instruments[b.instrument_index].label(),
        b.question_no
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn instruments() -> Vec<Instrument> {
        vec![
            Instrument::new("GAD-7", vec![Item::new("Feeling nervous"), Item::new("Worrying")]),
            Instrument::new("PHQ-9", vec![Item::new("Feeling anxious"), Item::new("Not worrying")]),
        ]
    }

    fn matrix() -> SimilarityMatrix {
        SimilarityMatrix::from_rows(vec![
            vec![1.0, 0.6, 0.9, 0.2],
            vec![0.6, 1.0, 0.7, -0.8],
            vec![0.9, 0.7, 1.0, 0.55],
            vec![0.2, -0.8, 0.55, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_cross_instrument_rows_sorted() {
        let rows = generate_crosswalk_table(&instruments(), &matrix(), &CrosswalkOptions::default())
            .unwrap();
        let pairs: Vec<(usize, usize)> = rows.iter().map(|r| (r.item_a.index, r.item_b.index)).collect();
        assert_eq!(pairs, vec![(0, 2), (1, 2)]);
        assert_eq!(rows[0].pair_name, "GAD-7_1_PHQ-9_1");
        assert_eq!(rows[0].match_score, 0.9);
    }

    #[test]
    fn test_negative_pairs_never_match() {
        let options = CrosswalkOptions {
            threshold: -1.0,
            ..Default::default()
        };
        let rows = generate_crosswalk_table(&instruments(), &matrix(), &options).unwrap();
        assert!(rows.iter().all(|r| r.match_score > 0.0));
        assert!(!rows.iter().any(|r| r.item_a.index == 1 && r.item_b.index == 3));
    }

    #[test]
    fn test_within_instrument_pairs() {
        let options = CrosswalkOptions {
            allow_within_instrument: true,
            ..Default::default()
        };
        let rows = generate_crosswalk_table(&instruments(), &matrix(), &options).unwrap();
        assert!(rows.iter().any(|r| r.item_a.index == 0 && r.item_b.index == 1));
        assert!(rows.iter().any(|r| r.item_a.index == 2 && r.item_b.index == 3));
    }

    #[test]
    fn test_one_to_one_is_greedy() {
        let options = CrosswalkOptions {
            threshold: 0.1,
            one_to_one: true,
            ..Default::default()
        };
        let rows = generate_crosswalk_table(&instruments(), &matrix(), &options).unwrap();
        let pairs: Vec<(usize, usize)> = rows.iter().map(|r| (r.item_a.index, r.item_b.index)).collect();
        // (0,2) wins; (1,2) and (0,3) are blocked; (1,3) is negative.
        assert_eq!(pairs, vec![(0, 2)]);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = generate_crosswalk_table(
            &instruments(),
            &SimilarityMatrix::identity(3),
            &CrosswalkOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, MatchError::ShapeMismatch { expected: 4, actual: 3 });
    }
}
