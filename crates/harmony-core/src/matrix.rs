//! Similarity-with-polarity matrix builder.
//!
//! The matrix builder operates entirely through the [`Vectoriser`] and
//! [`VectorCache`] traits. The calling application chooses the provider,
//! owns the cache, and consumes the returned [`MatchResponse`].
//!
//! # Algorithm
//!
//! 1. Flatten instruments into matrix order and reject empty input.
//! 2. Negate each item's text in its language (when negation is enabled).
//! 3. Vectorise raw texts, negated texts and the query in one cached batch.
//! 4. For each unordered pair `i < j`:
//!    - `sim_pos = cos(v_i, v_j)`
//!    - `sim_neg = (cos(v_i', v_j) + cos(v_j', v_i)) / 2`
//!    - report `+sim_pos` if `sim_pos >= sim_neg`, else `-sim_neg`.
//! 5. Write the value to `(i, j)` and `(j, i)`; the diagonal is `1.0`.
//!
//! Any vectorisation error aborts the request; no partial matrix is built.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{vectorise_with_cache, VectorCache};
use crate::embedding::{cosine_similarity, normalise_text, ModelKey, Vectoriser};
use crate::error::MatchError;
use crate::models::{flatten_items, Instrument, ItemRef};
use crate::negation::negate;

/// A square, symmetric matrix of signed similarity scores in `[-1, 1]`.
///
/// Stored row-major; serialises as nested rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<f32>>", try_from = "Vec<Vec<f32>>")]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// The explicit empty matrix returned for requests with no items.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An `n × n` matrix with `1.0` on the diagonal and `0.0` elsewhere.
    pub fn identity(size: usize) -> Self {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
        }
        Self { size, values }
    }

    /// Build from nested rows.
    ///
    /// # Errors
    ///
    /// [`MatchError::ShapeMismatch`] if any row length differs from the row count.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, MatchError> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(MatchError::ShapeMismatch {
                    expected: size,
                    actual: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self { size, values })
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Score at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is out of range.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(i < self.size && j < self.size, "index out of range");
        self.values[i * self.size + j]
    }

    /// Score at `(i, j)`, or `None` when out of range.
    pub fn try_get(&self, i: usize, j: usize) -> Option<f32> {
        (i < self.size && j < self.size).then(|| self.values[i * self.size + j])
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Copy out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        (0..self.size).map(|i| self.row(i).to_vec()).collect()
    }

    /// Iterate the strict upper triangle as `(i, j, score)` with `i < j`.
    pub fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.size).flat_map(move |i| ((i + 1)..self.size).map(move |j| (i, j, self.get(i, j))))
    }

    fn set_pair(&mut self, i: usize, j: usize, value: f32) {
        self.values[i * self.size + j] = value;
        self.values[j * self.size + i] = value;
    }
}

impl From<SimilarityMatrix> for Vec<Vec<f32>> {
    fn from(m: SimilarityMatrix) -> Self {
        m.to_rows()
    }
}

impl TryFrom<Vec<Vec<f32>>> for SimilarityMatrix {
    type Error = MatchError;

    fn try_from(rows: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Probe each item's negation to detect opposite polarity.
    pub is_negate: bool,
    /// Optional free-text query scored against every item.
    pub query: Option<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            is_negate: true,
            query: None,
        }
    }
}

/// The result of one harmonisation request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    /// Flattened items; entry `k` labels matrix row `k`.
    pub items: Vec<ItemRef>,
    pub similarity_with_polarity: SimilarityMatrix,
    /// `cos(query, item_k)` for each item, when a query was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_similarity: Option<Vec<f32>>,
    /// The `(framework, model)` the vectors came from.
    pub model: ModelKey,
}

/// Resolve the signed score for one pair from its two probes.
///
/// `sim_pos = cos(v_i, v_j)`. [`build_matrix`] takes the negation probe in
/// both directions and averages it:
/// `sim_neg = (cos(v_i', v_j) + cos(v_j', v_i)) / 2`, where `v'` is the
/// vector of the item's negated text, so `(i, j)` and `(j, i)` always agree.
///
/// Returns `+sim_pos` unless the negation probe is strictly more similar,
/// in which case the pair is flagged opposite with `-sim_neg`.
pub fn resolve_polarity(sim_pos: f32, sim_neg: f32) -> f32 {
    let value = if sim_neg > sim_pos { -sim_neg } else { sim_pos };
    value.clamp(-1.0, 1.0)
}

/// Build the matrix from item vectors and, optionally, negated-item vectors.
///
/// `negated[k]` must be the vector of item `k`'s negated text. Without
/// negation vectors the result is plain cosine similarity floored at `0.0`.
pub fn build_matrix(vectors: &[Vec<f32>], negated: Option<&[Vec<f32>]>) -> SimilarityMatrix {
    let mut matrix = SimilarityMatrix::identity(vectors.len());

    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let sim_pos = cosine_similarity(&vectors[i], &vectors[j]);
            let value = match negated {
                Some(neg) => {
                    let sim_neg = 0.5
                        * (cosine_similarity(&neg[i], &vectors[j])
                            + cosine_similarity(&neg[j], &vectors[i]));
                    resolve_polarity(sim_pos, sim_neg)
                }
                None => sim_pos.clamp(0.0, 1.0),
            };
            matrix.set_pair(i, j, value);
        }
    }

    matrix
}

/// Matrix builder bound to one vectoriser and a shared cache.
///
/// # Example
///
/// ```rust,ignore
/// let engine = MatchEngine::new(vectoriser, Arc::new(InMemoryVectorCache::new()));
/// let response = engine.match_instruments(&instruments, &MatchOptions::default()).await?;
/// assert!(response.similarity_with_polarity.get(0, 0) > 0.99);
/// ```
#[derive(Clone)]
pub struct MatchEngine {
    vectoriser: Arc<dyn Vectoriser>,
    cache: Arc<dyn VectorCache>,
}

impl MatchEngine {
    pub fn new(vectoriser: Arc<dyn Vectoriser>, cache: Arc<dyn VectorCache>) -> Self {
        Self { vectoriser, cache }
    }

    pub fn model_key(&self) -> &ModelKey {
        self.vectoriser.model_key()
    }

    pub fn cache(&self) -> &Arc<dyn VectorCache> {
        &self.cache
    }

    /// Compute the similarity-with-polarity matrix for `instruments`.
    ///
    /// An empty instrument list yields an empty matrix. A blank query is
    /// treated as no query.
    ///
    /// # Errors
    ///
    /// - [`MatchError::EmptyInput`] for an instrument with no items or an
    ///   item whose text is blank.
    /// - Any vectorisation, count, or dimension error; the request is
    ///   aborted as a whole.
    pub async fn match_instruments(
        &self,
        instruments: &[Instrument],
        options: &MatchOptions,
    ) -> Result<MatchResponse, MatchError> {
        validate_instruments(instruments)?;

        let items = flatten_items(instruments);
        let query = options
            .query
            .as_deref()
            .map(normalise_text)
            .filter(|q| !q.is_empty());

        if items.is_empty() {
            return Ok(MatchResponse {
                items,
                similarity_with_polarity: SimilarityMatrix::empty(),
                query_similarity: query.map(|_| Vec::new()),
                model: self.model_key().clone(),
            });
        }

        let raw: Vec<String> = items.iter().map(|r| normalise_text(&r.question_text)).collect();
        let negated: Vec<String> = if options.is_negate {
            items
                .iter()
                .zip(&raw)
                .map(|(r, text)| normalise_text(&negate(text, &r.language)))
                .collect()
        } else {
            Vec::new()
        };

        if options.is_negate {
            let noops = raw.iter().zip(&negated).filter(|(a, b)| a == b).count();
            debug!(items = raw.len(), noop_negations = noops, "negation probes prepared");
        }

        let mut texts: Vec<String> = Vec::with_capacity(raw.len() * 2 + 1);
        texts.extend(raw.iter().cloned());
        texts.extend(negated.iter().cloned());
        if let Some(q) = &query {
            texts.push(q.clone());
        }

        let mut vectors =
            vectorise_with_cache(self.vectoriser.as_ref(), self.cache.as_ref(), &texts).await?;

        let query_vec = query.as_ref().and_then(|_| vectors.pop());
        let negated_vecs = vectors.split_off(raw.len());
        let item_vecs = vectors;

        let matrix = build_matrix(
            &item_vecs,
            options.is_negate.then_some(negated_vecs.as_slice()),
        );

        let query_similarity = query_vec.map(|q| {
            item_vecs
                .iter()
                .map(|v| cosine_similarity(&q, v))
                .collect::<Vec<_>>()
        });

        info!(
            model = %self.model_key(),
            instruments = instruments.len(),
            items = items.len(),
            negate = options.is_negate,
            "similarity matrix built"
        );

        Ok(MatchResponse {
            items,
            similarity_with_polarity: matrix,
            query_similarity,
            model: self.model_key().clone(),
        })
    }
}

fn validate_instruments(instruments: &[Instrument]) -> Result<(), MatchError> {
    for instrument in instruments {
        if instrument.items.is_empty() {
            return Err(MatchError::EmptyInput(format!(
                "instrument '{}' has no items",
                instrument.label()
            )));
        }
        for (position, item) in instrument.items.iter().enumerate() {
            if item.question_text.trim().is_empty() {
                return Err(MatchError::EmptyInput(format!(
                    "item {} of instrument '{}' has no text",
                    item.question_no
                        .clone()
                        .unwrap_or_else(|| (position + 1).to_string()),
                    instrument.label()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryVectorCache;
    use crate::models::Item;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONCEPTS: &[&[&str]] = &[
        &["nervous", "anxious", "frightened", "worried", "worry"],
        &["calm", "relaxed"],
        &["sad", "depressed", "down"],
        &["happy", "cheerful"],
        &["headaches", "headache"],
        &["eating", "appetite"],
        &["breathe", "breathing"],
        &["bothered", "bother"],
    ];
    const NEGATIONS: &[&str] = &["not", "don't", "doesn't", "didn't", "never", "no"];
    const LEXICAL_DIMS: usize = 8;

    /// Deterministic embedder: concept counts, a negation marker, and a
    /// small hashed bag of words so that no two texts coincide.
    struct ConceptVectoriser {
        key: ModelKey,
        calls: AtomicUsize,
    }

    impl ConceptVectoriser {
        fn new() -> Self {
            Self {
                key: ModelKey::new("test", "concepts"),
                calls: AtomicUsize::new(0),
            }
        }

        fn embed(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; CONCEPTS.len() + 1 + LEXICAL_DIMS];
            for raw in text.split_whitespace() {
                let word: String = raw
                    .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase();
                for (d, words) in CONCEPTS.iter().enumerate() {
                    if words.contains(&word.as_str()) {
                        v[d] += 1.0;
                    }
                }
                if NEGATIONS.contains(&word.as_str()) {
                    v[CONCEPTS.len()] += 1.5;
                }
                let bucket = word
                    .bytes()
                    .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3))
                    as usize
                    % LEXICAL_DIMS;
                v[CONCEPTS.len() + 1 + bucket] += 0.15;
            }
            v
        }
    }

    #[async_trait]
    impl Vectoriser for ConceptVectoriser {
        fn model_key(&self) -> &ModelKey {
            &self.key
        }

        async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::embed(t)).collect())
        }
    }

    struct FailingVectoriser(ModelKey);

    #[async_trait]
    impl Vectoriser for FailingVectoriser {
        fn model_key(&self) -> &ModelKey {
            &self.0
        }

        async fn vectorise(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
            Err(self.0.unavailable("OPENAI_API_KEY environment variable not set"))
        }
    }

    fn engine() -> (MatchEngine, Arc<ConceptVectoriser>) {
        let vectoriser = Arc::new(ConceptVectoriser::new());
        let engine = MatchEngine::new(vectoriser.clone(), Arc::new(InMemoryVectorCache::new()));
        (engine, vectoriser)
    }

    fn instrument(texts: &[&str]) -> Instrument {
        Instrument::new("Test", texts.iter().map(|t| Item::new(*t)).collect())
    }

    #[test]
    fn test_resolve_polarity() {
        assert_eq!(resolve_polarity(0.7, 0.3), 0.7);
        assert_eq!(resolve_polarity(0.4, 0.9), -0.9);
        // Ties go to the stated meaning.
        assert_eq!(resolve_polarity(0.5, 0.5), 0.5);
    }

    #[test]
    fn test_build_matrix_without_negation_floors_at_zero() {
        let vectors = vec![vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.6, 0.8]];
        let m = build_matrix(&vectors, None);
        assert_eq!(m.get(0, 1), 0.0);
        assert!((m.get(0, 2) - 0.6).abs() < 1e-6);
        assert_eq!(m.get(1, 1), 1.0);
    }

    #[test]
    fn test_noop_negation_never_flags_opposite() {
        // Negated vectors identical to the originals: the probe equals sim_pos.
        let vectors = vec![vec![1.0, 0.2], vec![0.3, 1.0], vec![0.9, 0.5]];
        let m = build_matrix(&vectors, Some(&vectors));
        for (_, _, score) in m.upper_triangle() {
            assert!(score >= 0.0);
        }
    }

    #[test]
    fn test_matrix_serde_roundtrip_shape() {
        let m = SimilarityMatrix::identity(2);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,0.0],[0.0,1.0]]");
        let bad: Result<SimilarityMatrix, _> = serde_json::from_str("[[1.0,0.0],[1.0]]");
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_self_similarity_symmetry_and_range() {
        let (engine, _) = engine();
        let instruments = vec![
            instrument(&["I feel nervous", "I feel sad", "I get headaches when I am at school"]),
            instrument(&["I am calm and relaxed", "I feel happy"]),
        ];
        let response = engine
            .match_instruments(&instruments, &MatchOptions::default())
            .await
            .unwrap();
        let m = &response.similarity_with_polarity;

        assert_eq!(m.size(), 5);
        for i in 0..m.size() {
            assert!(m.get(i, i) > 0.99);
            for j in 0..m.size() {
                assert!((m.get(i, j) - m.get(j, i)).abs() < 1e-6);
                assert!((-1.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[tokio::test]
    async fn test_polarity_nervous_example() {
        let (engine, _) = engine();
        let instruments = vec![instrument(&[
            "I feel nervous",
            "I don't feel nervous",
            "I feel anxious",
            "I am calm and relaxed",
        ])];
        let response = engine
            .match_instruments(&instruments, &MatchOptions::default())
            .await
            .unwrap();
        let m = &response.similarity_with_polarity;

        assert!(m.get(0, 1) < 0.0, "negation scored {}", m.get(0, 1));
        assert!(m.get(0, 2) > 0.5, "rephrasing scored {}", m.get(0, 2));
    }

    #[tokio::test]
    async fn test_distinct_topics_are_not_inflated() {
        let (engine, _) = engine();
        let instruments = vec![instrument(&[
            "When I feel frightened, it is hard for me to breathe",
            "I was bothered by things that usually don't bother me.",
            "I get headaches when I am at school",
            "I did not feel like eating; my appetite was poor.",
        ])];
        let response = engine
            .match_instruments(&instruments, &MatchOptions::default())
            .await
            .unwrap();
        let scores: Vec<f32> = response
            .similarity_with_polarity
            .upper_triangle()
            .map(|(_, _, s)| s)
            .collect();

        let mean = scores.iter().sum::<f32>() / scores.len() as f32;
        assert!(mean < 0.85);
        assert!(scores.iter().any(|s| *s < 0.8));
    }

    #[tokio::test]
    async fn test_without_negation_has_no_negative_scores() {
        let (engine, _) = engine();
        let instruments = vec![instrument(&["I feel nervous", "I don't feel nervous"])];
        let options = MatchOptions {
            is_negate: false,
            query: None,
        };
        let response = engine.match_instruments(&instruments, &options).await.unwrap();
        assert!(response.similarity_with_polarity.get(0, 1) > 0.0);
    }

    #[tokio::test]
    async fn test_single_provider_call_and_warm_cache() {
        let (engine, vectoriser) = engine();
        let instruments = vec![instrument(&["I feel nervous", "I feel sad"])];
        let options = MatchOptions {
            is_negate: true,
            query: Some("anxiety".to_string()),
        };

        let cold = engine.match_instruments(&instruments, &options).await.unwrap();
        assert_eq!(vectoriser.calls.load(Ordering::SeqCst), 1);

        let warm = engine.match_instruments(&instruments, &options).await.unwrap();
        assert_eq!(vectoriser.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cold.similarity_with_polarity, warm.similarity_with_polarity);
        assert_eq!(cold.query_similarity, warm.query_similarity);
        assert_eq!(cold.query_similarity.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_empty_request_returns_empty_matrix() {
        let (engine, vectoriser) = engine();
        let response = engine
            .match_instruments(&[], &MatchOptions::default())
            .await
            .unwrap();
        assert!(response.similarity_with_polarity.is_empty());
        assert_eq!(vectoriser.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_instrument_and_blank_text_are_rejected() {
        let (engine, _) = engine();
        let err = engine
            .match_instruments(&[instrument(&[])], &MatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::EmptyInput(_)));

        let err = engine
            .match_instruments(&[instrument(&["I feel sad", "  "])], &MatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::EmptyInput(ref m) if m.contains("item 2")));
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_request() {
        let engine = MatchEngine::new(
            Arc::new(FailingVectoriser(ModelKey::new("openai", "text-embedding-3-large"))),
            Arc::new(InMemoryVectorCache::new()),
        );
        let err = engine
            .match_instruments(&[instrument(&["I feel sad"])], &MatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::ProviderUnavailable { .. }));
        assert!(engine.cache().is_empty());
    }
}
