//! Shared fixtures: a deterministic concept embedder and vectoriser fakes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use harmony_match::harmony_core::embedding::{ModelKey, Vectoriser};
use harmony_match::harmony_core::models::{Instrument, Item};
use harmony_match::harmony_core::MatchError;

const CONCEPTS: &[&[&str]] = &[
    &["nervous", "anxious", "frightened", "worried", "worrying", "worry", "edge"],
    &["calm", "relaxed"],
    &["sad", "depressed", "down", "hopeless"],
    &["happy", "cheerful"],
    &["headaches", "headache"],
    &["eating", "appetite"],
    &["breathe", "breathing"],
    &["bothered", "bother"],
    &["sleep", "sleeping", "asleep"],
];
const NEGATIONS: &[&str] = &["not", "don't", "doesn't", "didn't", "never", "no", "cannot"];
const LEXICAL_DIMS: usize = 8;
pub const DIMS: usize = CONCEPTS.len() + 1 + LEXICAL_DIMS;

/// Concept counts, a strong negation marker, and a light hashed bag of
/// words so distinct sentences never share a vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for raw in text.split_whitespace() {
        let word: String = raw
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
            .to_lowercase();
        if word.is_empty() {
            continue;
        }
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
            .fold(0xcbf29ce484222325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100000001b3)
            }) as usize
            % LEXICAL_DIMS;
        v[CONCEPTS.len() + 1 + bucket] += 0.15;
    }
    v
}

/// In-process vectoriser over [`embed`] that counts provider calls.
pub struct ConceptVectoriser {
    key: ModelKey,
    pub calls: AtomicUsize,
    pub texts_seen: AtomicUsize,
}

impl ConceptVectoriser {
    pub fn new() -> Self {
        Self {
            key: ModelKey::new("test", "concepts"),
            calls: AtomicUsize::new(0),
            texts_seen: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Vectoriser for ConceptVectoriser {
    fn model_key(&self) -> &ModelKey {
        &self.key
    }

    async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed(t)).collect())
    }
}

/// Always fails, as a provider without credentials would.
pub struct FailingVectoriser {
    key: ModelKey,
}

impl FailingVectoriser {
    pub fn new() -> Self {
        Self {
            key: ModelKey::new("openai", "text-embedding-3-large"),
        }
    }
}

#[async_trait]
impl Vectoriser for FailingVectoriser {
    fn model_key(&self) -> &ModelKey {
        &self.key
    }

    async fn vectorise(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        Err(self.key.unavailable("OPENAI_API_KEY environment variable not set"))
    }
}

/// Returns vectors whose length depends on the text, to trigger dimension errors.
pub struct RaggedVectoriser {
    key: ModelKey,
}

impl RaggedVectoriser {
    pub fn new() -> Self {
        Self {
            key: ModelKey::new("test", "ragged"),
        }
    }
}

#[async_trait]
impl Vectoriser for RaggedVectoriser {
    fn model_key(&self) -> &ModelKey {
        &self.key
    }

    async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        Ok(texts.iter().map(|t| vec![1.0; 1 + t.len() % 3]).collect())
    }
}

pub fn instrument(name: &str, texts: &[&str]) -> Instrument {
    Instrument::new(name, texts.iter().map(|t| Item::new(*t)).collect())
}

/// The four-item polarity fixture, as two instruments of two items.
pub fn nervous_instruments() -> Vec<Instrument> {
    vec![
        instrument("A", &["I feel nervous", "I don't feel nervous"]),
        instrument("B", &["I feel anxious", "I am calm and relaxed"]),
    ]
}

pub const INSTRUMENTS_JSON: &str = r#"[
  {
    "instrument_id": "gad7",
    "instrument_name": "GAD-7",
    "items": [
      {"question_no": "1", "question_text": "I feel nervous"},
      {"question_no": "2", "question_text": "I don't feel nervous"}
    ]
  },
  {
    "instrument_name": "Custom",
    "questions": [
      {"question_no": "a", "question_text": "I feel anxious"},
      {"question_no": "b", "question_text": "I am calm and relaxed"}
    ]
  }
]"#;
