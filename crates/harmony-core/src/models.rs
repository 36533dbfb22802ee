//! Core data models used throughout Harmony Match.
//!
//! These types represent the questionnaire items and instruments supplied by
//! callers, plus the flattened item references that index the similarity
//! matrix and every consumer built on it.

use serde::{Deserialize, Serialize};

/// Language assumed when neither an item nor its instrument carries a tag.
pub const DEFAULT_LANGUAGE: &str = "en";

/// One question or statement within an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_id: Option<String>,
    /// Answer options, e.g. `["Not at all", "Several days"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Item {
    /// Create an item with only its text set.
    pub fn new(question_text: impl Into<String>) -> Self {
        Self {
            question_text: question_text.into(),
            question_no: None,
            instrument_id: None,
            options: Vec::new(),
            language: None,
        }
    }

    /// Builder-style setter for the ordinal number.
    pub fn with_number(mut self, question_no: impl Into<String>) -> Self {
        self.question_no = Some(question_no.into());
        self
    }

    /// Builder-style setter for the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A named questionnaire: an ordered collection of [`Item`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_id: Option<String>,
    #[serde(default)]
    pub instrument_name: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Accepts `questions` as an alias for compatibility with Harmony exports.
    #[serde(alias = "questions")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Instrument {
    /// Create an English instrument from a name and its items.
    pub fn new(instrument_name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            instrument_id: None,
            instrument_name: instrument_name.into(),
            language: default_language(),
            items,
            metadata: None,
        }
    }

    /// Builder-style setter for the instrument id.
    pub fn with_id(mut self, instrument_id: impl Into<String>) -> Self {
        self.instrument_id = Some(instrument_id.into());
        self
    }

    /// Builder-style setter for the instrument language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Label used in crosswalk pair names: the name, else the id, else `"instrument"`.
    pub fn label(&self) -> &str {
        if !self.instrument_name.is_empty() {
            &self.instrument_name
        } else {
            self.instrument_id.as_deref().unwrap_or("instrument")
        }
    }
}

/// A flattened reference to one item, indexed by its matrix row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRef {
    /// Row/column of this item in the similarity matrix.
    pub index: usize,
    /// Position of the owning instrument in the request.
    pub instrument_index: usize,
    pub instrument_id: Option<String>,
    pub instrument_name: String,
    /// The item's `question_no`, else its 1-based position in the instrument.
    pub question_no: String,
    pub question_text: String,
    /// Effective language: the item's tag, else the instrument's.
    pub language: String,
}

/// Flatten instruments into matrix order.
///
/// Row `k` of every matrix built from these instruments corresponds to
/// `flatten_items(instruments)[k]`.
pub fn flatten_items(instruments: &[Instrument]) -> Vec<ItemRef> {
    let mut refs = Vec::with_capacity(total_items(instruments));
    for (instrument_index, instrument) in instruments.iter().enumerate() {
        for (position, item) in instrument.items.iter().enumerate() {
            refs.push(ItemRef {
                index: refs.len(),
                instrument_index,
                instrument_id: item
                    .instrument_id
                    .clone()
                    .or_else(|| instrument.instrument_id.clone()),
                instrument_name: instrument.instrument_name.clone(),
                question_no: item
                    .question_no
                    .clone()
                    .unwrap_or_else(|| (position + 1).to_string()),
                question_text: item.question_text.clone(),
                language: item
                    .language
                    .clone()
                    .unwrap_or_else(|| instrument.language.clone()),
            });
        }
    }
    refs
}

/// Total number of items across all instruments.
pub fn total_items(instruments: &[Instrument]) -> usize {
    instruments.iter().map(|i| i.items.len()).sum()
}
