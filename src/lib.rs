//! # Harmony Match
//!
//! Polarity-aware harmonisation of questionnaire items.
//!
//! Harmony Match scores every pair of items across one or more instruments
//! (e.g. GAD-7 and PHQ-9) with a signed similarity: positive for items that
//! ask the same thing, negative for items that ask the opposite. The matrix
//! feeds crosswalk tables and harmonisation statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Instruments │──▶│  harmony-core     │──▶│  Crosswalk   │
//! │   (JSON)    │   │ negate + vectorise│   │  Statistics  │
//! └─────────────┘   │ + polarity matrix │   └──────────────┘
//!                   └────────┬─────────┘
//!                            │ Vectoriser
//!          ┌─────────────────┼─────────────────┐
//!          ▼                 ▼                 ▼
//!     ┌─────────┐     ┌────────────┐     ┌──────────┐
//!     │fastembed│     │OpenAI/Azure│     │  Ollama  │
//!     └─────────┘     └────────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harmony models                                  # list available models
//! harmony negate "I feel nervous"                 # I don't feel nervous
//! harmony match instruments.json --threshold 0.6  # matrix + crosswalk + stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Provider registry and embedding adapters |
//! | [`instruments`] | Instrument file loading |
//! | [`snapshot`] | Vector cache persistence |
//! | [`report`] | Match pipeline and output formats |
//! | [`match_cmd`] | CLI command handlers |

pub mod config;
pub mod embedding;
pub mod instruments;
pub mod match_cmd;
pub mod report;
pub mod snapshot;

pub use harmony_core;
