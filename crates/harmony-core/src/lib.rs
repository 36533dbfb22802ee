//! # Harmony Core
//!
//! Shared, WASM-safe logic for Harmony Match: item and instrument models,
//! the vectoriser and vector-cache traits, per-language negation, the
//! polarity-aware similarity matrix builder, and the crosswalk and
//! statistics consumers built on top of it.
//!
//! This crate contains no tokio, HTTP clients, filesystem I/O, or other
//! native-only dependencies. Concrete embedding providers live in the
//! `harmony-match` application crate.

pub mod cache;
pub mod crosswalk;
pub mod embedding;
pub mod error;
pub mod matrix;
pub mod models;
pub mod negation;
pub mod stats;

pub use error::MatchError;
