//! MIDI corpus builder library
//!
//! Turns a directory of MIDI files into a flat corpus of bar-aligned,
//! multi-voice token sequences for sequence-model training.

pub mod config;
pub mod dataset;
pub mod error;
pub mod segment;
pub mod store;
pub mod tokenizer;

pub use error::{CorpusError, Result};
