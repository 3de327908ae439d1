//! MIDI tokenization
//!
//! Provides the tokenizer capability interface and its implementations:
//! - REMI (bar-relative positions and durations)
//! - MIDI-like (note on/off with time shifts)
//!
//! plus the MIDI document model and the admission filter applied before
//! tokenization.

pub mod midi;
pub mod midi_like;
pub mod remi;
pub mod traits;
pub mod vocab;

#[cfg(test)]
pub(crate) mod fixtures;

pub use midi::{MidiDocument, Note, Rejection, TimeSignature, ValidityFilter};
pub use midi_like::MidiLikeTokenizer;
pub use remi::RemiTokenizer;
pub use traits::{build_tokenizer, Tokenizer, TokenizerConfig, TokenizerKind};
