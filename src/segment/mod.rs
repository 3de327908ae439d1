//! Bar-aligned segmentation of token streams
//!
//! Turns per-voice token streams into fixed-length segments, cut on bar
//! boundary markers.
//!
//! ```rust,ignore
//! use segment::{BarSegmenter, PieceSplitter, BAR_TOKEN};
//!
//! let segmenter = BarSegmenter::new(8, BAR_TOKEN)?;
//! let piece = PieceSplitter::new(segmenter).split(&voices);
//! ```
//!
//! ## Boundary Policy
//!
//! - Tokens before the first marker are never emitted
//! - A segment holds the tokens strictly between its opening and closing marker
//! - A trailing partial window is dropped

pub mod segmenter;
pub mod splitter;


use std::collections::BTreeMap;

/// Token id produced by a tokenizer
pub type Token = u32;

/// Voice (track) index within a piece: 0 = melody, 1 = accompaniment, ...
pub type VoiceIndex = u8;

/// One voice's full token stream for a piece
pub type TokenStream = Vec<Token>;

/// Token streams of every voice of a piece
pub type VoiceStreams = BTreeMap<VoiceIndex, TokenStream>;

/// Tokens of exactly one bar-aligned window
pub type Segment = Vec<Token>;

pub use segmenter::{BarSegmenter, BAR_TOKEN};
pub use splitter::{PieceSplitter, SplitPiece};
