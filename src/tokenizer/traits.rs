//! Tokenizer trait abstraction
//!
//! Defines the capability interface every tokenizer family implements. The
//! family is chosen once, from configuration, through [`TokenizerKind`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::midi::MidiDocument;
use super::midi_like::MidiLikeTokenizer;
use super::remi::RemiTokenizer;
use crate::error::{CorpusError, Result};
use crate::segment::{Token, VoiceStreams, BAR_TOKEN};

/// Tokenizer family
///
/// Config files name it with the same aliases [`FromStr`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum TokenizerKind {
    /// Bar / Position / Pitch / Velocity / Duration events
    #[default]
    Remi,
    /// NoteOn / NoteOff / TimeShift events with bar markers
    MidiLike,
}

impl TokenizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Remi => "remi",
            Self::MidiLike => "midi-like",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Remi => "Bar-relative positions with explicit note durations",
            Self::MidiLike => "Note on/off events separated by time shifts",
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<TokenizerKind> for &'static str {
    fn from(kind: TokenizerKind) -> Self {
        kind.name()
    }
}

impl TryFrom<String> for TokenizerKind {
    type Error = CorpusError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for TokenizerKind {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "remi" => Ok(Self::Remi),
            "midi-like" | "midilike" | "midi_like" => Ok(Self::MidiLike),
            other => Err(CorpusError::InvalidConfiguration(format!(
                "unknown tokenizer '{}' (expected remi or midi-like)",
                other
            ))),
        }
    }
}

/// Vocabulary parameters shared by the tokenizer families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokenizer family
    pub kind: TokenizerKind,

    /// Lowest pitch kept (inclusive)
    pub pitch_low: u8,

    /// Highest pitch kept (inclusive)
    pub pitch_high: u8,

    /// Time grid resolution: positions per quarter note
    pub positions_per_beat: u32,

    /// Longest representable duration, in beats
    pub max_duration_beats: u32,

    /// Number of velocity bins
    pub velocity_bins: u8,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: TokenizerKind::Remi,
            pitch_low: 21,
            pitch_high: 108,
            positions_per_beat: 8,
            max_duration_beats: 12,
            velocity_bins: 32,
        }
    }
}

impl TokenizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pitch_low > self.pitch_high || self.pitch_high > 127 {
            return Err(CorpusError::InvalidConfiguration(format!(
                "invalid pitch range {}..={}",
                self.pitch_low, self.pitch_high
            )));
        }
        if self.positions_per_beat == 0 || self.max_duration_beats == 0 {
            return Err(CorpusError::InvalidConfiguration(
                "positions_per_beat and max_duration_beats must be positive".to_string(),
            ));
        }
        if self.velocity_bins == 0 || self.velocity_bins > 128 {
            return Err(CorpusError::InvalidConfiguration(format!(
                "velocity_bins must be in 1..=128, got {}",
                self.velocity_bins
            )));
        }
        Ok(())
    }
}

/// Unified trait for tokenizer families
///
/// Implementations turn a parsed document into one token stream per voice.
/// Every stream uses [`Tokenizer::bar_token`] to mark the start of each bar.
pub trait Tokenizer: Send + Sync {
    fn kind(&self) -> TokenizerKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Token id marking the start of a bar
    fn bar_token(&self) -> Token {
        BAR_TOKEN
    }

    /// Total number of token ids this tokenizer can emit
    fn vocab_size(&self) -> usize;

    /// Encode every voice of a document
    fn encode(&self, doc: &MidiDocument) -> Result<VoiceStreams>;
}

/// Build the tokenizer selected by `config.kind`
pub fn build_tokenizer(config: &TokenizerConfig) -> Result<Box<dyn Tokenizer>> {
    Ok(match config.kind {
        TokenizerKind::Remi => Box::new(RemiTokenizer::new(config)?),
        TokenizerKind::MidiLike => Box::new(MidiLikeTokenizer::new(config)?),
    })
}
