//! REMI-style tokenizer
//!
//! Each bar starts with a `Bar` token. Notes follow as
//! `Position Pitch Velocity Duration`, with `Position` omitted when several
//! notes share an onset.

use super::midi::{MidiDocument, Note};
use super::traits::{Tokenizer, TokenizerConfig, TokenizerKind};
use super::vocab::{velocity_bin, Grid, Span, FIRST_EVENT_TOKEN};
use crate::error::{CorpusError, Result};
use crate::segment::{TokenStream, VoiceIndex, VoiceStreams, BAR_TOKEN};

/// Longest bar the position range covers (a 4/2 bar)
const MAX_BAR_BEATS: u32 = 8;

pub struct RemiTokenizer {
    pitch_low: u8,
    pitch_high: u8,
    positions_per_beat: u32,
    velocity_bins: u8,
    position: Span,
    pitch: Span,
    velocity: Span,
    duration: Span,
}

impl RemiTokenizer {
    /// Lay out the vocabulary for `config`, which must be valid
    pub fn new(config: &TokenizerConfig) -> Result<Self> {
        config.validate()?;
        let position = Span::starting_at(FIRST_EVENT_TOKEN, config.positions_per_beat * MAX_BAR_BEATS);
        let pitch = position.then(u32::from(config.pitch_high - config.pitch_low) + 1);
        let velocity = pitch.then(u32::from(config.velocity_bins));
        let duration = velocity.then(config.max_duration_beats * config.positions_per_beat);

        Ok(Self {
            pitch_low: config.pitch_low,
            pitch_high: config.pitch_high,
            positions_per_beat: config.positions_per_beat,
            velocity_bins: config.velocity_bins,
            position,
            pitch,
            velocity,
            duration,
        })
    }

    fn encode_voice(&self, notes: &[Note], grid: Grid, bar_ticks: u32, bars: u32) -> TokenStream {
        let mut stream = Vec::with_capacity(bars as usize + notes.len() * 4);
        let mut notes = notes
            .iter()
            .filter(|n| (self.pitch_low..=self.pitch_high).contains(&n.pitch))
            .peekable();

        for bar in 0..bars {
            stream.push(BAR_TOKEN);
            let bar_start = bar.saturating_mul(bar_ticks);
            let bar_end = bar_start.saturating_add(bar_ticks);
            let mut onset = None;

            while let Some(note) = notes.next_if(|n| n.start < bar_end) {
                let position = grid.position(note.start.saturating_sub(bar_start));
                if onset != Some(position) {
                    stream.push(self.position.token(position));
                    onset = Some(position);
                }
                stream.push(self.pitch.token(u32::from(note.pitch - self.pitch_low)));
                stream.push(self.velocity.token(velocity_bin(note.velocity, self.velocity_bins)));
                let duration = grid.position(note.duration()).max(1);
                stream.push(self.duration.token(duration - 1));
            }
        }

        stream
    }
}

impl Tokenizer for RemiTokenizer {
    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Remi
    }

    fn vocab_size(&self) -> usize {
        self.duration.end() as usize
    }

    fn encode(&self, doc: &MidiDocument) -> Result<VoiceStreams> {
        let grid = Grid::new(doc.ticks_per_beat, self.positions_per_beat);
        let bar_ticks = doc.bar_ticks();
        let bars = doc.bar_count();

        doc.voices
            .iter()
            .enumerate()
            .map(|(index, notes)| {
                let voice = VoiceIndex::try_from(index).map_err(|_| {
                    CorpusError::InvalidConfiguration(format!("too many voices ({})", doc.voices.len()))
                })?;
                Ok((voice, self.encode_voice(notes, grid, bar_ticks, bars)))
            })
            .collect()
    }
}
