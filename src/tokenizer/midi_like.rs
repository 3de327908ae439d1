//! MIDI-like tokenizer
//!
//! Mirrors the event stream of a MIDI track: `Velocity NoteOn`, `NoteOff`
//! and `TimeShift` tokens, with a `Bar` token inserted at every bar start so
//! the stream can be segmented.

use super::midi::{MidiDocument, Note};
use super::traits::{Tokenizer, TokenizerConfig, TokenizerKind};
use super::vocab::{velocity_bin, Grid, Span, FIRST_EVENT_TOKEN};
use crate::error::{CorpusError, Result};
use crate::segment::{TokenStream, VoiceIndex, VoiceStreams, BAR_TOKEN};

/// Longest single time shift, in beats
const MAX_SHIFT_BEATS: u32 = 4;

/// Event kinds in emission order for events sharing a tick: notes ending on a
/// barline close before the bar marker, notes starting on it open after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Event {
    NoteOff { pitch: u8 },
    Bar,
    NoteOn { pitch: u8, velocity: u8 },
}

pub struct MidiLikeTokenizer {
    pitch_low: u8,
    pitch_high: u8,
    positions_per_beat: u32,
    velocity_bins: u8,
    note_on: Span,
    note_off: Span,
    velocity: Span,
    time_shift: Span,
}

impl MidiLikeTokenizer {
    /// Lay out the vocabulary for `config`, which must be valid
    pub fn new(config: &TokenizerConfig) -> Result<Self> {
        config.validate()?;
        let pitches = u32::from(config.pitch_high - config.pitch_low) + 1;
        let note_on = Span::starting_at(FIRST_EVENT_TOKEN, pitches);
        let note_off = note_on.then(pitches);
        let velocity = note_off.then(u32::from(config.velocity_bins));
        let time_shift = velocity.then(config.positions_per_beat * MAX_SHIFT_BEATS);

        Ok(Self {
            pitch_low: config.pitch_low,
            pitch_high: config.pitch_high,
            positions_per_beat: config.positions_per_beat,
            velocity_bins: config.velocity_bins,
            note_on,
            note_off,
            velocity,
            time_shift,
        })
    }

    fn events(&self, notes: &[Note], bar_ticks: u32, bars: u32) -> Vec<(u32, Event)> {
        let mut events: Vec<(u32, Event)> = (0..bars)
            .map(|bar| (bar.saturating_mul(bar_ticks), Event::Bar))
            .collect();

        for note in notes
            .iter()
            .filter(|n| (self.pitch_low..=self.pitch_high).contains(&n.pitch))
        {
            events.push((
                note.start,
                Event::NoteOn {
                    pitch: note.pitch,
                    velocity: note.velocity,
                },
            ));
            events.push((note.end, Event::NoteOff { pitch: note.pitch }));
        }

        events.sort();
        events
    }

    fn encode_voice(&self, notes: &[Note], grid: Grid, bar_ticks: u32, bars: u32) -> TokenStream {
        let mut stream = Vec::new();
        let mut time = 0u32;

        for (tick, event) in self.events(notes, bar_ticks, bars) {
            let position = grid.position(tick);
            let mut shift = position.saturating_sub(time);
            while shift > 0 {
                let step = shift.min(self.time_shift.len);
                stream.push(self.time_shift.token(step - 1));
                shift -= step;
            }
            time = time.max(position);

            match event {
                Event::Bar => stream.push(BAR_TOKEN),
                Event::NoteOff { pitch } => {
                    stream.push(self.note_off.token(u32::from(pitch - self.pitch_low)));
                }
                Event::NoteOn { pitch, velocity } => {
                    stream.push(self.velocity.token(velocity_bin(velocity, self.velocity_bins)));
                    stream.push(self.note_on.token(u32::from(pitch - self.pitch_low)));
                }
            }
        }

        stream
    }
}

impl Tokenizer for MidiLikeTokenizer {
    fn kind(&self) -> TokenizerKind {
        TokenizerKind::MidiLike
    }

    fn vocab_size(&self) -> usize {
        self.time_shift.end() as usize
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::fixtures::{piano_piece, PieceShape};

    fn tokenizer() -> MidiLikeTokenizer {
        MidiLikeTokenizer::new(&TokenizerConfig::default()).unwrap()
    }

    #[test]
    fn test_one_marker_per_bar() {
        let doc = MidiDocument::parse(&piano_piece(&PieceShape::default())).unwrap();
        for stream in tokenizer().encode(&doc).unwrap().values() {
            assert_eq!(stream.iter().filter(|&&t| t == BAR_TOKEN).count(), 4);
        }
    }

    #[test]
    fn test_event_order() {
        let doc = MidiDocument::parse(&piano_piece(&PieceShape::default())).unwrap();
        let tok = tokenizer();
        let streams = tok.encode(&doc).unwrap();
        let right = &streams[&0];

        // Bar, Velocity, NoteOn(72), one beat shift, NoteOff(72), Velocity, NoteOn(73)
        assert_eq!(right[0], BAR_TOKEN);
        assert_eq!(right[1], tok.velocity.token(velocity_bin(80, 32)));
        assert_eq!(right[2], tok.note_on.token(72 - 21));
        assert_eq!(right[3], tok.time_shift.token(7));
        assert_eq!(right[4], tok.note_off.token(72 - 21));
        assert_eq!(right[6], tok.note_on.token(73 - 21));
    }

    #[test]
    fn test_bar_precedes_notes_on_same_tick() {
        let doc = MidiDocument::parse(&piano_piece(&PieceShape::default())).unwrap();
        let tok = tokenizer();
        let streams = tok.encode(&doc).unwrap();
        let right = &streams[&0];
        // Second bar: shift, NoteOff(75), Bar, Velocity, NoteOn(72)
        let second_bar = right
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == BAR_TOKEN)
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(right[second_bar - 1], tok.note_off.token(75 - 21));
        assert_eq!(right[second_bar + 2], tok.note_on.token(72 - 21));
    }

    #[test]
    fn test_tokens_stay_in_vocab() {
        let doc = MidiDocument::parse(&piano_piece(&PieceShape::default())).unwrap();
        let tok = tokenizer();
        for stream in tok.encode(&doc).unwrap().values() {
            assert!(stream.iter().all(|&t| (t as usize) < tok.vocab_size()));
        }
    }

    #[test]
    fn test_zero_grid_is_an_error() {
        let result = MidiLikeTokenizer::new(&TokenizerConfig {
            positions_per_beat: 0,
            ..TokenizerConfig::default()
        });
        assert!(matches!(result, Err(CorpusError::InvalidConfiguration(_))));
    }
}
