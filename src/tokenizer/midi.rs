//! MIDI document model and admission filter
//!
//! Parses a Standard MIDI File with `midly` into the handful of facts the
//! pipeline needs: tick resolution, time-signature regions, overall length
//! and the notes of every voice.
//!
//! Voices are note-bearing `(track, channel)` pairs, numbered in track order
//! then channel order. For a two-hand piano file this gives voice 0 = right
//! hand, voice 1 = left hand.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CorpusError, Result};

/// Time signature assumed when a file declares none
const DEFAULT_TIME_SIGNATURE: TimeSignature = TimeSignature {
    tick: 0,
    numerator: 4,
    denominator: 4,
};

/// A single sounding note, in absolute ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub start: u32,
    pub end: u32,
    pub pitch: u8,
    pub velocity: u8,
}

impl Note {
    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// A time-signature region starting at `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub tick: u32,
    pub numerator: u8,
    pub denominator: u8,
}

/// Parsed view of a MIDI file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDocument {
    /// Ticks per quarter note
    pub ticks_per_beat: u32,
    /// Time-signature changes in file order
    pub time_signatures: Vec<TimeSignature>,
    /// Latest event tick in any track
    pub max_tick: u32,
    /// Notes per voice, sorted by (start, pitch)
    pub voices: Vec<Vec<Note>>,
}

impl MidiDocument {
    /// Read and parse a MIDI file
    ///
    /// Unreadable or undecodable files are reported as `MalformedPiece` so the
    /// caller can skip them.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CorpusError::MalformedPiece {
            path: path.to_path_buf(),
            reason: format!("unreadable: {}", e),
        })?;
        Self::parse(&bytes).map_err(|reason| CorpusError::MalformedPiece {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse MIDI bytes
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let smf = Smf::parse(bytes).map_err(|e| e.to_string())?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => u32::from(ticks.as_int()),
            Timing::Timecode(..) => return Err("SMPTE timecode timing is not supported".to_string()),
        };
        if ticks_per_beat == 0 {
            return Err("zero ticks per beat".to_string());
        }

        let mut time_signatures = Vec::new();
        let mut max_tick = 0u32;
        let mut voices: BTreeMap<(usize, u8), Vec<Note>> = BTreeMap::new();

        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u32;
            // Open notes per (channel, key), matched first-in first-out
            let mut open: HashMap<(u8, u8), VecDeque<(u32, u8)>> = HashMap::new();

            for event in track {
                tick = tick.saturating_add(event.delta.as_int());
                max_tick = max_tick.max(tick);

                match event.kind {
                    TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_power, _, _)) => {
                        time_signatures.push(TimeSignature {
                            tick,
                            numerator,
                            denominator: 1u8.checked_shl(u32::from(denominator_power)).unwrap_or(0),
                        });
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                open.entry((channel, key.as_int()))
                                    .or_default()
                                    .push_back((tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let pitch = key.as_int();
                                if let Some((start, velocity)) =
                                    open.get_mut(&(channel, pitch)).and_then(VecDeque::pop_front)
                                {
                                    voices.entry((track_index, channel)).or_default().push(Note {
                                        start,
                                        end: tick,
                                        pitch,
                                        velocity,
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
        }

        let voices = voices
            .into_values()
            .map(|mut notes| {
                notes.sort_by_key(|n| (n.start, n.pitch));
                notes
            })
            .collect();

        Ok(Self {
            ticks_per_beat,
            time_signatures,
            max_tick,
            voices,
        })
    }

    /// Time signature governing the bar grid (first declared, else 4/4)
    pub fn primary_time_signature(&self) -> TimeSignature {
        self.time_signatures
            .first()
            .copied()
            .filter(|ts| ts.numerator > 0 && ts.denominator > 0)
            .unwrap_or(DEFAULT_TIME_SIGNATURE)
    }

    /// Length of one bar in ticks
    pub fn bar_ticks(&self) -> u32 {
        let ts = self.primary_time_signature();
        let ticks = u64::from(self.ticks_per_beat) * u64::from(ts.numerator) * 4 / u64::from(ts.denominator);
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }

    /// Tick at which the last note of any voice ends
    pub fn end_tick(&self) -> u32 {
        self.voices
            .iter()
            .flatten()
            .map(|n| n.end)
            .max()
            .unwrap_or(0)
    }

    /// Number of bars needed to hold every note
    pub fn bar_count(&self) -> u32 {
        self.end_tick().div_ceil(self.bar_ticks())
    }

    pub fn note_count(&self) -> usize {
        self.voices.iter().map(Vec::len).sum()
    }
}

/// Why a piece was not admitted
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("time signature {numerator}/{denominator} at tick {tick} (need numerator {required})")]
    TimeSignature {
        tick: u32,
        numerator: u8,
        denominator: u8,
        required: u8,
    },

    #[error("too short: {max_tick} ticks < {min_ticks} required")]
    TooShort { max_tick: u32, min_ticks: u64 },
}

/// Admission checks applied before tokenization
///
/// A piece passes when every time-signature region has `required_numerator`
/// beats per bar and it lasts at least `min_beats` beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityFilter {
    pub required_numerator: u8,
    pub min_beats: u32,
}

impl Default for ValidityFilter {
    fn default() -> Self {
        Self {
            required_numerator: 4,
            min_beats: 10,
        }
    }
}

impl ValidityFilter {
    /// Pure predicate: the same document always gets the same decision
    pub fn check(&self, doc: &MidiDocument) -> std::result::Result<(), Rejection> {
        if let Some(ts) = doc
            .time_signatures
            .iter()
            .find(|ts| ts.numerator != self.required_numerator)
        {
            return Err(Rejection::TimeSignature {
                tick: ts.tick,
                numerator: ts.numerator,
                denominator: ts.denominator,
                required: self.required_numerator,
            });
        }

        let min_ticks = u64::from(self.min_beats) * u64::from(doc.ticks_per_beat);
        if u64::from(doc.max_tick) < min_ticks {
            return Err(Rejection::TooShort {
                max_tick: doc.max_tick,
                min_ticks,
            });
        }

        Ok(())
    }

    pub fn admits(&self, doc: &MidiDocument) -> bool {
        self.check(doc).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::fixtures::{piano_piece, PieceShape};

    #[test]
    fn test_parse_two_voice_piece() {
        let bytes = piano_piece(&PieceShape::default());
        let doc = MidiDocument::parse(&bytes).unwrap();

        assert_eq!(doc.ticks_per_beat, 480);
        assert_eq!(doc.voices.len(), 2);
        assert_eq!(doc.time_signatures.len(), 1);
        assert_eq!(doc.time_signatures[0].numerator, 4);
        assert_eq!(doc.time_signatures[0].denominator, 4);
        // Four bars of quarter notes in the right hand
        assert_eq!(doc.voices[0].len(), 16);
        assert_eq!(doc.voices[0][1].start, 480);
        assert_eq!(doc.voices[0][1].duration(), 480);
        // Half notes in the left hand
        assert_eq!(doc.voices[1].len(), 8);
        assert_eq!(doc.bar_ticks(), 1920);
        assert_eq!(doc.bar_count(), 4);
        assert_eq!(doc.max_tick, 4 * 1920);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(MidiDocument::parse(b"not a midi file").is_err());
    }

    #[test]
    fn test_load_missing_file_is_malformed() {
        let err = MidiDocument::load(Path::new("/nonexistent/piece.mid")).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedPiece { .. }));
    }

    #[test]
    fn test_filter_accepts_common_time() {
        let doc = MidiDocument::parse(&piano_piece(&PieceShape::default())).unwrap();
        assert_eq!(ValidityFilter::default().check(&doc), Ok(()));
    }

    #[test]
    fn test_filter_rejects_triple_meter() {
        let shape = PieceShape {
            numerator: 3,
            ..PieceShape::default()
        };
        let doc = MidiDocument::parse(&piano_piece(&shape)).unwrap();
        let rejection = ValidityFilter::default().check(&doc).unwrap_err();
        assert!(matches!(rejection, Rejection::TimeSignature { numerator: 3, .. }));
    }

    #[test]
    fn test_filter_rejects_short_piece() {
        // Two bars of 4/4 = 8 beats < 10
        let shape = PieceShape {
            bars: 2,
            ..PieceShape::default()
        };
        let doc = MidiDocument::parse(&piano_piece(&shape)).unwrap();
        let rejection = ValidityFilter::default().check(&doc).unwrap_err();
        assert_eq!(
            rejection,
            Rejection::TooShort {
                max_tick: 2 * 1920,
                min_ticks: 4800
            }
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = ValidityFilter::default();
        for bars in [1, 2, 3, 8] {
            let shape = PieceShape {
                bars,
                ..PieceShape::default()
            };
            let doc = MidiDocument::parse(&piano_piece(&shape)).unwrap();
            assert_eq!(filter.check(&doc), filter.check(&doc));
        }
    }

    #[test]
    fn test_missing_time_signature_defaults_to_common_time() {
        let shape = PieceShape {
            with_time_signature: false,
            ..PieceShape::default()
        };
        let doc = MidiDocument::parse(&piano_piece(&shape)).unwrap();
        assert!(doc.time_signatures.is_empty());
        assert_eq!(doc.primary_time_signature().numerator, 4);
        assert!(ValidityFilter::default().admits(&doc));
    }
}
