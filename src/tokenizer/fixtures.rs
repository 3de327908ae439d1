//! In-memory MIDI fixtures for tests

use midly::{
    num::{u15, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};

pub const TICKS_PER_BEAT: u16 = 480;

/// Shape of a generated piano-style piece
#[derive(Debug, Clone)]
pub struct PieceShape {
    pub bars: u32,
    pub numerator: u8,
    pub with_time_signature: bool,
    /// Number of voices: quarter notes, half notes, whole notes
    pub voices: u8,
}

impl Default for PieceShape {
    fn default() -> Self {
        Self {
            bars: 4,
            numerator: 4,
            with_time_signature: true,
            voices: 2,
        }
    }
}

fn note(channel: u8, delta: u32, pitch: u8, on: bool) -> TrackEvent<'static> {
    let key = u7::new(pitch);
    let message = if on {
        MidiMessage::NoteOn {
            key,
            vel: u7::new(80),
        }
    } else {
        MidiMessage::NoteOff {
            key,
            vel: u7::new(0),
        }
    };
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    }
}

fn end_of_track() -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Repeated notes of `beats_per_note` beats filling `total_beats`
fn voice_track(channel: u8, base_pitch: u8, beats_per_note: u32, total_beats: u32) -> Track<'static> {
    let length = beats_per_note * u32::from(TICKS_PER_BEAT);
    let mut track = Vec::new();
    for i in 0..total_beats / beats_per_note {
        let pitch = base_pitch + (i % 4) as u8;
        track.push(note(channel, 0, pitch, true));
        track.push(note(channel, length, pitch, false));
    }
    track.push(end_of_track());
    track
}

/// Encode a multi-track SMF for `shape`
pub fn piano_piece(shape: &PieceShape) -> Vec<u8> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_BEAT)),
    ));

    let mut conductor: Track<'static> = Vec::new();
    if shape.with_time_signature {
        conductor.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(shape.numerator, 2, 24, 8)),
        });
    }
    conductor.push(end_of_track());
    smf.tracks.push(conductor);

    let total_beats = shape.bars * u32::from(shape.numerator);
    let layout = [(72u8, 1u32), (48, 2), (36, 4)];
    for (channel, &(pitch, beats)) in layout.iter().enumerate().take(usize::from(shape.voices)) {
        smf.tracks.push(voice_track(channel as u8, pitch, beats, total_beats));
    }

    let mut bytes = Vec::new();
    smf.write(&mut bytes).expect("in-memory MIDI write");
    bytes
}
