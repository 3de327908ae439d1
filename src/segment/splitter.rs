//! Piece splitter
//!
//! Applies a [`BarSegmenter`] to every voice of a tokenized piece. Voices are
//! segmented independently; alignment is only checked at merge time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BarSegmenter, Segment, VoiceIndex, VoiceStreams};

/// Per-voice segment sequences of one piece
///
/// Serializes as `{"0": [[...], ...], "1": [[...], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitPiece {
    pub voices: BTreeMap<VoiceIndex, Vec<Segment>>,
}

impl SplitPiece {
    pub fn new(voices: BTreeMap<VoiceIndex, Vec<Segment>>) -> Self {
        Self { voices }
    }

    /// Segments of one voice, if present
    pub fn voice(&self, index: VoiceIndex) -> Option<&[Segment]> {
        self.voices.get(&index).map(Vec::as_slice)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Voice indices in ascending order
    pub fn voice_indices(&self) -> Vec<VoiceIndex> {
        self.voices.keys().copied().collect()
    }

    /// Segment count of the first voice
    ///
    /// This is the figure callers aggregate across pieces.
    pub fn segment_count(&self) -> usize {
        self.voices.values().next().map_or(0, Vec::len)
    }

    /// Segment counts of every voice
    pub fn lengths(&self) -> Vec<(VoiceIndex, usize)> {
        self.voices
            .iter()
            .map(|(&voice, segments)| (voice, segments.len()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.values().all(Vec::is_empty)
    }
}

/// Splits every voice of a piece with the same segmenter
#[derive(Debug, Clone, Copy)]
pub struct PieceSplitter {
    segmenter: BarSegmenter,
}

impl PieceSplitter {
    pub fn new(segmenter: BarSegmenter) -> Self {
        Self { segmenter }
    }

    pub fn segmenter(&self) -> &BarSegmenter {
        &self.segmenter
    }

    pub fn split(&self, voices: &VoiceStreams) -> SplitPiece {
        let voices = voices
            .iter()
            .map(|(&voice, stream)| (voice, self.segmenter.segment(stream)))
            .collect();
        SplitPiece { voices }
    }
}
