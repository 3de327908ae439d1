//! Bar Segmenter
//!
//! Cuts one voice's token stream into segments of `bars_per_segment` bars.
//!
//! A window opens on a bar marker and closes on the marker `bars_per_segment`
//! bars later. The emitted segment is the slice strictly between those two
//! markers, so inner markers of multi-bar windows stay in the segment. The
//! closing marker opens the next window.
//!
//! With `m` markers in the stream this yields `(m - 1) / bars_per_segment`
//! segments (zero when `m <= bars_per_segment`).

use super::{Segment, Token};
use crate::error::{CorpusError, Result};

/// Bar event token id shared by the bundled tokenizer vocabularies
pub const BAR_TOKEN: Token = 1;

/// Splits a token stream on bar boundary markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarSegmenter {
    bars_per_segment: usize,
    marker: Token,
}

impl BarSegmenter {
    /// Create a segmenter cutting every `bars_per_segment` bars on `marker`
    pub fn new(bars_per_segment: usize, marker: Token) -> Result<Self> {
        if bars_per_segment == 0 {
            return Err(CorpusError::InvalidConfiguration(
                "bars_per_segment must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            bars_per_segment,
            marker,
        })
    }

    pub fn bars_per_segment(&self) -> usize {
        self.bars_per_segment
    }

    pub fn marker(&self) -> Token {
        self.marker
    }

    /// Segment a stream
    ///
    /// Pure and order-preserving: the same stream always yields the same
    /// segments.
    pub fn segment(&self, stream: &[Token]) -> Vec<Segment> {
        let mut segments = Vec::new();
        // Index of the marker that opened the current window
        let mut window_start: Option<usize> = None;
        let mut bars_in_window = 0;

        for (i, &token) in stream.iter().enumerate() {
            if token != self.marker {
                continue;
            }

            let Some(start) = window_start else {
                window_start = Some(i);
                continue;
            };

            bars_in_window += 1;
            if bars_in_window == self.bars_per_segment {
                segments.push(stream[start + 1..i].to_vec());
                window_start = Some(i);
                bars_in_window = 0;
            }
        }

        segments
    }

    /// Number of bar markers in a stream
    pub fn count_markers(&self, stream: &[Token]) -> usize {
        stream.iter().filter(|&&t| t == self.marker).count()
    }

    /// Number of segments `segment` will return for a stream with `markers` markers
    pub fn expected_segments(&self, markers: usize) -> usize {
        markers.saturating_sub(1) / self.bars_per_segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bars_rejected() {
        let err = BarSegmenter::new(0, BAR_TOKEN).unwrap_err();
        assert!(matches!(err, CorpusError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_single_bar_windows() {
        let segmenter = BarSegmenter::new(1, BAR_TOKEN).unwrap();
        let segments = segmenter.segment(&[0, 1, 2, 1, 3, 4, 1, 5]);
        assert_eq!(segments, vec![vec![2], vec![3, 4]]);
    }

    #[test]
    fn test_custom_marker() {
        let segmenter = BarSegmenter::new(1, 9).unwrap();
        let segments = segmenter.segment(&[9, 1, 1, 9, 2, 9]);
        assert_eq!(segments, vec![vec![1, 1], vec![2]]);
    }

    #[test]
    fn test_expected_segments() {
        let segmenter = BarSegmenter::new(2, BAR_TOKEN).unwrap();
        assert_eq!(segmenter.expected_segments(0), 0);
        assert_eq!(segmenter.expected_segments(2), 0);
        assert_eq!(segmenter.expected_segments(3), 1);
        assert_eq!(segmenter.expected_segments(7), 3);
    }
}
