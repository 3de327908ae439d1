//! Vocabulary layout helpers
//!
//! Both tokenizer families reserve `0` for padding and `1` for the bar
//! marker, then lay out contiguous id ranges per event type.

use crate::segment::Token;

/// First id available for event ranges
pub const FIRST_EVENT_TOKEN: Token = 2;

/// A contiguous range of token ids for one event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: Token,
    pub len: u32,
}

impl Span {
    pub fn starting_at(offset: Token, len: u32) -> Self {
        Self { offset, len }
    }

    /// Next span, laid out right after this one
    pub fn then(&self, len: u32) -> Self {
        Self::starting_at(self.end(), len)
    }

    /// One past the last id of this span
    pub fn end(&self) -> Token {
        self.offset + self.len
    }

    /// Id of the `index`-th value, clamped to the last id
    pub fn token(&self, index: u32) -> Token {
        self.offset + index.min(self.len.saturating_sub(1))
    }

    pub fn contains(&self, token: Token) -> bool {
        (self.offset..self.end()).contains(&token)
    }
}

/// Quantizes ticks onto a fixed positions-per-beat grid
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    ticks_per_beat: u64,
    positions_per_beat: u64,
}

impl Grid {
    pub fn new(ticks_per_beat: u32, positions_per_beat: u32) -> Self {
        Self {
            ticks_per_beat: u64::from(ticks_per_beat.max(1)),
            positions_per_beat: u64::from(positions_per_beat),
        }
    }

    /// Nearest grid position for a tick offset
    pub fn position(&self, ticks: u32) -> u32 {
        let position = (u64::from(ticks) * self.positions_per_beat + self.ticks_per_beat / 2) / self.ticks_per_beat;
        u32::try_from(position).unwrap_or(u32::MAX)
    }
}

/// Map a MIDI velocity (0..=127) onto `bins` evenly sized bins
pub fn velocity_bin(velocity: u8, bins: u8) -> u32 {
    let bins = u32::from(bins.max(1));
    (u32::from(velocity) * bins / 128).min(bins - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_layout() {
        let first = Span::starting_at(FIRST_EVENT_TOKEN, 10);
        let second = first.then(5);
        assert_eq!(second.offset, 12);
        assert_eq!(second.end(), 17);
        assert!(second.contains(16));
        assert!(!second.contains(17));
        assert_eq!(second.token(99), 16);
    }

    #[test]
    fn test_grid_rounds_to_nearest() {
        let grid = Grid::new(480, 8);
        assert_eq!(grid.position(0), 0);
        assert_eq!(grid.position(480), 8);
        assert_eq!(grid.position(59), 1);
        assert_eq!(grid.position(29), 0);
    }

    #[test]
    fn test_velocity_bins() {
        assert_eq!(velocity_bin(0, 32), 0);
        assert_eq!(velocity_bin(127, 32), 31);
        assert_eq!(velocity_bin(64, 32), 16);
        assert_eq!(velocity_bin(100, 1), 0);
    }
}
