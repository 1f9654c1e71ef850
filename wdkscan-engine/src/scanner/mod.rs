//! Sliding-window pattern scanner
//!
//! `scan` walks fixed-width windows across a byte payload from offset 0 to
//! `len - width`, left to right, and yields every window the matcher accepts.
//! `scan_stepped` does the same but only tries every `step`th offset; a step
//! equal to the width gives aligned, non-overlapping windows. Both are pure
//! functions of their inputs. Stopping at the first hit is left to the caller.

pub mod matcher;

use bytes::Bytes;

pub use matcher::{Matcher, MatcherKind, MinDistinct, NonUniform, NonZero};

/// Window width used when none is configured
pub const DEFAULT_WIDTH: usize = 5;

/// A window accepted by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit<'a> {
    pub offset: usize,
    pub window: &'a [u8],
}

/// Yield every `width`-byte window of `value` accepted by `matcher`
///
/// Offsets come out strictly ascending. A zero width, or a value shorter
/// than `width`, yields nothing.
pub fn scan<'a, 'm, M>(
    value: &'a [u8],
    width: usize,
    matcher: &'m M,
) -> impl Iterator<Item = Hit<'a>> + 'm
where
    'a: 'm,
    M: Matcher + ?Sized,
{
    scan_stepped(value, width, 1, matcher)
}

/// Like `scan`, but only windows starting at multiples of `step`
///
/// A step of 0 is treated as 1.
pub fn scan_stepped<'a, 'm, M>(
    value: &'a [u8],
    width: usize,
    step: usize,
    matcher: &'m M,
) -> impl Iterator<Item = Hit<'a>> + 'm
where
    'a: 'm,
    M: Matcher + ?Sized,
{
    // slice::windows panics on zero; an empty chunk size yields no windows instead
    let windows = if width == 0 { None } else { Some(value.windows(width)) };
    windows
        .into_iter()
        .flatten()
        .enumerate()
        .step_by(step.max(1))
        .filter(move |(_, window)| matcher.matches(window))
        .map(|(offset, window)| Hit { offset, window })
}

/// A hit attributed to the record it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub key: Bytes,
    pub offset: usize,
    pub window: Bytes,
}

impl Match {
    /// Build a match from a hit inside `value`, sharing the record's buffers
    pub fn from_hit(key: &Bytes, value: &Bytes, hit: &Hit<'_>) -> Self {
        Match {
            key: key.clone(),
            offset: hit.offset,
            window: value.slice(hit.offset..hit.offset + hit.window.len()),
        }
    }

    /// Window as uppercase hex, two digits per byte, no prefix
    pub fn hex(&self) -> String {
        hex::encode_upper(&self.window)
    }

    /// Record key as uppercase hex
    pub fn key_hex(&self) -> String {
        hex::encode_upper(&self.key)
    }
}

impl std::fmt::Display for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.key_hex(), self.offset, self.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets<M: Matcher>(value: &[u8], width: usize, matcher: &M) -> Vec<usize> {
        scan(value, width, matcher).map(|hit| hit.offset).collect()
    }

    #[test]
    fn test_finds_window_after_padding() {
        let value = [0x00, 0x00, 0x00, 0x00, 0x00, 0x3A, 0x3C, 0x6C, 0xCB, 0x6D];
        let hits: Vec<_> = scan(&value, 5, &NonUniform).collect();
        // Every window except the all-zero one at offset 0
        assert_eq!(
            hits.iter().map(|h| h.offset).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(hits.last().unwrap().window, &[0x3Au8, 0x3C, 0x6C, 0xCB, 0x6D][..]);
    }

    #[test]
    fn test_offsets_ascending_and_windows_accepted() {
        let value: Vec<u8> = (0..200u32).map(|n| ((n * 37) % 7) as u8).collect();
        for width in 1..=9 {
            let hits: Vec<_> = scan(&value, width, &MinDistinct(3)).collect();
            assert!(hits.windows(2).all(|pair| pair[0].offset < pair[1].offset));
            for hit in &hits {
                assert_eq!(hit.window.len(), width);
                assert!(hit.offset + width <= value.len());
                assert_eq!(hit.window, &value[hit.offset..hit.offset + width]);
                assert!(MinDistinct(3).matches(hit.window));
            }
        }
    }

    #[test]
    fn test_short_value_yields_nothing() {
        assert!(offsets(&[1, 2, 3, 4], 5, &NonUniform).is_empty());
        assert!(offsets(&[], 5, &NonZero).is_empty());
        assert!(offsets(&[], 1, &NonZero).is_empty());
    }

    #[test]
    fn test_zero_width_yields_nothing() {
        let always = |_: &[u8]| true;
        assert!(offsets(&[1, 2, 3], 0, &always).is_empty());
    }

    #[test]
    fn test_exact_length_value() {
        assert_eq!(offsets(&[1, 2, 3, 4, 5], 5, &NonUniform), vec![0]);
        assert!(offsets(&[1, 1, 1, 1, 1], 5, &NonUniform).is_empty());
    }

    #[test]
    fn test_aligned_windows() {
        let value = [0x00, 0x00, 0x00, 0x00, 0x00, 0x3A, 0x3C, 0x6C, 0xCB, 0x6D];
        let hits: Vec<_> = scan_stepped(&value, 5, 5, &NonUniform).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].offset, 5);

        // Offsets 0, 3, 6; the tail at 9 is too short for a window
        let value = [1u8, 2, 3, 1, 1, 1, 4, 5, 6, 7, 8];
        assert_eq!(
            scan_stepped(&value, 3, 3, &NonUniform)
                .map(|h| h.offset)
                .collect::<Vec<_>>(),
            vec![0, 6]
        );
        assert_eq!(
            scan_stepped(&value, 3, 0, &NonUniform).count(),
            scan(&value, 3, &NonUniform).count()
        );
    }

    #[test]
    fn test_scan_is_repeatable() {
        let value: Vec<u8> = (0..64u8).map(|n| n / 3).collect();
        let first: Vec<_> = scan(&value, 4, &NonUniform).collect();
        let second: Vec<_> = scan(&value, 4, &NonUniform).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dyn_matcher() {
        let kinds: Vec<Box<dyn Matcher>> = vec![Box::new(NonUniform), Box::new(NonZero)];
        let value = [0xFF; 6];
        let counts: Vec<_> = kinds
            .iter()
            .map(|m| scan(&value, 5, m.as_ref()).count())
            .collect();
        assert_eq!(counts, vec![0, 2]);
    }

    #[test]
    fn test_match_hex() {
        let key = Bytes::from_static(b"mkey");
        let value = Bytes::from_static(&[0, 0, 0, 0, 0, 0x3A, 0x3C, 0x6C, 0xCB, 0x6D]);
        let hit = scan(&value, 5, &NonUniform).last().unwrap();
        let m = Match::from_hit(&key, &value, &hit);

        assert_eq!(m.offset, 5);
        assert_eq!(m.hex(), "3A3C6CCB6D");
        assert_eq!(m.key_hex(), "6D6B6579");
        assert_eq!(m.to_string(), "6D6B6579 5 3A3C6CCB6D");

        let short = Match {
            key: Bytes::from_static(&[0x0A, 0x00]),
            offset: 0,
            window: Bytes::from_static(&[0xFF, 0x01]),
        };
        assert_eq!(short.to_string(), "0A00 0 FF01");
    }
}
