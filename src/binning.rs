//! # Hierarchical binning
//!
//! The coordinate space of every reference sequence is partitioned by a fixed
//! six-level tree of bins. Level 0 is a single bin covering 512 Mbp; each
//! further level splits every bin of the level above into eight.
//!
//! | Level | Shift | Bin size | First id | Last id |
//! |-------|-------|----------|----------|---------|
//! | 0     | 29    | 512 Mbp  | 0        | 0       |
//! | 1     | 26    | 64 Mbp   | 1        | 8       |
//! | 2     | 23    | 8 Mbp    | 9        | 72      |
//! | 3     | 20    | 1 Mbp    | 73       | 584     |
//! | 4     | 17    | 128 Kbp  | 585      | 4680    |
//! | 5     | 14    | 16 Kbp   | 4681     | 37448   |

/// Shift of the finest binning level (16 Kbp bins)
pub const MIN_SHIFT: u32 = 14;

/// Number of levels below the root bin
pub const DEPTH: u32 = 5;

/// Exclusive upper bound of indexable coordinates (512 Mbp)
pub const MAX_POSITION: u32 = 1 << (MIN_SHIFT + 3 * DEPTH);

/// Size of a single linear index window in bases
pub const WINDOW_SIZE: u32 = 1 << MIN_SHIFT;

/// Number of bins in the scheme (exclusive upper bound of bin ids)
pub const MAX_BIN: u32 = ((1 << (3 * (DEPTH + 1))) - 1) / 7;

/// First bin id of the level whose bins span `1 << shift` bases
fn level_base(shift: u32) -> u32 {
    ((1 << (MIN_SHIFT + 3 * DEPTH - shift)) - 1) / 7
}

/// Returns the smallest bin fully containing the half-open interval `[begin, end)`
///
/// Intervals that do not fit within any 64 Mbp bin, or that reach past
/// [`MAX_POSITION`], are assigned to the root bin 0. An empty interval is
/// treated as covering the single base at `begin`.
///
/// # Examples
///
/// ```rust
/// use bamdex::binning::bin_for;
///
/// assert_eq!(bin_for(0, 100), 4681);
/// assert_eq!(bin_for(16_000, 17_000), 585);
/// assert_eq!(bin_for(0, 1 << 29), 0);
/// ```
#[must_use]
pub fn bin_for(begin: u32, end: u32) -> u32 {
    let last = end.max(begin.saturating_add(1)) - 1;
    if last >= MAX_POSITION {
        return 0;
    }
    let mut shift = MIN_SHIFT;
    while shift < MIN_SHIFT + 3 * DEPTH {
        if begin >> shift == last >> shift {
            return level_base(shift) + (begin >> shift);
        }
        shift += 3;
    }
    0
}

/// Returns every bin that may hold records overlapping `[start, end)`
///
/// The root bin is always included for a non-empty interval. Coordinates are
/// clamped to `[0, MAX_POSITION - 1]`; an empty interval yields no bins. The
/// returned ids are ascending and unique.
///
/// # Examples
///
/// ```rust
/// use bamdex::binning::{bin_for, bins_overlapping};
///
/// let bins = bins_overlapping(19_000, 21_000);
/// assert_eq!(bins, vec![0, 1, 9, 73, 585, 4682]);
/// assert!(bins.contains(&bin_for(20_000, 20_050)));
/// ```
#[must_use]
pub fn bins_overlapping(start: u32, end: u32) -> Vec<u32> {
    if start >= end {
        return Vec::new();
    }
    let start = start.min(MAX_POSITION - 1);
    let last = (end - 1).min(MAX_POSITION - 1);

    let mut bins = vec![0];
    let mut shift = MIN_SHIFT + 3 * (DEPTH - 1);
    loop {
        let base = level_base(shift);
        bins.extend((base + (start >> shift))..=(base + (last >> shift)));
        if shift == MIN_SHIFT {
            break;
        }
        shift -= 3;
    }
    bins
}

/// Linear index window holding `position`
#[must_use]
pub fn window_for(position: u32) -> usize {
    (position >> MIN_SHIFT) as usize
}
