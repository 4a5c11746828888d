use rangemap::RangeSet;
use std::ops::Range;
use std::time::Duration;

/// Time ranges already available in the demuxer.
///
/// Backed by [`RangeSet`], which merges adjacent and overlapping ranges on
/// insertion, so the stored ranges are always disjoint and ordered.
#[derive(Debug, Clone, Default)]
pub struct BufferedRanges {
    ranges: RangeSet<Duration>,
}

impl BufferedRanges {
    /// No ranges buffered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `[start, end)`. Empty or inverted ranges are ignored.
    pub fn add(&mut self, start: Duration, end: Duration) {
        if start < end {
            self.ranges.insert(start..end);
        }
    }

    /// Whether `time` falls in a buffered range.
    pub fn contains(&self, time: Duration) -> bool {
        self.ranges.contains(&time)
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.ranges.iter().next().is_none()
    }

    /// Number of disjoint ranges.
    pub fn len(&self) -> usize {
        self.ranges.iter().count()
    }

    /// The ranges in ascending order.
    pub fn to_vec(&self) -> Vec<Range<Duration>> {
        self.ranges.iter().cloned().collect()
    }
}
