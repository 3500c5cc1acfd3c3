//! Half-open time interval arithmetic backing both the routing resolver and
//! response-range merging.
//!
//! Mirrors the semantics of the original's `IntervalTree`-based `Epochs`:
//! intervals are always stored fully merged, with end-to-end adjacency
//! treated as an overlap (`merge_overlaps(strict=False)`). An open-ended
//! ("currently acquiring") endtime is represented internally by the
//! [`crate::time::open_end`] sentinel and only collapsed back to `None` at
//! the `StreamEpoch` boundary.

use crate::time::{open_end, Instant};

/// A single `[start, end)` interval. `end` is never `None` internally --
/// open epochs use the [`open_end`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: Instant,
    pub end: Instant,
}

impl Interval {
    pub fn new(start: Instant, end: Instant) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    fn overlaps_or_touches(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A set of non-overlapping, non-touching-but-merged intervals for one
/// stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Epochs {
    intervals: Vec<Interval>,
}

impl Epochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tuples<I>(tuples: I) -> Self
    where
        I: IntoIterator<Item = (Instant, Option<Instant>)>,
    {
        let mut epochs = Self::new();
        for (start, end) in tuples {
            epochs.insert(start, end.unwrap_or_else(open_end));
        }
        epochs
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn into_intervals(self) -> Vec<Interval> {
        self.intervals
    }

    /// Earliest start across all intervals.
    pub fn begin(&self) -> Option<Instant> {
        self.intervals.first().map(|iv| iv.start)
    }

    /// Latest end across all intervals (`open_end()` if any interval is
    /// open-ended).
    pub fn end(&self) -> Option<Instant> {
        self.intervals.iter().map(|iv| iv.end).max()
    }

    /// Insert `[start, end)`, re-merging overlapping/adjacent intervals.
    pub fn insert(&mut self, start: Instant, end: Instant) {
        self.intervals.push(Interval::new(start, end));
        self.normalize();
    }

    /// Union this set with `other`, re-merging.
    pub fn union_with(&mut self, other: &Epochs) {
        self.intervals.extend(other.intervals.iter().copied());
        self.normalize();
    }

    fn normalize(&mut self) {
        self.intervals.sort_by_key(|iv| (iv.start, iv.end));
        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for iv in self.intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if last.overlaps_or_touches(&iv) => {
                    if iv.end > last.end {
                        last.end = iv.end;
                    }
                }
                _ => merged.push(iv),
            }
        }
        self.intervals = merged;
    }

    /// Split any interval strictly containing `point` into two at that
    /// point. A no-op if `point` falls on an existing boundary or outside
    /// every interval.
    pub fn slice_at(&mut self, point: Instant) {
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        for iv in &self.intervals {
            if point > iv.start && point < iv.end {
                result.push(Interval::new(iv.start, point));
                result.push(Interval::new(point, iv.end));
            } else {
                result.push(*iv);
            }
        }
        self.intervals = result;
    }

    /// Intervals that intersect `[start, end)`, trimmed to that window.
    pub fn overlap(&self, start: Instant, end: Instant) -> Vec<Interval> {
        self.intervals
            .iter()
            .filter_map(|iv| {
                let lo = iv.start.max(start);
                let hi = iv.end.min(end);
                if lo < hi {
                    Some(Interval::new(lo, hi))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Intersect every interval with `[start, end)` (`None` bounds default
    /// to this set's own extrema, i.e. a no-op truncation on that side).
    /// Mirrors `StreamEpochs.modify_with_temporal_constraints`.
    pub fn intersect_with_window(&mut self, start: Option<Instant>, end: Option<Instant>) {
        let lo = start.or_else(|| self.begin());
        let hi = end.or_else(|| self.end());
        let (Some(lo), Some(hi)) = (lo, hi) else {
            self.intervals.clear();
            return;
        };

        self.slice_at(lo);
        self.slice_at(hi);
        self.intervals = self.overlap(lo, hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_fdsn_datetime as t;

    #[test]
    fn adjacent_intervals_merge() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), t("2019-01-02").unwrap());
        e.insert(t("2019-01-02").unwrap(), t("2019-01-03").unwrap());
        assert_eq!(e.len(), 1);
        assert_eq!(e.begin().unwrap(), t("2019-01-01").unwrap());
        assert_eq!(e.end().unwrap(), t("2019-01-03").unwrap());
    }

    #[test]
    fn disjoint_intervals_stay_separate() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), t("2019-01-02").unwrap());
        e.insert(t("2019-01-03").unwrap(), t("2019-01-04").unwrap());
        assert_eq!(e.len(), 2);
    }

    #[test]
    fn slice_at_splits_containing_interval() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), t("2019-01-10").unwrap());
        e.slice_at(t("2019-01-05").unwrap());
        assert_eq!(e.len(), 2);
        let ivs: Vec<_> = e.iter().collect();
        assert_eq!(ivs[0].end, t("2019-01-05").unwrap());
        assert_eq!(ivs[1].start, t("2019-01-05").unwrap());
    }

    #[test]
    fn intersect_with_window_truncates() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), t("2019-01-10").unwrap());
        e.intersect_with_window(Some(t("2019-01-03").unwrap()), Some(t("2019-01-05").unwrap()));
        assert_eq!(e.begin().unwrap(), t("2019-01-03").unwrap());
        assert_eq!(e.end().unwrap(), t("2019-01-05").unwrap());
    }

    #[test]
    fn intersect_drops_non_overlapping_window() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), t("2019-01-02").unwrap());
        e.intersect_with_window(Some(t("2019-03-01").unwrap()), Some(t("2019-04-01").unwrap()));
        assert!(e.is_empty());
    }

    #[test]
    fn open_ended_interval_end_is_open_sentinel() {
        let mut e = Epochs::new();
        e.insert(t("2019-01-01").unwrap(), open_end());
        assert!(e.end().unwrap() == open_end());
    }
}
