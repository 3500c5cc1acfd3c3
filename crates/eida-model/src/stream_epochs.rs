use std::cmp::Ordering;

use chrono::Duration;

use crate::epoch::Epochs;
use crate::stream::Stream;
use crate::stream_epoch::StreamEpoch;
use crate::time::Instant;

/// Multiple non-overlapping time windows for one stream.
#[derive(Debug, Clone)]
pub struct StreamEpochs {
    pub stream: Stream,
    pub epochs: Epochs,
}

impl StreamEpochs {
    pub fn new(stream: Stream, epochs: Epochs) -> Self {
        Self { stream, epochs }
    }

    pub fn from_stream_epoch(se: &StreamEpoch) -> Self {
        let mut epochs = Epochs::new();
        epochs.insert(se.starttime, se.endtime.unwrap_or_else(crate::time::open_end));
        Self::new(se.stream.clone(), epochs)
    }

    pub fn starttime(&self) -> Option<Instant> {
        self.epochs.begin()
    }

    pub fn endtime(&self) -> Option<Instant> {
        self.epochs.end()
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.starttime(), self.endtime()) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        }
    }

    /// Intersect every epoch with `[start, end)`.
    pub fn modify_with_temporal_constraints(&mut self, start: Option<Instant>, end: Option<Instant>) {
        self.epochs.intersect_with_window(start, end);
    }

    /// Merge `other`'s intervals into this one's (union, not intersection).
    pub fn merge(&mut self, other: &Epochs) {
        self.epochs.union_with(other);
    }

    /// Emit one `StreamEpoch` per disjoint interval.
    pub fn iter(&self) -> impl Iterator<Item = StreamEpoch> + '_ {
        self.epochs.iter().map(move |iv| {
            let endtime = if crate::time::is_open_end(iv.end) {
                None
            } else {
                Some(iv.end)
            };
            StreamEpoch::new(self.stream.clone(), iv.start, endtime)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

impl PartialEq for StreamEpochs {
    fn eq(&self, other: &Self) -> bool {
        self.stream == other.stream && self.epochs == other.epochs
    }
}
impl Eq for StreamEpochs {}

impl PartialOrd for StreamEpochs {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StreamEpochs {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.stream != other.stream {
            return self.stream.cmp(&other.stream);
        }
        match (self.starttime(), other.starttime()) {
            (Some(a), Some(b)) if a == b => self.endtime().cmp(&other.endtime()),
            (a, b) => a.cmp(&b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_fdsn_datetime as t;

    #[test]
    fn iter_emits_one_stream_epoch_per_interval() {
        let mut epochs = Epochs::new();
        epochs.insert(t("2019-01-01").unwrap(), t("2019-01-02").unwrap());
        epochs.insert(t("2019-02-01").unwrap(), t("2019-02-02").unwrap());
        let ses = StreamEpochs::new(Stream::wildcard(), epochs);
        let out: Vec<_> = ses.iter().collect();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn modify_with_temporal_constraints_intersects() {
        let mut epochs = Epochs::new();
        epochs.insert(t("2019-01-01").unwrap(), t("2019-01-10").unwrap());
        let mut ses = StreamEpochs::new(Stream::wildcard(), epochs);
        ses.modify_with_temporal_constraints(Some(t("2019-01-03").unwrap()), Some(t("2019-01-05").unwrap()));
        assert_eq!(ses.starttime().unwrap(), t("2019-01-03").unwrap());
        assert_eq!(ses.endtime().unwrap(), t("2019-01-05").unwrap());
    }
}
