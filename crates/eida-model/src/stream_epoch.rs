use std::cmp::Ordering;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::stream::Stream;
use crate::time::{format_fdsn_datetime, format_fdsn_datetime_opt, parse_fdsn_datetime, Instant};

/// A [`Stream`] plus a `[starttime, endtime)` window. `endtime = None` means
/// open-ended -- the stream is currently acquiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEpoch {
    pub stream: Stream,
    pub starttime: Instant,
    pub endtime: Option<Instant>,
}

impl StreamEpoch {
    pub fn new(stream: Stream, starttime: Instant, endtime: Option<Instant>) -> Self {
        Self {
            stream,
            starttime,
            endtime,
        }
    }

    /// Parse a POST-body SNCL line: `NET STA LOC CHA START [END]`. A missing
    /// `END` field is substituted with `default_endtime`, if given.
    pub fn from_post_line(line: &str, default_endtime: Option<Instant>) -> Result<Self, ModelError> {
        let line = line.trim();
        let parts: Vec<&str> = line.split(' ').filter(|s| !s.is_empty()).collect();

        if parts.len() != 5 && parts.len() != 6 {
            return Err(ModelError::MalformedLine(line.to_owned()));
        }

        let stream = Stream::new(parts[0], parts[1], parts[2], parts[3]);
        let starttime = parse_fdsn_datetime(parts[4])?;
        let endtime = if parts.len() == 6 {
            Some(parse_fdsn_datetime(parts[5])?)
        } else {
            default_endtime
        };

        Ok(Self::new(stream, starttime, endtime))
    }

    /// Split into `num` contiguous, equal-duration pieces. Pieces `1..num-1`
    /// are exactly `duration/num`; the last piece absorbs the rounding
    /// remainder. `num < 2` returns `[self]` unchanged.
    pub fn slice(&self, num: u32, default_endtime: Instant) -> Vec<StreamEpoch> {
        if num < 2 {
            return vec![self.clone()];
        }

        let end = self.endtime.unwrap_or(default_endtime);
        let total = end - self.starttime;
        let piece = total / i32::try_from(num).unwrap_or(i32::MAX);

        let mut pieces = Vec::with_capacity(num as usize);
        let mut cursor = self.starttime;
        for i in 0..num {
            let piece_end = if i == num - 1 { end } else { cursor + piece };
            pieces.push(StreamEpoch::new(self.stream.clone(), cursor, Some(piece_end)));
            cursor = piece_end;
        }
        pieces
    }

    pub fn duration(&self) -> Option<Duration> {
        self.endtime.map(|end| end - self.starttime)
    }

    pub fn to_sql_like(&self) -> StreamEpoch {
        StreamEpoch {
            stream: self.stream.to_sql_like(),
            starttime: self.starttime,
            endtime: self.endtime,
        }
    }
}

impl PartialEq for StreamEpoch {
    fn eq(&self, other: &Self) -> bool {
        self.stream == other.stream && self.starttime == other.starttime && self.endtime == other.endtime
    }
}
impl Eq for StreamEpoch {}

impl PartialOrd for StreamEpoch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamEpoch {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.stream != other.stream {
            return self.stream.cmp(&other.stream);
        }
        if self.starttime != other.starttime {
            return self.starttime.cmp(&other.starttime);
        }
        match (self.endtime, other.endtime) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, None) => Ordering::Equal,
            // an open endtime sorts last, mirroring the original's
            // `__lt__` (an epoch that never ends is never "less than").
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        }
    }
}

impl fmt::Display for StreamEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.stream,
            format_fdsn_datetime(self.starttime),
            format_fdsn_datetime_opt(self.endtime)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_fdsn_datetime as t;

    #[test]
    fn parses_post_line_with_end() {
        let se = StreamEpoch::from_post_line("CH HASLI -- LHZ 2019-01-01 2019-01-05", None).unwrap();
        assert_eq!(se.stream.network, "CH");
        assert_eq!(se.endtime.unwrap(), t("2019-01-05").unwrap());
    }

    #[test]
    fn parses_post_line_missing_end_substitutes_default() {
        let default = t("2020-01-01T00:00:00").unwrap();
        let se = StreamEpoch::from_post_line("CH HASLI -- LHZ 2019-01-01", Some(default)).unwrap();
        assert_eq!(se.endtime, Some(default));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(StreamEpoch::from_post_line("CH HASLI LHZ 2019-01-01", None).is_err());
    }

    #[test]
    fn slice_divides_into_equal_pieces_with_remainder_on_last() {
        let se = StreamEpoch::new(
            crate::stream::Stream::wildcard(),
            t("2019-01-01T00:00:00").unwrap(),
            Some(t("2019-01-01T00:00:10").unwrap()),
        );
        let pieces = se.slice(3, t("2019-01-01T00:00:10").unwrap());
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].starttime, t("2019-01-01T00:00:00").unwrap());
        assert_eq!(pieces[2].endtime.unwrap(), t("2019-01-01T00:00:10").unwrap());
        // contiguous: each piece's end is the next piece's start
        for w in pieces.windows(2) {
            assert_eq!(w[0].endtime.unwrap(), w[1].starttime);
        }
    }

    #[test]
    fn slice_with_num_below_two_is_noop() {
        let se = StreamEpoch::new(
            crate::stream::Stream::wildcard(),
            t("2019-01-01").unwrap(),
            Some(t("2019-01-02").unwrap()),
        );
        assert_eq!(se.slice(1, t("2019-01-02").unwrap()), vec![se.clone()]);
    }

    #[test]
    fn open_endtime_sorts_after_closed() {
        let stream = crate::stream::Stream::wildcard();
        let open = StreamEpoch::new(stream.clone(), t("2019-01-01").unwrap(), None);
        let closed = StreamEpoch::new(stream, t("2019-01-01").unwrap(), Some(t("2019-01-02").unwrap()));
        assert!(closed < open);
    }
}
