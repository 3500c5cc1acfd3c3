use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wildcard::{fdsnws_to_sql_wildcards, DEFAULT_LIKE_ESCAPE};

/// A network/station/location/channel code 4-tuple. Codes may contain the
/// FDSNWS wildcards `*` (multi-char) and `?` (single-char).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl Stream {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    pub fn wildcard() -> Self {
        Self::new("*", "*", "*", "*")
    }

    /// Dotted identifier, e.g. `CH.HASLI.--.LHZ`.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// Translate every field's FDSNWS wildcards into `SQL LIKE` form.
    pub fn to_sql_wildcards(&self, like_multi: char, like_single: char, like_escape: char) -> Self {
        Self {
            network: fdsnws_to_sql_wildcards(&self.network, like_multi, like_single, like_escape),
            station: fdsnws_to_sql_wildcards(&self.station, like_multi, like_single, like_escape),
            location: fdsnws_to_sql_wildcards(&self.location, like_multi, like_single, like_escape),
            channel: fdsnws_to_sql_wildcards(&self.channel, like_multi, like_single, like_escape),
        }
    }

    pub fn to_sql_like(&self) -> Self {
        self.to_sql_wildcards('%', '_', DEFAULT_LIKE_ESCAPE)
    }

    /// A network code is "wildcard-only" if it resolves to match anything --
    /// either the bare `*` or a string made up entirely of `?` up to 2 chars
    /// (the convention used when deciding whether to attempt virtual-network
    /// resolution).
    pub fn is_wildcard_only_network(&self) -> bool {
        self.network == "*" || (self.network.len() <= 2 && self.network.chars().all(|c| c == '?'))
    }
}

// Equality is by all four fields (spec.md §3), not by the joined id, since
// two codes with different field boundaries could in principle join to the
// same string only if a code itself contains a literal '.', which FDSNWS
// codes never do.
impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.network == other.network
            && self.station == other.station
            && self.location == other.location
            && self.channel == other.channel
    }
}
impl Eq for Stream {}

impl PartialOrd for Stream {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Stream {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.network, self.station, self.location, self.channel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_fieldwise() {
        let a = Stream::new("CH", "HASLI", "--", "LHZ");
        let b = Stream::new("CH", "HASLI", "--", "LHZ");
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_is_lexicographic_by_dotted_join() {
        let a = Stream::new("CH", "BFO", "--", "LHZ");
        let b = Stream::new("GR", "BFO", "--", "LHZ");
        assert!(a < b);
    }

    #[test]
    fn wildcard_only_network_detection() {
        assert!(Stream::new("*", "x", "x", "x").is_wildcard_only_network());
        assert!(Stream::new("??", "x", "x", "x").is_wildcard_only_network());
        assert!(!Stream::new("CH", "x", "x", "x").is_wildcard_only_network());
        assert!(!Stream::new("???", "x", "x", "x").is_wildcard_only_network());
    }

    #[test]
    fn sql_wildcard_translation_is_fieldwise() {
        let s = Stream::new("*", "HASLI", "--", "L?Z");
        let sql = s.to_sql_like();
        assert_eq!(sql.network, "%");
        assert_eq!(sql.channel, "L_Z");
    }
}
