//! Availability worker: extent-reduction for the sorted response
//! processor. Grounded on
//! `eidaws.federator.fdsnws_availability.extent.AvailabilityExtentRequestProcessor`'s
//! per-stream hull reduction and its `"distributed stream epochs not
//! allowed"` rejection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use eida_model::{Route, Stream};

use crate::error::GatewayError;

/// One stream reduced to the hull of every granular sub-route's epoch:
/// earliest start, latest end (an end of `None` -- open-ended -- always
/// wins over any concrete end).
#[derive(Debug, Clone)]
pub struct ReducedExtent {
    pub stream: Stream,
    pub endpoint_url: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Reduce a granular routing result (one stream-epoch per sub-route) to one
/// extent per stream. Errs if two different endpoints would serve the same
/// stream.
pub fn reduce_extents(routes: &[Route]) -> Result<Vec<ReducedExtent>, GatewayError> {
    let mut by_stream: BTreeMap<Stream, (String, DateTime<Utc>, Option<DateTime<Utc>>)> = BTreeMap::new();

    for route in routes {
        for se in &route.stream_epochs {
            match by_stream.get_mut(&se.stream) {
                None => {
                    by_stream.insert(se.stream.clone(), (route.url.clone(), se.starttime, se.endtime));
                }
                Some((existing_url, start, end)) => {
                    if *existing_url != route.url {
                        return Err(GatewayError::DistributedStreamEpochs(se.stream.to_string()));
                    }
                    if se.starttime < *start {
                        *start = se.starttime;
                    }
                    *end = match (*end, se.endtime) {
                        (None, _) | (_, None) => None,
                        (Some(a), Some(b)) => Some(a.max(b)),
                    };
                }
            }
        }
    }

    Ok(by_stream
        .into_iter()
        .map(|(stream, (endpoint_url, start, end))| ReducedExtent { stream, endpoint_url, start, end })
        .collect())
}

/// The only `orderby` value the availability surface accepts; every other
/// value is a client error (spec's open question #2).
pub const SUPPORTED_ORDERBY: &str = "nslc_time_quality_samplerate";

pub fn validate_orderby(value: Option<&str>) -> Result<(), GatewayError> {
    match value {
        None | Some(SUPPORTED_ORDERBY) => Ok(()),
        Some(other) => Err(GatewayError::Parser(format!("unsupported orderby value: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eida_model::StreamEpoch;

    fn se(net: &str, start: &str, end: Option<&str>) -> StreamEpoch {
        StreamEpoch::new(
            Stream::new(net, "HASLI", "--", "LHZ"),
            start.parse().unwrap(),
            end.map(|e| e.parse().unwrap()),
        )
    }

    #[test]
    fn reduces_to_a_single_hull_per_stream() {
        let routes = vec![Route::new(
            "http://a",
            vec![
                se("CH", "2019-01-01T00:00:00Z", Some("2019-01-02T00:00:00Z")),
                se("CH", "2019-01-02T00:00:00Z", Some("2019-01-03T00:00:00Z")),
            ],
        )];
        let extents = reduce_extents(&routes).unwrap();
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0].end, Some("2019-01-03T00:00:00Z".parse().unwrap()));
    }

    #[test]
    fn rejects_distributed_stream_epochs() {
        let routes = vec![
            Route::new("http://a", vec![se("CH", "2019-01-01T00:00:00Z", None)]),
            Route::new("http://b", vec![se("CH", "2019-01-02T00:00:00Z", None)]),
        ];
        assert!(reduce_extents(&routes).is_err());
    }

    #[test]
    fn rejects_unsupported_orderby() {
        assert!(validate_orderby(Some(SUPPORTED_ORDERBY)).is_ok());
        assert!(validate_orderby(None).is_ok());
        assert!(validate_orderby(Some("latestupdate")).is_err());
    }
}
