//! Endpoint workers: one per response format, each fetching sub-requests
//! from a single upstream endpoint URL and writing parsed output into a
//! shared drain. Grounded on spec.md §4.7 / §9's "dynamic duck-typed
//! workers" note -- reimagined here as one trait implementor per format
//! instead of `_load`/`_dump`/`_write_response_to_buffer` duck typing.

pub mod availability;
pub mod miniseed;
pub mod simple;
pub mod stationxml;
pub mod wfcatalog;

use bytes::Bytes;

/// Format-specific response format tag, threaded through to the simple
/// worker's header-stripping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleFormat {
    StationText,
    AvailabilityText,
    AvailabilityJson,
    AvailabilityGeocsv,
}

/// Outcome of one sub-request against an endpoint.
#[derive(Debug)]
pub enum FetchOutcome {
    /// `200`: parsed body ready to append to the drain.
    Ok(Bytes),
    /// `204` or equivalent: nothing to append.
    NoContent,
    /// `413`: caller should split the stream-epoch and retry.
    TooLarge,
    /// `5xx`/other client error: caller records it against the
    /// retry-budget stats and drops the sub-response.
    Error(u16),
}
