//! Sample stream-epochs and routes used across `router`/`gateway` tests.

use eida_model::time::parse_fdsn_datetime;
use eida_model::{Route, Stream, StreamEpoch};

/// `CH.HASLI.--.LHZ` over `[2019-01-01, 2019-01-02)`.
pub fn sample_stream_epoch() -> StreamEpoch {
    StreamEpoch::new(
        Stream::new("CH", "HASLI", "--", "LHZ"),
        parse_fdsn_datetime("2019-01-01").unwrap(),
        Some(parse_fdsn_datetime("2019-01-02").unwrap()),
    )
}

/// A second, disjoint stream-epoch on a different network, for tests that
/// need more than one entry.
pub fn sample_stream_epoch_other_network() -> StreamEpoch {
    StreamEpoch::new(
        Stream::new("GE", "MATE", "--", "BHZ"),
        parse_fdsn_datetime("2019-06-01").unwrap(),
        Some(parse_fdsn_datetime("2019-06-02").unwrap()),
    )
}

/// A single-endpoint route carrying [`sample_stream_epoch`].
pub fn sample_route(url: &str) -> Route {
    Route::new(url, vec![sample_stream_epoch()])
}
