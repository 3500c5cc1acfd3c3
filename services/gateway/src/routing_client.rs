//! Encapsulates a call to the routing store as an HTTP request, and parses
//! its plain-text URL-block/SNCL-line response. Grounded on
//! `eidaws.federator.utils.mixin.ClientRetryBudgetMixin` /
//! `eidaws.federator.utils.request.RoutingRequestHandler`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use eida_model::time::parse_fdsn_datetime;
use eida_model::{Route, Stream, StreamEpoch};

use crate::error::GatewayError;
use crate::stats::Stats;

#[derive(Debug, Clone)]
pub struct RoutingResult {
    pub routed_urls: Vec<String>,
    pub routes: Vec<Route>,
}

/// Parse the routing surface's plain-text body: blank-line-separated
/// blocks, each a URL line followed by `NET STA LOC CHA START [END]` lines.
fn parse_routing_body(body: &str, default_endtime: Option<chrono::DateTime<Utc>>) -> Result<Vec<Route>, GatewayError> {
    let mut routes = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        let url = line.trim();
        if url.is_empty() {
            continue;
        }
        let mut stream_epochs = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                lines.next();
                break;
            }
            let raw = lines.next().unwrap();
            stream_epochs.push(parse_sncl_line(raw, default_endtime)?);
        }
        routes.push(Route::new(url.to_owned(), stream_epochs));
    }
    Ok(routes)
}

fn parse_sncl_line(line: &str, default_endtime: Option<chrono::DateTime<Utc>>) -> Result<StreamEpoch, GatewayError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(GatewayError::Parser(format!("malformed routing line: {line:?}")));
    }
    let stream = Stream::new(fields[0], fields[1], fields[2], fields[3]);
    let start = parse_fdsn_datetime(fields[4])?;
    let end = match fields.get(5) {
        Some(raw) => Some(parse_fdsn_datetime(raw)?),
        None => default_endtime,
    };
    Ok(StreamEpoch::new(stream, start, end))
}

/// Build the GET query string for a single stream-epoch (one call per
/// fanned-out `StreamEpoch`, to maximize HTTP-cache hits on the routing
/// surface).
fn query_string(se: &StreamEpoch, service: &str, extra: &HashMap<String, String>) -> String {
    let mut params = vec![
        ("service".to_owned(), service.to_owned()),
        ("net".to_owned(), se.stream.network.clone()),
        ("sta".to_owned(), se.stream.station.clone()),
        ("loc".to_owned(), se.stream.location.clone()),
        ("cha".to_owned(), se.stream.channel.clone()),
        ("start".to_owned(), eida_model::time::format_fdsn_datetime(se.starttime)),
    ];
    if let Some(end) = se.endtime {
        params.push(("end".to_owned(), eida_model::time::format_fdsn_datetime(end)));
    }
    for (k, v) in extra {
        params.push((k.clone(), v.clone()));
    }
    params
        .into_iter()
        .map(|(k, v)| format!("{k}={}", urlencode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Query the routing store for one stream-epoch, skip URL blocks whose
/// error-ratio exceeds `retry_budget_threshold`, and enforce the per-stream
/// and total epoch duration limits.
#[allow(clippy::too_many_arguments)]
pub async fn resolve(
    http_client: &reqwest::Client,
    router_base_url: &str,
    stats: &Stats,
    stream_epoch: &StreamEpoch,
    service: &str,
    extra_params: &HashMap<String, String>,
    retry_budget_threshold: f64,
    max_stream_duration: Duration,
    max_total_duration: Duration,
) -> Result<RoutingResult, GatewayError> {
    let url = format!(
        "{router_base_url}/eidaws/routing/1/query?{}",
        query_string(stream_epoch, service, extra_params)
    );

    let response = http_client.get(&url).send().await?;
    if response.status() == reqwest::StatusCode::NO_CONTENT || response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(RoutingResult { routed_urls: Vec::new(), routes: Vec::new() });
    }
    if !response.status().is_success() {
        return Err(GatewayError::RoutingFailure(format!("routing store returned {}", response.status())));
    }

    let body = response.text().await?;
    // Every sub-request here is a GET (one stream-epoch per call, to
    // maximize HTTP-cache hits), so a missing endtime is never defaulted --
    // that substitution only applies to the POST envelope.
    let parsed_routes = parse_routing_body(&body, None)?;

    let mut routed_urls = Vec::new();
    let mut routes = Vec::new();
    let mut per_stream_total = chrono::Duration::zero();
    let mut grand_total = chrono::Duration::zero();

    for route in parsed_routes {
        let error_ratio = stats.error_ratio(&route.url).await?;
        if error_ratio > retry_budget_threshold {
            continue;
        }

        for se in &route.stream_epochs {
            let duration = se.endtime.unwrap_or_else(Utc::now) - se.starttime;
            per_stream_total = per_stream_total.max(duration);
            grand_total = grand_total + duration;
        }

        routed_urls.push(route.url.clone());
        routes.push(route);
    }

    let per_stream_std = per_stream_total.to_std().unwrap_or(Duration::MAX);
    let grand_total_std = grand_total.to_std().unwrap_or(Duration::MAX);
    if per_stream_std > max_stream_duration {
        return Err(GatewayError::TooLarge("per-stream epoch duration exceeds the configured maximum".to_owned()));
    }
    if grand_total_std > max_total_duration {
        return Err(GatewayError::TooLarge("total epoch duration exceeds the configured maximum".to_owned()));
    }

    Ok(RoutingResult { routed_urls, routes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_blocks_separated_by_blank_lines() {
        let body = "http://a/query\nCH HASLI -- LHZ 2019-01-01T00:00:00 2019-01-02T00:00:00\n\nhttp://b/query\nGE MATE -- BHZ 2019-01-01T00:00:00 2019-01-02T00:00:00\n";
        let routes = parse_routing_body(body, None).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].url, "http://a/query");
        assert_eq!(routes[0].stream_epochs.len(), 1);
    }
}
