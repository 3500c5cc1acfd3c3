//! StationXML worker: hierarchical merge of several sub-responses' DOMs
//! into one. Grounded on
//! `eidaws.federator.fdsnws_station.xml.StationXMLSchema`/
//! `StationXMLResponseCodeType`'s network/station keying-by-hash merge, kept
//! as a raw-span extract-and-splice instead of a full DOM rebuild --
//! response bodies pass through untouched except for the join points.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeLevel {
    Network,
    Station,
    /// `response` carries full `<Response>` blocks inside each `<Channel>`;
    /// it merges exactly like `channel` since channels are never split.
    Channel,
}

impl MergeLevel {
    pub fn from_query_value(level: &str) -> Self {
        match level {
            "network" => MergeLevel::Network,
            "station" => MergeLevel::Station,
            _ => MergeLevel::Channel,
        }
    }
}

fn local_name(qname: &[u8]) -> &str {
    let s = std::str::from_utf8(qname).unwrap_or_default();
    s.rsplit(':').next().unwrap_or(s)
}

fn attr_hash(e: &BytesStart) -> u64 {
    let mut pairs: Vec<(String, String)> = e
        .attributes()
        .flatten()
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&a.value).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    let mut hasher = DefaultHasher::new();
    for (k, v) in pairs {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

fn first_event_attrs_hash(raw: &str) -> Result<u64, GatewayError> {
    let mut reader = Reader::from_str(raw);
    let mut buf = Vec::new();
    match reader
        .read_event_into(&mut buf)
        .map_err(|e| GatewayError::Parser(format!("xml error: {e}")))?
    {
        Event::Start(e) | Event::Empty(e) => Ok(attr_hash(&e)),
        _ => Err(GatewayError::Parser("expected an element start".to_owned())),
    }
}

/// Extract every top-level (non-nested) occurrence of `tag` from `xml`,
/// each as the exact original substring spanning its own open and close
/// tags (or the single self-closed tag).
fn extract_elements(xml: &str, tag: &str) -> Result<Vec<String>, GatewayError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start_pos = 0usize;

    loop {
        let pos_before = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| GatewayError::Parser(format!("xml error: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if local_name(e.name().as_ref()) == tag => {
                if depth == 0 {
                    start_pos = pos_before;
                }
                depth += 1;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == tag => {
                depth -= 1;
                if depth == 0 {
                    out.push(xml[start_pos..reader.buffer_position()].to_owned());
                }
            }
            Event::Empty(ref e) if depth == 0 && local_name(e.name().as_ref()) == tag => {
                out.push(xml[pos_before..reader.buffer_position()].to_owned());
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Split an element's raw text into `(open_tag, inner_content, close_tag)`.
/// A self-closed element yields `(raw, "", "")`.
fn split_element(raw: &str) -> (String, String, String) {
    let Some(tag_end) = find_unquoted_gt(raw) else {
        return (raw.to_owned(), String::new(), String::new());
    };
    if raw[..=tag_end].ends_with("/>") {
        return (raw.to_owned(), String::new(), String::new());
    }
    let open = raw[..=tag_end].to_owned();
    match raw.rfind("</") {
        Some(close_start) => {
            let inner = raw[tag_end + 1..close_start].to_owned();
            let close = raw[close_start..].to_owned();
            (open, inner, close)
        }
        None => (open, raw[tag_end + 1..].to_owned(), String::new()),
    }
}

fn find_unquoted_gt(s: &str) -> Option<usize> {
    let mut in_quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => in_quote = Some(c),
            None if c == '>' => return Some(i),
            None => {}
        }
    }
    None
}

fn merge_network_level(bodies: &[String]) -> Result<String, GatewayError> {
    let mut order = Vec::new();
    let mut seen: HashMap<u64, String> = HashMap::new();
    for body in bodies {
        for raw in extract_elements(body, "Network")? {
            let hash = first_event_attrs_hash(&raw)?;
            if let std::collections::hash_map::Entry::Vacant(slot) = seen.entry(hash) {
                order.push(hash);
                slot.insert(raw);
            }
        }
    }
    Ok(order.into_iter().map(|h| seen.remove(&h).unwrap()).collect())
}

struct StationLevelNetwork {
    open: String,
    close: String,
    station_order: Vec<u64>,
    stations: HashMap<u64, String>,
}

fn merge_station_level(bodies: &[String]) -> Result<String, GatewayError> {
    let mut order = Vec::new();
    let mut networks: HashMap<u64, StationLevelNetwork> = HashMap::new();

    for body in bodies {
        for raw_net in extract_elements(body, "Network")? {
            let nhash = first_event_attrs_hash(&raw_net)?;
            if !networks.contains_key(&nhash) {
                let (open, _inner, close) = split_element(&raw_net);
                order.push(nhash);
                networks.insert(
                    nhash,
                    StationLevelNetwork { open, close, station_order: Vec::new(), stations: HashMap::new() },
                );
            }
            let (_open, inner, _close) = split_element(&raw_net);
            let entry = networks.get_mut(&nhash).unwrap();
            for raw_station in extract_elements(&inner, "Station")? {
                let shash = first_event_attrs_hash(&raw_station)?;
                if !entry.stations.contains_key(&shash) {
                    entry.station_order.push(shash);
                    entry.stations.insert(shash, raw_station);
                }
            }
        }
    }

    let mut out = String::new();
    for nhash in order {
        let net = networks.get(&nhash).unwrap();
        out.push_str(&net.open);
        for shash in &net.station_order {
            out.push_str(net.stations.get(shash).unwrap());
        }
        out.push_str(&net.close);
    }
    Ok(out)
}

struct ChannelLevelStation {
    open: String,
    close: String,
    preamble: Option<String>,
    channels: Vec<String>,
}

struct ChannelLevelNetwork {
    open: String,
    close: String,
    station_order: Vec<u64>,
    stations: HashMap<u64, ChannelLevelStation>,
}

fn merge_channel_level(bodies: &[String]) -> Result<String, GatewayError> {
    let mut order = Vec::new();
    let mut networks: HashMap<u64, ChannelLevelNetwork> = HashMap::new();

    for body in bodies {
        for raw_net in extract_elements(body, "Network")? {
            let nhash = first_event_attrs_hash(&raw_net)?;
            let (net_open, net_inner, net_close) = split_element(&raw_net);
            if !networks.contains_key(&nhash) {
                order.push(nhash);
                networks.insert(
                    nhash,
                    ChannelLevelNetwork { open: net_open, close: net_close, station_order: Vec::new(), stations: HashMap::new() },
                );
            }
            let net_entry = networks.get_mut(&nhash).unwrap();

            for raw_station in extract_elements(&net_inner, "Station")? {
                let shash = first_event_attrs_hash(&raw_station)?;
                let (st_open, st_inner, st_close) = split_element(&raw_station);
                let channels = extract_elements(&st_inner, "Channel")?;

                if !net_entry.stations.contains_key(&shash) {
                    let preamble = match channels.first() {
                        Some(first) => st_inner.find(first.as_str()).map(|idx| st_inner[..idx].to_owned()),
                        None => Some(st_inner.clone()),
                    };
                    net_entry.station_order.push(shash);
                    net_entry
                        .stations
                        .insert(shash, ChannelLevelStation { open: st_open, close: st_close, preamble, channels: Vec::new() });
                }
                net_entry.stations.get_mut(&shash).unwrap().channels.extend(channels);
            }
        }
    }

    let mut out = String::new();
    for nhash in order {
        let net = networks.get(&nhash).unwrap();
        out.push_str(&net.open);
        for shash in &net.station_order {
            let st = net.stations.get(shash).unwrap();
            out.push_str(&st.open);
            if let Some(preamble) = &st.preamble {
                out.push_str(preamble);
            }
            for channel in &st.channels {
                out.push_str(channel);
            }
            out.push_str(&st.close);
        }
        out.push_str(&net.close);
    }
    Ok(out)
}

/// Merge complete StationXML response bodies, keyed by `level`. Returns the
/// concatenated `<Network>` elements only -- the processor wraps them in
/// the `<FDSNStationXML>` envelope.
pub fn merge(bodies: &[String], level: MergeLevel) -> Result<String, GatewayError> {
    match level {
        MergeLevel::Network => merge_network_level(bodies),
        MergeLevel::Station => merge_station_level(bodies),
        MergeLevel::Channel => merge_channel_level(bodies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_level_keeps_first_occurrence_only() {
        let a = r#"<Network code="CH" startDate="2000-01-01"><Station code="HASLI"/></Network>"#.to_owned();
        let b = r#"<Network code="CH" startDate="2000-01-01"><Station code="OTHER"/></Network>"#.to_owned();
        let merged = merge(&[a.clone(), b], MergeLevel::Network).unwrap();
        assert!(merged.contains("HASLI"));
        assert!(!merged.contains("OTHER"));
    }

    #[test]
    fn station_level_appends_unseen_stations_under_matched_network() {
        let a = r#"<Network code="CH" startDate="2000-01-01"><Station code="HASLI"/></Network>"#.to_owned();
        let b = r#"<Network code="CH" startDate="2000-01-01"><Station code="ZUR"/></Network>"#.to_owned();
        let merged = merge(&[a, b], MergeLevel::Station).unwrap();
        assert!(merged.contains("HASLI"));
        assert!(merged.contains("ZUR"));
        assert_eq!(merged.matches("<Network").count(), 1);
    }

    #[test]
    fn channel_level_appends_every_channel_without_dedup() {
        let a = r#"<Network code="CH"><Station code="HASLI"><Channel code="LHZ"/></Station></Network>"#.to_owned();
        let b = r#"<Network code="CH"><Station code="HASLI"><Channel code="LHN"/></Station></Network>"#.to_owned();
        let merged = merge(&[a, b], MergeLevel::Channel).unwrap();
        assert!(merged.contains("LHZ"));
        assert!(merged.contains("LHN"));
        assert_eq!(merged.matches("<Station").count(), 1);
    }
}
