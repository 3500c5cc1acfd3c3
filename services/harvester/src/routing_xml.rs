//! Parsing of routing-configuration documents: `<route>` elements carrying
//! nested per-service endpoint URLs, and `<vnetwork>` elements mapping a
//! virtual network code to a list of real stream patterns.
//!
//! Grounded on `RoutingHarvester`/`VNetHarvester`'s `_harvest_localconfig`
//! (`eidaws.stationlite.harvest.harvester`), re-expressed over `quick-xml`
//! (no XML crate exists in the teacher; grounded instead on the `quick-xml`
//! usage in the retrieved pack's other example manifests).

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use eida_model::time::parse_fdsn_datetime;
use eida_model::time::Instant;
use eida_model::{Stream, StreamEpoch};

use crate::error::HarvestError;

#[derive(Debug, Clone)]
pub struct ServiceElement {
    pub name: String,
    pub url: String,
    pub priority: u32,
    pub start: Instant,
    pub end: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct RouteElement {
    pub stream: Stream,
    pub services: Vec<ServiceElement>,
}

#[derive(Debug, Clone)]
pub struct VNetworkElement {
    pub code: String,
    pub streams: Vec<StreamEpoch>,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub routes: Vec<RouteElement>,
    pub vnetworks: Vec<VNetworkElement>,
}

fn local_name(qname: &[u8]) -> &str {
    let s = std::str::from_utf8(qname).unwrap_or_default();
    s.rsplit(':').next().unwrap_or(s)
}

fn attr(e: &quick_xml::events::BytesStart, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if local_name(a.key.as_ref()) == key {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn parse_endtime(raw: Option<String>) -> Result<Option<Instant>, HarvestError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_fdsn_datetime(s.trim())?)),
        _ => Ok(None),
    }
}

const KNOWN_SERVICES: &[&str] = &["station", "dataselect", "wfcatalog", "availability"];

/// Parse a routing-configuration document containing `<route>` and
/// `<vnetwork>` elements (in any order, any namespace prefix).
pub fn parse_routing_config(xml: &str) -> Result<RoutingConfig, HarvestError> {
    let mut reader = Reader::from_str(xml);

    let mut config = RoutingConfig::default();
    let mut buf = Vec::new();

    let mut current_route: Option<RouteElement> = None;
    let mut current_vnetwork: Option<VNetworkElement> = None;
    let mut current_service_tag: Option<(String, String, u32, Instant, Option<Instant>)> = None;
    let mut text_buf = String::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| HarvestError::MalformedConfig(e.to_string()))?
        {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let tag = local_name(e.name().as_ref()).to_owned();

                if tag == "route" {
                    let stream = Stream::new(
                        attr(&e, "networkCode").unwrap_or_else(|| "*".to_owned()),
                        attr(&e, "stationCode").unwrap_or_else(|| "*".to_owned()),
                        attr(&e, "locationCode").unwrap_or_else(|| "*".to_owned()),
                        attr(&e, "streamCode").unwrap_or_else(|| "*".to_owned()),
                    );
                    current_route = Some(RouteElement { stream, services: Vec::new() });
                } else if tag == "vnetwork" {
                    current_vnetwork = Some(VNetworkElement {
                        code: attr(&e, "networkCode").unwrap_or_default(),
                        streams: Vec::new(),
                    });
                } else if tag == "stream" {
                    if let Some(vnet) = current_vnetwork.as_mut() {
                        let stream = Stream::new(
                            attr(&e, "net").unwrap_or_else(|| "*".to_owned()),
                            attr(&e, "sta").unwrap_or_else(|| "*".to_owned()),
                            attr(&e, "loc").unwrap_or_else(|| "*".to_owned()),
                            attr(&e, "cha").unwrap_or_else(|| "*".to_owned()),
                        );
                        let start = attr(&e, "start")
                            .map(|s| parse_fdsn_datetime(&s))
                            .transpose()?
                            .unwrap_or_else(eida_model::time::open_end);
                        let end = parse_endtime(attr(&e, "end"))?;
                        vnet.streams.push(StreamEpoch::new(stream, start, end));
                    }
                } else if KNOWN_SERVICES.contains(&tag.as_str()) && current_route.is_some() {
                    let priority: u32 = attr(&e, "priority").and_then(|p| p.parse().ok()).unwrap_or(1);
                    let start = attr(&e, "start")
                        .map(|s| parse_fdsn_datetime(&s))
                        .transpose()?
                        .unwrap_or_else(eida_model::time::open_end);
                    let end = parse_endtime(attr(&e, "end"))?;
                    current_service_tag = Some((tag, String::new(), priority, start, end));
                    text_buf.clear();
                }
            }
            Event::Text(t) => {
                text_buf.push_str(&t.unescape().unwrap_or_default());
            }
            Event::End(e) => {
                let tag = local_name(e.name().as_ref()).to_owned();
                if KNOWN_SERVICES.contains(&tag.as_str()) {
                    if let Some((name, _, priority, start, end)) = current_service_tag.take() {
                        if let Some(route) = current_route.as_mut() {
                            route.services.push(ServiceElement {
                                name,
                                url: text_buf.trim().to_owned(),
                                priority,
                                start,
                                end,
                            });
                        }
                    }
                } else if tag == "route" {
                    if let Some(route) = current_route.take() {
                        config.routes.push(route);
                    }
                } else if tag == "vnetwork" {
                    if let Some(vnet) = current_vnetwork.take() {
                        config.vnetworks.push(vnet);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_with_services() {
        let xml = r#"
            <routing>
              <route networkCode="CH" stationCode="HASLI" locationCode="--" streamCode="LHZ">
                <dataselect priority="1" start="2000-01-01" end="">http://eida.ethz.ch/fdsnws/dataselect/1/query</dataselect>
                <station priority="1" start="2000-01-01" end="">http://eida.ethz.ch/fdsnws/station/1/query</station>
              </route>
            </routing>
        "#;
        let config = parse_routing_config(xml).unwrap();
        assert_eq!(config.routes.len(), 1);
        let route = &config.routes[0];
        assert_eq!(route.stream.network, "CH");
        assert_eq!(route.services.len(), 2);
        assert_eq!(route.services[0].name, "dataselect");
        assert!(route.services[0].end.is_none());
    }

    #[test]
    fn parses_vnetwork_with_streams() {
        let xml = r#"
            <vnetworks>
              <vnetwork networkCode="_ALPARRAY">
                <stream net="CH" sta="GRIMS" loc="*" cha="*" start="2012-01-01" end=""/>
              </vnetwork>
            </vnetworks>
        "#;
        let config = parse_routing_config(xml).unwrap();
        assert_eq!(config.vnetworks.len(), 1);
        assert_eq!(config.vnetworks[0].code, "_ALPARRAY");
        assert_eq!(config.vnetworks[0].streams.len(), 1);
        assert_eq!(config.vnetworks[0].streams[0].stream.station, "GRIMS");
    }
}
