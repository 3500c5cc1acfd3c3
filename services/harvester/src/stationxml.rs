//! A narrow FDSN StationXML reader: just enough of `Network`/`Station`/
//! `Channel` epoch data to populate the routing store. Grounded on
//! `RoutingHarvester._harvest_from_stationxml`'s walk of `inventory.networks`
//! `/.stations/.channels`, re-expressed over `quick-xml` event parsing
//! instead of `obspy.read_inventory`.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use eida_model::time::{parse_fdsn_datetime, Instant};

use crate::error::HarvestError;

#[derive(Debug, Clone)]
pub struct ChannelEpochXml {
    pub code: String,
    pub locationcode: String,
    pub start: Instant,
    pub end: Option<Instant>,
    pub restricted_status: String,
}

#[derive(Debug, Clone)]
pub struct StationEpochXml {
    pub code: String,
    pub start: Instant,
    pub end: Option<Instant>,
    pub latitude: f64,
    pub longitude: f64,
    pub channels: Vec<ChannelEpochXml>,
}

#[derive(Debug, Clone)]
pub struct NetworkEpochXml {
    pub code: String,
    pub start: Instant,
    pub end: Option<Instant>,
    pub stations: Vec<StationEpochXml>,
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

fn parse_end(raw: Option<String>) -> Result<Option<Instant>, HarvestError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_fdsn_datetime(s.trim())?)),
        _ => Ok(None),
    }
}

pub fn parse_station_inventory(xml: &str) -> Result<Vec<NetworkEpochXml>, HarvestError> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut networks = Vec::new();
    let mut current_network: Option<NetworkEpochXml> = None;
    let mut current_station: Option<StationEpochXml> = None;
    let mut current_text_tag: Option<String> = None;
    let mut text_buf = String::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| HarvestError::MalformedStationXml(e.to_string()))?
        {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let tag = local_name(e.name().as_ref()).to_owned();
                match tag.as_str() {
                    "Network" => {
                        current_network = Some(NetworkEpochXml {
                            code: attr(&e, "code").unwrap_or_default(),
                            start: attr(&e, "startDate")
                                .map(|s| parse_fdsn_datetime(&s))
                                .transpose()?
                                .unwrap_or_else(eida_model::time::open_end),
                            end: parse_end(attr(&e, "endDate"))?,
                            stations: Vec::new(),
                        });
                    }
                    "Station" => {
                        current_station = Some(StationEpochXml {
                            code: attr(&e, "code").unwrap_or_default(),
                            start: attr(&e, "startDate")
                                .map(|s| parse_fdsn_datetime(&s))
                                .transpose()?
                                .unwrap_or_else(eida_model::time::open_end),
                            end: parse_end(attr(&e, "endDate"))?,
                            latitude: 0.0,
                            longitude: 0.0,
                            channels: Vec::new(),
                        });
                    }
                    "Channel" => {
                        if let Some(station) = current_station.as_mut() {
                            station.channels.push(ChannelEpochXml {
                                code: attr(&e, "code").unwrap_or_default(),
                                locationcode: attr(&e, "locationCode").unwrap_or_default(),
                                start: attr(&e, "startDate")
                                    .map(|s| parse_fdsn_datetime(&s))
                                    .transpose()?
                                    .unwrap_or_else(eida_model::time::open_end),
                                end: parse_end(attr(&e, "endDate"))?,
                                restricted_status: attr(&e, "restrictedStatus").unwrap_or_else(|| "open".to_owned()),
                            });
                        }
                    }
                    "Latitude" | "Longitude" => {
                        current_text_tag = Some(tag);
                        text_buf.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                text_buf.push_str(&t.unescape().unwrap_or_default());
            }
            Event::End(e) => {
                let tag = local_name(e.name().as_ref()).to_owned();
                match tag.as_str() {
                    "Latitude" | "Longitude" => {
                        if let (Some(tag_name), Some(station)) = (current_text_tag.take(), current_station.as_mut()) {
                            if let Ok(value) = text_buf.trim().parse::<f64>() {
                                if tag_name == "Latitude" {
                                    station.latitude = value;
                                } else {
                                    station.longitude = value;
                                }
                            }
                        }
                    }
                    "Station" => {
                        if let (Some(station), Some(network)) = (current_station.take(), current_network.as_mut()) {
                            network.stations.push(station);
                        }
                    }
                    "Network" => {
                        if let Some(network) = current_network.take() {
                            networks.push(network);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(networks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <FDSNStationXML>
          <Network code="CH" startDate="2000-01-01">
            <Station code="HASLI" startDate="2000-01-01">
              <Latitude>46.7</Latitude>
              <Longitude>8.0</Longitude>
              <Channel code="LHZ" locationCode="--" startDate="2000-01-01" restrictedStatus="open"/>
            </Station>
          </Network>
        </FDSNStationXML>
    "#;

    #[test]
    fn parses_nested_epochs() {
        let networks = parse_station_inventory(SAMPLE).unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].code, "CH");
        assert_eq!(networks[0].stations.len(), 1);
        assert_eq!(networks[0].stations[0].latitude, 46.7);
        assert_eq!(networks[0].stations[0].channels.len(), 1);
        assert_eq!(networks[0].stations[0].channels[0].code, "LHZ");
    }

    #[test]
    fn empty_body_yields_no_networks() {
        assert!(parse_station_inventory("").unwrap().is_empty());
    }
}
