//! Simple worker: station-text and availability text/json/geocsv all read
//! a full response body and strip a format-specific header before emitting
//! the trimmed blob. Grounded on `eidaws.federator.fdsnws_station.text`'s
//! and `eidaws.federator.fdsnws_availability`'s simple response handling.

use super::SimpleFormat;

/// Strip the format-specific header bytes from a complete response body.
pub fn strip_header(format: SimpleFormat, body: &[u8]) -> Vec<u8> {
    match format {
        SimpleFormat::StationText => strip_first_comment_line(body),
        SimpleFormat::AvailabilityText => strip_first_comment_line(body),
        SimpleFormat::AvailabilityGeocsv => strip_first_n_lines(body, 5),
        SimpleFormat::AvailabilityJson => extract_datasources_array(body),
    }
}

/// Drop the first line if it starts with `#` (the FDSNWS text-format
/// column-header comment).
fn strip_first_comment_line(body: &[u8]) -> Vec<u8> {
    if body.first() == Some(&b'#') {
        match body.iter().position(|&b| b == b'\n') {
            Some(idx) => body[idx + 1..].to_vec(),
            None => Vec::new(),
        }
    } else {
        body.to_vec()
    }
}

fn strip_first_n_lines(body: &[u8], n: usize) -> Vec<u8> {
    let mut pos = 0;
    for _ in 0..n {
        match body[pos..].iter().position(|&b| b == b'\n') {
            Some(idx) => pos += idx + 1,
            None => return Vec::new(),
        }
    }
    body[pos..].to_vec()
}

/// Extract the content between the `datasources` array's `[` and `]`.
fn extract_datasources_array(body: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(body);
    let Some(key_pos) = text.find("\"datasources\"") else {
        return Vec::new();
    };
    let Some(open) = text[key_pos..].find('[') else {
        return Vec::new();
    };
    let open = key_pos + open;

    let mut depth = 0i32;
    let mut close = None;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Vec::new();
    };

    text[open + 1..close].as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_comment_line() {
        let body = b"#Network Station\nCH HASLI\n";
        assert_eq!(strip_header(SimpleFormat::StationText, body), b"CH HASLI\n");
    }

    #[test]
    fn strips_five_geocsv_header_lines() {
        let body = b"l1\nl2\nl3\nl4\nl5\ndata\n";
        assert_eq!(strip_header(SimpleFormat::AvailabilityGeocsv, body), b"data\n");
    }

    #[test]
    fn extracts_datasources_array_content() {
        let body = br#"{"created":"x","datasources":[{"a":1},{"b":2}]}"#;
        let out = strip_header(SimpleFormat::AvailabilityJson, body);
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"a":1},{"b":2}"#);
    }
}
