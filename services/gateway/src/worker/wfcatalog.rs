//! WFCatalog JSON worker: split-and-align merge over a stream of
//! `[{...}, {...}]` sub-response bodies. Grounded on
//! `eidaws.federator.fdsnws_wfcatalog.wfcatalog.WFCatalogRequestProcessor`'s
//! `_merge_responses` backward brace scan, re-expressed with `serde_json`
//! object equality instead of a manual backward byte scan.

use crate::error::GatewayError;

/// Accumulates one logical stream-epoch's WFCatalog objects, comma-joined,
/// without the enclosing `[`/`]` -- the processor adds those once at the
/// end of the whole response.
pub struct WfcatalogAssembler {
    buffer: Vec<u8>,
}

impl WfcatalogAssembler {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Append one sub-response's JSON array body, dropping its leading
    /// object if it duplicates the buffer's current last object.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        let text = std::str::from_utf8(chunk)
            .map_err(|e| GatewayError::Parser(format!("invalid utf8 in wfcatalog chunk: {e}")))?;
        let inner = strip_array_brackets(text.trim());
        if inner.trim().is_empty() {
            return Ok(());
        }
        let mut objects = split_top_level_objects(inner)?;
        if objects.is_empty() {
            return Ok(());
        }

        if !self.buffer.is_empty() {
            let existing = String::from_utf8_lossy(&self.buffer).into_owned();
            let existing_objects = split_top_level_objects(&existing)?;
            if let Some(last) = existing_objects.last() {
                if objects_equal(last, &objects[0]) {
                    objects.remove(0);
                }
            }
        }

        for obj in objects {
            if !self.buffer.is_empty() {
                self.buffer.push(b',');
            }
            self.buffer.extend_from_slice(obj.as_bytes());
        }
        Ok(())
    }
}

impl Default for WfcatalogAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_array_brackets(text: &str) -> &str {
    let inner = text.strip_prefix('[').unwrap_or(text);
    inner.strip_suffix(']').unwrap_or(inner).trim()
}

/// Split a comma-joined list of JSON objects into its top-level members,
/// respecting nested braces and quoted strings.
fn split_top_level_objects(text: &str) -> Result<Vec<String>, GatewayError> {
    let mut objects = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    let mut start = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(GatewayError::Parser("unbalanced braces in wfcatalog chunk".to_owned()));
                }
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(text[s..=i].to_owned());
                    }
                }
            }
            _ => {}
        }
    }
    Ok(objects)
}

fn objects_equal(a: &str, b: &str) -> bool {
    match (serde_json::from_str::<serde_json::Value>(a), serde_json::from_str::<serde_json::Value>(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_two_chunks_with_a_comma() {
        let mut assembler = WfcatalogAssembler::new();
        assembler.append(br#"[{"a":1}]"#).unwrap();
        assembler.append(br#"[{"b":2}]"#).unwrap();
        assert_eq!(String::from_utf8(assembler.into_bytes()).unwrap(), r#"{"a":1},{"b":2}"#);
    }

    #[test]
    fn drops_duplicate_boundary_object() {
        let mut assembler = WfcatalogAssembler::new();
        assembler.append(br#"[{"a":1},{"b":2}]"#).unwrap();
        assembler.append(br#"[{"b":2},{"c":3}]"#).unwrap();
        assert_eq!(String::from_utf8(assembler.into_bytes()).unwrap(), r#"{"a":1},{"b":2},{"c":3}"#);
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut assembler = WfcatalogAssembler::new();
        assembler.append(b"[]").unwrap();
        assert!(assembler.is_empty());
    }
}
