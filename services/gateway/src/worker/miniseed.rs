//! MiniSEED worker: record-size discovery via blockette 1000 and
//! last-record deduplication across successive sub-responses for one
//! logical stream-epoch. Grounded on
//! `eidaws.federator.fdsnws_dataselect.miniseed.DataselectRequestProcessor`'s
//! `_merge_responses`/blockette scan.

use crate::error::GatewayError;

/// Accumulates one logical stream-epoch's MiniSEED bytes across however
/// many sub-responses the split-and-align retries produced.
pub struct MiniseedAssembler {
    fallback_record_size: usize,
    record_size: Option<usize>,
    last_record: Option<Vec<u8>>,
    buffer: Vec<u8>,
}

impl MiniseedAssembler {
    pub fn new(fallback_record_size: usize) -> Self {
        Self { fallback_record_size, record_size: None, last_record: None, buffer: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append one sub-response body. Record size is discovered from the
    /// first non-empty chunk; every later chunk must align to it.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let record_size = match self.record_size {
            Some(size) => size,
            None => {
                let size = detect_record_size(chunk, self.fallback_record_size)?;
                self.record_size = Some(size);
                size
            }
        };
        if record_size == 0 || chunk.len() % record_size != 0 {
            return Err(GatewayError::Parser("miniseed chunk is not aligned to the record size".to_owned()));
        }

        let mut offset = 0;
        if let Some(last) = &self.last_record {
            if chunk.len() >= record_size && chunk[..record_size] == last[..] {
                offset = record_size;
            }
        }
        self.buffer.extend_from_slice(&chunk[offset..]);
        if chunk.len() >= record_size {
            self.last_record = Some(chunk[chunk.len() - record_size..].to_vec());
        }
        Ok(())
    }
}

/// Locate blockette 1000 in the first record of `chunk` and return
/// `2 ^ (byte at blockette_start + 6)`. Falls back to
/// `fallback_record_size` (if set and a multiple of 64) when absent.
fn detect_record_size(chunk: &[u8], fallback_record_size: usize) -> Result<usize, GatewayError> {
    if chunk.len() < 48 {
        return Err(GatewayError::Parser("miniseed record shorter than the fixed 48-byte header".to_owned()));
    }
    let data_offset = u16::from_be_bytes([chunk[44], chunk[45]]) as usize;
    let header_end = data_offset.max(256);
    if chunk.len() < header_end {
        return Err(GatewayError::Parser("miniseed record shorter than its declared data offset".to_owned()));
    }

    let blockettes = &chunk[48..header_end];
    let mut pos = 0usize;
    loop {
        if pos + 4 > blockettes.len() {
            break;
        }
        let blockette_id = u16::from_be_bytes([blockettes[pos], blockettes[pos + 1]]);
        let next_offset = u16::from_be_bytes([blockettes[pos + 2], blockettes[pos + 3]]) as usize;

        if blockette_id == 1000 {
            let exponent_pos = pos + 6;
            if exponent_pos >= blockettes.len() {
                break;
            }
            return Ok(1usize << blockettes[exponent_pos]);
        }

        if next_offset == 0 {
            break;
        }
        let next_relative = next_offset.saturating_sub(48);
        if next_relative <= pos {
            break;
        }
        pos = next_relative;
    }

    if fallback_record_size > 0 && fallback_record_size % 64 == 0 {
        Ok(fallback_record_size)
    } else {
        Err(GatewayError::Parser("blockette 1000 absent and no usable fallback record size configured".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal 64-byte record: 48-byte fixed header (with
    /// `data_offset = 48`), followed by a blockette-1000 at offset 48
    /// declaring record length exponent 6 (2^6 = 64).
    fn sample_record(payload_byte: u8) -> Vec<u8> {
        let mut record = vec![0u8; 64];
        record[44] = 0;
        record[45] = 48; // data_offset
        record[48] = 0x03; // blockette id 1000, high byte
        record[49] = 0xE8; // 1000 low byte
        record[50] = 0; // next_offset = 0 (no more blockettes)
        record[51] = 0;
        record[48 + 6] = 6; // exponent -> 2^6 = 64
        record[63] = payload_byte;
        record
    }

    #[test]
    fn detects_record_size_from_blockette_1000() {
        let record = sample_record(1);
        assert_eq!(detect_record_size(&record, 0).unwrap(), 64);
    }

    #[test]
    fn falls_back_when_blockette_1000_is_absent() {
        let mut record = vec![0u8; 64];
        record[44] = 0;
        record[45] = 48;
        assert_eq!(detect_record_size(&record, 64).unwrap(), 64);
        assert!(detect_record_size(&record, 0).is_err());
    }

    #[test]
    fn dedups_repeated_boundary_record_across_chunks() {
        let mut assembler = MiniseedAssembler::new(0);
        let r1 = sample_record(1);
        let r2 = sample_record(2);
        let mut first_chunk = r1.clone();
        first_chunk.extend_from_slice(&r2);

        let mut second_chunk = r2.clone();
        let r3 = sample_record(3);
        second_chunk.extend_from_slice(&r3);

        assembler.append(&first_chunk).unwrap();
        assembler.append(&second_chunk).unwrap();

        let out = assembler.into_bytes();
        assert_eq!(out.len(), 64 * 3);
    }
}
