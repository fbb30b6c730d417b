//! Xray stats wire format decoding and request encoding.
//!
//! `QueryStatsResponse` is a protobuf message with one repeated embedded `Stat`
//! (field 1), each carrying a `name` (field 1, string) and a `value` (field 2, int64).
//! Only those two shapes are ever consumed, so this is a small bounded parser instead
//! of a schema-driven decoder. Unknown fields are skipped by their wire type; a buffer
//! that ends mid-field fails the whole batch.

use bytes::{BufMut, Bytes, BytesMut};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_FIXED64: u8 = 1;
pub const WIRE_LEN: u8 = 2;
pub const WIRE_FIXED32: u8 = 5;

/// `QueryStatsResponse.stat`
pub const FIELD_STAT: u32 = 1;
/// `Stat.name`
pub const FIELD_STAT_NAME: u32 = 1;
/// `Stat.value`
pub const FIELD_STAT_VALUE: u32 = 2;
/// `QueryStatsRequest.pattern`
pub const FIELD_QUERY_PATTERN: u32 = 1;
/// `QueryStatsRequest.reset`
pub const FIELD_QUERY_RESET: u32 = 2;

/// A 64-bit varint never needs more than 10 groups.
pub const MAX_VARINT_LEN: usize = 10;

/// One named counter from a stats response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub name: String,
    pub value: u64,
}

/// Structural decode failure. Offsets are relative to the message being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer ends mid-field at offset {0}")]
    Truncated(usize),
    #[error("varint longer than 10 bytes at offset {0}")]
    VarintOverflow(usize),
    #[error("invalid field number at offset {0}")]
    InvalidFieldNumber(usize),
    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType { wire_type: u8, offset: usize },
}

/// Decode a `QueryStatsResponse` into its counter records.
///
/// Embedded stats without a name are dropped. A stat without a value field carries
/// zero, which is how proto3 encodes it. Any structural error discards the batch.
pub fn decode_stats(buf: &[u8]) -> Result<Vec<CounterRecord>, DecodeError> {
    let mut reader = Reader::new(buf);
    let mut records = Vec::new();

    while !reader.is_empty() {
        let offset = reader.pos;
        let (field, wire_type) = reader.read_tag()?;
        if field == FIELD_STAT && wire_type == WIRE_LEN {
            let body = reader.read_len_delimited()?;
            if let Some(record) = decode_stat(body)? {
                records.push(record);
            }
        } else {
            reader.skip(wire_type, offset)?;
        }
    }

    Ok(records)
}

fn decode_stat(buf: &[u8]) -> Result<Option<CounterRecord>, DecodeError> {
    let mut reader = Reader::new(buf);
    let mut name = None;
    let mut value = 0;

    while !reader.is_empty() {
        let offset = reader.pos;
        match reader.read_tag()? {
            (FIELD_STAT_NAME, WIRE_LEN) => {
                let raw = reader.read_len_delimited()?;
                name = Some(String::from_utf8_lossy(raw).into_owned());
            }
            (FIELD_STAT_VALUE, WIRE_VARINT) => {
                value = reader.read_varint()?;
            }
            (_, wire_type) => reader.skip(wire_type, offset)?,
        }
    }

    Ok(name.map(|name| CounterRecord { name, value }))
}

/// Encode a `QueryStatsRequest`. Default-valued fields are omitted, as proto3 does.
pub fn encode_query_request(pattern: &str, reset: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(pattern.len() + 4);
    if !pattern.is_empty() {
        write_bytes_field(&mut buf, FIELD_QUERY_PATTERN, pattern.as_bytes());
    }
    if reset {
        write_varint_field(&mut buf, FIELD_QUERY_RESET, 1);
    }
    buf.freeze()
}

/// Append one embedded `Stat` to a `QueryStatsResponse` buffer.
pub fn write_counter(buf: &mut BytesMut, name: &str, value: u64) {
    let mut stat = BytesMut::with_capacity(name.len() + 12);
    write_bytes_field(&mut stat, FIELD_STAT_NAME, name.as_bytes());
    if value != 0 {
        write_varint_field(&mut stat, FIELD_STAT_VALUE, value);
    }
    write_bytes_field(buf, FIELD_STAT, &stat);
}

#[allow(clippy::cast_possible_truncation)]
pub fn write_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

#[inline]
pub fn write_tag(buf: &mut BytesMut, field: u32, wire_type: u8) {
    write_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
}

pub fn write_varint_field(buf: &mut BytesMut, field: u32, value: u64) {
    write_tag(buf, field, WIRE_VARINT);
    write_varint(buf, value);
}

pub fn write_bytes_field(buf: &mut BytesMut, field: u32, data: &[u8]) {
    write_tag(buf, field, WIRE_LEN);
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Cursor over one protobuf message.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut result = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos) else {
                return Err(DecodeError::Truncated(start));
            };
            self.pos += 1;
            // The tenth group holds only the top bit of a u64.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(DecodeError::VarintOverflow(start));
            }
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::VarintOverflow(start))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_tag(&mut self) -> Result<(u32, u8), DecodeError> {
        let offset = self.pos;
        let tag = self.read_varint()?;
        let field = tag >> 3;
        if field == 0 || field > u64::from(u32::MAX) {
            return Err(DecodeError::InvalidFieldNumber(offset));
        }
        Ok((field as u32, (tag & 0x07) as u8))
    }

    fn read_len_delimited(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let len = self.read_varint()?;
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| self.pos.checked_add(len))
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::Truncated(start))?;
        let data = &self.buf[self.pos..end];
        self.pos = end;
        Ok(data)
    }

    fn advance(&mut self, n: usize) -> Result<(), DecodeError> {
        if self.buf.len() - self.pos < n {
            return Err(DecodeError::Truncated(self.pos));
        }
        self.pos += n;
        Ok(())
    }

    fn skip(&mut self, wire_type: u8, tag_offset: usize) -> Result<(), DecodeError> {
        match wire_type {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.advance(8),
            WIRE_LEN => self.read_len_delimited().map(|_| ()),
            WIRE_FIXED32 => self.advance(4),
            other => Err(DecodeError::UnsupportedWireType {
                wire_type: other,
                offset: tag_offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(counters: &[(&str, u64)]) -> BytesMut {
        let mut buf = BytesMut::new();
        for (name, value) in counters {
            write_counter(&mut buf, name, *value);
        }
        buf
    }

    fn record(name: &str, value: u64) -> CounterRecord {
        CounterRecord {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn decode_two_counters() {
        let buf = response(&[
            ("user>>>alice>>>traffic>>>uplink", 1000),
            ("user>>>alice>>>traffic>>>downlink", 300_000_000_000),
        ]);
        let records = decode_stats(&buf).unwrap();
        assert_eq!(
            records,
            vec![
                record("user>>>alice>>>traffic>>>uplink", 1000),
                record("user>>>alice>>>traffic>>>downlink", 300_000_000_000),
            ]
        );
    }

    #[test]
    fn decode_empty_buffer() {
        assert_eq!(decode_stats(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn missing_value_is_zero() {
        let buf = response(&[("user>>>bob>>>traffic>>>uplink", 0)]);
        // write_counter omits zero values, like proto3 encoders
        assert_eq!(buf.len(), 2 + 2 + "user>>>bob>>>traffic>>>uplink".len());
        let records = decode_stats(&buf).unwrap();
        assert_eq!(records, vec![record("user>>>bob>>>traffic>>>uplink", 0)]);
    }

    #[test]
    fn stat_without_name_is_dropped() {
        let mut stat = BytesMut::new();
        write_varint_field(&mut stat, FIELD_STAT_VALUE, 42);
        let mut buf = BytesMut::new();
        write_bytes_field(&mut buf, FIELD_STAT, &stat);
        write_counter(&mut buf, "x", 7);

        assert_eq!(decode_stats(&buf).unwrap(), vec![record("x", 7)]);
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let plain = response(&[("a", 1), ("b", 2)]);

        let mut buf = BytesMut::new();
        // top-level noise of every skippable wire type
        write_varint_field(&mut buf, 7, u64::MAX);
        write_tag(&mut buf, 8, WIRE_FIXED64);
        buf.extend_from_slice(&[0xff; 8]);
        write_counter(&mut buf, "a", 1);
        write_bytes_field(&mut buf, 9, b"opaque");
        write_tag(&mut buf, 10, WIRE_FIXED32);
        buf.extend_from_slice(&[0xee; 4]);

        // stat with unknown fields around name and value
        let mut stat = BytesMut::new();
        write_varint_field(&mut stat, 5, 300);
        write_bytes_field(&mut stat, FIELD_STAT_NAME, b"b");
        write_tag(&mut stat, 6, WIRE_FIXED32);
        stat.extend_from_slice(&[1, 2, 3, 4]);
        write_varint_field(&mut stat, FIELD_STAT_VALUE, 2);
        write_bytes_field(&mut stat, 1000, b"trailer");
        write_bytes_field(&mut buf, FIELD_STAT, &stat);

        assert_eq!(decode_stats(&buf).unwrap(), decode_stats(&plain).unwrap());
    }

    #[test]
    fn value_with_wrong_wire_type_is_skipped() {
        let mut stat = BytesMut::new();
        write_bytes_field(&mut stat, FIELD_STAT_NAME, b"n");
        write_bytes_field(&mut stat, FIELD_STAT_VALUE, b"not a varint");
        let mut buf = BytesMut::new();
        write_bytes_field(&mut buf, FIELD_STAT, &stat);

        assert_eq!(decode_stats(&buf).unwrap(), vec![record("n", 0)]);
    }

    #[test]
    fn truncated_length_discards_batch() {
        let mut buf = response(&[("user>>>alice>>>traffic>>>uplink", 1)]);
        let full = buf.len();
        buf.truncate(full - 1);
        assert!(matches!(
            decode_stats(&buf),
            Err(DecodeError::Truncated(_))
        ));
    }

    #[test]
    fn truncated_tail_after_valid_record_discards_batch() {
        let mut buf = response(&[("a", 1), ("b", 2)]);
        // dangling varint field: tag then a continuation byte with nothing after
        write_tag(&mut buf, 3, WIRE_VARINT);
        buf.put_u8(0x80);
        assert_eq!(decode_stats(&buf), Err(DecodeError::Truncated(buf.len() - 1)));
    }

    #[test]
    fn truncated_fixed_field() {
        let mut buf = BytesMut::new();
        write_tag(&mut buf, 4, WIRE_FIXED64);
        buf.extend_from_slice(&[0; 7]);
        assert_eq!(decode_stats(&buf), Err(DecodeError::Truncated(1)));
    }

    #[test]
    fn overlong_varint() {
        let mut buf = BytesMut::new();
        write_tag(&mut buf, 3, WIRE_VARINT);
        buf.extend_from_slice(&[0xff; 11]);
        assert_eq!(decode_stats(&buf), Err(DecodeError::VarintOverflow(1)));
    }

    #[test]
    fn max_u64_varint_roundtrips() {
        let buf = response(&[("max", u64::MAX)]);
        assert_eq!(decode_stats(&buf).unwrap(), vec![record("max", u64::MAX)]);
    }

    #[test]
    fn group_wire_type_is_rejected() {
        let mut buf = BytesMut::new();
        write_tag(&mut buf, 2, 3);
        assert_eq!(
            decode_stats(&buf),
            Err(DecodeError::UnsupportedWireType {
                wire_type: 3,
                offset: 0
            })
        );
    }

    #[test]
    fn field_number_zero_is_rejected() {
        assert_eq!(
            decode_stats(&[0x02, 0x00]),
            Err(DecodeError::InvalidFieldNumber(0))
        );
    }

    #[test]
    fn invalid_utf8_name_is_lossy() {
        let mut stat = BytesMut::new();
        write_bytes_field(&mut stat, FIELD_STAT_NAME, &[b'a', 0xff, b'b']);
        let mut buf = BytesMut::new();
        write_bytes_field(&mut buf, FIELD_STAT, &stat);

        let records = decode_stats(&buf).unwrap();
        assert_eq!(records[0].name, "a\u{fffd}b");
    }

    #[test]
    fn query_request_encoding() {
        let req = encode_query_request("user>>>", false);
        assert_eq!(&req[..], b"\x0a\x07user>>>");

        let req = encode_query_request("user>>>", true);
        assert_eq!(&req[..], b"\x0a\x07user>>>\x10\x01");

        assert!(encode_query_request("", false).is_empty());
    }

    #[test]
    fn multi_byte_length_prefix() {
        let long_name = "u".repeat(300);
        let buf = response(&[(&long_name, 5)]);
        let records = decode_stats(&buf).unwrap();
        assert_eq!(records[0].name.len(), 300);
        assert_eq!(records[0].value, 5);
    }
}
