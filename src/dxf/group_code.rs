//! Binary DXF group-code/value codec (spec.md §4.1 `GroupCodeCodec`).
//!
//! Grounded on the teacher's winnow-based binary readers
//! (`data::idx`, `data::parser_utils`): small `fn(&mut &[u8]) -> WResult<T>`
//! parsers composed with `winnow::binary::{le_*}`, offset-carrying errors.

use winnow::Parser;
use winnow::binary::{le_f64, le_i16, le_i32, le_u8};
use winnow::error::ContextError;
use winnow::token::take;

use super::DxfError;

/// The literal 22-byte binary-DXF sentinel.
pub const SENTINEL: &[u8; 22] = b"AutoCAD Binary DXF\r\n\x1a\0";

/// A decoded group-code value. `Int64` exists for codec completeness (no
/// group-code range maps to it per the inference table, but a producer may
/// emit one and it must still round-trip as a raw 8-byte LE integer under
/// the fallback-to-string fallback described in spec.md §4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Double(f64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub code: u16,
    pub value: Value,
}

impl Record {
    pub fn new(code: u16, value: Value) -> Self {
        Record { code, value }
    }

    pub fn str(code: u16, s: impl Into<String>) -> Self {
        Record::new(code, Value::Str(s.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match &self.value {
            Value::Int16(v) => Some(*v as i32),
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Double,
    Int16,
    Int32,
    Binary,
}

/// Value-type inference by group-code range, per spec.md §4.1's table.
pub fn infer_value_type(code: u16) -> ValueType {
    match code {
        0..=9 | 100..=102 | 105 | 300..=369 | 390..=399 | 410..=419 | 430..=439 | 470..=481 | 999 | 1000..=1009 => ValueType::Str,
        10..=59 | 110..=149 | 210..=239 | 460..=469 | 1010..=1059 => ValueType::Double,
        60..=79 | 170..=179 | 270..=289 | 370..=389 | 400..=409 | 1060..=1070 => ValueType::Int16,
        90..=99 | 420..=429 | 440..=449 | 1071 => ValueType::Int32,
        1004 => ValueType::Binary,
        _ => ValueType::Str,
    }
}

/// Decode a stream of `(code, value)` records from a binary-DXF byte buffer,
/// *excluding* the leading 22-byte sentinel (callers check/skip that via
/// [`check_sentinel`]). Stops at end-of-buffer or a `(0, "EOF")` record.
pub fn decode(input: &[u8]) -> Result<Vec<Record>, DxfError> {
    let total_len = input.len();
    let mut cursor = input;
    let mut records = Vec::new();
    while !cursor.is_empty() {
        let offset = total_len - cursor.len();
        let code = decode_group_code(&mut cursor).map_err(|_| DxfError::TruncatedRecord { offset })?;
        let value_type = infer_value_type(code);
        let value = decode_value(&mut cursor, value_type).map_err(|_| DxfError::TruncatedRecord { offset })?;
        let is_eof = code == 0 && matches!(&value, Value::Str(s) if s == "EOF");
        records.push(Record { code, value });
        if is_eof {
            break;
        }
    }
    Ok(records)
}

fn decode_group_code(input: &mut &[u8]) -> Result<u16, ()> {
    let marker: u8 = le_u8.parse_next(input).map_err(|_: winnow::error::ErrMode<ContextError>| ())?;
    if marker == 0xFF {
        let code: i16 = le_i16.parse_next(input).map_err(|_| ())?;
        Ok(code as u16)
    } else {
        Ok(marker as u16)
    }
}

fn decode_value(input: &mut &[u8], value_type: ValueType) -> Result<Value, ()> {
    match value_type {
        ValueType::Str => {
            let s = decode_null_terminated_string(input)?;
            Ok(Value::Str(s))
        }
        ValueType::Double => {
            let d: f64 = le_f64.parse_next(input).map_err(|_| ())?;
            Ok(Value::Double(d))
        }
        ValueType::Int16 => {
            let v: i16 = le_i16.parse_next(input).map_err(|_| ())?;
            Ok(Value::Int16(v))
        }
        ValueType::Int32 => {
            let v: i32 = le_i32.parse_next(input).map_err(|_| ())?;
            Ok(Value::Int32(v))
        }
        ValueType::Binary => {
            let len: u8 = le_u8.parse_next(input).map_err(|_| ())?;
            let bytes: &[u8] = take(len as usize).parse_next(input).map_err(|_: winnow::error::ErrMode<ContextError>| ())?;
            Ok(Value::Binary(bytes.to_vec()))
        }
    }
}

fn decode_null_terminated_string(input: &mut &[u8]) -> Result<String, ()> {
    let pos = input.iter().position(|&b| b == 0).ok_or(())?;
    let bytes: &[u8] = take(pos).parse_next(input).map_err(|_: winnow::error::ErrMode<ContextError>| ())?;
    let _: u8 = le_u8.parse_next(input).map_err(|_| ())?; // consume the null terminator
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Encode `records` back into a binary-DXF byte stream (sentinel excluded;
/// see [`encode_with_sentinel`] for the full file). The exact inverse of
/// [`decode`] for any record stream this codec itself produced (spec.md §4.1,
/// universal property 5).
pub fn encode(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        encode_group_code(&mut out, record.code);
        encode_value(&mut out, &record.value);
    }
    out
}

fn encode_group_code(out: &mut Vec<u8>, code: u16) {
    if code <= 254 {
        out.push(code as u8);
    } else {
        out.push(0xFF);
        out.extend_from_slice(&(code as i16).to_le_bytes());
    }
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Str(s) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        Value::Double(d) => out.extend_from_slice(&d.to_le_bytes()),
        Value::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Binary(bytes) => {
            out.push(bytes.len() as u8);
            out.extend_from_slice(bytes);
        }
    }
}

/// Verify the leading 22 bytes of `input` match [`SENTINEL`].
pub fn check_sentinel(input: &[u8]) -> Result<(), DxfError> {
    if input.len() < SENTINEL.len() || &input[..SENTINEL.len()] != SENTINEL {
        return Err(DxfError::BadSentinel);
    }
    Ok(())
}

/// Prepend the sentinel to an encoded record stream, producing a complete
/// binary-DXF file.
pub fn encode_with_sentinel(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SENTINEL.len() + records.len() * 8);
    out.extend_from_slice(SENTINEL);
    out.extend(encode(records));
    out
}
