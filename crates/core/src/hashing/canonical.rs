//! Canonical byte encoding of requests
//!
//! Every value is written as a one-byte type tag followed by a big-endian
//! `u64` length (or element count) and its content. Two different inputs can
//! therefore never serialize to the same bytes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use zrata_domain::{CacheError, ParamValue, Result};

/// Leading bytes of every encoding; bump when the layout changes
const LAYOUT_VERSION: &[u8] = b"zrata-request-v1";

mod tag {
    pub const NULL: u8 = b'n';
    pub const BOOL: u8 = b'b';
    pub const INT: u8 = b'i';
    pub const FLOAT: u8 = b'f';
    pub const STR: u8 = b's';
    pub const SEQ: u8 = b'l';
    pub const MAP: u8 = b'm';
}

/// Canonical decimal text of a number
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Number {
    Int(String),
    Float(String),
}

impl Number {
    fn text(&self) -> &str {
        match self {
            Self::Int(s) | Self::Float(s) => s,
        }
    }
}

/// Render a float with `precision` fractional digits
///
/// Trailing zeros are trimmed. A value with nothing left after the point is
/// reported as an integer, so `10.0` and `10` compare equal, and `-0.0`
/// becomes `0`.
pub(crate) fn canonical_float(value: f64, precision: u8) -> Result<Number> {
    if !value.is_finite() {
        return Err(CacheError::invalid_request(format!(
            "float parameter {value} has no canonical form"
        )));
    }

    let mut text = format!("{value:.prec$}", prec = usize::from(precision));
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_owned();
    }

    Ok(if text.contains('.') { Number::Float(text) } else { Number::Int(text) })
}

/// Incremental encoder for the canonical request layout
pub(crate) struct CanonicalEncoder {
    buf: Vec<u8>,
    precision: u8,
}

impl CanonicalEncoder {
    pub(crate) fn new(precision: u8) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(LAYOUT_VERSION);
        Self { buf, precision }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn write_len(&mut self, len: usize) {
        self.buf.extend_from_slice(&(len as u64).to_be_bytes());
    }

    fn write_tagged(&mut self, tag: u8, bytes: &[u8]) {
        self.buf.push(tag);
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn write_str(&mut self, value: &str) {
        self.write_tagged(tag::STR, value.as_bytes());
    }

    pub(crate) fn write_map(&mut self, map: &BTreeMap<String, ParamValue>) -> Result<()> {
        self.buf.push(tag::MAP);
        self.write_len(map.len());
        for (key, value) in map {
            if key.is_empty() {
                return Err(CacheError::invalid_request("parameter keys must not be empty"));
            }
            self.write_str(key);
            self.write_value(value)?;
        }
        Ok(())
    }

    pub(crate) fn write_value(&mut self, value: &ParamValue) -> Result<()> {
        match value {
            ParamValue::Null => self.write_tagged(tag::NULL, &[]),
            ParamValue::Bool(b) => self.write_tagged(tag::BOOL, &[u8::from(*b)]),
            ParamValue::Int(i) => self.write_tagged(tag::INT, i.to_string().as_bytes()),
            ParamValue::Float(f) => match canonical_float(*f, self.precision)? {
                Number::Int(text) => self.write_tagged(tag::INT, text.as_bytes()),
                Number::Float(text) => self.write_tagged(tag::FLOAT, text.as_bytes()),
            },
            ParamValue::Str(s) => self.write_str(s),
            ParamValue::Seq(items) => {
                self.buf.push(tag::SEQ);
                self.write_len(items.len());
                for item in items {
                    self.write_value(item)?;
                }
            }
            ParamValue::Map(map) => self.write_map(map)?,
        }
        Ok(())
    }
}

/// Compact JSON-like rendering with sorted keys and canonical numbers
pub(crate) fn render_map(map: &BTreeMap<String, ParamValue>, precision: u8) -> Result<String> {
    let mut out = String::new();
    render_map_into(&mut out, map, precision)?;
    Ok(out)
}

fn render_map_into(
    out: &mut String,
    map: &BTreeMap<String, ParamValue>,
    precision: u8,
) -> Result<()> {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_quoted(out, key);
        out.push(':');
        render_value_into(out, value, precision)?;
    }
    out.push('}');
    Ok(())
}

fn render_value_into(out: &mut String, value: &ParamValue, precision: u8) -> Result<()> {
    match value {
        ParamValue::Null => out.push_str("null"),
        ParamValue::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        ParamValue::Int(i) => {
            let _ = write!(out, "{i}");
        }
        ParamValue::Float(f) => out.push_str(canonical_float(*f, precision)?.text()),
        ParamValue::Str(s) => push_quoted(out, s),
        ParamValue::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_value_into(out, item, precision)?;
            }
            out.push(']');
        }
        ParamValue::Map(map) => render_map_into(out, map, precision)?,
    }
    Ok(())
}

fn push_quoted(out: &mut String, s: &str) {
    // serde_json escaping of a plain string cannot fail
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => {
            let _ = write!(out, "{s:?}");
        }
    }
}
