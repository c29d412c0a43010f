//! Canonical single-line text encoding of job parameters.
//!
//! The encoding is compact JSON with mapping keys in sorted order, so
//! structurally equal values always produce byte-identical text. That
//! makes an encoded parameter set usable as a dedup or cache key.
//!
//! Two decoders are provided:
//!
//! - [`decode`] sniffs the shape of the text first and passes anything that
//!   does not look encoded through as a plain string. Values already stored
//!   by older schedulers depend on this.
//! - [`decode_strict`] requires a complete encoding and never guesses. New
//!   code paths should use it.

use crate::ParamValue;
use std::fmt::Write;

/// Text was recognized as an encoded structure but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("cannot decode parameter text {text:?}: {source}")]
pub struct DecodeError {
    /// The offending input
    pub text: String,
    #[source]
    source: serde_json::Error,
}

/// Encode a parameter structure to its canonical one-line form.
pub fn encode(value: &ParamValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &ParamValue) {
    match value {
        ParamValue::Null => out.push_str("null"),
        ParamValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ParamValue::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        // JSON has no NaN/inf; they degrade to null.
        ParamValue::Float(f) if !f.is_finite() => out.push_str("null"),
        ParamValue::Float(f) => {
            let _ = write!(out, "{:?}", f);
        }
        ParamValue::String(s) => write_string(out, s),
        ParamValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        ParamValue::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Whether `text` has the shape of an encoded structure.
///
/// True for fully quoted text, text wrapped in braces, and text that
/// merely starts with `[`.
pub fn is_encoded(text: &str) -> bool {
    let quoted = text.len() >= 2 && text.starts_with('"') && text.ends_with('"');
    let braced = text.starts_with('{') && text.ends_with('}');
    // Compatibility shim: stored values were only ever checked for the
    // opening bracket. Do not copy this into new formats.
    let bracketed = text.starts_with('[');
    quoted || braced || bracketed
}

/// `null`, `true`, `false` or a JSON number with no surrounding whitespace.
fn is_scalar_literal(text: &str) -> bool {
    match text {
        "null" | "true" | "false" => true,
        _ => {
            text.starts_with(|c: char| c == '-' || c.is_ascii_digit())
                && text.ends_with(|c: char| c.is_ascii_digit())
                && serde_json::from_str::<serde_json::Number>(text).is_ok()
        }
    }
}

/// Decode text that may or may not be an encoded structure.
///
/// Text that does not look encoded comes back unchanged as a string
/// scalar. Text that does look encoded must parse completely, otherwise a
/// [`DecodeError`] is returned.
///
/// A bare `null`, boolean or number is typed only when it is exactly the
/// canonical encoding of that value, so `1.10`, `1e5` or a 20-digit id
/// stay strings and are never rewritten.
pub fn decode(text: &str) -> Result<ParamValue, DecodeError> {
    if is_encoded(text) {
        return decode_strict(text);
    }

    if is_scalar_literal(text) {
        if let Ok(value) = decode_strict(text) {
            if encode(&value) == text {
                return Ok(value);
            }
        }
    }
    Ok(ParamValue::String(text.to_string()))
}

/// Decode text that is required to be a complete encoding.
pub fn decode_strict(text: &str) -> Result<ParamValue, DecodeError> {
    serde_json::from_str(text).map_err(|source| DecodeError {
        text: text.to_string(),
        source,
    })
}
