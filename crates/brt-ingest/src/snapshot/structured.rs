//! Native JSON encoding of a whole snapshot

use brt_common::Snapshot;
use serde_json::Value;

/// Pretty JSON, feed key order kept, non-ASCII escaped as `\uXXXX`
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    let text = serde_json::to_string_pretty(snapshot)?;
    Ok(escape_non_ascii(&text).into_bytes())
}

pub fn decode(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Replace every non-ASCII char of serialized JSON with its escape sequence.
///
/// Only valid on JSON text: outside string literals serialized JSON is pure
/// ASCII, so the replacement never lands outside a string.
pub fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];

    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{:04x}", unit));
        }
    }

    out
}
