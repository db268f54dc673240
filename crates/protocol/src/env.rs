//! Environment block encoding.
//!
//! Each pair is written as `key=value`, pairs are separated by NUL and the
//! block ends with one NUL. An empty mapping encodes to a single NUL.

use crate::error::{ProtocolError, Result};

/// Encode `key=value` pairs into a NUL-separated, NUL-terminated block.
pub fn encode_env_block<'a, I>(pairs: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut block = Vec::new();
    let mut first = true;

    for (key, value) in pairs {
        if key.is_empty() || key.contains('=') {
            return Err(ProtocolError::InvalidEnvKey(key.to_string()));
        }
        if key.contains('\0') {
            return Err(ProtocolError::InteriorNul { field: "environment key" });
        }
        if value.contains('\0') {
            return Err(ProtocolError::InteriorNul { field: "environment value" });
        }

        if !first {
            block.push(0);
        }
        first = false;

        block.extend_from_slice(key.as_bytes());
        block.push(b'=');
        block.extend_from_slice(value.as_bytes());
    }

    block.push(0);
    Ok(block)
}

/// Decode an environment block back into pairs.
///
/// Decoding stops at the first empty entry, so both the bare block and the
/// block with an extra boundary terminator are accepted.
pub fn decode_env_block(block: &[u8]) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();

    for entry in block.split(|b| *b == 0) {
        if entry.is_empty() {
            break;
        }
        let entry = std::str::from_utf8(entry)
            .map_err(|_| ProtocolError::InvalidUtf8 { field: "environment block" })?;
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| ProtocolError::MalformedEnvEntry(entry.to_string()))?;
        pairs.push((key.to_string(), value.to_string()));
    }

    Ok(pairs)
}
