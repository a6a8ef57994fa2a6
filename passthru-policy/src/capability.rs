//! Sink capability parsing
//!
//! A capability report carries the integer encodings the sink accepts. The
//! backend separately exposes a descriptor string (`hdmi_encodings=pcm;ac3`)
//! which is parsed into an ordered encoding list for observability only.

use crate::error::{Error, Result};
use passthru_common::Encoding;
use serde::{Deserialize, Serialize};

/// Inbound capability report from the sink event source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    /// Platform encoding codes; `None` when the event carried no list
    #[serde(default)]
    pub encodings: Option<Vec<i32>>,
}

impl CapabilityReport {
    pub fn new(encodings: Vec<i32>) -> Self {
        Self {
            encodings: Some(encodings),
        }
    }
}

/// Normalized result of a capability report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// AC-3 was present in the report
    pub dolby_supported: bool,
    /// Descriptor encodings in token order; `None` means no information
    pub encodings: Option<Vec<Encoding>>,
}

/// True iff the AC-3 code is present; empty and absent lists are false
pub fn dolby_supported(encodings: Option<&[i32]>) -> bool {
    encodings
        .map(|codes| codes.contains(&Encoding::AC3_CODE))
        .unwrap_or(false)
}

/// Parse a backend descriptor of the form `key=tok1;tok2;...`
///
/// Empty trailing pieces are dropped before counting, so `hdmi_encodings=`
/// is malformed and `pcm;ac3;` yields two encodings. Unrecognized tokens keep
/// their position as `Encoding::Unknown`.
///
/// # Errors
/// `Error::MalformedDescriptor` unless the string has exactly one key and one
/// value part.
pub fn parse_descriptor(raw: &str) -> Result<Vec<Encoding>> {
    let parts = split_trimmed(raw, '=');
    let [_, value] = parts.as_slice() else {
        return Err(Error::MalformedDescriptor(raw.to_string()));
    };

    Ok(split_trimmed(*value, ';')
        .into_iter()
        .map(Encoding::from_token)
        .collect())
}

/// Render encodings as their platform codes, e.g. `[2, 5]`
pub fn format_encoding_codes(encodings: &[Encoding]) -> String {
    let codes: Vec<String> = encodings.iter().map(|e| e.code().to_string()).collect();
    format!("[{}]", codes.join(", "))
}

fn split_trimmed(input: &str, sep: char) -> Vec<&str> {
    let mut parts: Vec<&str> = input.split(sep).collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}
