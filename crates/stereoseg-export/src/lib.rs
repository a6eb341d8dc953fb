//! stereoseg-export: Pure text serializers (sans-IO)
//!
//! Converts segmentation results into the whitespace-separated text files
//! written next to the image artifacts, and parses them back:
//!
//! - plane file: one `a b c` line per segment, in segment id order
//! - label file: one `segA segB code` line per boundary relation

pub mod plane;
pub mod relation;

pub use plane::{parse_plane_text, to_plane_text};
pub use relation::{parse_relation_text, to_relation_text};

/// A line of a plane or label file could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The line has the wrong number of whitespace-separated fields.
    #[error("line {line}: expected {expected} fields, found {actual}")]
    FieldCount {
        line: usize,
        expected: usize,
        actual: usize,
    },

    /// A field is not a number of the expected type.
    #[error("line {line}: invalid number {value:?}")]
    InvalidNumber { line: usize, value: String },

    /// A relation code outside `0..=3`.
    #[error("line {line}: unknown relation code {code}")]
    UnknownCode { line: usize, code: u8 },

    /// The record is well-formed text but not a valid relation.
    #[error("line {line}: {source}")]
    Relation {
        line: usize,
        #[source]
        source: stereoseg_pipeline::PipelineError,
    },
}

/// Split a line into exactly `N` fields, or report the 1-based `line`.
fn fields<const N: usize>(text: &str, line: usize) -> Result<[&str; N], ParseError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    <[&str; N]>::try_from(parts.as_slice()).map_err(|_| ParseError::FieldCount {
        line,
        expected: N,
        actual: parts.len(),
    })
}

/// Parse one numeric field.
fn number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        value: value.to_owned(),
    })
}
