//! Label (boundary relation) file serializer.
//!
//! One line per relation, in the order the engine produced them:
//!
//! ```text
//! <segment_a> <segment_b> <code>
//! ```
//!
//! with codes 0 (A in front), 1 (B in front), 2 (coplanar), 3 (invalid).

use std::fmt::Write;

use stereoseg_pipeline::{BoundaryRelation, RelationKind, SegmentId};

use crate::{ParseError, fields, number};

/// Serialize relations in the given order.
///
/// # Examples
///
/// ```
/// use stereoseg_pipeline::{BoundaryRelation, RelationKind};
/// use stereoseg_export::to_relation_text;
///
/// let relations = [
///     BoundaryRelation::new(0, 1, RelationKind::ForegroundIsB).unwrap(),
///     BoundaryRelation::new(1, 2, RelationKind::Invalid).unwrap(),
/// ];
/// assert_eq!(to_relation_text(&relations), "0 1 1\n1 2 3\n");
/// ```
#[must_use]
pub fn to_relation_text(relations: &[BoundaryRelation]) -> String {
    let mut out = String::new();
    for relation in relations {
        let _ = writeln!(
            out,
            "{} {} {}",
            relation.segment_a(),
            relation.segment_b(),
            relation.kind().code()
        );
    }
    out
}

/// Parse a label file back into relations, preserving line order.
///
/// # Errors
///
/// Returns [`ParseError`] for the first line that is not three integers,
/// carries an unknown code, or pairs a segment with itself.
pub fn parse_relation_text(text: &str) -> Result<Vec<BoundaryRelation>, ParseError> {
    text.lines()
        .enumerate()
        .map(|(index, content)| {
            let line = index + 1;
            let [a, b, code] = fields::<3>(content, line)?;
            let a: SegmentId = number(a, line)?;
            let b: SegmentId = number(b, line)?;
            let code: u8 = number(code, line)?;
            let kind =
                RelationKind::from_code(code).ok_or(ParseError::UnknownCode { line, code })?;
            BoundaryRelation::new(a, b, kind).map_err(|source| ParseError::Relation { line, source })
        })
        .collect()
}
