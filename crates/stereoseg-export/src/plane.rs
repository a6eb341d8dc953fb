//! Plane file serializer.
//!
//! One line per segment in ascending id order:
//!
//! ```text
//! <a> <b> <c>
//! ```
//!
//! so that line `i` (0-based) holds the plane `d = a*x + b*y + c` of
//! segment `i`. Values use the shortest decimal text that reads back to the
//! same `f64`.

use std::fmt::Write;

use stereoseg_pipeline::PlaneCoefficients;

use crate::{ParseError, fields, number};

/// Serialize per-segment planes, indexed by segment id.
///
/// # Examples
///
/// ```
/// use stereoseg_pipeline::PlaneCoefficients;
/// use stereoseg_export::to_plane_text;
///
/// let planes = [
///     PlaneCoefficients::new(0.5, -0.25, 12.0),
///     PlaneCoefficients::fronto_parallel(3.0),
/// ];
/// assert_eq!(to_plane_text(&planes), "0.5 -0.25 12\n0 0 3\n");
/// ```
#[must_use]
pub fn to_plane_text(planes: &[PlaneCoefficients]) -> String {
    let mut out = String::new();
    for plane in planes {
        let _ = writeln!(out, "{} {} {}", plane.a, plane.b, plane.c);
    }
    out
}

/// Parse a plane file back into per-segment planes.
///
/// # Errors
///
/// Returns [`ParseError`] for the first line without exactly three
/// floating-point fields.
pub fn parse_plane_text(text: &str) -> Result<Vec<PlaneCoefficients>, ParseError> {
    text.lines()
        .enumerate()
        .map(|(index, content)| {
            let line = index + 1;
            let [a, b, c] = fields::<3>(content, line)?;
            Ok(PlaneCoefficients::new(
                number(a, line)?,
                number(b, line)?,
                number(c, line)?,
            ))
        })
        .collect()
}
