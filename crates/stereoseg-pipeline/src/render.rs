//! Segment boundary visualization.
//!
//! Paints segment boundaries over a copy of the left image in two passes:
//!
//! 1. Every label discontinuity gets a thin neutral gray seam.
//! 2. Each discontinuity is looked up in the [`BoundaryRelations`] and,
//!    unless the relation is [`RelationKind::Invalid`], overdrawn with a
//!    thick colored band: green on both sides for coplanar boundaries, red
//!    on the foreground side and blue on the background side for
//!    occlusions.
//!
//! A pixel is compared with its right neighbor and its bottom neighbor
//! whenever that neighbor exists. The "near" side of a seam runs from the
//! tested pixel backward, the "far" side from the neighbor forward.

use image::Rgb;

use crate::relation::{BoundaryRelation, BoundaryRelations, RelationKind};
use crate::types::{LabelMap, PipelineError, RgbImage, SegmentId};

/// Color of the pass-1 seam drawn at every label discontinuity.
pub const BOUNDARY_GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// Color of both sides of a coplanar boundary.
pub const COPLANAR_GREEN: Rgb<u8> = Rgb([0, 225, 0]);

/// Color of the occluding side of an occlusion boundary.
pub const FOREGROUND_RED: Rgb<u8> = Rgb([225, 0, 0]);

/// Color of the occluded side of an occlusion boundary.
pub const BACKGROUND_BLUE: Rgb<u8> = Rgb([0, 0, 225]);

/// Pass-1 band width: one pixel on each side of the seam.
pub const BASE_THICKNESS: u32 = 2;

/// Pass-2 band width: six pixels on each side of the seam.
pub const OVERLAY_THICKNESS: u32 = 7;

/// Direction in which a seam's neighbor lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Neighbor is to the right; bands run along the row.
    Horizontal,
    /// Neighbor is below; bands run along the column.
    Vertical,
}

/// Render the boundary visualization for one image pair.
///
/// Returns a new image; neither input is modified. Rendering the same
/// inputs twice yields identical output.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `reference` and
/// `labels` differ in size, and [`PipelineError::UnmatchedBoundary`] for
/// the first adjacent label pair (in raster order) that has no relation.
pub fn render_boundaries(
    reference: &RgbImage,
    labels: &LabelMap,
    relations: &BoundaryRelations,
) -> Result<RgbImage, PipelineError> {
    let expected = labels.dimensions();
    let (width, height) = reference.dimensions();
    if (width, height) != (expected.width, expected.height) {
        return Err(PipelineError::DimensionMismatch {
            expected,
            actual: crate::Dimensions { width, height },
        });
    }

    let mut output = reference.clone();

    for_each_seam(labels, |x, y, axis, _, _| {
        paint_seam(
            &mut output,
            x,
            y,
            axis,
            BASE_THICKNESS,
            BOUNDARY_GRAY,
            BOUNDARY_GRAY,
        );
        Ok(())
    })?;

    for_each_seam(labels, |x, y, axis, label, neighbor| {
        let relation = relations
            .lookup(label, neighbor)
            .ok_or(PipelineError::UnmatchedBoundary {
                a: label,
                b: neighbor,
                x,
                y,
            })?;
        if let Some((near, far)) = overlay_colors(relation, label) {
            paint_seam(&mut output, x, y, axis, OVERLAY_THICKNESS, near, far);
        }
        Ok(())
    })?;

    Ok(output)
}

/// Pass-2 colors `(near, far)` for a seam whose near pixel has label
/// `near_label`, or `None` when the boundary is not overdrawn.
///
/// For occlusions the side is chosen by comparing `near_label` with the
/// relation's foreground segment, so the result does not depend on which
/// geometric side of the seam the foreground lies.
#[must_use]
pub fn overlay_colors(
    relation: &BoundaryRelation,
    near_label: SegmentId,
) -> Option<(Rgb<u8>, Rgb<u8>)> {
    match relation.kind() {
        RelationKind::Invalid => None,
        RelationKind::Coplanar => Some((COPLANAR_GREEN, COPLANAR_GREEN)),
        RelationKind::ForegroundIsA | RelationKind::ForegroundIsB => {
            if relation.foreground() == Some(near_label) {
                Some((FOREGROUND_RED, BACKGROUND_BLUE))
            } else {
                Some((BACKGROUND_BLUE, FOREGROUND_RED))
            }
        }
    }
}

/// Call `visit(x, y, axis, label, neighbor_label)` for every label
/// discontinuity in raster order, horizontal before vertical per pixel.
///
/// The last row still gets right tests and the last column bottom tests,
/// and an Invalid horizontal seam does not skip the vertical test of the
/// same pixel.
fn for_each_seam(
    labels: &LabelMap,
    mut visit: impl FnMut(u32, u32, Axis, SegmentId, SegmentId) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    let (width, height) = (labels.width(), labels.height());
    for y in 0..height {
        for x in 0..width {
            let label = labels.get(x, y);
            if x + 1 < width {
                let right = labels.get(x + 1, y);
                if right != label {
                    visit(x, y, Axis::Horizontal, label, right)?;
                }
            }
            if y + 1 < height {
                let below = labels.get(x, y + 1);
                if below != label {
                    visit(x, y, Axis::Vertical, label, below)?;
                }
            }
        }
    }
    Ok(())
}

/// Paint `thickness - 1` pixels backward from `(x, y)` with `near` and
/// `thickness - 1` pixels forward from its neighbor with `far`, clamped to
/// the image.
fn paint_seam(
    image: &mut RgbImage,
    x: u32,
    y: u32,
    axis: Axis,
    thickness: u32,
    near: Rgb<u8>,
    far: Rgb<u8>,
) {
    let (position, limit) = match axis {
        Axis::Horizontal => (x, image.width()),
        Axis::Vertical => (y, image.height()),
    };
    let mut put = |along: u32, color: Rgb<u8>| match axis {
        Axis::Horizontal => image.put_pixel(along, y, color),
        Axis::Vertical => image.put_pixel(x, along, color),
    };

    for offset in 0..thickness - 1 {
        let Some(along) = position.checked_sub(offset) else {
            break;
        };
        put(along, near);
    }
    for offset in 1..thickness {
        let along = position + offset;
        if along >= limit {
            break;
        }
        put(along, far);
    }
}
