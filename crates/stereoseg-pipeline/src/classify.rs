//! Boundary relation classification.
//!
//! Every adjacent segment pair gets exactly one [`BoundaryRelation`]. The
//! two planes are sampled at the midpoints of the pixel edges they share
//! and three hypotheses are scored:
//!
//! - coplanar: `hinge_penalty + smoothness_weight * mean((dA - dB)^2)`
//! - A in front: `occlusion_penalty + impossible_penalty * P(dA <= dB)`
//! - B in front: `occlusion_penalty + impossible_penalty * P(dB <= dA)`
//!
//! The cheapest wins; ties prefer coplanar, then A, then B. Pairs where
//! either segment has no plane, or where a plane leaves the searched
//! disparity range along the boundary, are [`RelationKind::Invalid`].

use std::collections::HashMap;

use crate::relation::{BoundaryRelation, BoundaryRelations, RelationKind};
use crate::types::{EngineConfig, LabelMap, PipelineError, PlaneCoefficients, SegmentId, canonical_pair};

/// Classify every adjacent pair of `labels`.
///
/// Relations are emitted in first-occurrence raster order with
/// `segment_a < segment_b`. `planes` is indexed by segment id; ids beyond
/// its length count as unfit.
///
/// # Errors
///
/// Propagates relation construction errors, which cannot occur for pairs
/// taken from a label map.
pub fn classify_relations(
    labels: &LabelMap,
    planes: &[Option<PlaneCoefficients>],
    config: &EngineConfig,
) -> Result<BoundaryRelations, PipelineError> {
    let samples = boundary_samples(labels);
    let records = labels
        .adjacent_pairs()
        .into_iter()
        .map(|(a, b)| {
            let plane_of = |id: SegmentId| planes.get(usize::from(id)).copied().flatten();
            let points = samples.get(&(a, b)).map_or(&[][..], Vec::as_slice);
            let kind = classify_pair(plane_of(a), plane_of(b), points, config);
            BoundaryRelation::new(a, b, kind)
        })
        .collect::<Result<Vec<_>, _>>()?;
    BoundaryRelations::new(records)
}

/// Relation kind for one pair given its planes and shared edge midpoints.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classify_pair(
    plane_a: Option<PlaneCoefficients>,
    plane_b: Option<PlaneCoefficients>,
    points: &[(f64, f64)],
    config: &EngineConfig,
) -> RelationKind {
    let (Some(plane_a), Some(plane_b)) = (plane_a, plane_b) else {
        return RelationKind::Invalid;
    };
    if points.is_empty() {
        return RelationKind::Invalid;
    }

    let max = f64::from(config.max_disparity);
    let in_range = |d: f64| (0.0..=max).contains(&d);
    let n = points.len() as f64;

    let mut gap_sq = 0.0;
    let mut a_behind = 0_usize;
    let mut b_behind = 0_usize;
    for &(x, y) in points {
        let da = plane_a.disparity_at(x, y);
        let db = plane_b.disparity_at(x, y);
        if !in_range(da) || !in_range(db) {
            return RelationKind::Invalid;
        }
        gap_sq += (da - db).powi(2);
        a_behind += usize::from(da <= db);
        b_behind += usize::from(db <= da);
    }

    let coplanar = config
        .smoothness_weight
        .mul_add(gap_sq / n, config.hinge_penalty);
    let a_front = config
        .impossible_penalty
        .mul_add(a_behind as f64 / n, config.occlusion_penalty);
    let b_front = config
        .impossible_penalty
        .mul_add(b_behind as f64 / n, config.occlusion_penalty);

    if coplanar <= a_front && coplanar <= b_front {
        RelationKind::Coplanar
    } else if a_front <= b_front {
        RelationKind::ForegroundIsA
    } else {
        RelationKind::ForegroundIsB
    }
}

/// Midpoints of the pixel edges shared by each canonical pair.
fn boundary_samples(labels: &LabelMap) -> HashMap<(SegmentId, SegmentId), Vec<(f64, f64)>> {
    let mut samples: HashMap<_, Vec<_>> = HashMap::new();
    let (width, height) = (labels.width(), labels.height());
    for y in 0..height {
        for x in 0..width {
            let label = labels.get(x, y);
            let (fx, fy) = (f64::from(x), f64::from(y));
            if x + 1 < width {
                let right = labels.get(x + 1, y);
                if right != label {
                    samples
                        .entry(canonical_pair(label, right))
                        .or_default()
                        .push((fx + 0.5, fy));
                }
            }
            if y + 1 < height {
                let below = labels.get(x, y + 1);
                if below != label {
                    samples
                        .entry(canonical_pair(label, below))
                        .or_default()
                        .push((fx, fy + 0.5));
                }
            }
        }
    }
    samples
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEAM: [(f64, f64); 3] = [(3.5, 0.0), (3.5, 1.0), (3.5, 2.0)];

    fn flat(d: f64) -> Option<PlaneCoefficients> {
        Some(PlaneCoefficients::fronto_parallel(d))
    }

    #[test]
    fn identical_planes_are_coplanar() {
        let kind = classify_pair(flat(20.0), flat(20.0), &SEAM, &EngineConfig::default());
        assert_eq!(kind, RelationKind::Coplanar);
    }

    #[test]
    fn nearer_plane_is_foreground() {
        let config = EngineConfig::default();
        assert_eq!(
            classify_pair(flat(30.0), flat(10.0), &SEAM, &config),
            RelationKind::ForegroundIsA
        );
        assert_eq!(
            classify_pair(flat(10.0), flat(30.0), &SEAM, &config),
            RelationKind::ForegroundIsB
        );
    }

    #[test]
    fn missing_plane_is_invalid() {
        let kind = classify_pair(None, flat(5.0), &SEAM, &EngineConfig::default());
        assert_eq!(kind, RelationKind::Invalid);
    }

    #[test]
    fn out_of_range_plane_is_invalid() {
        let config = EngineConfig {
            max_disparity: 64,
            ..EngineConfig::default()
        };
        assert_eq!(
            classify_pair(flat(80.0), flat(10.0), &SEAM, &config),
            RelationKind::Invalid
        );
        assert_eq!(
            classify_pair(flat(-1.0), flat(10.0), &SEAM, &config),
            RelationKind::Invalid
        );
    }

    #[test]
    fn crossing_planes_prefer_cheapest_hypothesis() {
        // Plane A rises across the seam and crosses plane B halfway:
        // neither side is consistently in front.
        let plane_a = Some(PlaneCoefficients::new(0.0, 1.0, 9.0));
        let points = [(3.5, 0.0), (3.5, 1.0), (3.5, 2.0), (3.5, 3.0)];
        let config = EngineConfig {
            smoothness_weight: 1.0,
            ..EngineConfig::default()
        };
        // Gaps are -1, 0, 1, 2: mean square 1.5, coplanar cost 6.5.
        assert_eq!(
            classify_pair(plane_a, flat(10.0), &points, &config),
            RelationKind::Coplanar
        );
    }

    #[test]
    fn every_adjacent_pair_gets_one_relation() {
        // 0 0 1
        // 2 2 1
        let labels = LabelMap::from_raw(3, 2, vec![0, 0, 1, 2, 2, 1]).unwrap();
        let planes = vec![flat(10.0), flat(40.0), None];
        let relations = classify_relations(&labels, &planes, &EngineConfig::default()).unwrap();

        assert!(relations.missing_pairs(&labels).is_empty());
        assert_eq!(relations.len(), 3);
        assert_eq!(
            relations.lookup(1, 0).unwrap().kind(),
            RelationKind::ForegroundIsB
        );
        assert_eq!(relations.lookup(2, 0).unwrap().kind(), RelationKind::Invalid);
        assert_eq!(relations.lookup(1, 2).unwrap().kind(), RelationKind::Invalid);
        for record in relations.records() {
            assert!(record.segment_a() < record.segment_b());
        }
    }

    #[test]
    fn short_plane_table_counts_as_unfit() {
        let labels = LabelMap::from_raw(2, 1, vec![0, 1]).unwrap();
        let relations =
            classify_relations(&labels, &[flat(3.0)], &EngineConfig::default()).unwrap();
        assert_eq!(relations.lookup(0, 1).unwrap().kind(), RelationKind::Invalid);
    }
}
