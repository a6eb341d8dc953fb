//! Boundary relations between adjacent segments.
//!
//! A [`BoundaryRelation`] says how two neighboring segments meet in
//! depth: one occludes the other, they are coplanar, or the boundary
//! could not be classified. [`BoundaryRelations`] stores the records in
//! the order the engine produced them and answers unordered pair
//! lookups in constant time.

use std::collections::HashMap;

use crate::types::{LabelMap, PipelineError, SegmentId, canonical_pair};

/// Geometric relationship across a segment boundary.
///
/// The integer codes returned by [`code`](Self::code) are part of the
/// relation file format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// `segment_a` occludes `segment_b`.
    ForegroundIsA,
    /// `segment_b` occludes `segment_a`.
    ForegroundIsB,
    /// Both sides lie on a continuous depth surface.
    Coplanar,
    /// The boundary could not be classified and is not drawn in color.
    Invalid,
}

impl RelationKind {
    /// Stable file-format code: 0, 1, 2, 3 in declaration order.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ForegroundIsA => 0,
            Self::ForegroundIsB => 1,
            Self::Coplanar => 2,
            Self::Invalid => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ForegroundIsA),
            1 => Some(Self::ForegroundIsB),
            2 => Some(Self::Coplanar),
            3 => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// Relation record for one unordered segment pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRelation {
    segment_a: SegmentId,
    segment_b: SegmentId,
    kind: RelationKind,
    foreground: Option<SegmentId>,
}

impl BoundaryRelation {
    /// Create a relation record.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SelfRelation`] if both sides name the same
    /// segment.
    pub fn new(
        segment_a: SegmentId,
        segment_b: SegmentId,
        kind: RelationKind,
    ) -> Result<Self, PipelineError> {
        if segment_a == segment_b {
            return Err(PipelineError::SelfRelation(segment_a));
        }
        let foreground = match kind {
            RelationKind::ForegroundIsA => Some(segment_a),
            RelationKind::ForegroundIsB => Some(segment_b),
            RelationKind::Coplanar | RelationKind::Invalid => None,
        };
        Ok(Self {
            segment_a,
            segment_b,
            kind,
            foreground,
        })
    }

    #[must_use]
    pub const fn segment_a(&self) -> SegmentId {
        self.segment_a
    }

    #[must_use]
    pub const fn segment_b(&self) -> SegmentId {
        self.segment_b
    }

    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        self.kind
    }

    /// The occluding segment, for the two foreground kinds.
    #[must_use]
    pub const fn foreground(&self) -> Option<SegmentId> {
        self.foreground
    }
}

/// Relation records keyed by unordered segment pair.
///
/// Holds at most one record per pair; `lookup(a, b)` and `lookup(b, a)`
/// return the same record.
#[derive(Debug, Clone, Default)]
pub struct BoundaryRelations {
    records: Vec<BoundaryRelation>,
    index: HashMap<(SegmentId, SegmentId), usize>,
}

impl BoundaryRelations {
    /// Build the store, keeping `records` in their given order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateRelation`] if two records cover
    /// the same unordered pair.
    pub fn new(records: Vec<BoundaryRelation>) -> Result<Self, PipelineError> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let key = canonical_pair(record.segment_a, record.segment_b);
            if index.insert(key, i).is_some() {
                return Err(PipelineError::DuplicateRelation { a: key.0, b: key.1 });
            }
        }
        Ok(Self { records, index })
    }

    /// Record for the unordered pair `{a, b}`, if any.
    #[must_use]
    pub fn lookup(&self, a: SegmentId, b: SegmentId) -> Option<&BoundaryRelation> {
        self.index
            .get(&canonical_pair(a, b))
            .map(|&i| &self.records[i])
    }

    /// Records in engine order.
    #[must_use]
    pub fn records(&self) -> &[BoundaryRelation] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adjacent pairs of `labels` that have no record.
    ///
    /// Empty when the store satisfies the engine contract for `labels`.
    #[must_use]
    pub fn missing_pairs(&self, labels: &LabelMap) -> Vec<(SegmentId, SegmentId)> {
        labels
            .adjacent_pairs()
            .into_iter()
            .filter(|pair| !self.index.contains_key(pair))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn relation(a: SegmentId, b: SegmentId, kind: RelationKind) -> BoundaryRelation {
        BoundaryRelation::new(a, b, kind).unwrap()
    }

    #[test]
    fn codes_round_trip() {
        for kind in [
            RelationKind::ForegroundIsA,
            RelationKind::ForegroundIsB,
            RelationKind::Coplanar,
            RelationKind::Invalid,
        ] {
            assert_eq!(RelationKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(RelationKind::from_code(4), None);
    }

    #[test]
    fn codes_match_file_format() {
        assert_eq!(RelationKind::ForegroundIsA.code(), 0);
        assert_eq!(RelationKind::ForegroundIsB.code(), 1);
        assert_eq!(RelationKind::Coplanar.code(), 2);
        assert_eq!(RelationKind::Invalid.code(), 3);
    }

    #[test]
    fn foreground_follows_kind() {
        assert_eq!(
            relation(4, 9, RelationKind::ForegroundIsA).foreground(),
            Some(4)
        );
        assert_eq!(
            relation(4, 9, RelationKind::ForegroundIsB).foreground(),
            Some(9)
        );
        assert_eq!(relation(4, 9, RelationKind::Coplanar).foreground(), None);
        assert_eq!(relation(4, 9, RelationKind::Invalid).foreground(), None);
    }

    #[test]
    fn self_relation_is_rejected() {
        assert!(matches!(
            BoundaryRelation::new(3, 3, RelationKind::Coplanar),
            Err(PipelineError::SelfRelation(3))
        ));
    }

    #[test]
    fn lookup_is_symmetric() {
        let store = BoundaryRelations::new(vec![
            relation(5, 2, RelationKind::ForegroundIsB),
            relation(0, 1, RelationKind::Coplanar),
        ])
        .unwrap();
        let forward = store.lookup(5, 2).unwrap();
        let backward = store.lookup(2, 5).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.kind(), RelationKind::ForegroundIsB);
        assert_eq!(forward.foreground(), Some(2));
        assert!(store.lookup(0, 5).is_none());
    }

    #[test]
    fn duplicate_unordered_pair_is_rejected() {
        let result = BoundaryRelations::new(vec![
            relation(1, 2, RelationKind::Coplanar),
            relation(2, 1, RelationKind::Invalid),
        ]);
        assert!(matches!(
            result,
            Err(PipelineError::DuplicateRelation { a: 1, b: 2 })
        ));
    }

    #[test]
    fn records_keep_engine_order() {
        let store = BoundaryRelations::new(vec![
            relation(7, 3, RelationKind::Invalid),
            relation(0, 1, RelationKind::Coplanar),
        ])
        .unwrap();
        let order: Vec<_> = store
            .records()
            .iter()
            .map(|r| (r.segment_a(), r.segment_b()))
            .collect();
        assert_eq!(order, vec![(7, 3), (0, 1)]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_pairs_reports_uncovered_adjacency() {
        // 0 1
        // 2 2
        let labels = LabelMap::from_raw(2, 2, vec![0, 1, 2, 2]).unwrap();
        let store = BoundaryRelations::new(vec![relation(1, 0, RelationKind::Coplanar)]).unwrap();
        assert_eq!(store.missing_pairs(&labels), vec![(0, 2), (1, 2)]);
    }
}
