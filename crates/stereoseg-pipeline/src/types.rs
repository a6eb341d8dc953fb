//! Shared types for the stereoseg pipeline.

use serde::{Deserialize, Serialize};

use crate::relation::BoundaryRelations;

/// Re-export `RgbImage` so downstream crates can reference the
/// reference and visualization images without depending on `image` directly.
pub use image::RgbImage;

/// 16-bit single-channel image used for the segment and disparity artifacts.
pub type Luma16Image = image::ImageBuffer<image::Luma<u16>, Vec<u16>>;

/// Identifier of a segment in a [`LabelMap`].
pub type SegmentId = u16;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Number of pixels covered by these dimensions.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-pixel segment labels.
///
/// Row-major, one [`SegmentId`] per pixel. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    dimensions: Dimensions,
    labels: Vec<SegmentId>,
}

impl LabelMap {
    /// Wrap a row-major label buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::LabelMapSize`] if `labels.len()` is not
    /// `width * height`.
    pub fn from_raw(width: u32, height: u32, labels: Vec<SegmentId>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions { width, height };
        if labels.len() != dimensions.area() {
            return Err(PipelineError::LabelMapSize {
                expected: dimensions.area(),
                actual: labels.len(),
            });
        }
        Ok(Self { dimensions, labels })
    }

    /// Build a label map by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> SegmentId) -> Self {
        let mut labels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                labels.push(f(x, y));
            }
        }
        Self {
            dimensions: Dimensions { width, height },
            labels,
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Label at `(x, y)`. Panics when out of bounds, like `image::ImageBuffer::get_pixel`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> SegmentId {
        self.labels[self.index(x, y)]
    }

    /// Row-major label slice.
    #[must_use]
    pub fn as_slice(&self) -> &[SegmentId] {
        &self.labels
    }

    /// One past the largest label present, i.e. the length of a dense
    /// per-segment table covering every id in the map.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.labels
            .iter()
            .max()
            .map_or(0, |&max| usize::from(max) + 1)
    }

    /// Every unordered pair of labels that meet across a right or bottom
    /// neighbor, as `(min, max)`, in order of first occurrence in a raster
    /// scan.
    #[must_use]
    pub fn adjacent_pairs(&self) -> Vec<(SegmentId, SegmentId)> {
        let mut seen = std::collections::HashSet::new();
        let mut pairs = Vec::new();
        let (w, h) = (self.width(), self.height());
        for y in 0..h {
            for x in 0..w {
                let label = self.get(x, y);
                let right = (x + 1 < w).then(|| self.get(x + 1, y));
                let below = (y + 1 < h).then(|| self.get(x, y + 1));
                for other in [right, below].into_iter().flatten() {
                    if other != label {
                        let pair = canonical_pair(label, other);
                        if seen.insert(pair) {
                            pairs.push(pair);
                        }
                    }
                }
            }
        }
        pairs
    }

    /// Encode the labels as a 16-bit grayscale image (one gray level per id).
    #[must_use]
    pub fn to_luma16(&self) -> Luma16Image {
        Luma16Image::from_fn(self.width(), self.height(), |x, y| {
            image::Luma([self.get(x, y)])
        })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.dimensions.width as usize + x as usize
    }
}

/// Canonical key for an unordered segment pair.
#[must_use]
pub fn canonical_pair(a: SegmentId, b: SegmentId) -> (SegmentId, SegmentId) {
    (a.min(b), a.max(b))
}

/// Disparity plane of one segment: `d(x, y) = a*x + b*y + c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PlaneCoefficients {
    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Constant plane at disparity `c`.
    #[must_use]
    pub const fn fronto_parallel(c: f64) -> Self {
        Self { a: 0.0, b: 0.0, c }
    }

    /// Predicted disparity at pixel position `(x, y)`.
    #[must_use]
    pub fn disparity_at(self, x: f64, y: f64) -> f64 {
        self.a.mul_add(x, self.b.mul_add(y, self.c))
    }
}

/// Dense per-pixel disparity in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    dimensions: Dimensions,
    values: Vec<f32>,
}

impl DisparityMap {
    /// Scale applied when encoding disparity into a 16-bit image.
    pub const LUMA16_SCALE: f32 = 256.0;

    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            dimensions: Dimensions { width, height },
            values,
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Encode as 16-bit grayscale with `round(d * 256)`, saturating at the
    /// `u16` range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_luma16(&self) -> Luma16Image {
        Luma16Image::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            let scaled = (self.get(x, y) * Self::LUMA16_SCALE)
                .round()
                .clamp(0.0, f32::from(u16::MAX));
            image::Luma([scaled as u16])
        })
    }
}

/// Everything a stereo engine produces for one image pair.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Segment id per pixel of the left image.
    pub labels: LabelMap,
    /// Disparity per pixel of the left image.
    pub disparity: DisparityMap,
    /// Plane per segment, indexed by segment id.
    pub planes: Vec<PlaneCoefficients>,
    /// One relation per adjacent segment pair, in engine order.
    pub relations: BoundaryRelations,
}

/// Tunables handed to a stereo engine.
///
/// Replaces a sequence of global setter calls with one immutable value
/// passed into every [`StereoEngine::compute`](crate::StereoEngine::compute)
/// invocation. The weight and penalty names follow the SPS-Stereo energy
/// terms; an engine is free to interpret them as it sees fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Desired number of segments.
    pub superpixel_total: u32,
    /// Outer (segmentation refinement) iterations.
    pub outer_iterations: u32,
    /// Inner (plane re-fit) iterations.
    pub inner_iterations: u32,
    /// Weight of the distance from a pixel to its segment centroid.
    pub position_weight: f64,
    /// Weight of the disparity residual against the segment plane.
    pub depth_weight: f64,
    /// Weight of the boundary length term.
    pub boundary_weight: f64,
    /// Weight of the plane gap across a boundary.
    pub smoothness_weight: f64,
    /// Largest disparity residual, in pixels, that counts as a plane inlier.
    pub inlier_threshold: f64,
    /// Fixed cost of a hinge/coplanar boundary.
    pub hinge_penalty: f64,
    /// Fixed cost of an occlusion boundary.
    pub occlusion_penalty: f64,
    /// Cost of a boundary sample that contradicts the chosen relation.
    pub impossible_penalty: f64,
    /// Largest disparity searched by block matching.
    pub max_disparity: u32,
    /// Half-size of the block matching window.
    pub match_radius: u32,
    /// Gaussian blur sigma applied before matching. Zero disables blur.
    pub blur_sigma: f32,
}

impl EngineConfig {
    pub const DEFAULT_SUPERPIXEL_TOTAL: u32 = 1000;
    pub const DEFAULT_OUTER_ITERATIONS: u32 = 10;
    pub const DEFAULT_INNER_ITERATIONS: u32 = 10;
    pub const DEFAULT_POSITION_WEIGHT: f64 = 500.0;
    pub const DEFAULT_DEPTH_WEIGHT: f64 = 2000.0;
    pub const DEFAULT_BOUNDARY_WEIGHT: f64 = 1000.0;
    pub const DEFAULT_SMOOTHNESS_WEIGHT: f64 = 400.0;
    pub const DEFAULT_INLIER_THRESHOLD: f64 = 9.0;
    pub const DEFAULT_HINGE_PENALTY: f64 = 5.0;
    pub const DEFAULT_OCCLUSION_PENALTY: f64 = 15.0;
    pub const DEFAULT_IMPOSSIBLE_PENALTY: f64 = 30.0;
    pub const DEFAULT_MAX_DISPARITY: u32 = 256;
    pub const DEFAULT_MATCH_RADIUS: u32 = 2;
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.superpixel_total == 0 {
            return Err(PipelineError::InvalidConfig(
                "superpixel_total must be at least 1".to_owned(),
            ));
        }
        if self.inner_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "inner_iterations must be at least 1".to_owned(),
            ));
        }
        if self.max_disparity == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_disparity must be at least 1".to_owned(),
            ));
        }
        if !(self.inlier_threshold.is_finite() && self.inlier_threshold > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "inlier_threshold must be positive, got {}",
                self.inlier_threshold
            )));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be non-negative, got {}",
                self.blur_sigma
            )));
        }
        let weights = [
            ("position_weight", self.position_weight),
            ("depth_weight", self.depth_weight),
            ("boundary_weight", self.boundary_weight),
            ("smoothness_weight", self.smoothness_weight),
            ("hinge_penalty", self.hinge_penalty),
            ("occlusion_penalty", self.occlusion_penalty),
            ("impossible_penalty", self.impossible_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            superpixel_total: Self::DEFAULT_SUPERPIXEL_TOTAL,
            outer_iterations: Self::DEFAULT_OUTER_ITERATIONS,
            inner_iterations: Self::DEFAULT_INNER_ITERATIONS,
            position_weight: Self::DEFAULT_POSITION_WEIGHT,
            depth_weight: Self::DEFAULT_DEPTH_WEIGHT,
            boundary_weight: Self::DEFAULT_BOUNDARY_WEIGHT,
            smoothness_weight: Self::DEFAULT_SMOOTHNESS_WEIGHT,
            inlier_threshold: Self::DEFAULT_INLIER_THRESHOLD,
            hinge_penalty: Self::DEFAULT_HINGE_PENALTY,
            occlusion_penalty: Self::DEFAULT_OCCLUSION_PENALTY,
            impossible_penalty: Self::DEFAULT_IMPOSSIBLE_PENALTY,
            max_disparity: Self::DEFAULT_MAX_DISPARITY,
            match_radius: Self::DEFAULT_MATCH_RADIUS,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
        }
    }
}

/// Errors that can occur while decoding, segmenting or rendering a pair.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Engine configuration is invalid.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Two images (or an image and a label map) that must agree in size do not.
    #[error("dimension mismatch: {expected} vs {actual}")]
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },

    /// A label buffer does not match its declared dimensions.
    #[error("label buffer holds {actual} values, expected {expected}")]
    LabelMapSize { expected: usize, actual: usize },

    /// The requested segmentation needs more ids than `SegmentId` can hold.
    #[error("{requested} segments requested, at most {max} are representable")]
    TooManySegments { requested: usize, max: usize },

    /// An adjacent label pair has no boundary relation record.
    #[error("unmatched boundary between segments {a} and {b} at ({x}, {y})")]
    UnmatchedBoundary {
        a: SegmentId,
        b: SegmentId,
        x: u32,
        y: u32,
    },

    /// The same unordered segment pair appears twice in a relation list.
    #[error("duplicate boundary relation for segments {a} and {b}")]
    DuplicateRelation { a: SegmentId, b: SegmentId },

    /// A relation names the same segment on both sides.
    #[error("boundary relation pairs segment {0} with itself")]
    SelfRelation(SegmentId),
}
