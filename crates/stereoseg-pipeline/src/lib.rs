//! stereoseg-pipeline: Stereo segmentation and boundary rendering (sans-IO).
//!
//! Turns a rectified stereo pair into a segment label map, a disparity
//! map, one disparity plane per segment and one relation per adjacent
//! segment pair, then paints a boundary visualization over the left
//! image:
//!
//! decode -> engine (match -> segment -> fit planes -> classify) -> render
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and images and returns structured data. Reading list files
//! and writing artifacts lives in the `stereoseg` binary.

pub mod blur;
pub mod classify;
pub mod decode;
pub mod engine;
pub mod matching;
pub mod plane;
pub mod relation;
pub mod render;
pub mod superpixel;
pub mod types;

pub use engine::{EngineKind, StereoEngine};
pub use relation::{BoundaryRelation, BoundaryRelations, RelationKind};
pub use render::render_boundaries;
pub use types::{
    Dimensions, DisparityMap, EngineConfig, LabelMap, Luma16Image, PipelineError,
    PlaneCoefficients, RgbImage, SegmentId, Segmentation,
};

/// Everything produced for one stereo pair.
#[derive(Debug, Clone)]
pub struct PairResult {
    /// Engine output for the pair.
    pub segmentation: Segmentation,
    /// Left image with segment boundaries painted over it.
    pub boundary: RgbImage,
}

/// Run decode, segmentation and boundary rendering for one pair.
///
/// Takes the raw bytes of the left and right images (PNG, JPEG, BMP,
/// WebP), the engine to use and its configuration.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if either byte slice is empty.
/// Returns [`PipelineError::ImageDecode`] if either image cannot be decoded.
/// Returns whatever the engine returns for its own failures.
/// Returns [`PipelineError::UnmatchedBoundary`] if the engine broke its
/// contract by leaving an adjacent pair without a relation.
pub fn process_pair(
    left_bytes: &[u8],
    right_bytes: &[u8],
    engine: &impl StereoEngine,
    config: &EngineConfig,
) -> Result<PairResult, PipelineError> {
    let left = decode::decode_rgb(left_bytes)?;
    let right = decode::decode_rgb(right_bytes)?;

    let segmentation = engine.compute(&left, &right, config)?;
    let boundary = render_boundaries(&left, &segmentation.labels, &segmentation.relations)?;

    Ok(PairResult {
        segmentation,
        boundary,
    })
}
