//! Stereo segmentation engines.
//!
//! This module defines the [`StereoEngine`] trait through which the batch
//! driver obtains labels, disparities, planes and boundary relations for
//! an image pair, and the [`EngineKind`] enum for selecting an
//! implementation at runtime.
//!
//! # Strategy pattern
//!
//! The renderer and the serializers only depend on the engine's output
//! contract ([`Segmentation`]). Any engine can be plugged in as long as
//! every adjacent label pair it produces has exactly one relation.

use image::RgbImage;
use log::debug;

use crate::blur::gaussian_blur;
use crate::classify::classify_relations;
use crate::matching::block_match;
use crate::superpixel::GridSegmentation;
use crate::types::{
    Dimensions, DisparityMap, EngineConfig, PipelineError, PlaneCoefficients, Segmentation,
};

/// Selects which stereo engine to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// Grid superpixels refined against color and block-matched disparity,
    /// with least-squares disparity planes per segment.
    #[default]
    GridPlane,
}

/// Trait for stereo segmentation engines.
///
/// Input: a rectified left/right pair of equal size and an immutable
/// configuration. Output: labels and disparity for the left image, one
/// plane per segment and one relation per adjacent segment pair.
pub trait StereoEngine {
    /// Segment the pair.
    ///
    /// # Errors
    ///
    /// Implementations return [`PipelineError`] for invalid configuration,
    /// mismatched inputs or segmentations they cannot represent.
    fn compute(
        &self,
        left: &RgbImage,
        right: &RgbImage,
        config: &EngineConfig,
    ) -> Result<Segmentation, PipelineError>;
}

impl StereoEngine for EngineKind {
    fn compute(
        &self,
        left: &RgbImage,
        right: &RgbImage,
        config: &EngineConfig,
    ) -> Result<Segmentation, PipelineError> {
        match *self {
            Self::GridPlane => compute_grid_plane(left, right, config),
        }
    }
}

/// Reference engine: see [`EngineKind::GridPlane`].
fn compute_grid_plane(
    left: &RgbImage,
    right: &RgbImage,
    config: &EngineConfig,
) -> Result<Segmentation, PipelineError> {
    config.validate()?;

    let (width, height) = left.dimensions();
    if right.dimensions() != (width, height) {
        let (rw, rh) = right.dimensions();
        return Err(PipelineError::DimensionMismatch {
            expected: Dimensions { width, height },
            actual: Dimensions {
                width: rw,
                height: rh,
            },
        });
    }
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyInput);
    }

    let left_gray = gaussian_blur(&image::imageops::grayscale(left), config.blur_sigma);
    let right_gray = gaussian_blur(&image::imageops::grayscale(right), config.blur_sigma);
    let matched = block_match(
        &left_gray,
        &right_gray,
        config.max_disparity,
        config.match_radius,
    );
    debug!(
        "block matching: {} of {} pixels consistent",
        matched.valid_count(),
        width as usize * height as usize
    );

    let mut grid = GridSegmentation::new(width, height, config.superpixel_total)?;
    debug!(
        "grid: {} segments of {} px",
        grid.segment_count(),
        grid.cell()
    );

    for iteration in 0..config.outer_iterations {
        let planes = grid.fit_planes(&matched, config);
        let moved = grid.refine(left, &matched, &planes, config);
        debug!("refinement {iteration}: {moved} pixels moved");
        if moved == 0 {
            break;
        }
    }

    let fitted = grid.fit_planes(&matched, config);
    let labels = grid.into_label_map()?;
    let relations = classify_relations(&labels, &fitted, config)?;

    let max = f64::from(config.max_disparity);
    #[allow(clippy::cast_possible_truncation)]
    let disparity = DisparityMap::from_fn(width, height, |x, y| {
        fitted[usize::from(labels.get(x, y))].map_or(0.0, |plane| {
            plane
                .disparity_at(f64::from(x), f64::from(y))
                .clamp(0.0, max) as f32
        })
    });

    let planes = fitted
        .iter()
        .map(|plane| plane.unwrap_or(PlaneCoefficients::fronto_parallel(0.0)))
        .collect();

    Ok(Segmentation {
        labels,
        disparity,
        planes,
        relations,
    })
}
