//! Artifact naming and writing.
//!
//! Each pair produces five files sharing a stem taken from the left image
//! name:
//!
//! | suffix                 | content                                   |
//! |------------------------|-------------------------------------------|
//! | `_left_disparity.png`  | 16-bit disparity, `round(d * 256)`        |
//! | `_segment.png`         | 16-bit segment labels                     |
//! | `_boundary.png`        | left image with boundaries painted on top |
//! | `_plane.txt`           | `a b c` per segment                       |
//! | `_label.txt`           | `segA segB code` per boundary relation    |

use std::path::{Path, PathBuf};

use image::{EncodableLayout, ImageBuffer, ImageFormat, PixelWithColorType};
use stereoseg_pipeline::{BoundaryRelation, PairResult, PlaneCoefficients};

use crate::error::BatchError;

pub const DISPARITY_SUFFIX: &str = "_left_disparity.png";
pub const SEGMENT_SUFFIX: &str = "_segment.png";
pub const BOUNDARY_SUFFIX: &str = "_boundary.png";
pub const PLANE_SUFFIX: &str = "_plane.txt";
pub const LABEL_SUFFIX: &str = "_label.txt";

/// Output stem for a left image path.
///
/// The file name after the last path separator, with everything from its
/// last `.` removed. Names without a `.` are kept whole.
#[must_use]
pub fn output_stem(left: &Path) -> String {
    let name = left
        .file_name()
        .map_or_else(|| left.to_string_lossy(), |name| name.to_string_lossy());
    match name.rfind('.') {
        Some(dot) => name[..dot].to_owned(),
        None => name.into_owned(),
    }
}

/// Destination paths of the five artifacts of one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub disparity: PathBuf,
    pub segment: PathBuf,
    pub boundary: PathBuf,
    pub plane: PathBuf,
    pub label: PathBuf,
}

impl ArtifactPaths {
    #[must_use]
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        let path = |suffix: &str| output_dir.join(format!("{stem}{suffix}"));
        Self {
            disparity: path(DISPARITY_SUFFIX),
            segment: path(SEGMENT_SUFFIX),
            boundary: path(BOUNDARY_SUFFIX),
            plane: path(PLANE_SUFFIX),
            label: path(LABEL_SUFFIX),
        }
    }
}

/// Write all five artifacts of a processed pair.
///
/// # Errors
///
/// Returns the first [`BatchError::Write`] or [`BatchError::Encode`]
/// encountered. Artifacts written before the failure are left in place.
pub fn write_artifacts(paths: &ArtifactPaths, result: &PairResult) -> Result<(), BatchError> {
    let segmentation = &result.segmentation;
    save_png(&segmentation.disparity.to_luma16(), &paths.disparity)?;
    save_png(&segmentation.labels.to_luma16(), &paths.segment)?;
    save_png(&result.boundary, &paths.boundary)?;
    write_plane_file(&paths.plane, &segmentation.planes)?;
    write_relation_file(&paths.label, segmentation.relations.records())
}

/// Write the plane file for per-segment planes.
///
/// # Errors
///
/// Returns [`BatchError::Write`] if the file cannot be created or written.
pub fn write_plane_file(path: &Path, planes: &[PlaneCoefficients]) -> Result<(), BatchError> {
    write_text(path, &stereoseg_export::to_plane_text(planes))
}

/// Write the label file for boundary relations, in the given order.
///
/// # Errors
///
/// Returns [`BatchError::Write`] if the file cannot be created or written.
pub fn write_relation_file(path: &Path, relations: &[BoundaryRelation]) -> Result<(), BatchError> {
    write_text(path, &stereoseg_export::to_relation_text(relations))
}

fn write_text(path: &Path, text: &str) -> Result<(), BatchError> {
    std::fs::write(path, text).map_err(|source| BatchError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn save_png<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, path: &Path) -> Result<(), BatchError>
where
    P: PixelWithColorType,
    [P::Subpixel]: EncodableLayout,
{
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|err| match err {
            image::ImageError::IoError(source) => BatchError::Write {
                path: path.to_path_buf(),
                source,
            },
            source => BatchError::Encode {
                path: path.to_path_buf(),
                source,
            },
        })
}
