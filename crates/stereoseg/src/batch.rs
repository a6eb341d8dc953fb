//! Sequential batch driver.
//!
//! Each pair runs end to end before the next one starts:
//! read -> decode -> engine -> render -> write artifacts.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use log::{debug, error, info, warn};
use stereoseg_pipeline::{EngineConfig, StereoEngine};

use crate::artifacts::{ArtifactPaths, output_stem, write_artifacts};
use crate::error::BatchError;
use crate::list::ImagePair;

/// How the batch handles its output and failing pairs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory receiving every artifact; created if missing.
    pub output_dir: PathBuf,
    /// Log and skip a failing pair instead of aborting the batch.
    pub keep_going: bool,
}

/// Outcome of a batch that ran to the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.failed == 0
    }
}

/// Process every pair in order.
///
/// A stem seen earlier in the batch is reported with a warning and its
/// artifacts are overwritten.
///
/// # Errors
///
/// Returns [`BatchError::Write`] if the output directory cannot be
/// created. Without `keep_going`, returns the first pair's error and
/// processes nothing after it.
pub fn run_batch(
    pairs: &[ImagePair],
    engine: &impl StereoEngine,
    config: &EngineConfig,
    options: &BatchOptions,
) -> Result<BatchSummary, BatchError> {
    std::fs::create_dir_all(&options.output_dir).map_err(|source| BatchError::Write {
        path: options.output_dir.clone(),
        source,
    })?;

    let mut summary = BatchSummary::default();
    let mut stems = HashSet::new();

    for pair in pairs {
        info!("Processing {}", pair.left.display());
        let stem = output_stem(&pair.left);
        if !stems.insert(stem.clone()) {
            warn!(
                "stem {stem:?} already used in this batch, overwriting its artifacts with {}",
                pair.left.display()
            );
        }

        match process_pair(pair, &stem, engine, config, options) {
            Ok(()) => summary.processed += 1,
            Err(err) if options.keep_going => {
                error!("skipping pair {}: {err}", pair.left.display());
                summary.failed += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}

fn process_pair(
    pair: &ImagePair,
    stem: &str,
    engine: &impl StereoEngine,
    config: &EngineConfig,
    options: &BatchOptions,
) -> Result<(), BatchError> {
    let read = |path: &PathBuf| {
        std::fs::read(path).map_err(|source| BatchError::ReadImage {
            path: path.clone(),
            source,
        })
    };
    let left_bytes = read(&pair.left)?;
    let right_bytes = read(&pair.right)?;

    let start = Instant::now();
    let result = stereoseg_pipeline::process_pair(&left_bytes, &right_bytes, engine, config)
        .map_err(|source| BatchError::Pipeline {
            path: pair.left.clone(),
            source,
        })?;
    debug!(
        "{stem}: {} segments, {} relations in {:?}",
        result.segmentation.labels.segment_count(),
        result.segmentation.relations.len(),
        start.elapsed()
    );

    let start = Instant::now();
    write_artifacts(&ArtifactPaths::new(&options.output_dir, stem), &result)?;
    debug!("{stem}: artifacts written in {:?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use stereoseg_pipeline::{
        BoundaryRelation, BoundaryRelations, DisparityMap, LabelMap, PipelineError,
        PlaneCoefficients, RelationKind, RgbImage, Segmentation,
    };

    use super::*;

    /// Splits the image into left and right halves, the right half in front.
    struct HalvesEngine;

    impl StereoEngine for HalvesEngine {
        fn compute(
            &self,
            left: &RgbImage,
            _right: &RgbImage,
            _config: &EngineConfig,
        ) -> Result<Segmentation, PipelineError> {
            let (w, h) = left.dimensions();
            let labels = LabelMap::from_fn(w, h, |x, _| u16::from(x >= w / 2));
            Ok(Segmentation {
                labels,
                disparity: DisparityMap::from_fn(w, h, |x, _| if x >= w / 2 { 8.0 } else { 2.0 }),
                planes: vec![
                    PlaneCoefficients::fronto_parallel(2.0),
                    PlaneCoefficients::fronto_parallel(8.0),
                ],
                relations: BoundaryRelations::new(vec![BoundaryRelation::new(
                    0,
                    1,
                    RelationKind::ForegroundIsB,
                )?])?,
            })
        }
    }

    /// Scratch directory unique to one test in this process.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stereoseg-batch-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        RgbImage::from_pixel(8, 4, image::Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    fn options(dir: &Path, keep_going: bool) -> BatchOptions {
        BatchOptions {
            output_dir: dir.join("out"),
            keep_going,
        }
    }

    #[test]
    fn pair_produces_five_artifacts() {
        let dir = scratch_dir("five");
        write_png(&dir.join("scene.png"));
        write_png(&dir.join("scene_R.png"));
        let pairs = [ImagePair {
            left: dir.join("scene.png"),
            right: dir.join("scene_R.png"),
        }];

        let summary =
            run_batch(&pairs, &HalvesEngine, &EngineConfig::default(), &options(&dir, false))
                .unwrap();
        assert_eq!(summary, BatchSummary { processed: 1, failed: 0 });

        let out = dir.join("out");
        let paths = ArtifactPaths::new(&out, "scene");
        for path in [&paths.disparity, &paths.segment, &paths.boundary, &paths.plane, &paths.label] {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert_eq!(std::fs::read_to_string(&paths.plane).unwrap(), "0 0 2\n0 0 8\n");
        assert_eq!(std::fs::read_to_string(&paths.label).unwrap(), "0 1 1\n");

        let boundary = image::open(&paths.boundary).unwrap().to_rgb8();
        assert_eq!(boundary.get_pixel(3, 0).0, [0, 0, 225]);
        assert_eq!(boundary.get_pixel(4, 0).0, [225, 0, 0]);
        assert_eq!(boundary.get_pixel(0, 0).0, [0, 0, 225]);

        let disparity = image::open(&paths.disparity).unwrap().to_luma16();
        assert_eq!(disparity.get_pixel(0, 0).0[0], 512);
        assert_eq!(disparity.get_pixel(7, 0).0[0], 2048);

        let segment = image::open(&paths.segment).unwrap().to_luma16();
        assert_eq!(segment.get_pixel(0, 3).0[0], 0);
        assert_eq!(segment.get_pixel(7, 3).0[0], 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failing_pair_aborts_by_default() {
        let dir = scratch_dir("abort");
        write_png(&dir.join("good.png"));
        let pairs = [
            ImagePair {
                left: dir.join("missing.png"),
                right: dir.join("good.png"),
            },
            ImagePair {
                left: dir.join("good.png"),
                right: dir.join("good.png"),
            },
        ];

        let err = run_batch(&pairs, &HalvesEngine, &EngineConfig::default(), &options(&dir, false))
            .unwrap_err();
        assert!(matches!(err, BatchError::ReadImage { .. }));
        assert!(!dir.join("out/good_plane.txt").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn keep_going_skips_failing_pair() {
        let dir = scratch_dir("keep-going");
        write_png(&dir.join("good.png"));
        std::fs::write(dir.join("corrupt.png"), b"not an image").unwrap();
        let pairs = [
            ImagePair {
                left: dir.join("corrupt.png"),
                right: dir.join("good.png"),
            },
            ImagePair {
                left: dir.join("good.png"),
                right: dir.join("good.png"),
            },
        ];

        let summary =
            run_batch(&pairs, &HalvesEngine, &EngineConfig::default(), &options(&dir, true))
                .unwrap();
        assert_eq!(summary, BatchSummary { processed: 1, failed: 1 });
        assert!(!summary.is_success());
        assert!(dir.join("out/good_plane.txt").exists());
        assert!(!dir.join("out/corrupt_plane.txt").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn repeated_stem_overwrites_artifacts() {
        let dir = scratch_dir("repeat");
        std::fs::create_dir_all(dir.join("a")).unwrap();
        std::fs::create_dir_all(dir.join("b")).unwrap();
        write_png(&dir.join("a/img.png"));
        write_png(&dir.join("b/img.png"));
        let pairs = [
            ImagePair {
                left: dir.join("a/img.png"),
                right: dir.join("a/img.png"),
            },
            ImagePair {
                left: dir.join("b/img.png"),
                right: dir.join("b/img.png"),
            },
        ];

        let summary =
            run_batch(&pairs, &HalvesEngine, &EngineConfig::default(), &options(&dir, false))
                .unwrap();
        assert_eq!(summary.processed, 2);
        assert!(dir.join("out/img_label.txt").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_batch_succeeds() {
        let dir = scratch_dir("empty");
        let summary =
            run_batch(&[], &HalvesEngine, &EngineConfig::default(), &options(&dir, false))
                .unwrap();
        assert_eq!(summary, BatchSummary::default());
        assert!(dir.join("out").is_dir());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
