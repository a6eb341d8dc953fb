//! Grid superpixels with boundary refinement.
//!
//! Segments start as a regular grid of square cells sized so that roughly
//! `superpixel_total` cells cover the image. Each refinement sweep lets a
//! boundary pixel move to a neighboring segment when that lowers its
//! energy:
//!
//! ```text
//! E(p, s) = |color(p) - mean_color(s)|^2
//!         + position_weight   * |p - centroid(s)|^2 / cell^2
//!         + depth_weight      * min(r, inlier_threshold)^2 / inlier_threshold^2
//!         + boundary_weight   * (4-neighbors of p not labeled s) / 4
//! ```
//!
//! where `r` is the residual of the matched disparity at `p` against the
//! plane of `s` (the term is dropped when either is unavailable). A segment
//! never loses its last pixel, so ids stay dense.

use image::RgbImage;

use crate::matching::SparseDisparity;
use crate::plane::{DisparitySample, fit_plane_robust};
use crate::types::{EngineConfig, LabelMap, PipelineError, PlaneCoefficients, SegmentId};

/// Largest number of segments a [`SegmentId`] can address.
pub const MAX_SEGMENTS: usize = SegmentId::MAX as usize + 1;

/// Mutable segmentation state of the reference engine.
#[derive(Debug, Clone)]
pub struct GridSegmentation {
    width: u32,
    height: u32,
    cell: u32,
    segment_count: usize,
    labels: Vec<SegmentId>,
}

/// Running sums for one segment.
#[derive(Debug, Clone, Copy, Default)]
struct SegmentStats {
    count: u32,
    color: [f64; 3],
    x: f64,
    y: f64,
}

impl SegmentStats {
    fn mean_color(&self) -> [f64; 3] {
        let n = f64::from(self.count.max(1));
        self.color.map(|c| c / n)
    }

    fn centroid(&self) -> (f64, f64) {
        let n = f64::from(self.count.max(1));
        (self.x / n, self.y / n)
    }
}

impl GridSegmentation {
    /// Lay out a regular grid of roughly `superpixel_total` square cells.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TooManySegments`] if the grid needs more
    /// cells than [`MAX_SEGMENTS`].
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(width: u32, height: u32, superpixel_total: u32) -> Result<Self, PipelineError> {
        let area = f64::from(width) * f64::from(height);
        let cell = (area / f64::from(superpixel_total.max(1)))
            .sqrt()
            .round()
            .max(1.0) as u32;
        let columns = width.div_ceil(cell);
        let rows = height.div_ceil(cell);
        let segment_count = columns as usize * rows as usize;
        if segment_count > MAX_SEGMENTS {
            return Err(PipelineError::TooManySegments {
                requested: segment_count,
                max: MAX_SEGMENTS,
            });
        }

        let mut labels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                // Bounded by MAX_SEGMENTS above.
                labels.push(((y / cell) * columns + x / cell) as SegmentId);
            }
        }

        Ok(Self {
            width,
            height,
            cell,
            segment_count,
            labels,
        })
    }

    /// Side length of the initial grid cells in pixels.
    #[must_use]
    pub const fn cell(&self) -> u32 {
        self.cell
    }

    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segment_count
    }

    #[must_use]
    pub fn label(&self, x: u32, y: u32) -> SegmentId {
        self.labels[self.index(x, y)]
    }

    /// Fit one plane per segment to the matched disparities it covers.
    ///
    /// Segments without any valid disparity get `None`.
    #[must_use]
    pub fn fit_planes(
        &self,
        disparity: &SparseDisparity,
        config: &EngineConfig,
    ) -> Vec<Option<PlaneCoefficients>> {
        let mut samples: Vec<Vec<DisparitySample>> = vec![Vec::new(); self.segment_count];
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(d) = disparity.get(x, y) {
                    samples[usize::from(self.label(x, y))].push(DisparitySample::new(
                        f64::from(x),
                        f64::from(y),
                        f64::from(d),
                    ));
                }
            }
        }
        samples
            .iter()
            .map(|s| fit_plane_robust(s, config.inlier_threshold, config.inner_iterations))
            .collect()
    }

    /// One raster-order sweep of boundary pixel reassignment.
    ///
    /// Returns the number of pixels that changed segment.
    pub fn refine(
        &mut self,
        image: &RgbImage,
        disparity: &SparseDisparity,
        planes: &[Option<PlaneCoefficients>],
        config: &EngineConfig,
    ) -> usize {
        let mut stats = self.stats(image);
        let mut moved = 0;

        for y in 0..self.height {
            for x in 0..self.width {
                let current = self.label(x, y);
                if stats[usize::from(current)].count <= 1 {
                    continue;
                }
                let neighbors = self.neighbor_labels(x, y);
                if neighbors.iter().flatten().all(|&l| l == current) {
                    continue;
                }

                let energy = |label: SegmentId| {
                    self.energy(
                        x,
                        y,
                        label,
                        &neighbors,
                        image,
                        disparity,
                        &stats[usize::from(label)],
                        planes[usize::from(label)],
                        config,
                    )
                };
                let mut best = (energy(current), current);
                for &candidate in neighbors.iter().flatten() {
                    if candidate != current {
                        let e = energy(candidate);
                        if e < best.0 {
                            best = (e, candidate);
                        }
                    }
                }

                let (_, target) = best;
                if target != current {
                    let index = self.index(x, y);
                    self.labels[index] = target;
                    stats[usize::from(current)].count -= 1;
                    stats[usize::from(target)].count += 1;
                    moved += 1;
                }
            }
        }

        moved
    }

    /// Freeze the labels into an immutable [`LabelMap`].
    ///
    /// # Errors
    ///
    /// Propagates [`PipelineError::LabelMapSize`], which cannot occur for a
    /// grid built by [`new`](Self::new).
    pub fn into_label_map(self) -> Result<LabelMap, PipelineError> {
        LabelMap::from_raw(self.width, self.height, self.labels)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Labels of the left, right, top and bottom neighbors that exist.
    fn neighbor_labels(&self, x: u32, y: u32) -> [Option<SegmentId>; 4] {
        [
            x.checked_sub(1).map(|nx| self.label(nx, y)),
            (x + 1 < self.width).then(|| self.label(x + 1, y)),
            y.checked_sub(1).map(|ny| self.label(x, ny)),
            (y + 1 < self.height).then(|| self.label(x, y + 1)),
        ]
    }

    fn stats(&self, image: &RgbImage) -> Vec<SegmentStats> {
        let mut stats = vec![SegmentStats::default(); self.segment_count];
        for y in 0..self.height {
            for x in 0..self.width {
                let s = &mut stats[usize::from(self.label(x, y))];
                let pixel = image.get_pixel(x, y).0;
                s.count += 1;
                for (sum, channel) in s.color.iter_mut().zip(pixel) {
                    *sum += f64::from(channel);
                }
                s.x += f64::from(x);
                s.y += f64::from(y);
            }
        }
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn energy(
        &self,
        x: u32,
        y: u32,
        label: SegmentId,
        neighbors: &[Option<SegmentId>; 4],
        image: &RgbImage,
        disparity: &SparseDisparity,
        stats: &SegmentStats,
        plane: Option<PlaneCoefficients>,
        config: &EngineConfig,
    ) -> f64 {
        let pixel = image.get_pixel(x, y).0;
        let color: f64 = stats
            .mean_color()
            .iter()
            .zip(pixel)
            .map(|(mean, channel)| (f64::from(channel) - mean).powi(2))
            .sum();

        let (cx, cy) = stats.centroid();
        let (px, py) = (f64::from(x), f64::from(y));
        let cell = f64::from(self.cell);
        let position = ((px - cx).powi(2) + (py - cy).powi(2)) / (cell * cell);

        let depth = match (disparity.get(x, y), plane) {
            (Some(d), Some(plane)) => {
                let threshold = config.inlier_threshold;
                let residual = (f64::from(d) - plane.disparity_at(px, py)).abs().min(threshold);
                (residual / threshold).powi(2)
            }
            _ => 0.0,
        };

        let foreign = neighbors
            .iter()
            .flatten()
            .filter(|&&l| l != label)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let boundary = foreign as f64 / 4.0;

        config.boundary_weight.mul_add(
            boundary,
            config
                .depth_weight
                .mul_add(depth, config.position_weight.mul_add(position, color)),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::matching::block_match;

    #[test]
    fn grid_cells_cover_image() {
        let grid = GridSegmentation::new(10, 6, 15).unwrap();
        // sqrt(60 / 15) = 2 pixel cells, 5 x 3 of them.
        assert_eq!(grid.cell(), 2);
        assert_eq!(grid.segment_count(), 15);
        assert_eq!(grid.label(0, 0), 0);
        assert_eq!(grid.label(9, 0), 4);
        assert_eq!(grid.label(9, 5), 14);
    }

    #[test]
    fn partial_cells_at_edges_get_their_own_id() {
        let grid = GridSegmentation::new(5, 5, 4).unwrap();
        // sqrt(25 / 4) rounds to 3: columns and rows of 3 + 2 pixels.
        assert_eq!(grid.cell(), 3);
        assert_eq!(grid.segment_count(), 4);
        assert_eq!(grid.label(4, 4), 3);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let result = GridSegmentation::new(300, 300, 90_000);
        assert!(matches!(
            result,
            Err(PipelineError::TooManySegments { requested: 90_000, .. })
        ));
    }

    #[test]
    fn refine_pulls_pixels_toward_matching_color() {
        // Color edge at x = 5, grid seam at x = 4: the black column x = 4
        // belongs with the left-hand segment by color.
        let image = RgbImage::from_fn(8, 8, |x, _| {
            if x < 5 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let gray = image::imageops::grayscale(&image);
        let disparity = block_match(&gray, &gray, 1, 1);
        let mut grid = GridSegmentation::new(8, 8, 4).unwrap();
        assert_eq!(grid.cell(), 4);

        let config = EngineConfig {
            position_weight: 0.0,
            boundary_weight: 0.0,
            depth_weight: 0.0,
            ..EngineConfig::default()
        };
        let planes = grid.fit_planes(&disparity, &config);
        let moved = grid.refine(&image, &disparity, &planes, &config);

        assert!(moved > 0);
        assert_eq!(grid.label(3, 0), 0);
        assert_eq!(grid.label(4, 0), 0);
        assert_eq!(grid.label(5, 0), 1);
    }

    #[test]
    fn refine_keeps_every_segment_alive() {
        let image = RgbImage::from_fn(6, 6, |x, y| image::Rgb([(x * 40) as u8, (y * 40) as u8, 0]));
        let gray = image::imageops::grayscale(&image);
        let disparity = block_match(&gray, &gray, 2, 1);
        let mut grid = GridSegmentation::new(6, 6, 9).unwrap();
        assert_eq!(grid.segment_count(), 9);
        let config = EngineConfig::default();
        for _ in 0..5 {
            let planes = grid.fit_planes(&disparity, &config);
            grid.refine(&image, &disparity, &planes, &config);
        }
        let labels = grid.into_label_map().unwrap();
        let mut present = vec![false; 9];
        for &label in labels.as_slice() {
            present[usize::from(label)] = true;
        }
        assert!(present.iter().all(|&p| p));
    }

    #[test]
    fn planes_follow_matched_disparity() {
        let image = RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 5]));
        let gray = image::imageops::grayscale(&image);
        let disparity = block_match(&gray, &gray, 2, 1);
        let grid = GridSegmentation::new(8, 8, 4).unwrap();
        let planes = grid.fit_planes(&disparity, &EngineConfig::default());
        assert_eq!(planes.len(), 4);
        for plane in planes {
            let plane = plane.unwrap();
            assert!(plane.disparity_at(1.0, 1.0).abs() < 1e-9);
        }
    }
}
