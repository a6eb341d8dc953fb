//! Block matching on a rectified grayscale pair.
//!
//! For every disparity level the absolute intensity difference between
//! the two views is aggregated over a square window with
//! [`imageproc::filter::box_filter`]; each pixel keeps the level with the
//! lowest aggregated cost. Matching runs in both directions and a
//! left/right consistency check discards occluded or ambiguous pixels.

use image::{GrayImage, Luma};

/// Integer disparity per left-image pixel, `None` where the consistency
/// check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseDisparity {
    width: u32,
    height: u32,
    values: Vec<Option<u16>>,
}

impl SparseDisparity {
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        self.values[y as usize * self.width as usize + x as usize]
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels that passed the consistency check.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Which view the cost volume is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference {
    /// Left pixel `x` matches right pixel `x - d`.
    Left,
    /// Right pixel `x` matches left pixel `x + d`.
    Right,
}

/// Match `left` against `right` for disparities `0..=max_disparity`.
///
/// The disparity range is clamped to the image width. Both images must
/// have the same dimensions; the caller checks this.
#[must_use]
pub fn block_match(
    left: &GrayImage,
    right: &GrayImage,
    max_disparity: u32,
    radius: u32,
) -> SparseDisparity {
    let (width, height) = left.dimensions();
    let levels = max_disparity
        .min(width.saturating_sub(1))
        .min(u32::from(u16::MAX));

    let from_left = winners(left, right, levels, radius, Reference::Left);
    let from_right = winners(right, left, levels, radius, Reference::Right);

    let mut values = Vec::with_capacity(from_left.len());
    for y in 0..height {
        for x in 0..width {
            let row = y as usize * width as usize;
            let d = from_left[row + x as usize];
            let consistent = x.checked_sub(u32::from(d)).is_some_and(|xr| {
                from_right[row + xr as usize].abs_diff(d) <= 1
            });
            values.push(consistent.then_some(d));
        }
    }

    SparseDisparity {
        width,
        height,
        values,
    }
}

/// Winner-takes-all disparity per pixel of `base`. Ties keep the smaller
/// disparity.
#[allow(clippy::cast_possible_truncation)]
fn winners(
    base: &GrayImage,
    other: &GrayImage,
    levels: u32,
    radius: u32,
    reference: Reference,
) -> Vec<u16> {
    let (width, height) = base.dimensions();
    let pixels = width as usize * height as usize;
    let mut best_cost = vec![u16::MAX; pixels];
    let mut best_disparity = vec![0_u16; pixels];

    for d in 0..=levels {
        let difference = GrayImage::from_fn(width, height, |x, y| {
            let partner = match reference {
                Reference::Left => x.checked_sub(d),
                Reference::Right => Some(x + d).filter(|&px| px < width),
            };
            partner.map_or(Luma([u8::MAX]), |px| {
                Luma([base.get_pixel(x, y).0[0].abs_diff(other.get_pixel(px, y).0[0])])
            })
        });
        let aggregated = imageproc::filter::box_filter(&difference, radius, radius);

        for (i, pixel) in aggregated.pixels().enumerate() {
            let cost = u16::from(pixel.0[0]);
            if cost < best_cost[i] {
                best_cost[i] = cost;
                // `levels` is clamped to the u16 range above.
                best_disparity[i] = d as u16;
            }
        }
    }

    best_disparity
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic high-frequency texture.
    fn texture(x: u32, y: u32) -> u8 {
        let h = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503) ^ (x * y);
        (h % 251) as u8
    }

    /// Left view and a right view shifted so every pixel has disparity `shift`.
    fn shifted_pair(width: u32, height: u32, shift: u32) -> (GrayImage, GrayImage) {
        let left = GrayImage::from_fn(width, height, |x, y| Luma([texture(x, y)]));
        let right = GrayImage::from_fn(width, height, |x, y| Luma([texture(x + shift, y)]));
        (left, right)
    }

    #[test]
    fn recovers_constant_shift() {
        let (left, right) = shifted_pair(48, 24, 5);
        let result = block_match(&left, &right, 16, 2);

        let mut total = 0;
        let mut correct = 0;
        for y in 2..22 {
            for x in 10..44 {
                total += 1;
                if result.get(x, y) == Some(5) {
                    correct += 1;
                }
            }
        }
        assert!(
            correct * 10 >= total * 9,
            "only {correct}/{total} interior pixels matched the shift"
        );
    }

    #[test]
    fn identical_views_match_at_zero() {
        let (left, _) = shifted_pair(20, 10, 0);
        let result = block_match(&left, &left, 8, 1);
        for y in 0..10 {
            for x in 0..20 {
                assert_eq!(result.get(x, y), Some(0), "pixel ({x}, {y})");
            }
        }
        assert_eq!(result.valid_count(), 200);
    }

    #[test]
    fn disparity_range_is_clamped_to_width() {
        let (left, right) = shifted_pair(4, 4, 1);
        let result = block_match(&left, &right, 1000, 1);
        assert_eq!(result.width(), 4);
        assert_eq!(result.height(), 4);
        for y in 0..4 {
            for x in 0..4 {
                if let Some(d) = result.get(x, y) {
                    assert!(u32::from(d) <= x);
                }
            }
        }
    }
}
