//! Pre-matching smoothing.
//!
//! Block matching compares raw intensities pixel by pixel, so per-pixel
//! noise in either view shifts the cost minimum to the wrong disparity
//! level. Blurring both views with the same Gaussian first keeps the
//! aggregated costs dominated by scene texture. Both views must use the
//! same `sigma` or the intensities no longer agree.

use image::GrayImage;

/// Smooth one view of the pair with a Gaussian of standard deviation
/// `sigma` pixels.
///
/// `sigma <= 0` disables smoothing and returns a copy.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
