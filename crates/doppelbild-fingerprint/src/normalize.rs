// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image normalizer — converts an arbitrary raster image into the two
// canonical forms used as hashing inputs: a contrast-stretched grayscale
// canvas, and an edge map of that canvas.

use image::{DynamicImage, GrayImage, Luma, imageops};
use imageproc::filter::filter3x3;
use tracing::debug;

/// 3x3 Laplacian-style kernel: strong response on intensity discontinuities,
/// zero on flat regions.
const EDGE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Fraction of the histogram clipped off each end before stretching,
/// in percent.
const CONTRAST_CUTOFF_PERCENT: u64 = 2;

/// Produces the canonical hashing inputs for an image.
///
/// Every image is reduced to a fixed square canvas regardless of its source
/// aspect ratio. The distortion is accepted deliberately: it is applied
/// identically to every image in the corpus, so relative comparability is
/// preserved while resolution and aspect ratio stop being confounds.
#[derive(Debug, Clone)]
pub struct Normalizer {
    canvas_size: u32,
}

impl Normalizer {
    pub fn new(canvas_size: u32) -> Self {
        Self { canvas_size }
    }

    /// The plain grayscale form: luminance, contrast stretch, fixed canvas.
    ///
    /// The contrast stretch clips the darkest and brightest 2% of pixels and
    /// remaps the rest onto the full dynamic range, which makes the derived
    /// hashes robust to exposure differences between a scanned original and
    /// a reproduction.
    pub fn gray_form(&self, img: &DynamicImage) -> GrayImage {
        let gray = img.to_luma8();
        let stretched = autocontrast(&gray, CONTRAST_CUTOFF_PERCENT);
        let canvas = imageops::resize(
            &stretched,
            self.canvas_size,
            self.canvas_size,
            imageops::FilterType::Lanczos3,
        );
        debug!(
            from_w = img.width(),
            from_h = img.height(),
            canvas = self.canvas_size,
            "gray form built"
        );
        canvas
    }

    /// The edge form: gradient magnitude of the gray form, restretched.
    ///
    /// Operating on edges discards tone entirely, so hashes of this form
    /// survive recoloring and rescanning.
    pub fn edge_form(&self, gray: &GrayImage) -> GrayImage {
        let edges = filter3x3::<Luma<u8>, f32, u8>(gray, &EDGE_KERNEL);
        autocontrast(&edges, CONTRAST_CUTOFF_PERCENT)
    }
}

/// Histogram-based contrast stretch.
///
/// Clips `cutoff_percent` of the pixel mass from each end of the histogram,
/// then linearly remaps the surviving range onto [0, 255]. Images whose
/// clipped histogram collapses to a single level are returned unchanged.
pub fn autocontrast(img: &GrayImage, cutoff_percent: u64) -> GrayImage {
    let total = u64::from(img.width()) * u64::from(img.height());
    if total == 0 {
        return img.clone();
    }

    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let cut = total * cutoff_percent / 100;

    // Remove `cut` pixels from each tail of the histogram.
    let mut clipped = hist;
    let mut remaining = cut;
    for level in 0..256 {
        if remaining == 0 {
            break;
        }
        let taken = clipped[level].min(remaining);
        clipped[level] -= taken;
        remaining -= taken;
    }
    let mut remaining = cut;
    for level in (0..256).rev() {
        if remaining == 0 {
            break;
        }
        let taken = clipped[level].min(remaining);
        clipped[level] -= taken;
        remaining -= taken;
    }

    let lo = clipped.iter().position(|&c| c > 0);
    let hi = clipped.iter().rposition(|&c| c > 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as i32, hi as i32),
        _ => return img.clone(),
    };

    let mut out = img.clone();
    for p in out.pixels_mut() {
        let v = p.0[0] as i32;
        p.0[0] = ((v - lo) * 255 / (hi - lo)).clamp(0, 255) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn gray_form_has_canvas_dimensions() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(30, 90, Rgb([10, 20, 30])));
        let norm = Normalizer::new(64);
        let gray = norm.gray_form(&img);
        assert_eq!(gray.dimensions(), (64, 64));
    }

    #[test]
    fn autocontrast_stretches_low_contrast_image() {
        // Half the pixels at 100, half at 140: after stretching the range
        // must span the full dynamic range.
        let img = GrayImage::from_fn(100, 2, |x, _| {
            if x < 50 { Luma([100u8]) } else { Luma([140u8]) }
        });
        let out = autocontrast(&img, 2);
        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn autocontrast_leaves_flat_image_unchanged() {
        let img = GrayImage::from_pixel(16, 16, Luma([77u8]));
        let out = autocontrast(&img, 2);
        assert_eq!(img, out);
    }

    #[test]
    fn edge_form_is_flat_for_flat_input() {
        let norm = Normalizer::new(32);
        let flat = GrayImage::from_pixel(32, 32, Luma([128u8]));
        let edge = norm.edge_form(&flat);
        // No intensity discontinuities anywhere: every response is zero and
        // the restretch keeps it that way.
        assert!(edge.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn forms_are_deterministic() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(50, 40, |x, y| {
            Rgb([(x * 5) as u8, (y * 6) as u8, 200])
        }));
        let norm = Normalizer::new(64);
        let a = norm.gray_form(&img);
        let b = norm.gray_form(&img);
        assert_eq!(a.as_raw(), b.as_raw());
        assert_eq!(norm.edge_form(&a).as_raw(), norm.edge_form(&b).as_raw());
    }
}
