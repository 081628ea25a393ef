// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doppelbild-fingerprint — the perceptual fingerprinting and matching engine.
//
// Provides image normalization (grayscale + edge canonical forms), three
// perceptual hash codes per image (phash, dhash, ehash), Hamming distance,
// and the best-match selection over a candidate set.

pub mod hash;
pub mod matcher;
pub mod normalize;

pub use hash::HashCode;
pub use matcher::{Candidate, Match, Matcher};
pub use normalize::Normalizer;

use doppelbild_core::{DoppelbildError, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// The perceptual signature of one image: three equal-length hash codes plus
/// the source dimensions (reported downstream, never used in matching).
///
/// Immutable once computed; it outlives the bitmap it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Frequency-domain hash of the grayscale form.
    pub phash: HashCode,
    /// Row-wise gradient hash of the grayscale form.
    pub dhash: HashCode,
    /// Frequency-domain hash of the edge form (tone-invariant).
    pub ehash: HashCode,
    pub width: u32,
    pub height: u32,
}

/// Computes [`Fingerprint`]s under a fixed configuration.
///
/// Canvas size and hash size are constant across a corpus, so every hash it
/// produces is cross-comparable with every other.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    normalizer: Normalizer,
    hash_size: u32,
}

impl Fingerprinter {
    pub fn new(canvas_size: u32, hash_size: u32) -> Self {
        Self {
            normalizer: Normalizer::new(canvas_size),
            hash_size,
        }
    }

    /// Load an image from disk and fingerprint it.
    ///
    /// A file that cannot be decoded surfaces as [`DoppelbildError::Decode`];
    /// a blank image is never silently substituted.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn fingerprint_path(&self, path: impl AsRef<std::path::Path>) -> Result<Fingerprint> {
        let img = image::open(path.as_ref()).map_err(|err| {
            DoppelbildError::Decode(format!("{}: {}", path.as_ref().display(), err))
        })?;
        Ok(self.fingerprint(&img))
    }

    /// Fingerprint an already-decoded image. Pure: identical pixels always
    /// yield the identical triple.
    pub fn fingerprint(&self, img: &DynamicImage) -> Fingerprint {
        let (width, height) = (img.width(), img.height());

        let gray = self.normalizer.gray_form(img);
        let edge = self.normalizer.edge_form(&gray);

        let phash = hash::phash(&gray, self.hash_size);
        let dhash = hash::dhash(&gray, self.hash_size);
        let ehash = hash::phash(&edge, self.hash_size);

        debug!(
            phash = %phash.to_hex(),
            dhash = %dhash.to_hex(),
            ehash = %ehash.to_hex(),
            width,
            height,
            "fingerprint computed"
        );

        Fingerprint {
            phash,
            dhash,
            ehash,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_image(w: u32, h: u32) -> DynamicImage {
        let img = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let fp = Fingerprinter::new(128, 8);
        let img = gradient_image(300, 200);
        let a = fp.fingerprint(&img);
        let b = fp.fingerprint(&img);
        assert_eq!(a, b);
        assert_eq!(a.width, 300);
        assert_eq!(a.height, 200);
    }

    #[test]
    fn all_three_hashes_share_bit_length() {
        let fp = Fingerprinter::new(128, 8);
        let sig = fp.fingerprint(&gradient_image(64, 64));
        assert_eq!(sig.phash.bit_len(), 64);
        assert_eq!(sig.dhash.bit_len(), 64);
        assert_eq!(sig.ehash.bit_len(), 64);
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let fp = Fingerprinter::new(128, 8);
        let a = fp.fingerprint(&gradient_image(300, 200));
        let b = fp.fingerprint(&gradient_image(300, 200));
        assert_eq!(a.phash.distance(&b.phash), 0);
        assert_eq!(a.dhash.distance(&b.dhash), 0);
        assert_eq!(a.ehash.distance(&b.ehash), 0);
    }

    #[test]
    fn unrelated_images_differ() {
        let fp = Fingerprinter::new(128, 8);
        let a = fp.fingerprint(&gradient_image(300, 200));
        let noise = RgbImage::from_fn(300, 200, |x, y| {
            // Deterministic pseudo-noise, distinct from the smooth gradient.
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104729)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(89)])
        });
        let b = fp.fingerprint(&DynamicImage::ImageRgb8(noise));
        assert!(a.phash.distance(&b.phash) > 0);
    }

    #[test]
    fn rescaled_image_stays_close_in_phash() {
        let fp = Fingerprinter::new(128, 8);
        let original = gradient_image(400, 300);
        let smaller = original.resize_exact(200, 150, image::imageops::FilterType::Lanczos3);
        let a = fp.fingerprint(&original);
        let b = fp.fingerprint(&smaller);
        assert!(
            a.phash.distance(&b.phash) <= 8,
            "phash distance {} exceeds tolerance",
            a.phash.distance(&b.phash)
        );
    }
}
