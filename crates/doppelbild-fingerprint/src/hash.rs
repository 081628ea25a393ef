// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perceptual hash codes — DCT-based phash and row-gradient dhash over
// normalized grayscale forms, plus Hamming distance between codes.

use image::{GrayImage, imageops};
use serde::{Deserialize, Serialize};

/// Multiplier applied to the hash grid side to size the DCT input.
/// A hash size of 8 means the DCT runs on a 32x32 reduction.
const DCT_SCALE: u32 = 4;

/// A fixed-length perceptual hash bit pattern, packed MSB-first.
///
/// Bit length is a corpus-wide constant (`hash_size²`), so any two codes of
/// the same family are always comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashCode {
    bytes: Vec<u8>,
    bit_len: u32,
}

impl HashCode {
    /// Pack a slice of bits (MSB-first within each byte).
    pub fn from_bits(bits: &[bool]) -> Self {
        let bytes = bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &bit)| if bit { acc | (1 << (7 - i)) } else { acc })
            })
            .collect();
        Self {
            bytes,
            bit_len: bits.len() as u32,
        }
    }

    /// Parse the lowercase hex rendering produced by [`HashCode::to_hex`].
    ///
    /// The hex form carries whole bytes only, so the caller supplies the
    /// code's bit length (a corpus-wide constant derived from `hash_size`).
    /// Returns `None` when the digits don't parse, the byte count doesn't
    /// match `bit_len`, or padding bits in the final byte are set.
    pub fn from_hex(hex: &str, bit_len: u32) -> Option<Self> {
        let hex = hex.trim();
        if bit_len == 0 || hex.len() % 2 != 0 {
            return None;
        }
        let bytes: Option<Vec<u8>> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
            .collect();
        let bytes = bytes?;
        if bytes.len() as u32 != bit_len.div_ceil(8) {
            return None;
        }
        let padding = bytes.len() as u32 * 8 - bit_len;
        if padding > 0 {
            let last = bytes[bytes.len() - 1];
            if last & ((1u8 << padding) - 1) != 0 {
                return None;
            }
        }
        Some(Self { bytes, bit_len })
    }

    /// Fixed-width lowercase hex, the storage and report form.
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.bytes.iter().fold(
            String::with_capacity(self.bytes.len() * 2),
            |mut s, b| {
                let _ = write!(s, "{b:02x}");
                s
            },
        )
    }

    /// Number of bits in this code.
    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    /// Hamming distance: the count of differing bits.
    ///
    /// Symmetric, zero on self. Operands of a given family always share a
    /// bit length by construction; a mismatch is a programming error.
    pub fn distance(&self, other: &HashCode) -> u32 {
        debug_assert_eq!(
            self.bit_len, other.bit_len,
            "hash codes of differing lengths are never comparable"
        );
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl std::fmt::Display for HashCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Frequency-domain perceptual hash.
///
/// Reduces the form to a `hash_size * 4` square, applies a 2D DCT-II, keeps
/// the top-left `hash_size x hash_size` low-frequency block, and emits one
/// bit per coefficient: set when the coefficient exceeds the block median.
/// Captures coarse structure; tolerant to resizing, compression, and minor
/// tone shifts.
pub fn phash(form: &GrayImage, hash_size: u32) -> HashCode {
    let dct_size = hash_size * DCT_SCALE;
    let reduced = imageops::resize(
        form,
        dct_size,
        dct_size,
        imageops::FilterType::Lanczos3,
    );

    let pixels: Vec<f64> = reduced.pixels().map(|p| p.0[0] as f64).collect();
    let dct = dct_2d(&pixels, dct_size as usize);

    let side = hash_size as usize;
    let mut block = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            block.push(dct[y * dct_size as usize + x]);
        }
    }

    let med = median(&block);
    let bits: Vec<bool> = block.iter().map(|&c| c > med).collect();
    HashCode::from_bits(&bits)
}

/// Row-wise gradient hash.
///
/// Reduces the form to `(hash_size + 1) x hash_size` and emits one bit per
/// horizontally adjacent pixel pair: set when the right pixel is brighter.
/// Cheap, fine-grained, sensitive to genuine structural differences.
pub fn dhash(form: &GrayImage, hash_size: u32) -> HashCode {
    let reduced = imageops::resize(
        form,
        hash_size + 1,
        hash_size,
        imageops::FilterType::Lanczos3,
    );

    let mut bits = Vec::with_capacity((hash_size * hash_size) as usize);
    for y in 0..hash_size {
        for x in 0..hash_size {
            let left = reduced.get_pixel(x, y).0[0];
            let right = reduced.get_pixel(x + 1, y).0[0];
            bits.push(right > left);
        }
    }
    HashCode::from_bits(&bits)
}

/// Median of a coefficient block; mean of the two middle values when the
/// block has even length.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// 2D orthonormal DCT-II via separable row/column passes with a
/// precomputed cosine table.
fn dct_2d(pixels: &[f64], size: usize) -> Vec<f64> {
    let cos_table: Vec<f64> = (0..size)
        .flat_map(|u| {
            (0..size).map(move |x| {
                ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / (2.0 * size as f64)).cos()
            })
        })
        .collect();
    let norm = (2.0 / size as f64).sqrt();

    // Rows.
    let mut temp = vec![0.0; size * size];
    for y in 0..size {
        for u in 0..size {
            let mut sum = 0.0;
            for x in 0..size {
                sum += pixels[y * size + x] * cos_table[u * size + x];
            }
            let cu = if u == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
            temp[y * size + u] = sum * cu * norm;
        }
    }

    // Columns.
    let mut result = vec![0.0; size * size];
    for x in 0..size {
        for v in 0..size {
            let mut sum = 0.0;
            for y in 0..size {
                sum += temp[y * size + x] * cos_table[v * size + y];
            }
            let cv = if v == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
            result[v * size + x] = sum * cv * norm;
        }
    }

    result
}
