// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tunable parameters for extraction, fingerprinting, and matching.
///
/// Constructed once and passed explicitly into the normalizer, extractor,
/// matcher, and orchestrators — never read from ambient global state, so
/// per-call tuning and deterministic tests stay possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// DPI used when rendering whole pages as fallback images.
    pub render_dpi: u32,
    /// If a document yields at least this many embedded images, page
    /// rendering is skipped entirely (document-level decision).
    pub min_embedded_images: usize,
    /// Maximum Hamming distance at which two phashes still agree.
    pub phash_threshold: u32,
    /// Maximum Hamming distance at which two dhashes still agree.
    pub dhash_threshold: u32,
    /// Maximum Hamming distance at which two ehashes alone are convincing.
    pub ehash_threshold: u32,
    /// Side length of the square canvas every image is normalized onto.
    pub canvas_size: u32,
    /// Side length of the hash grid; every hash carries `hash_size²` bits.
    pub hash_size: u32,
    /// Whether images of one document may match earlier images of the same
    /// document. When `false`, only strictly-prior documents are candidates.
    pub within_document_matching: bool,
    /// Root directory for stored PDFs, extracted images, and the database.
    pub storage_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_dpi: 200,
            min_embedded_images: 1,
            phash_threshold: 8,
            dhash_threshold: 10,
            ehash_threshold: 10,
            canvas_size: 512,
            hash_size: 8,
            within_document_matching: true,
            storage_dir: PathBuf::from("storage"),
        }
    }
}

impl EngineConfig {
    /// Number of bits in every hash code produced under this configuration.
    pub fn hash_bits(&self) -> u32 {
        self.hash_size * self.hash_size
    }

    /// Directory where ingested PDFs are copied.
    pub fn pdf_dir(&self) -> PathBuf {
        self.storage_dir.join("pdfs")
    }

    /// Directory where extracted images for a given document are written.
    pub fn images_dir(&self, document_id: i64) -> PathBuf {
        self.storage_dir
            .join("images")
            .join(format!("doc_{document_id}"))
    }

    /// Directory for the ephemeral artifacts of one pairwise comparison run.
    pub fn compare_dir(&self, run_id: &str) -> PathBuf {
        self.storage_dir.join("compare").join(format!("run_{run_id}"))
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join("doppelbild.db")
    }
}
