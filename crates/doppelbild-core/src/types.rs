// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Doppelbild.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Unique identifier of an ingested document (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a stored image record (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub i64);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a stored fingerprint record (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintId(pub i64);

impl std::fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an image was obtained from its document.
///
/// The choice is made once per document: either every image is an embedded
/// raster object, or every page was rendered whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A raster image object stored directly in a page's resource stream.
    Embedded,
    /// A full-page rasterization (fallback for scanned documents).
    Rendered,
}

impl SourceKind {
    /// Stable string form used in the database `source` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Rendered => "rendered",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "embedded" => Some(Self::Embedded),
            "rendered" => Some(Self::Rendered),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image pulled out of a document, written to disk and awaiting
/// fingerprinting. Page and index are 1-based; rendered pages always have
/// index 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub source: SourceKind,
    pub page: u32,
    pub index: u32,
    pub path: PathBuf,
}

/// Metadata of a previously stored image, resolved when reporting a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub image_id: ImageId,
    pub document_id: DocumentId,
    pub document_filename: String,
    pub page: u32,
    pub source: SourceKind,
    pub index: u32,
    pub path: PathBuf,
}
