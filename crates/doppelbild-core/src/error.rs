// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Doppelbild.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Doppelbild operations.
#[derive(Debug, Error)]
pub enum DoppelbildError {
    // -- Input errors --
    #[error("input document not found: {}", .0.display())]
    InputNotFound(PathBuf),

    // -- Extraction errors --
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("no page rasterizer configured and document has too few embedded images: {0}")]
    NoRasterizer(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DoppelbildError>;
