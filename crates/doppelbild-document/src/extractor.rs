// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document-level extraction policy — embedded images first, whole-page
// rendering as fallback.

use std::path::Path;

use tracing::{info, instrument};

use doppelbild_core::{DoppelbildError, ExtractedImage, Result, SourceKind};

use crate::embedded::EmbeddedExtractor;
use crate::render::PageRasterizer;

/// Runs the two-stage extraction policy for one document.
///
/// Embedded extraction is attempted first. Only when the number of embedded
/// images found falls below `min_embedded_images` does the extractor fall
/// back to rendering every page — a document is either entirely "embedded
/// mode" or entirely "render mode", never a mix.
pub struct DocumentExtractor {
    embedded: EmbeddedExtractor,
    rasterizer: Option<Box<dyn PageRasterizer>>,
    min_embedded_images: usize,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(
        rasterizer: Option<Box<dyn PageRasterizer>>,
        min_embedded_images: usize,
        render_dpi: u32,
    ) -> Self {
        Self {
            embedded: EmbeddedExtractor::new(),
            rasterizer,
            min_embedded_images,
            render_dpi,
        }
    }

    /// Extract the document's images into `out_dir`, returning the chosen
    /// mode alongside the images in stable page/index order.
    #[instrument(skip_all, fields(path = %pdf_path.as_ref().display()))]
    pub fn extract(
        &self,
        pdf_path: impl AsRef<Path>,
        out_dir: &Path,
    ) -> Result<(SourceKind, Vec<ExtractedImage>)> {
        let pdf_path = pdf_path.as_ref();

        let embedded = self.embedded.extract(pdf_path, out_dir)?;
        if embedded.len() >= self.min_embedded_images {
            info!(count = embedded.len(), "document is in embedded mode");
            return Ok((SourceKind::Embedded, embedded));
        }

        info!(
            embedded_found = embedded.len(),
            minimum = self.min_embedded_images,
            "too few embedded images, falling back to page rendering"
        );

        let rasterizer = self.rasterizer.as_ref().ok_or_else(|| {
            DoppelbildError::NoRasterizer(pdf_path.display().to_string())
        })?;
        let rendered = rasterizer.render_pages(pdf_path, out_dir, self.render_dpi)?;
        Ok((SourceKind::Rendered, rendered))
    }
}
