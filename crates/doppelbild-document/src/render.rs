// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization — the fallback extraction mode for documents with too
// few embedded images (typically scans). The renderer itself is pluggable;
// a pdfium-backed implementation ships behind the "pdfium" feature gate.

use std::path::Path;

use doppelbild_core::{ExtractedImage, Result};

/// Renders every page of a PDF as one whole image.
///
/// Implementations write one file per page into `out_dir` and return entries
/// with 1-based page numbers and an image index that is always 1.
pub trait PageRasterizer {
    fn render_pages(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<ExtractedImage>>;
}

#[cfg(feature = "pdfium")]
pub mod pdfium {
    use std::fs;
    use std::path::Path;

    use pdfium_render::prelude::*;
    use tracing::{debug, info, instrument};

    use doppelbild_core::{DoppelbildError, ExtractedImage, Result, SourceKind};

    use super::PageRasterizer;

    /// Whole-page renderer backed by the pdfium library.
    ///
    /// Binds to a system-installed libpdfium, falling back to one next to
    /// the executable.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        pub fn new() -> Result<Self> {
            let bindings = Pdfium::bind_to_system_library()
                .or_else(|_| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                })
                .map_err(|err| {
                    DoppelbildError::Extraction(format!("failed to load pdfium library: {err:?}"))
                })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        #[instrument(skip_all, fields(path = %pdf_path.display(), dpi))]
        fn render_pages(
            &self,
            pdf_path: &Path,
            out_dir: &Path,
            dpi: u32,
        ) -> Result<Vec<ExtractedImage>> {
            let document = self
                .pdfium
                .load_pdf_from_file(pdf_path, None)
                .map_err(|err| {
                    DoppelbildError::Extraction(format!(
                        "pdfium failed to open {}: {err}",
                        pdf_path.display()
                    ))
                })?;

            fs::create_dir_all(out_dir)?;

            let render_config =
                PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

            let mut rendered = Vec::new();
            for (page_index, page) in document.pages().iter().enumerate() {
                let page_number = page_index as u32 + 1;
                let bitmap = page.render_with_config(&render_config).map_err(|err| {
                    DoppelbildError::Extraction(format!(
                        "pdfium failed to render page {page_number}: {err}"
                    ))
                })?;

                let path = out_dir.join(format!("render_p{page_number}.jpg"));
                bitmap
                    .as_image()
                    .to_rgb8()
                    .save(&path)
                    .map_err(|err| {
                        DoppelbildError::Extraction(format!(
                            "failed to encode rendered page {page_number}: {err}"
                        ))
                    })?;

                debug!(page = page_number, "page rendered");
                rendered.push(ExtractedImage {
                    source: SourceKind::Rendered,
                    page: page_number,
                    index: 1,
                    path,
                });
            }

            info!(pages = rendered.len(), "page rendering complete");
            Ok(rendered)
        }
    }
}
