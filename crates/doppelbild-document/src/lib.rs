// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doppelbild-document — pulls raster images out of PDF documents.
//
// Two extraction modes exist, chosen once per document: embedded image
// objects read directly from page resource streams (`lopdf`), or whole-page
// rasterization through a pluggable renderer (pdfium behind the "pdfium"
// feature gate).

pub mod embedded;
pub mod extractor;
pub mod render;

pub use embedded::EmbeddedExtractor;
pub use extractor::DocumentExtractor;
pub use render::PageRasterizer;

#[cfg(feature = "pdfium")]
pub use render::pdfium::PdfiumRasterizer;
