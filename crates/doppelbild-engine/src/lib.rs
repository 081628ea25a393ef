// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doppelbild-engine — orchestrates extraction, fingerprinting, matching, and
// persistence across whole documents.
//
// Three entry points: `ingest` (one document against the stored corpus),
// `compare` (two documents against each other, nothing persisted), and
// `ingest_folder` (batch ingestion with per-document failure isolation).

mod compare;
mod ingest;
mod report;

pub use report::{
    CompareEntry, CompareMatchDetail, CompareReport, FolderEntry, FolderOutcome, FolderReport,
    ImageEntry, IngestReport, MatchDetail,
};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use doppelbild_core::{EngineConfig, Result};
use doppelbild_document::{DocumentExtractor, PageRasterizer};
use doppelbild_fingerprint::{Fingerprinter, Matcher};
use doppelbild_store::Store;

/// The duplicate-detection engine: a configuration, a fingerprinting
/// pipeline, a matcher, an extraction policy, and the persistent corpus.
pub struct Engine {
    config: EngineConfig,
    fingerprinter: Fingerprinter,
    matcher: Matcher,
    extractor: DocumentExtractor,
    store: Store,
}

impl Engine {
    /// Open the engine over the storage directory named in `config`.
    ///
    /// `rasterizer` supplies the whole-page fallback renderer; pass `None`
    /// to restrict the engine to embedded-mode documents.
    pub fn open(
        config: EngineConfig,
        rasterizer: Option<Box<dyn PageRasterizer>>,
    ) -> Result<Self> {
        let store = Store::open(config.db_path(), config.hash_bits())?;
        let fingerprinter = Fingerprinter::new(config.canvas_size, config.hash_size);
        let matcher = Matcher::from_config(&config);
        let extractor =
            DocumentExtractor::new(rasterizer, config.min_embedded_images, config.render_dpi);

        Ok(Self {
            config,
            fingerprinter,
            matcher,
            extractor,
            store,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// SHA-256 digest of a file, streamed in 8 KiB chunks, rendered as hex.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
pub(crate) mod testpdf {
    //! Synthetic single- and multi-image PDFs for orchestrator tests.

    use std::path::Path;

    use image::RgbImage;
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    /// Build a PDF with one page per supplied image, each page carrying the
    /// image as a raw (unfiltered) `DeviceRGB` XObject.
    pub fn pdf_with_images(path: &Path, images: &[RgbImage]) {
        build_pdf(path, images.iter().map(raw_rgb_xobject).collect());
    }

    /// Like [`pdf_with_images`], but page 1 carries an image stream declared
    /// as JPEG (`DCTDecode`) whose bytes are garbage. Extraction passes the
    /// stream through verbatim; decoding it then fails.
    pub fn pdf_with_garbage_jpeg_then_images(path: &Path, images: &[RgbImage]) {
        let mut xobjects = vec![(
            dictionary! {
                "Type" => Object::Name(b"XObject".to_vec()),
                "Subtype" => Object::Name(b"Image".to_vec()),
                "Width" => Object::Integer(8),
                "Height" => Object::Integer(8),
                "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => Object::Name(b"DCTDecode".to_vec()),
            },
            b"these bytes are not a jpeg".to_vec(),
        )];
        xobjects.extend(images.iter().map(raw_rgb_xobject));
        build_pdf(path, xobjects);
    }

    fn raw_rgb_xobject(img: &RgbImage) -> (Dictionary, Vec<u8>) {
        let (width, height) = img.dimensions();
        (
            dictionary! {
                "Type" => Object::Name(b"XObject".to_vec()),
                "Subtype" => Object::Name(b"Image".to_vec()),
                "Width" => Object::Integer(width as i64),
                "Height" => Object::Integer(height as i64),
                "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
                "BitsPerComponent" => Object::Integer(8),
            },
            img.as_raw().clone(),
        )
    }

    fn build_pdf(path: &Path, xobjects: Vec<(Dictionary, Vec<u8>)>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for (image_dict, content) in xobjects {
            let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, content)));
            let content_id = doc.add_object(Object::Stream(Stream::new(
                dictionary! {},
                b"q Q".to_vec(),
            )));
            let page_id = doc.add_object(dictionary! {
                "Type" => Object::Name(b"Page".to_vec()),
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        "Im1" => Object::Reference(image_id),
                    },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).expect("failed to save test PDF");
    }

    /// Fine checkerboard: busy structure, strong edges.
    pub fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    /// Smooth horizontal brightness ramp: almost no edges.
    pub fn ramp(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, _| {
            let v = (x * 255 / size.max(1)) as u8;
            image::Rgb([v, v, v])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_file_matches_known_digest() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let digest = sha256_file(tmp.path()).unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
