// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded-image extraction — walks each page's /Resources → /XObject
// dictionaries with `lopdf` and writes every decodable /Image stream to disk.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

use doppelbild_core::{DoppelbildError, ExtractedImage, Result, SourceKind};

/// Extracts embedded raster image objects from a PDF.
///
/// Supports the two encodings that cover the vast majority of real-world
/// PDFs: `DCTDecode` streams (written out verbatim as JPEG) and
/// `FlateDecode`/unfiltered streams in 8-bit `DeviceRGB` or `DeviceGray`
/// (re-encoded as PNG). Image objects with other encodings are skipped with
/// a warning; a skip is never fatal to the document.
pub struct EmbeddedExtractor;

impl EmbeddedExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract every embedded image, writing files into `out_dir`.
    ///
    /// Returned entries carry 1-based page numbers and a 1-based per-page
    /// image index following the order the XObject dictionary lists them.
    #[instrument(skip_all, fields(path = %pdf_path.as_ref().display()))]
    pub fn extract(
        &self,
        pdf_path: impl AsRef<Path>,
        out_dir: &Path,
    ) -> Result<Vec<ExtractedImage>> {
        let pdf_path = pdf_path.as_ref();
        let document = Document::load(pdf_path).map_err(|err| {
            DoppelbildError::Extraction(format!(
                "failed to open {}: {}",
                pdf_path.display(),
                err
            ))
        })?;

        fs::create_dir_all(out_dir)?;

        let pages = document.get_pages();
        let mut extracted = Vec::new();

        for (&page_number, &page_id) in &pages {
            let image_objects = page_image_objects(&document, page_id);
            let mut image_index = 0u32;

            for object_id in image_objects {
                image_index += 1;
                match save_image_stream(
                    &document,
                    object_id,
                    out_dir,
                    page_number,
                    image_index,
                ) {
                    Ok(Some(path)) => extracted.push(ExtractedImage {
                        source: SourceKind::Embedded,
                        page: page_number,
                        index: image_index,
                        path,
                    }),
                    Ok(None) => {}
                    Err(err) => warn!(
                        page = page_number,
                        image_index,
                        %err,
                        "skipping undecodable embedded image"
                    ),
                }
            }
        }

        info!(
            pages = pages.len(),
            images = extracted.len(),
            "embedded extraction complete"
        );
        Ok(extracted)
    }
}

impl Default for EmbeddedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the IDs of all /Image XObjects referenced by a page's resources,
/// in dictionary order. Resources inherited from ancestor /Pages nodes are
/// resolved by walking the /Parent chain.
fn page_image_objects(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Some(resources) = page_resources(document, page_id) else {
        return Vec::new();
    };

    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(document, obj))
    else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    for (_name, value) in xobjects.iter() {
        let Object::Reference(object_id) = value else {
            continue;
        };
        let Ok(Object::Stream(stream)) = document.get_object(*object_id) else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if is_image {
            ids.push(*object_id);
        }
    }
    ids
}

/// Resolve a page's /Resources dictionary, following the /Parent chain when
/// the page inherits resources from a /Pages node. Depth-capped against
/// malformed circular parent references.
fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = document.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(document, resources);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return None,
        }
    }
    None
}

/// Resolve an object that may be a direct dictionary or a reference to one.
fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        _ => None,
    }
}

/// Decode one /Image stream and write it to disk.
///
/// Returns `Ok(None)` when the encoding is unsupported (the caller counts
/// the image but produces no file for it).
fn save_image_stream(
    document: &Document,
    object_id: ObjectId,
    out_dir: &Path,
    page_number: u32,
    image_index: u32,
) -> Result<Option<PathBuf>> {
    let Ok(Object::Stream(stream)) = document.get_object(object_id) else {
        return Ok(None);
    };

    let filters = stream_filters(&stream.dict);

    // JPEG streams pass through untouched.
    if filters.iter().any(|f| f == b"DCTDecode") {
        let path = out_dir.join(format!("embedded_p{page_number}_img{image_index}.jpg"));
        fs::write(&path, &stream.content)?;
        debug!(page = page_number, image_index, "JPEG stream written verbatim");
        return Ok(Some(path));
    }

    // Anything beyond plain deflate we do not decode.
    let exotic = filters
        .iter()
        .any(|f| f != b"FlateDecode" && f != b"DCTDecode");
    if exotic {
        warn!(
            page = page_number,
            image_index,
            filters = ?filters.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect::<Vec<_>>(),
            "unsupported image encoding"
        );
        return Ok(None);
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|err| {
            DoppelbildError::Extraction(format!("failed to inflate image stream: {err}"))
        })?
    };

    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        warn!(page = page_number, image_index, bits, "unsupported bit depth");
        return Ok(None);
    }

    let color_space = color_space_name(document, &stream.dict);
    let decoded = match color_space.as_deref() {
        Some(b"DeviceRGB") => image::RgbImage::from_raw(width, height, data)
            .map(image::DynamicImage::ImageRgb8),
        Some(b"DeviceGray") => image::GrayImage::from_raw(width, height, data)
            .map(image::DynamicImage::ImageLuma8),
        other => {
            warn!(
                page = page_number,
                image_index,
                color_space = ?other.map(|n| String::from_utf8_lossy(n).into_owned()),
                "unsupported color space"
            );
            return Ok(None);
        }
    };

    let Some(decoded) = decoded else {
        return Err(DoppelbildError::Extraction(format!(
            "image stream length does not match {width}x{height} dimensions"
        )));
    };

    let path = out_dir.join(format!("embedded_p{page_number}_img{image_index}.png"));
    decoded
        .save(&path)
        .map_err(|err| DoppelbildError::Extraction(format!("failed to encode PNG: {err}")))?;
    debug!(page = page_number, image_index, width, height, "raw stream re-encoded as PNG");
    Ok(Some(path))
}

/// Flatten the /Filter entry (absent, single name, or array of names).
fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Read the /ColorSpace name, resolving one level of indirection.
fn color_space_name(document: &Document, dict: &Dictionary) -> Option<Vec<u8>> {
    let object = dict.get(b"ColorSpace").ok()?;
    let object = match object {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    object.as_name().ok().map(|n| n.to_vec())
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .ok()
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            DoppelbildError::Extraction(format!(
                "image stream missing integer /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::Stream;
    use tempfile::TempDir;

    /// Build a single-page PDF whose page carries one raw `DeviceRGB` image
    /// XObject of the given solid color.
    fn pdf_with_rgb_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
        let image_dict = dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
        };
        let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, data)));

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

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).expect("failed to save test PDF");
    }

    #[test]
    fn extracts_raw_rgb_image_object() {
        let dir = TempDir::new().unwrap();
        let pdf_path = dir.path().join("one_image.pdf");
        pdf_with_rgb_image(&pdf_path, 8, 6, [200, 10, 10]);

        let out_dir = dir.path().join("out");
        let extracted = EmbeddedExtractor::new()
            .extract(&pdf_path, &out_dir)
            .unwrap();

        assert_eq!(extracted.len(), 1);
        let entry = &extracted[0];
        assert_eq!(entry.source, SourceKind::Embedded);
        assert_eq!(entry.page, 1);
        assert_eq!(entry.index, 1);

        let reloaded = image::open(&entry.path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (8, 6));
        assert_eq!(reloaded.get_pixel(3, 3).0, [200, 10, 10]);
    }

    #[test]
    fn pdf_without_images_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let pdf_path = dir.path().join("no_images.pdf");

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            b"BT ET".to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(&pdf_path).unwrap();

        let extracted = EmbeddedExtractor::new()
            .extract(&pdf_path, &dir.path().join("out"))
            .unwrap();
        assert!(extracted.is_empty());
    }

    #[test]
    fn unreadable_pdf_is_an_extraction_error() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("not_a_pdf.pdf");
        fs::write(&bogus, b"definitely not a pdf").unwrap();

        let err = EmbeddedExtractor::new()
            .extract(&bogus, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, DoppelbildError::Extraction(_)));
    }
}
