// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ingestion orchestrator — single documents against the stored corpus, and
// whole folders with per-document failure isolation.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

use doppelbild_core::{DoppelbildError, ImageId, Result};
use doppelbild_fingerprint::{Candidate, Fingerprint};

use crate::report::{
    FolderEntry, FolderOutcome, FolderReport, ImageEntry, IngestReport, MatchDetail,
};
use crate::{Engine, sha256_file};

impl Engine {
    /// Ingest one document: extract its images, fingerprint them, match
    /// each against the corpus, and append the results to storage.
    ///
    /// Each image is matched against every fingerprint recorded strictly
    /// before it. With `within_document_matching` enabled (the default),
    /// earlier images of this same document are part of that history; with
    /// it disabled, only prior documents are.
    ///
    /// Fingerprints are computed in parallel across the document's images;
    /// matching and appending then run sequentially in extraction order, so
    /// results are deterministic either way.
    #[instrument(skip_all, fields(path = %pdf_path.as_ref().display()))]
    pub fn ingest(&mut self, pdf_path: impl AsRef<Path>) -> Result<IngestReport> {
        let pdf_path = pdf_path.as_ref();
        if !pdf_path.is_file() {
            return Err(DoppelbildError::InputNotFound(pdf_path.to_path_buf()));
        }

        let filename = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_owned());

        // Keep a copy of the source PDF next to the corpus.
        fs::create_dir_all(self.config.pdf_dir())?;
        let stored_path = self.config.pdf_dir().join(&filename);
        fs::copy(pdf_path, &stored_path)?;
        let digest = sha256_file(&stored_path)?;

        let document_id = self.store.insert_document(&filename, &stored_path, &digest)?;
        let out_dir = self.config.images_dir(document_id.0);
        let (mode, extracted) = self.extractor.extract(&stored_path, &out_dir)?;
        info!(%document_id, %mode, images = extracted.len(), "document extracted");

        // The candidate set: full history as recorded before this document.
        let mut candidates: Vec<Candidate<ImageId>> = self
            .store
            .all_fingerprints()?
            .into_iter()
            .map(|f| Candidate {
                id: f.image_id,
                phash: f.phash,
                dhash: f.dhash,
                ehash: f.ehash,
            })
            .collect();

        let fingerprints: Vec<Result<Fingerprint>> = extracted
            .par_iter()
            .map(|img| self.fingerprinter.fingerprint_path(&img.path))
            .collect();

        let mut entries = Vec::with_capacity(extracted.len());
        for (img, fingerprint) in extracted.iter().zip(fingerprints) {
            let fingerprint = match fingerprint {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(page = img.page, index = img.index, %err, "image skipped");
                    entries.push(ImageEntry {
                        page: img.page,
                        source: img.source,
                        index: img.index,
                        path: img.path.clone(),
                        phash: None,
                        dhash: None,
                        ehash: None,
                        width: None,
                        height: None,
                        is_duplicate: false,
                        matched: None,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let best = self.matcher.find_best_match(&fingerprint, &candidates);

            // Append before the next image of this document is processed,
            // so later images may match this one when the policy allows it.
            let (image_id, _) =
                self.store
                    .append_fingerprinted_image(document_id, img, &fingerprint)?;
            if self.config.within_document_matching {
                candidates.push(Candidate {
                    id: image_id,
                    phash: fingerprint.phash.clone(),
                    dhash: fingerprint.dhash.clone(),
                    ehash: fingerprint.ehash.clone(),
                });
            }

            let is_duplicate = best.is_some();
            let matched = match best {
                None => None,
                Some(m) => match self.store.image_info(m.id)? {
                    Some(info) => Some(MatchDetail {
                        score: m.score,
                        phash_dist: m.phash_dist,
                        dhash_dist: m.dhash_dist,
                        ehash_dist: m.ehash_dist,
                        image_id: info.image_id,
                        document_id: info.document_id,
                        document_filename: info.document_filename,
                        page: info.page,
                        source: info.source,
                        index: info.index,
                        path: info.path,
                    }),
                    None => {
                        warn!(matched_image = %m.id, "matched image has no stored metadata");
                        None
                    }
                },
            };

            entries.push(ImageEntry {
                page: img.page,
                source: img.source,
                index: img.index,
                path: img.path.clone(),
                phash: Some(fingerprint.phash.to_hex()),
                dhash: Some(fingerprint.dhash.to_hex()),
                ehash: Some(fingerprint.ehash.to_hex()),
                width: Some(fingerprint.width),
                height: Some(fingerprint.height),
                is_duplicate,
                matched,
                error: None,
            });
        }

        let report = IngestReport {
            document_id,
            filename,
            stored_path,
            images: entries,
        };

        fs::write(
            out_dir.join("report.json"),
            serde_json::to_string_pretty(&report)?,
        )?;

        info!(
            %document_id,
            images = report.images.len(),
            duplicates = report.duplicate_count(),
            failed = report.failed_count(),
            "ingest complete"
        );
        Ok(report)
    }

    /// Ingest every PDF under `folder` (recursively unless told otherwise),
    /// in sorted path order.
    ///
    /// One document's failure is recorded and never aborts the batch.
    #[instrument(skip_all, fields(folder = %folder.as_ref().display(), recursive))]
    pub fn ingest_folder(
        &mut self,
        folder: impl AsRef<Path>,
        recursive: bool,
    ) -> Result<FolderReport> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(DoppelbildError::InputNotFound(folder.to_path_buf()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut pdfs: Vec<PathBuf> = WalkDir::new(folder)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .map(|entry| entry.into_path())
            .collect();
        pdfs.sort();

        info!(count = pdfs.len(), "folder scan complete");

        let mut documents = Vec::with_capacity(pdfs.len());
        let (mut succeeded, mut failed) = (0usize, 0usize);
        let (mut total_images, mut total_duplicates, mut total_new) = (0usize, 0usize, 0usize);

        for path in pdfs {
            match self.ingest(&path) {
                Ok(report) => {
                    succeeded += 1;
                    total_images += report.images.len();
                    total_duplicates += report.duplicate_count();
                    total_new += report.new_count();
                    documents.push(FolderEntry {
                        path,
                        outcome: FolderOutcome::Ingested {
                            document_id: report.document_id,
                            images: report.images.len(),
                            duplicates: report.duplicate_count(),
                            new: report.new_count(),
                            failed_images: report.failed_count(),
                        },
                    });
                }
                Err(err) => {
                    error!(path = %path.display(), %err, "document failed, continuing batch");
                    failed += 1;
                    documents.push(FolderEntry {
                        path,
                        outcome: FolderOutcome::Failed {
                            error: err.to_string(),
                        },
                    });
                }
            }
        }

        Ok(FolderReport {
            folder: folder.to_path_buf(),
            documents,
            succeeded,
            failed,
            total_images,
            total_duplicates,
            total_new,
        })
    }
}
