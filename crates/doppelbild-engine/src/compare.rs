// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pairwise comparison — two documents against each other, outside the
// stored corpus. Nothing is persisted to the database.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use doppelbild_core::{DoppelbildError, Result};
use doppelbild_fingerprint::Candidate;

use crate::report::{CompareEntry, CompareMatchDetail, CompareReport};
use crate::Engine;

impl Engine {
    /// Compare every image of document A against every image of document B.
    ///
    /// The direction matters: each A image independently reports its best
    /// B match, so two A images may claim the same B image, and swapping
    /// the arguments can give a different picture. Extracted images and the
    /// report land in a fresh run directory; the corpus is untouched.
    #[instrument(skip_all, fields(
        a = %pdf_a.as_ref().display(),
        b = %pdf_b.as_ref().display(),
    ))]
    pub fn compare(
        &self,
        pdf_a: impl AsRef<Path>,
        pdf_b: impl AsRef<Path>,
    ) -> Result<CompareReport> {
        let pdf_a = pdf_a.as_ref();
        let pdf_b = pdf_b.as_ref();
        if !pdf_a.is_file() {
            return Err(DoppelbildError::InputNotFound(pdf_a.to_path_buf()));
        }
        if !pdf_b.is_file() {
            return Err(DoppelbildError::InputNotFound(pdf_b.to_path_buf()));
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = self.config.compare_dir(&run_id);

        let (_, extracted_a) = self.extractor.extract(pdf_a, &run_dir.join("A"))?;
        let (_, extracted_b) = self.extractor.extract(pdf_b, &run_dir.join("B"))?;
        info!(
            run_id,
            images_a = extracted_a.len(),
            images_b = extracted_b.len(),
            "both documents extracted"
        );

        // B becomes the candidate set, identified by its extraction index.
        let candidates: Vec<Candidate<usize>> = extracted_b
            .par_iter()
            .enumerate()
            .filter_map(|(idx, img)| match self.fingerprinter.fingerprint_path(&img.path) {
                Ok(fp) => Some(Candidate {
                    id: idx,
                    phash: fp.phash,
                    dhash: fp.dhash,
                    ehash: fp.ehash,
                }),
                Err(err) => {
                    warn!(page = img.page, index = img.index, %err, "B image skipped");
                    None
                }
            })
            .collect();

        let fingerprints_a: Vec<_> = extracted_a
            .par_iter()
            .map(|img| self.fingerprinter.fingerprint_path(&img.path))
            .collect();

        let mut entries = Vec::with_capacity(extracted_a.len());
        for (img, fingerprint) in extracted_a.iter().zip(fingerprints_a) {
            let fingerprint = match fingerprint {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(page = img.page, index = img.index, %err, "A image skipped");
                    entries.push(CompareEntry {
                        page: img.page,
                        source: img.source,
                        index: img.index,
                        path: img.path.clone(),
                        is_match: false,
                        matched: None,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let best = self.matcher.find_best_match(&fingerprint, &candidates);
            let matched = best.map(|m| {
                let b = &extracted_b[m.id];
                CompareMatchDetail {
                    score: m.score,
                    phash_dist: m.phash_dist,
                    dhash_dist: m.dhash_dist,
                    ehash_dist: m.ehash_dist,
                    b_page: b.page,
                    b_source: b.source,
                    b_index: b.index,
                    b_path: b.path.clone(),
                }
            });

            entries.push(CompareEntry {
                page: img.page,
                source: img.source,
                index: img.index,
                path: img.path.clone(),
                is_match: matched.is_some(),
                matched,
                error: None,
            });
        }

        let report = CompareReport {
            run_id,
            pdf_a: pdf_a.to_path_buf(),
            pdf_b: pdf_b.to_path_buf(),
            num_images_a: extracted_a.len(),
            num_images_b: extracted_b.len(),
            entries,
            output_dir: run_dir.clone(),
        };

        fs::write(
            run_dir.join("report.json"),
            serde_json::to_string_pretty(&report)?,
        )?;

        info!(
            run_id = report.run_id,
            matches = report.match_count(),
            "comparison complete"
        );
        Ok(report)
    }
}
