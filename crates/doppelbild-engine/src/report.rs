// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report types — the structured output of ingestion, comparison, and folder
// runs. Serialized to JSON alongside the extracted images.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use doppelbild_core::{DocumentId, ImageId, SourceKind};

/// Where a duplicate was previously seen, resolved from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetail {
    pub score: u32,
    pub phash_dist: u32,
    pub dhash_dist: u32,
    pub ehash_dist: u32,
    pub image_id: ImageId,
    pub document_id: DocumentId,
    pub document_filename: String,
    pub page: u32,
    pub source: SourceKind,
    pub index: u32,
    pub path: PathBuf,
}

/// One entry per image of an ingested document.
///
/// Images that failed to decode still appear, with `error` set and no
/// hashes — a failure is annotated, never silently omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub page: u32,
    pub source: SourceKind,
    pub index: u32,
    pub path: PathBuf,
    pub phash: Option<String>,
    pub dhash: Option<String>,
    pub ehash: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub filename: String,
    pub stored_path: PathBuf,
    pub images: Vec<ImageEntry>,
}

impl IngestReport {
    pub fn duplicate_count(&self) -> usize {
        self.images.iter().filter(|e| e.is_duplicate).count()
    }

    pub fn new_count(&self) -> usize {
        self.images
            .iter()
            .filter(|e| !e.is_duplicate && e.error.is_none())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.images.iter().filter(|e| e.error.is_some()).count()
    }
}

/// The B-side image a comparison entry matched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareMatchDetail {
    pub score: u32,
    pub phash_dist: u32,
    pub dhash_dist: u32,
    pub ehash_dist: u32,
    pub b_page: u32,
    pub b_source: SourceKind,
    pub b_index: u32,
    pub b_path: PathBuf,
}

/// One entry per image of document A during a pairwise comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareEntry {
    pub page: u32,
    pub source: SourceKind,
    pub index: u32,
    pub path: PathBuf,
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<CompareMatchDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one pairwise comparison run. Nothing is persisted; the run
/// directory holds only the extracted images and this report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareReport {
    pub run_id: String,
    pub pdf_a: PathBuf,
    pub pdf_b: PathBuf,
    pub num_images_a: usize,
    pub num_images_b: usize,
    pub entries: Vec<CompareEntry>,
    pub output_dir: PathBuf,
}

impl CompareReport {
    pub fn match_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_match).count()
    }
}

/// Per-document outcome within a folder run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FolderOutcome {
    Ingested {
        document_id: DocumentId,
        images: usize,
        duplicates: usize,
        new: usize,
        failed_images: usize,
    },
    Failed {
        error: String,
    },
}

/// One document of a folder run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FolderOutcome,
}

/// Aggregate outcome of ingesting a whole folder. Individual document
/// failures never abort the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderReport {
    pub folder: PathBuf,
    pub documents: Vec<FolderEntry>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_images: usize,
    pub total_duplicates: usize,
    pub total_new: usize,
}

impl FolderReport {
    pub fn failed_paths(&self) -> Vec<&PathBuf> {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, FolderOutcome::Failed { .. }))
            .map(|d| &d.path)
            .collect()
    }
}
