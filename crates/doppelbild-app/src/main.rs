// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Doppelbild — perceptual duplicate-image detection across PDF documents
//
// Entry point. Initialises logging, builds the engine over the storage
// directory, and dispatches the subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use doppelbild_core::{EngineConfig, Result};
use doppelbild_document::PageRasterizer;
use doppelbild_engine::{CompareReport, Engine, FolderOutcome, FolderReport, IngestReport};

#[derive(Debug, Parser)]
#[command(name = "doppelbild", version, about)]
struct Cli {
    /// Storage directory for the corpus (PDFs, images, database).
    #[arg(long, default_value = "storage", global = true)]
    storage_dir: PathBuf,

    /// Maximum perceptual-hash distance for the combined signal path.
    #[arg(long, default_value_t = 8, global = true)]
    phash_threshold: u32,

    /// Maximum difference-hash distance for the combined signal path.
    #[arg(long, default_value_t = 10, global = true)]
    dhash_threshold: u32,

    /// Maximum edge-hash distance (sufficient on its own).
    #[arg(long, default_value_t = 10, global = true)]
    ehash_threshold: u32,

    /// DPI used when falling back to whole-page rendering.
    #[arg(long, default_value_t = 200, global = true)]
    render_dpi: u32,

    /// Below this many embedded images, a document is treated as scanned
    /// and its pages are rendered whole instead.
    #[arg(long, default_value_t = 1, global = true)]
    min_embedded_images: usize,

    /// Match only against prior documents, never against earlier images
    /// of the document being ingested.
    #[arg(long, global = true)]
    no_within_document: bool,

    /// Print the full JSON report instead of the per-image summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest one PDF into the corpus and report duplicates.
    Ingest {
        /// Path to the PDF document.
        pdf: PathBuf,
    },
    /// Ingest every PDF under a folder, continuing past failures.
    Folder {
        /// Folder to scan for PDFs.
        folder: PathBuf,
        /// Only the folder itself, not its subdirectories.
        #[arg(long)]
        no_recursive: bool,
    },
    /// Compare two PDFs against each other without touching the corpus.
    Compare {
        /// The probe document (each of its images reports its best match).
        pdf_a: PathBuf,
        /// The reference document.
        pdf_b: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig {
        storage_dir: cli.storage_dir,
        phash_threshold: cli.phash_threshold,
        dhash_threshold: cli.dhash_threshold,
        ehash_threshold: cli.ehash_threshold,
        render_dpi: cli.render_dpi,
        min_embedded_images: cli.min_embedded_images,
        within_document_matching: !cli.no_within_document,
        ..Default::default()
    };

    let mut engine = Engine::open(config, rasterizer())?;

    match cli.command {
        Command::Ingest { pdf } => {
            let report = engine.ingest(&pdf)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_ingest(&report);
            }
        }
        Command::Folder {
            folder,
            no_recursive,
        } => {
            let report = engine.ingest_folder(&folder, !no_recursive)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_folder(&report);
            }
        }
        Command::Compare { pdf_a, pdf_b } => {
            let report = engine.compare(&pdf_a, &pdf_b)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_compare(&report);
            }
        }
    }

    Ok(())
}

/// Whole-page fallback renderer, available when built with `--features pdfium`.
#[cfg(feature = "pdfium")]
fn rasterizer() -> Option<Box<dyn PageRasterizer>> {
    use doppelbild_document::render::pdfium::PdfiumRasterizer;
    match PdfiumRasterizer::new() {
        Ok(r) => Some(Box::new(r)),
        Err(err) => {
            tracing::warn!(%err, "pdfium unavailable, scanned documents will be rejected");
            None
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn rasterizer() -> Option<Box<dyn PageRasterizer>> {
    None
}

fn print_ingest(report: &IngestReport) {
    println!(
        "document {} ({}): {} images",
        report.document_id,
        report.filename,
        report.images.len()
    );
    for entry in &report.images {
        let location = format!("page {:>3} image {:>2} [{}]", entry.page, entry.index, entry.source);
        if let Some(err) = &entry.error {
            println!("  [ERR] {location}  {err}");
        } else if let Some(m) = &entry.matched {
            println!(
                "  [DUP] {location}  -> '{}' page {} image {} (score {}, ph {}, dh {}, eh {})",
                m.document_filename, m.page, m.index, m.score, m.phash_dist, m.dhash_dist, m.ehash_dist
            );
        } else {
            println!("  [NEW] {location}");
        }
    }
    println!(
        "{} duplicate, {} new, {} failed",
        report.duplicate_count(),
        report.new_count(),
        report.failed_count()
    );
}

fn print_folder(report: &FolderReport) {
    for entry in &report.documents {
        match &entry.outcome {
            FolderOutcome::Ingested {
                document_id,
                images,
                duplicates,
                new,
                failed_images,
            } => println!(
                "  [OK]  {}  doc {document_id}: {images} images, {duplicates} dup, {new} new, {failed_images} failed",
                entry.path.display()
            ),
            FolderOutcome::Failed { error } => {
                println!("  [ERR] {}  {error}", entry.path.display());
            }
        }
    }
    println!(
        "{} documents ingested, {} failed; {} images ({} duplicate, {} new)",
        report.succeeded, report.failed, report.total_images, report.total_duplicates, report.total_new
    );
}

fn print_compare(report: &CompareReport) {
    println!(
        "comparing '{}' ({} images) against '{}' ({} images)",
        report.pdf_a.display(),
        report.num_images_a,
        report.pdf_b.display(),
        report.num_images_b
    );
    for entry in &report.entries {
        let location = format!("page {:>3} image {:>2}", entry.page, entry.index);
        if let Some(err) = &entry.error {
            println!("  [ERR]   {location}  {err}");
        } else if let Some(m) = &entry.matched {
            println!(
                "  [MATCH] {location}  -> B page {} image {} (score {}, ph {}, dh {}, eh {})",
                m.b_page, m.b_index, m.score, m.phash_dist, m.dhash_dist, m.ehash_dist
            );
        } else {
            println!("  [NONE]  {location}");
        }
    }
    println!(
        "{} of {} A images matched; run directory {}",
        report.match_count(),
        report.num_images_a,
        report.output_dir.display()
    );
}
