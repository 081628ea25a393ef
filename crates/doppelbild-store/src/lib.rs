// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doppelbild-store — SQLite persistence of documents, images, and
// fingerprints.
//
// Schema:
//   documents   (id INTEGER PRIMARY KEY AUTOINCREMENT,
//                filename TEXT NOT NULL, stored_path TEXT NOT NULL,
//                sha256 TEXT NOT NULL, ingested_at TEXT NOT NULL)  -- RFC 3339
//   images      (id INTEGER PRIMARY KEY AUTOINCREMENT,
//                document_id INTEGER NOT NULL REFERENCES documents(id),
//                page INTEGER NOT NULL, source TEXT NOT NULL,
//                image_index INTEGER NOT NULL, path TEXT NOT NULL,
//                width INTEGER NOT NULL, height INTEGER NOT NULL,
//                created_at TEXT NOT NULL)
//   fingerprints(id INTEGER PRIMARY KEY AUTOINCREMENT,
//                image_id INTEGER NOT NULL REFERENCES images(id),
//                phash TEXT NOT NULL, dhash TEXT NOT NULL, ehash TEXT NOT NULL)

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, instrument};

use doppelbild_core::{
    DocumentId, DoppelbildError, ExtractedImage, FingerprintId, ImageId, ImageMetadata, Result,
    SourceKind,
};
use doppelbild_fingerprint::{Fingerprint, HashCode};

/// Convert a `rusqlite::Error` into a `DoppelbildError::Database`.
fn db_err(e: rusqlite::Error) -> DoppelbildError {
    DoppelbildError::Database(e.to_string())
}

/// One stored fingerprint row, tagged with the identity of its owning image.
///
/// `all_fingerprints` yields these in insertion order — the Matcher's
/// first-seen-wins tie-break depends on that ordering.
#[derive(Debug, Clone)]
pub struct StoredFingerprint {
    pub fingerprint_id: FingerprintId,
    pub image_id: ImageId,
    pub phash: HashCode,
    pub dhash: HashCode,
    pub ehash: HashCode,
}

/// SQLite-backed corpus of fingerprinted images.
///
/// A single connection; appends within an ingestion run are immediately
/// visible to subsequent reads on the same handle.
pub struct Store {
    conn: Connection,
    hash_bits: u32,
}

impl Store {
    /// Open (or create) the database at `path`. Tables and indexes are
    /// created automatically; WAL mode is enabled for concurrent readers.
    ///
    /// `hash_bits` is the bit length of every hash code in this corpus
    /// (`hash_size²`); the stored hex form carries whole bytes only, so
    /// reads need it to reconstruct codes of non-byte-aligned lengths.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, hash_bits: u32) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn, hash_bits)
    }

    /// In-memory store, used by tests and pairwise comparison harnesses.
    pub fn open_in_memory(hash_bits: u32) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, hash_bits)
    }

    fn init(conn: Connection, hash_bits: u32) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                filename    TEXT NOT NULL,
                stored_path TEXT NOT NULL,
                sha256      TEXT NOT NULL,
                ingested_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS images (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES documents(id),
                page        INTEGER NOT NULL,
                source      TEXT NOT NULL,
                image_index INTEGER NOT NULL,
                path        TEXT NOT NULL,
                width       INTEGER NOT NULL,
                height      INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fingerprints (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                image_id INTEGER NOT NULL REFERENCES images(id),
                phash    TEXT NOT NULL,
                dhash    TEXT NOT NULL,
                ehash    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_images_document_id ON images(document_id);
            CREATE INDEX IF NOT EXISTS idx_fingerprints_image_id ON fingerprints(image_id);",
        )
        .map_err(db_err)?;

        Ok(Self { conn, hash_bits })
    }

    /// Record an ingested document; returns its new identity.
    pub fn insert_document(
        &self,
        filename: &str,
        stored_path: &Path,
        sha256: &str,
    ) -> Result<DocumentId> {
        self.conn
            .execute(
                "INSERT INTO documents (filename, stored_path, sha256, ingested_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    filename,
                    stored_path.display().to_string(),
                    sha256,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
        let id = DocumentId(self.conn.last_insert_rowid());
        debug!(document_id = %id, filename, "document recorded");
        Ok(id)
    }

    /// Atomically append one image record and its fingerprint.
    ///
    /// The pair is written in a single transaction: a half-appended image
    /// would corrupt the at-most-once duplicate-detection guarantee, so
    /// either both rows land or neither does.
    pub fn append_fingerprinted_image(
        &mut self,
        document_id: DocumentId,
        image: &ExtractedImage,
        fingerprint: &Fingerprint,
    ) -> Result<(ImageId, FingerprintId)> {
        let tx = self.conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO images
                 (document_id, page, source, image_index, path, width, height, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                document_id.0,
                image.page,
                image.source.as_str(),
                image.index,
                image.path.display().to_string(),
                fingerprint.width,
                fingerprint.height,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        let image_id = ImageId(tx.last_insert_rowid());

        tx.execute(
            "INSERT INTO fingerprints (image_id, phash, dhash, ehash)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                image_id.0,
                fingerprint.phash.to_hex(),
                fingerprint.dhash.to_hex(),
                fingerprint.ehash.to_hex(),
            ],
        )
        .map_err(db_err)?;
        let fingerprint_id = FingerprintId(tx.last_insert_rowid());

        tx.commit().map_err(db_err)?;
        debug!(%image_id, %fingerprint_id, "image and fingerprint appended");
        Ok((image_id, fingerprint_id))
    }

    /// Every stored fingerprint, in insertion order.
    pub fn all_fingerprints(&self) -> Result<Vec<StoredFingerprint>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, image_id, phash, dhash, ehash FROM fingerprints ORDER BY id")
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (fp_id, img_id, ph, dh, eh) = row.map_err(db_err)?;
            out.push(StoredFingerprint {
                fingerprint_id: FingerprintId(fp_id),
                image_id: ImageId(img_id),
                phash: parse_hash(&ph, self.hash_bits)?,
                dhash: parse_hash(&dh, self.hash_bits)?,
                ehash: parse_hash(&eh, self.hash_bits)?,
            });
        }
        Ok(out)
    }

    /// Resolve the stored metadata of one image, joined with its document.
    pub fn image_info(&self, image_id: ImageId) -> Result<Option<ImageMetadata>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT images.id, images.document_id, documents.filename,
                        images.page, images.source, images.image_index, images.path
                 FROM images
                 JOIN documents ON documents.id = images.document_id
                 WHERE images.id = ?1",
            )
            .map_err(db_err)?;

        let mut rows = stmt.query(params![image_id.0]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };

        let source_str: String = row.get(4).map_err(db_err)?;
        let source = SourceKind::parse(&source_str).ok_or_else(|| {
            DoppelbildError::Database(format!("unknown source kind in images table: {source_str}"))
        })?;

        Ok(Some(ImageMetadata {
            image_id: ImageId(row.get(0).map_err(db_err)?),
            document_id: DocumentId(row.get(1).map_err(db_err)?),
            document_filename: row.get(2).map_err(db_err)?,
            page: row.get(3).map_err(db_err)?,
            source,
            index: row.get(5).map_err(db_err)?,
            path: row.get::<_, String>(6).map_err(db_err)?.into(),
        }))
    }

    /// Number of ingested documents.
    pub fn document_count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(db_err)
    }
}

fn parse_hash(hex: &str, bit_len: u32) -> Result<HashCode> {
    HashCode::from_hex(hex, bit_len)
        .ok_or_else(|| DoppelbildError::Database(format!("malformed hash code in store: {hex}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fingerprint(seed: u8) -> Fingerprint {
        let bits: Vec<bool> = (0..64).map(|i| (i + seed as u32) % 5 == 0).collect();
        let code = HashCode::from_bits(&bits);
        Fingerprint {
            phash: code.clone(),
            dhash: code.clone(),
            ehash: code,
            width: 100,
            height: 80,
        }
    }

    fn extracted(page: u32, index: u32) -> ExtractedImage {
        ExtractedImage {
            source: SourceKind::Embedded,
            page,
            index,
            path: PathBuf::from(format!("/tmp/embedded_p{page}_img{index}.png")),
        }
    }

    #[test]
    fn append_and_read_back_in_insertion_order() {
        let mut store = Store::open_in_memory(64).unwrap();
        let doc = store
            .insert_document("a.pdf", Path::new("/tmp/a.pdf"), "deadbeef")
            .unwrap();

        let mut appended = Vec::new();
        for (page, seed) in [(1u32, 0u8), (2, 1), (3, 2)] {
            let (_, fp_id) = store
                .append_fingerprinted_image(doc, &extracted(page, 1), &fingerprint(seed))
                .unwrap();
            appended.push(fp_id);
        }

        let all = store.all_fingerprints().unwrap();
        assert_eq!(all.len(), 3);
        let ids: Vec<FingerprintId> = all.iter().map(|f| f.fingerprint_id).collect();
        assert_eq!(ids, appended, "read order must be insertion order");
        assert_eq!(all[0].phash, fingerprint(0).phash);
    }

    #[test]
    fn image_info_joins_document_metadata() {
        let mut store = Store::open_in_memory(64).unwrap();
        let doc = store
            .insert_document("report.pdf", Path::new("/data/report.pdf"), "cafe")
            .unwrap();
        let (image_id, _) = store
            .append_fingerprinted_image(doc, &extracted(4, 2), &fingerprint(3))
            .unwrap();

        let info = store.image_info(image_id).unwrap().expect("row must exist");
        assert_eq!(info.document_id, doc);
        assert_eq!(info.document_filename, "report.pdf");
        assert_eq!(info.page, 4);
        assert_eq!(info.index, 2);
        assert_eq!(info.source, SourceKind::Embedded);
    }

    #[test]
    fn image_info_of_unknown_id_is_none() {
        let store = Store::open_in_memory(64).unwrap();
        assert!(store.image_info(ImageId(999)).unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_directories_and_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("nested/dir/doppelbild.db");

        {
            let mut store = Store::open(&db_path, 64).unwrap();
            let doc = store
                .insert_document("x.pdf", Path::new("/x.pdf"), "00")
                .unwrap();
            store
                .append_fingerprinted_image(doc, &extracted(1, 1), &fingerprint(9))
                .unwrap();
        }

        let reopened = Store::open(&db_path, 64).unwrap();
        assert_eq!(reopened.document_count().unwrap(), 1);
        assert_eq!(reopened.all_fingerprints().unwrap().len(), 1);
    }

    #[test]
    fn non_byte_aligned_codes_survive_the_hex_round_trip() {
        // hash_size = 6 gives 36-bit codes, whose hex form carries four
        // padding bits in the final byte.
        let bits: Vec<bool> = (0..36).map(|i| i % 3 == 0).collect();
        let code = HashCode::from_bits(&bits);
        let fp = Fingerprint {
            phash: code.clone(),
            dhash: code.clone(),
            ehash: code.clone(),
            width: 10,
            height: 10,
        };

        let mut store = Store::open_in_memory(36).unwrap();
        let doc = store
            .insert_document("n.pdf", Path::new("/n.pdf"), "ab")
            .unwrap();
        store
            .append_fingerprinted_image(doc, &extracted(1, 1), &fp)
            .unwrap();

        let loaded = &store.all_fingerprints().unwrap()[0];
        assert_eq!(loaded.phash.bit_len(), 36);
        assert_eq!(loaded.phash, code);
        assert_eq!(code.distance(&loaded.phash), 0);
    }
}
