// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job artifact store.
//
// Every captured document lands in the job directory as
// `print_job_{id}.{ext}`, where the extension follows the detected (not
// the declared) format.  Writes are per-file create-write-close; there is
// no cross-job transactionality and no durable index — the directory IS
// the store.

use std::path::{Path, PathBuf};

use papertrap_core::error::Result;
use papertrap_core::events::{JobEventSender, JobReceivedEvent};
use papertrap_core::types::{CompressionKind, DocumentType, JobId};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::decompress::decompress;
use crate::pdf::wrap_in_pdf;
use crate::sniff::detect_type;

/// A persisted artifact, as reported to the caller and in events.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub detected: DocumentType,
    pub mime_type: String,
    pub compression: CompressionKind,
    pub sha256: String,
}

/// Writes captured documents into the job directory and publishes
/// job-received events.
pub struct JobStore {
    job_dir: PathBuf,
    events: JobEventSender,
}

impl JobStore {
    pub fn new(job_dir: impl Into<PathBuf>, events: JobEventSender) -> Self {
        Self {
            job_dir: job_dir.into(),
            events,
        }
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Create the job directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.job_dir).await?;
        Ok(())
    }

    /// Decompress, type, and persist a document payload.
    ///
    /// When the content is unrecognisable but the client declared a
    /// PDF-like format, the bytes are wrapped in a synthetic PDF so the
    /// artifact opens in ordinary viewers; otherwise unrecognisable
    /// content is stored as `.raw`.
    #[instrument(skip(self, payload), fields(job_id = %job_id, declared = declared_format, bytes = payload.len()))]
    pub async fn persist(
        &self,
        job_id: JobId,
        declared_format: &str,
        payload: &[u8],
    ) -> Result<StoredArtifact> {
        let outcome = decompress(payload);
        if outcome.compression != CompressionKind::None {
            debug!(
                compression = ?outcome.compression,
                ok = outcome.ok,
                original = outcome.original_size,
                decompressed = outcome.decompressed_size,
                "payload decompression attempted"
            );
        }

        let mut detected = detect_type(&outcome.bytes);
        let mut bytes = outcome.bytes;

        if detected == DocumentType::Unknown {
            if DocumentType::is_pdf_like_mime(declared_format) {
                match wrap_in_pdf(&bytes) {
                    Ok(wrapped) => {
                        bytes = wrapped;
                        detected = DocumentType::Pdf;
                    }
                    Err(err) => {
                        warn!(error = %err, "PDF wrapper synthesis failed, storing raw");
                        detected = DocumentType::Raw;
                    }
                }
            } else {
                detected = DocumentType::Raw;
            }
        }

        self.ensure_dir().await?;
        let path = self.artifact_path(job_id, detected);
        tokio::fs::write(&path, &bytes).await?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = hex::encode(hasher.finalize());

        let artifact = StoredArtifact {
            path: path.clone(),
            size: bytes.len() as u64,
            detected,
            mime_type: detected.mime_type().to_string(),
            compression: outcome.compression,
            sha256: sha256.clone(),
        };

        info!(
            path = %path.display(),
            size = artifact.size,
            detected = ?detected,
            "job artifact persisted"
        );

        // Best-effort local dispatch; no subscribers is fine.
        let _ = self.events.send(JobReceivedEvent {
            path,
            size: artifact.size,
            id: job_id,
            mime_type: artifact.mime_type.clone(),
            detected_format: detected,
            sha256,
        });

        Ok(artifact)
    }

    /// Snapshot of artifact paths currently in the job directory.
    pub async fn artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.job_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with("print_job_") {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Delete every artifact; returns how many files were removed.
    pub async fn clear(&self) -> Result<usize> {
        let artifacts = self.artifacts().await?;
        let mut removed = 0;
        for path in artifacts {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove artifact"),
            }
        }
        info!(removed, "job directory cleared");
        Ok(removed)
    }

    fn artifact_path(&self, job_id: JobId, detected: DocumentType) -> PathBuf {
        self.job_dir
            .join(format!("print_job_{}.{}", job_id, detected.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use papertrap_core::events::job_event_channel;
    use std::io::Write;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF";

    fn store_in(dir: &Path) -> (JobStore, papertrap_core::events::JobEventReceiver) {
        let (tx, rx) = job_event_channel();
        (JobStore::new(dir, tx), rx)
    }

    #[tokio::test]
    async fn persists_pdf_with_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, mut events) = store_in(dir.path());

        let artifact = store
            .persist(JobId(101), "application/pdf", PDF)
            .await
            .unwrap();

        assert!(artifact.path.ends_with("print_job_101.pdf"));
        assert_eq!(artifact.detected, DocumentType::Pdf);
        let written = std::fs::read(&artifact.path).unwrap();
        assert_eq!(written, PDF);

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, JobId(101));
        assert_eq!(event.mime_type, "application/pdf");
        assert_eq!(event.size, PDF.len() as u64);
    }

    #[tokio::test]
    async fn gzip_wrapped_pdf_is_stored_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _events) = store_in(dir.path());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PDF).unwrap();
        let gz = encoder.finish().unwrap();

        let artifact = store.persist(JobId(102), "application/pdf", &gz).await.unwrap();

        assert!(artifact.path.ends_with("print_job_102.pdf"));
        assert_eq!(artifact.compression, CompressionKind::Gzip);
        let written = std::fs::read(&artifact.path).unwrap();
        assert_eq!(written, PDF);
    }

    #[tokio::test]
    async fn unknown_pdf_like_payload_gets_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _events) = store_in(dir.path());

        let opaque: Vec<u8> = (0..300u32).map(|i| (i * 13 % 256) as u8).collect();
        let artifact = store
            .persist(JobId(103), "application/octet-stream", &opaque)
            .await
            .unwrap();

        assert!(artifact.path.ends_with("print_job_103.pdf"));
        let written = std::fs::read(&artifact.path).unwrap();
        assert!(written.starts_with(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn unknown_non_pdf_payload_stored_raw() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _events) = store_in(dir.path());

        let opaque: Vec<u8> = (0..300u32).map(|i| (i * 13 % 256) as u8).collect();
        let artifact = store
            .persist(JobId(104), "application/x-unheard-of", &opaque)
            .await
            .unwrap();

        assert!(artifact.path.ends_with("print_job_104.raw"));
        assert_eq!(artifact.detected, DocumentType::Raw);
    }

    #[tokio::test]
    async fn text_payload_gets_txt_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _events) = store_in(dir.path());

        let artifact = store
            .persist(JobId(105), "text/plain", b"hello printer\n")
            .await
            .unwrap();
        assert!(artifact.path.ends_with("print_job_105.txt"));
        assert_eq!(artifact.detected, DocumentType::PlainText);
    }

    #[tokio::test]
    async fn clear_removes_only_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _events) = store_in(dir.path());

        store.persist(JobId(1), "text/plain", b"one\n").await.unwrap();
        store.persist(JobId(2), "text/plain", b"two\n").await.unwrap();
        std::fs::write(dir.path().join("unrelated.log"), b"keep me").unwrap();

        assert_eq!(store.artifacts().await.unwrap().len(), 2);
        let removed = store.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.artifacts().await.unwrap().is_empty());
        assert!(dir.path().join("unrelated.log").exists());
    }
}
