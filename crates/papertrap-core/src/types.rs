// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the papertrap virtual printer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a captured print job.
///
/// Ids are time-seeded counters allocated by the server; they always fit in
/// a positive IPP `integer` (i32) because that is how `job-id` travels on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    /// The value as an IPP `job-id` integer.
    pub fn as_ipp_integer(&self) -> i32 {
        (self.0 & 0x7FFF_FFFF) as i32
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a captured job (IPP job-state, RFC 8011 §5.3.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created via Create-Job, no document received yet.
    Pending,
    /// Document data is being ingested.
    Processing,
    /// All documents received and persisted.
    Completed,
    /// Cancelled via Cancel-Job or by a plugin.
    Canceled,
    /// Processing failed or was aborted by the system.
    Aborted,
}

impl JobState {
    /// IPP `job-state` enum value.
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Pending => 3,
            Self::Processing => 5,
            Self::Canceled => 7,
            Self::Aborted => 8,
            Self::Completed => 9,
        }
    }

    /// Default `job-state-reasons` keyword for this state.
    pub fn default_reason(&self) -> &'static str {
        match self {
            Self::Pending => "none",
            Self::Processing => "processing-to-stop-point",
            Self::Canceled => "job-canceled-by-user",
            Self::Aborted => "job-canceled-by-system",
            Self::Completed => "job-completed-successfully",
        }
    }
}

/// Document formats the capture pipeline distinguishes.
///
/// Detection is signature-driven (magic bytes), not extension-driven: the
/// declared `document-format` attribute is advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    Gif,
    Tiff,
    PostScript,
    PlainText,
    /// Recognisable bytes with no matching signature.
    Raw,
    /// Nothing recognisable at all.
    Unknown,
}

impl DocumentType {
    /// MIME type string reported in job metadata and events.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
            Self::PostScript => "application/postscript",
            Self::PlainText => "text/plain",
            Self::Raw | Self::Unknown => "application/octet-stream",
        }
    }

    /// File extension used when persisting an artifact of this type.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::PostScript => "ps",
            Self::PlainText => "txt",
            Self::Raw | Self::Unknown => "raw",
        }
    }

    /// Whether the declared MIME type is "PDF-like" — a format for which the
    /// store synthesises a PDF wrapper when the real content is unrecognised.
    pub fn is_pdf_like_mime(mime: &str) -> bool {
        mime == "application/pdf"
            || mime == "application/postscript"
            || mime == "application/octet-stream"
            || mime.starts_with("application/vnd.cups-")
    }
}

/// Compression formats the ingestion pipeline can strip transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionKind {
    None,
    Gzip,
    Zlib,
    Deflate,
    Unknown,
}

/// A print job captured from the network.
///
/// Jobs live in memory for the lifetime of the process; only the document
/// artifact is persisted.  Plugins may annotate jobs through `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedJob {
    pub id: JobId,
    /// The client-supplied job-name (or a placeholder).
    pub name: String,
    /// Declared `document-format` MIME type from the request.
    pub document_format: String,
    /// Size of the received document payload in bytes.
    pub size: u64,
    /// Submission time, milliseconds since the Unix epoch.
    pub submitted_at: i64,
    pub state: JobState,
    pub state_reasons: Vec<String>,
    /// The `requesting-user-name` operation attribute, if sent.
    pub originating_user: String,
    /// Plugin annotations, keyed by plugin-chosen names.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CapturedJob {
    pub fn new(id: JobId, name: String, document_format: String, originating_user: String) -> Self {
        Self {
            id,
            name,
            document_format,
            size: 0,
            submitted_at: chrono::Utc::now().timestamp_millis(),
            state: JobState::Pending,
            state_reasons: vec![JobState::Pending.default_reason().to_string()],
            originating_user,
            metadata: BTreeMap::new(),
        }
    }

    /// Transition to `state` and replace the reasons with the given keyword.
    pub fn set_state(&mut self, state: JobState, reason: &str) {
        self.state = state;
        self.state_reasons = vec![reason.to_string()];
    }
}

/// Status of the embedded IPP capture server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
