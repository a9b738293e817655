// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// papertrap-document — Document ingestion pipeline: payload extraction,
// transparent decompression, signature-based typing, watermark overlays,
// and artifact persistence.

pub mod decompress;
pub mod pdf;
pub mod sniff;
pub mod store;
pub mod watermark;

pub use decompress::{DecompressionOutcome, decompress};
pub use sniff::{ExtractionMethod, detect_type, extract_document, find_signature};
pub use store::{JobStore, StoredArtifact};
pub use watermark::WatermarkSpec;
