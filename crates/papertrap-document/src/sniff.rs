// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document payload extraction and magic-byte format detection.
//
// Print clients wrap documents in wildly different envelopes (IPP tails,
// chunked HTTP bodies, stray header blocks), so extraction is a chain of
// increasingly desperate attempts: known signature anywhere in the buffer,
// then an HTTP-style header/body boundary, then the IPP end-of-attributes
// delimiter, then the whole input as-is.

use papertrap_core::types::DocumentType;
use tracing::debug;

/// Known file signatures, checked in table order at each offset.
const SIGNATURES: &[(&[u8], DocumentType)] = &[
    (b"%PDF", DocumentType::Pdf),
    (&[0xFF, 0xD8, 0xFF], DocumentType::Jpeg),
    (
        &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        DocumentType::Png,
    ),
    (b"GIF87a", DocumentType::Gif),
    (b"GIF89a", DocumentType::Gif),
    (&[0x49, 0x49, 0x2A, 0x00], DocumentType::Tiff),
    (&[0x4D, 0x4D, 0x00, 0x2A], DocumentType::Tiff),
    (b"%!PS", DocumentType::PostScript),
];

/// How the payload was located within the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// A known signature was found at some offset.
    Signature,
    /// The payload is a compressed stream; taken whole for the
    /// decompressor.
    CompressedStream,
    /// An HTTP-style blank line separated headers from the body.
    HeaderBoundary,
    /// The IPP end-of-attributes delimiter was located by scanning.
    EndOfAttributes,
    /// Nothing matched; the whole input is the document.
    WholeInput,
}

/// Find the first occurrence of any known signature.
///
/// Returns the offset and the matched type.  The scan is position-first:
/// the earliest offset wins regardless of which signature matches there.
pub fn find_signature(data: &[u8]) -> Option<(usize, DocumentType)> {
    for offset in 0..data.len() {
        for (signature, doc_type) in SIGNATURES {
            if data[offset..].starts_with(signature) {
                return Some((offset, *doc_type));
            }
        }
    }
    None
}

/// Locate the document payload inside a request body.
///
/// Ordered attempts per the ingestion contract; the returned slice borrows
/// from the input.
pub fn extract_document(body: &[u8]) -> (&[u8], ExtractionMethod) {
    // 1. Compressed streams have no envelope, and their bytes can fake a
    //    signature or header boundary; hand them to the decompressor whole.
    if body.starts_with(&[0x1F, 0x8B])
        || matches!(body, [0x78, 0x01, ..] | [0x78, 0x9C, ..] | [0x78, 0xDA, ..])
    {
        return (body, ExtractionMethod::CompressedStream);
    }

    // 2. Signature scan.
    if let Some((offset, doc_type)) = find_signature(body) {
        debug!(offset, ?doc_type, "payload located by signature");
        return (&body[offset..], ExtractionMethod::Signature);
    }

    // 3. HTTP-style header boundary.
    if let Some(pos) = find_subsequence(body, b"\r\n\r\n") {
        return (&body[pos + 4..], ExtractionMethod::HeaderBoundary);
    }
    if let Some(pos) = find_subsequence(body, b"\n\n") {
        return (&body[pos + 2..], ExtractionMethod::HeaderBoundary);
    }

    // 4. End-of-attributes scan over a full IPP request buffer.
    if body.len() > 8 {
        if let Some(pos) = body[8..].iter().position(|&b| b == 0x03) {
            let mut start = 8 + pos + 1;
            while start < body.len() && matches!(body[start], 0x00 | 0x0D | 0x0A) {
                start += 1;
            }
            return (&body[start..], ExtractionMethod::EndOfAttributes);
        }
    }

    // 5. Give up and take everything.
    (body, ExtractionMethod::WholeInput)
}

/// Detect the document type of (decompressed) payload bytes.
///
/// Signature scan first; otherwise the text heuristic (at least 80% of the
/// first 1024 bytes printable ASCII or tab/LF/CR); otherwise unknown.
pub fn detect_type(data: &[u8]) -> DocumentType {
    if data.is_empty() {
        return DocumentType::Unknown;
    }
    if let Some((_, doc_type)) = find_signature(data) {
        return doc_type;
    }
    if printable_ratio(data, 1024) >= 0.8 {
        return DocumentType::PlainText;
    }
    DocumentType::Unknown
}

/// Fraction of the first `window` bytes that are printable ASCII (32..=126)
/// or tab/LF/CR.
pub fn printable_ratio(data: &[u8], window: usize) -> f64 {
    let sample = &data[..data.len().min(window)];
    if sample.is_empty() {
        return 0.0;
    }
    let printable = sample
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || b == b'\t' || b == b'\n' || b == b'\r')
        .count();
    printable as f64 / sample.len() as f64
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
