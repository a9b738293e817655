// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transparent stream decompression for captured payloads.
//
// Detection is magic-byte first (gzip, zlib), then heuristic: a low
// printable-ASCII ratio marks the buffer as a candidate for headerless
// DEFLATE, in which case gzip, zlib, and raw DEFLATE are attempted in
// order.  Failures always fall back to the original bytes — a payload we
// cannot decompress is still a payload worth persisting.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use papertrap_core::types::CompressionKind;
use tracing::{debug, warn};

use crate::sniff::printable_ratio;

/// Upper bound on a single decompressed payload.
const MAX_DECOMPRESSED_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Printable-ratio window and threshold for the DEFLATE-candidate check.
const RATIO_WINDOW: usize = 256;
const RATIO_THRESHOLD: f64 = 0.5;

/// Result of a decompression attempt.
#[derive(Debug, Clone)]
pub struct DecompressionOutcome {
    pub compression: CompressionKind,
    /// Decompressed bytes, or the original input when nothing applied.
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub decompressed_size: usize,
    /// False only when a detected wrapper failed to inflate.
    pub ok: bool,
}

/// Detect and strip stream compression from `data`.
pub fn decompress(data: &[u8]) -> DecompressionOutcome {
    let original_size = data.len();

    // Magic-byte detection first.
    if data.starts_with(&[0x1F, 0x8B]) {
        return finish(data, CompressionKind::Gzip, inflate_gzip(data), original_size);
    }
    if is_zlib_header(data) {
        return finish(data, CompressionKind::Zlib, inflate_zlib(data), original_size);
    }

    // No magic.  Mostly-printable data is taken at face value.
    if printable_ratio(data, RATIO_WINDOW) >= RATIO_THRESHOLD {
        return DecompressionOutcome {
            compression: CompressionKind::None,
            bytes: data.to_vec(),
            original_size,
            decompressed_size: original_size,
            ok: true,
        };
    }

    // Binary-looking without a header: could be headerless DEFLATE (some
    // clients strip the wrapper).  Try each decoder; first success wins.
    for (kind, result) in [
        (CompressionKind::Gzip, inflate_gzip(data)),
        (CompressionKind::Zlib, inflate_zlib(data)),
        (CompressionKind::Deflate, inflate_raw(data)),
    ] {
        if let Some(bytes) = result {
            debug!(?kind, inflated = bytes.len(), "headerless payload inflated");
            return DecompressionOutcome {
                compression: kind,
                decompressed_size: bytes.len(),
                bytes,
                original_size,
                ok: true,
            };
        }
    }

    // Binary but not compressed by anything we know.
    DecompressionOutcome {
        compression: CompressionKind::Unknown,
        bytes: data.to_vec(),
        original_size,
        decompressed_size: original_size,
        ok: true,
    }
}

fn finish(
    data: &[u8],
    kind: CompressionKind,
    result: Option<Vec<u8>>,
    original_size: usize,
) -> DecompressionOutcome {
    match result {
        Some(bytes) => DecompressionOutcome {
            compression: kind,
            decompressed_size: bytes.len(),
            bytes,
            original_size,
            ok: true,
        },
        None => {
            warn!(?kind, "detected compression wrapper failed to inflate");
            DecompressionOutcome {
                compression: kind,
                bytes: data.to_vec(),
                original_size,
                decompressed_size: original_size,
                ok: false,
            }
        }
    }
}

/// Zlib CMF/FLG pairs for deflate with the common window size.
fn is_zlib_header(data: &[u8]) -> bool {
    matches!(data, [0x78, 0x01, ..] | [0x78, 0x9C, ..] | [0x78, 0xDA, ..])
}

fn inflate_gzip(data: &[u8]) -> Option<Vec<u8>> {
    read_capped(GzDecoder::new(data))
}

fn inflate_zlib(data: &[u8]) -> Option<Vec<u8>> {
    read_capped(ZlibDecoder::new(data))
}

fn inflate_raw(data: &[u8]) -> Option<Vec<u8>> {
    read_capped(DeflateDecoder::new(data))
}

/// Read a decoder to the end, bounded by [`MAX_DECOMPRESSED_BYTES`].
fn read_capped(decoder: impl Read) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut limited = decoder.take(MAX_DECOMPRESSED_BYTES + 1);
    match limited.read_to_end(&mut out) {
        Ok(_) if out.len() as u64 > MAX_DECOMPRESSED_BYTES => None,
        Ok(0) => None,
        Ok(_) => Some(out),
        Err(_) => None,
    }
}
