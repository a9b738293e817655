// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic PDF wrapper for unidentifiable payloads.
//
// When a client declares a PDF-like document-format but sends bytes with no
// recognisable signature, we wrap them into a minimal single-page PDF 1.7
// so downstream viewers can at least open the artifact.  The wrapper is a
// debugging convenience: the embedded content stream is the raw payload and
// is not expected to render as anything meaningful.

use lopdf::{Document, Object, Stream, dictionary};
use papertrap_core::error::{PapertrapError, Result};
use tracing::debug;

/// US Letter media box, matching what the capture pipeline advertises for
/// untyped content.
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;

/// Wrap arbitrary bytes in a minimal single-page PDF 1.7 document.
///
/// Structure: catalog → pages → one 612×792 page → content stream carrying
/// `raw` verbatim → info dictionary; lopdf emits the xref table and trailer
/// on save.
pub fn wrap_in_pdf(raw: &[u8]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();

    let content_id = doc.add_object(Stream::new(dictionary! {}, raw.to_vec()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });

    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("papertrap"),
        "Title" => Object::string_literal("Captured print job"),
    });

    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| PapertrapError::Pdf(format!("failed to serialise wrapper: {err}")))?;

    debug!(
        payload_bytes = raw.len(),
        wrapper_bytes = out.len(),
        "synthesised PDF wrapper"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_is_parseable_pdf() {
        let payload = b"\x00\x01\x02 opaque spool data \x7F\x80";
        let wrapped = wrap_in_pdf(payload).expect("wrap");

        assert!(wrapped.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&wrapped).expect("reparse");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn wrapper_embeds_payload_verbatim() {
        let payload = b"PAYLOAD-MARKER-0123456789";
        let wrapped = wrap_in_pdf(payload).expect("wrap");
        let contains = wrapped
            .windows(payload.len())
            .any(|window| window == payload);
        assert!(contains, "content stream should carry the raw bytes");
    }

    #[test]
    fn wrapper_handles_empty_payload() {
        let wrapped = wrap_in_pdf(&[]).expect("wrap");
        assert!(wrapped.starts_with(b"%PDF-1.7"));
    }
}
