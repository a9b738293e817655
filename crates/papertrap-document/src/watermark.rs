// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagonal translucent watermarks for captured documents.
//
// PDFs get a rotated text overlay appended to every page's content stream
// (lopdf); JPEG/PNG images get a translucent diagonal band blended into
// the pixels (the `image` crate decodes and re-encodes).

use std::io::Cursor;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use papertrap_core::error::{PapertrapError, Result};
use papertrap_core::types::DocumentType;
use tracing::debug;

/// Watermark parameters.  Opacity and size are clamped to the supported
/// ranges on use.
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub text: String,
    /// Translucency, clamped to [0.1, 1.0].
    pub opacity: f32,
    /// Font size in points (PDF) or band half-width in pixels (images),
    /// clamped to [12, 144].
    pub size: f32,
}

impl WatermarkSpec {
    pub fn clamped_opacity(&self) -> f32 {
        self.opacity.clamp(0.1, 1.0)
    }

    pub fn clamped_size(&self) -> f32 {
        self.size.clamp(12.0, 144.0)
    }
}

/// Names under which the overlay registers its page resources.
const GS_RESOURCE: &str = "GSpt0";
const FONT_RESOURCE: &str = "Fpt0";

/// Apply the watermark to a document of the given detected type.
///
/// Only PDF, JPEG, and PNG are supported; other types return an error the
/// caller treats as "leave the document alone".
pub fn apply(bytes: &[u8], doc_type: DocumentType, spec: &WatermarkSpec) -> Result<Vec<u8>> {
    match doc_type {
        DocumentType::Pdf => watermark_pdf(bytes, spec),
        DocumentType::Jpeg | DocumentType::Png => watermark_image(bytes, doc_type, spec),
        other => Err(PapertrapError::Document(format!(
            "watermarking does not support {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

/// Overlay the watermark text diagonally on every page of a PDF.
pub fn watermark_pdf(bytes: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|err| PapertrapError::Pdf(format!("failed to load PDF: {err}")))?;

    let pages: Vec<lopdf::ObjectId> = doc.get_pages().values().copied().collect();
    if pages.is_empty() {
        return Err(PapertrapError::Pdf("document has no pages".into()));
    }

    let opacity = spec.clamped_opacity();
    let size = spec.clamped_size();

    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => opacity,
        "CA" => opacity,
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    for page_id in pages {
        let (width, height) = page_media_box(&doc, page_id);
        let overlay = overlay_content(&spec.text, size, width, height)?;
        let stream_id = doc.add_object(Stream::new(dictionary! {}, overlay));

        append_page_content(&mut doc, page_id, stream_id)?;
        add_overlay_resources(&mut doc, page_id, gs_id, font_id)?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| PapertrapError::Pdf(format!("failed to serialise PDF: {err}")))?;

    debug!(
        pages = doc.get_pages().len(),
        text = %spec.text,
        "PDF watermark applied"
    );
    Ok(out)
}

/// Encoded content-stream operations for one page's overlay.
fn overlay_content(text: &str, size: f32, width: f32, height: f32) -> Result<Vec<u8>> {
    // 45 degree rotation, centred: walk half the estimated text width back
    // along the baseline from the page centre.
    let (cos, sin) = (std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2);
    let half_width = 0.25 * size * text.len() as f32;
    let tx = width / 2.0 - cos * half_width;
    let ty = height / 2.0 - sin * half_width;

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(GS_RESOURCE.into())]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.into()), size.into()],
            ),
            Operation::new("rg", vec![0.6.into(), 0.6.into(), 0.6.into()]),
            Operation::new(
                "Tm",
                vec![
                    cos.into(),
                    sin.into(),
                    (-sin).into(),
                    cos.into(),
                    tx.into(),
                    ty.into(),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };

    content
        .encode()
        .map_err(|err| PapertrapError::Pdf(format!("failed to encode overlay: {err}")))
}

/// Page dimensions from the MediaBox, defaulting to US Letter.
fn page_media_box(doc: &Document, page_id: lopdf::ObjectId) -> (f32, f32) {
    let media_box = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"MediaBox").ok())
        .and_then(|obj| obj.as_array().ok())
        .and_then(|values| {
            if values.len() == 4 {
                let nums: Vec<f32> = values.iter().filter_map(as_number).collect();
                (nums.len() == 4).then(|| (nums[2] - nums[0], nums[3] - nums[1]))
            } else {
                None
            }
        });
    media_box.unwrap_or((612.0, 792.0))
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Append the overlay stream to the page's Contents entry.
fn append_page_content(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    stream_id: lopdf::ObjectId,
) -> Result<()> {
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| PapertrapError::Pdf(format!("page dictionary: {err}")))?;

    let new_contents = match page.get(b"Contents") {
        Ok(Object::Reference(existing)) => {
            Object::Array(vec![Object::Reference(*existing), Object::Reference(stream_id)])
        }
        Ok(Object::Array(existing)) => {
            let mut list = existing.clone();
            list.push(Object::Reference(stream_id));
            Object::Array(list)
        }
        _ => Object::Reference(stream_id),
    };
    page.set("Contents", new_contents);
    Ok(())
}

/// Register the ExtGState and font resources on a page, following one
/// level of indirection if Resources is an indirect object.
fn add_overlay_resources(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    gs_id: lopdf::ObjectId,
    font_id: lopdf::ObjectId,
) -> Result<()> {
    let resources_ref = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Resources").ok())
        .and_then(|obj| obj.as_reference().ok());

    let resources = match resources_ref {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PapertrapError::Pdf(format!("resources dictionary: {err}")))?,
        None => {
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|err| PapertrapError::Pdf(format!("page dictionary: {err}")))?;
            if page.get(b"Resources").is_err() {
                page.set("Resources", Object::Dictionary(Dictionary::new()));
            }
            match page.get_mut(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict,
                _ => {
                    return Err(PapertrapError::Pdf(
                        "page Resources entry is not a dictionary".into(),
                    ));
                }
            }
        }
    };

    insert_resource_entry(resources, b"ExtGState", GS_RESOURCE, gs_id);
    insert_resource_entry(resources, b"Font", FONT_RESOURCE, font_id);
    Ok(())
}

/// Add `name -> target` under the given resource category, creating the
/// category dictionary when absent.  Indirect category dictionaries are
/// left untouched — replacing them would orphan the page's own resources.
fn insert_resource_entry(
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    target: lopdf::ObjectId,
) {
    match resources.get_mut(category) {
        Ok(Object::Dictionary(dict)) => {
            dict.set(name, Object::Reference(target));
        }
        Ok(_) => {}
        Err(_) => {
            let mut dict = Dictionary::new();
            dict.set(name, Object::Reference(target));
            resources.set(category, Object::Dictionary(dict));
        }
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Blend a translucent diagonal band into a JPEG or PNG image.
pub fn watermark_image(
    bytes: &[u8],
    doc_type: DocumentType,
    spec: &WatermarkSpec,
) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| PapertrapError::Document(format!("failed to decode image: {err}")))?;

    let mut rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(PapertrapError::Document("empty image".into()));
    }

    let opacity = spec.clamped_opacity();
    let band = spec.clamped_size();

    // Distance from the bottom-left → top-right diagonal, in pixels:
    // the line is x/w + y/h = 1.
    let nx = 1.0 / width as f32;
    let ny = 1.0 / height as f32;
    let norm = (nx * nx + ny * ny).sqrt();

    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let distance = ((x as f32) * nx + (y as f32) * ny - 1.0).abs() / norm;
        if distance <= band {
            for channel in 0..3 {
                let original = pixel.0[channel] as f32;
                pixel.0[channel] = (original * (1.0 - opacity) + 150.0 * opacity) as u8;
            }
        }
    }

    let mut out = Cursor::new(Vec::new());
    match doc_type {
        DocumentType::Png => {
            image::DynamicImage::ImageRgba8(rgba)
                .write_to(&mut out, image::ImageFormat::Png)
                .map_err(|err| {
                    PapertrapError::Document(format!("failed to encode PNG: {err}"))
                })?;
        }
        DocumentType::Jpeg => {
            // JPEG has no alpha channel.
            image::DynamicImage::ImageRgba8(rgba)
                .to_rgb8()
                .write_to(&mut out, image::ImageFormat::Jpeg)
                .map_err(|err| {
                    PapertrapError::Document(format!("failed to encode JPEG: {err}"))
                })?;
        }
        other => {
            return Err(PapertrapError::Document(format!(
                "unsupported image type {other:?}"
            )));
        }
    }

    debug!(width, height, ?doc_type, "image watermark applied");
    Ok(out.into_inner())
}
