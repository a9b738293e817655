// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer capability composition for Get-Printer-Attributes.
//
// The advertised printer-attributes group is built from three layers, each
// overriding the previous one attribute by attribute:
//
//   1. built-in defaults (always present)
//   2. a user-provided override document (see `overrides.rs`)
//   3. plugin `customize_ipp_attributes` output, folded in load order
//
// The dispatcher owns layers 2 and 3; this module provides the defaults and
// the name-keyed merge.

use crate::model::{
    Attribute, AttributeGroup, DelimiterTag, IppValue, RESOLUTION_UNIT_DPI,
};
use crate::operation::Operation;

/// Live facts injected into the default attribute set at compose time.
#[derive(Debug, Clone)]
pub struct PrinterFacts {
    pub printer_name: String,
    /// Host part of the printer URI (address the listener is reachable on).
    pub host: String,
    pub port: u16,
    /// Stable instance UUID, `urn:uuid:...` form.
    pub uuid_uri: String,
    /// Seconds since service start.
    pub up_time_secs: i32,
    /// Jobs currently held in the in-memory table.
    pub queued_job_count: i32,
}

impl PrinterFacts {
    pub fn printer_uri(&self) -> String {
        format!("ipp://{}:{}/", self.host, self.port)
    }
}

/// Media keywords advertised by default.
const MEDIA_SUPPORTED: [&str; 4] = [
    "iso_a4_210x297mm",
    "iso_a5_148x210mm",
    "na_letter_8.5x11in",
    "na_legal_8.5x14in",
];

/// Document formats accepted when no custom restriction is active.
const DOCUMENT_FORMATS: [&str; 7] = [
    "application/pdf",
    "application/octet-stream",
    "application/vnd.cups-raw",
    "application/vnd.cups-pdf",
    "image/jpeg",
    "image/png",
    "text/plain",
];

/// Build the layer-1 default printer-attributes group.
pub fn default_printer_attributes(facts: &PrinterFacts) -> AttributeGroup {
    let uri = facts.printer_uri();
    let mut group = AttributeGroup::new(DelimiterTag::PrinterAttributes);

    group.set(Attribute::new(
        "printer-name",
        IppValue::Name(facts.printer_name.clone()),
    ));
    group.set(Attribute::new("printer-state", IppValue::Enum(3))); // idle
    group.set(Attribute::new(
        "printer-state-reasons",
        IppValue::Keyword("none".into()),
    ));
    group.set(Attribute::new(
        "printer-is-accepting-jobs",
        IppValue::Boolean(true),
    ));
    group.set(Attribute::new("printer-uri", IppValue::Uri(uri.clone())));
    group.set(Attribute::new("printer-uri-supported", IppValue::Uri(uri)));
    group.set(Attribute::new(
        "printer-uuid",
        IppValue::Uri(facts.uuid_uri.clone()),
    ));
    group.set(Attribute::new(
        "uri-security-supported",
        IppValue::Keyword("none".into()),
    ));
    group.set(Attribute::new(
        "uri-authentication-supported",
        IppValue::Keyword("none".into()),
    ));
    group.set(Attribute::new(
        "printer-location",
        IppValue::Text("Local Network".into()),
    ));
    group.set(Attribute::new(
        "printer-info",
        IppValue::Text("Papertrap virtual print capture service".into()),
    ));
    group.set(Attribute::new(
        "printer-make-and-model",
        IppValue::Text("Papertrap Virtual Printer 1.0".into()),
    ));
    group.set(Attribute::new(
        "printer-up-time",
        IppValue::Integer(facts.up_time_secs),
    ));
    group.set(Attribute::new(
        "queued-job-count",
        IppValue::Integer(facts.queued_job_count),
    ));
    group.set(Attribute::new(
        "charset-configured",
        IppValue::Charset("utf-8".into()),
    ));
    group.set(Attribute::new(
        "charset-supported",
        IppValue::Charset("utf-8".into()),
    ));
    group.set(Attribute::new(
        "natural-language-configured",
        IppValue::NaturalLanguage("en".into()),
    ));
    group.set(Attribute::new(
        "generated-natural-language-supported",
        IppValue::NaturalLanguage("en".into()),
    ));
    group.set(Attribute::with_values(
        "ipp-versions-supported",
        vec![
            IppValue::Keyword("1.1".into()),
            IppValue::Keyword("2.0".into()),
        ],
    ));
    group.set(Attribute::new(
        "compression-supported",
        IppValue::Keyword("none".into()),
    ));
    group.set(Attribute::new(
        "pdl-override-supported",
        IppValue::Keyword("not-attempted".into()),
    ));
    group.set(Attribute::with_values(
        "document-format-supported",
        DOCUMENT_FORMATS
            .iter()
            .map(|f| IppValue::MimeMediaType((*f).into()))
            .collect(),
    ));
    group.set(Attribute::new(
        "document-format",
        IppValue::MimeMediaType("application/pdf".into()),
    ));
    group.set(Attribute::new(
        "document-format-default",
        IppValue::MimeMediaType("application/pdf".into()),
    ));
    group.set(Attribute::new(
        "media-default",
        IppValue::Keyword("iso_a4_210x297mm".into()),
    ));
    group.set(Attribute::with_values(
        "media-supported",
        MEDIA_SUPPORTED
            .iter()
            .map(|m| IppValue::Keyword((*m).into()))
            .collect(),
    ));
    group.set(Attribute::with_values(
        "operations-supported",
        Operation::advertised()
            .iter()
            .map(|op| IppValue::Enum(*op as i32))
            .collect(),
    ));
    group.set(Attribute::new("color-supported", IppValue::Boolean(true)));
    group.set(Attribute::new(
        "printer-resolution-supported",
        IppValue::Resolution {
            cross_feed: 300,
            feed: 300,
            unit: RESOLUTION_UNIT_DPI,
        },
    ));

    group
}

/// Apply one override layer: every attribute in `layer` replaces (or is
/// appended to) the same-named attribute in `base`.
pub fn apply_layer(base: &mut AttributeGroup, layer: &[Attribute]) {
    for attribute in layer {
        base.set(attribute.clone());
    }
}

/// Merge a plugin's replacement groups into the current set.
///
/// Groups are matched by delimiter tag; within a matched group the
/// replacement's attributes win name by name.  Unmatched replacement groups
/// are appended whole.
pub fn merge_groups(current: &mut Vec<AttributeGroup>, replacement: Vec<AttributeGroup>) {
    for group in replacement {
        match current.iter_mut().find(|g| g.tag == group.tag) {
            Some(existing) => apply_layer(existing, &group.attributes),
            None => current.push(group),
        }
    }
}

/// The effective `printer-is-accepting-jobs` across composed groups.
/// Missing means accepting.
pub fn effective_accepting_jobs(groups: &[AttributeGroup]) -> bool {
    groups
        .iter()
        .find(|g| g.tag == DelimiterTag::PrinterAttributes)
        .and_then(|g| g.get_bool("printer-is-accepting-jobs"))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> PrinterFacts {
        PrinterFacts {
            printer_name: "Papertrap Virtual Printer".into(),
            host: "192.168.1.20".into(),
            port: 8631,
            uuid_uri: "urn:uuid:00000000-0000-0000-0000-000000000001".into(),
            up_time_secs: 120,
            queued_job_count: 0,
        }
    }

    #[test]
    fn defaults_cover_required_attributes() {
        let group = default_printer_attributes(&facts());
        for name in [
            "printer-name",
            "printer-state",
            "printer-state-reasons",
            "printer-is-accepting-jobs",
            "printer-uri",
            "printer-uri-supported",
            "uri-security-supported",
            "uri-authentication-supported",
            "printer-location",
            "printer-info",
            "printer-make-and-model",
            "printer-up-time",
            "queued-job-count",
            "charset-configured",
            "charset-supported",
            "natural-language-configured",
            "generated-natural-language-supported",
            "ipp-versions-supported",
            "compression-supported",
            "pdl-override-supported",
            "document-format-supported",
            "document-format",
            "document-format-default",
            "media-default",
            "media-supported",
            "operations-supported",
            "color-supported",
            "printer-resolution-supported",
        ] {
            assert!(group.get(name).is_some(), "missing default: {name}");
        }
        assert_eq!(group.get_bool("printer-is-accepting-jobs"), Some(true));
        assert_eq!(group.get_i32("printer-state"), Some(3));
        assert_eq!(
            group.get_str("printer-uri"),
            Some("ipp://192.168.1.20:8631/")
        );
    }

    #[test]
    fn defaults_advertise_seven_operations() {
        let group = default_printer_attributes(&facts());
        let ops = &group.get("operations-supported").unwrap().values;
        assert_eq!(ops.len(), 7);
        assert!(ops.contains(&IppValue::Enum(0x0002)));
        assert!(ops.contains(&IppValue::Enum(0x0006)));
        assert!(ops.contains(&IppValue::Enum(0x000B)));
    }

    #[test]
    fn layer_overrides_by_name() {
        let mut group = default_printer_attributes(&facts());
        apply_layer(
            &mut group,
            &[
                Attribute::new("printer-name", IppValue::Name("Lab-A".into())),
                Attribute::new("custom-extra", IppValue::Keyword("yes".into())),
            ],
        );
        assert_eq!(group.get_str("printer-name"), Some("Lab-A"));
        assert_eq!(group.get_str("custom-extra"), Some("yes"));
    }

    #[test]
    fn merge_groups_last_writer_wins() {
        let mut current = vec![default_printer_attributes(&facts())];

        let mut first = AttributeGroup::new(DelimiterTag::PrinterAttributes);
        first.set(Attribute::new("printer-name", IppValue::Name("one".into())));
        merge_groups(&mut current, vec![first]);

        let mut second = AttributeGroup::new(DelimiterTag::PrinterAttributes);
        second.set(Attribute::new("printer-name", IppValue::Name("two".into())));
        merge_groups(&mut current, vec![second]);

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].get_str("printer-name"), Some("two"));
    }

    #[test]
    fn accepting_jobs_gate_reads_composed_value() {
        let mut group = default_printer_attributes(&facts());
        assert!(effective_accepting_jobs(std::slice::from_ref(&group)));

        apply_layer(
            &mut group,
            &[Attribute::new(
                "printer-is-accepting-jobs",
                IppValue::Boolean(false),
            )],
        );
        assert!(!effective_accepting_jobs(std::slice::from_ref(&group)));
    }
}
