// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-provided attribute override documents.
//
// Two JSON shapes are accepted, both produced by tooling around the
// original capture workflow:
//
// Legacy array:
//
// ```json
// [ { "tag": "PRINTER_ATTRIBUTES",
//     "attributes": [ { "name": "printer-name", "value": "Lab-A",
//                       "type": "STRING" },
//                     { "name": "media-supported",
//                       "values": ["iso_a4_210x297mm"] } ] } ]
// ```
//
// Printer response:
//
// ```json
// { "response": {
//     "operation-attributes": { "attributes-charset":
//         { "type": "charset", "value": "utf-8" } },
//     "printer-attributes": { "printer-name":
//         { "type": "nameWithoutLanguage", "value": "Lab-A" } } } }
// ```

use papertrap_core::error::{PapertrapError, Result};
use serde_json::Value as Json;
use tracing::debug;

use crate::model::{Attribute, IppValue};

/// Parsed override document: attributes destined for each response group.
#[derive(Debug, Clone, Default)]
pub struct CustomAttributeSet {
    pub operation: Vec<Attribute>,
    pub printer: Vec<Attribute>,
}

impl CustomAttributeSet {
    pub fn is_empty(&self) -> bool {
        self.operation.is_empty() && self.printer.is_empty()
    }

    /// The restricted `document-format-supported` list, if the document
    /// overrides it.
    pub fn supported_formats(&self) -> Option<Vec<String>> {
        self.printer
            .iter()
            .find(|a| a.name == "document-format-supported")
            .map(|a| {
                a.values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
    }

    /// The overridden `printer-is-accepting-jobs` flag, if present.
    pub fn accepting_jobs(&self) -> Option<bool> {
        self.printer
            .iter()
            .find(|a| a.name == "printer-is-accepting-jobs")
            .and_then(|a| a.first())
            .and_then(|v| v.as_bool())
    }
}

/// Parse an override document from JSON text, accepting either shape.
pub fn parse_override_document(text: &str) -> Result<CustomAttributeSet> {
    let json: Json = serde_json::from_str(text)?;

    let set = match &json {
        Json::Array(groups) => parse_legacy_array(groups)?,
        Json::Object(map) => {
            let response = map.get("response").ok_or_else(|| {
                PapertrapError::Protocol(
                    "override document has neither a top-level array nor a \"response\" key"
                        .into(),
                )
            })?;
            parse_response_shape(response)?
        }
        _ => {
            return Err(PapertrapError::Protocol(
                "override document must be a JSON array or object".into(),
            ));
        }
    };

    debug!(
        operation = set.operation.len(),
        printer = set.printer.len(),
        "parsed attribute override document"
    );
    Ok(set)
}

// ---------------------------------------------------------------------------
// Legacy array shape
// ---------------------------------------------------------------------------

fn parse_legacy_array(groups: &[Json]) -> Result<CustomAttributeSet> {
    let mut set = CustomAttributeSet::default();

    for group in groups {
        let tag = group
            .get("tag")
            .and_then(Json::as_str)
            .unwrap_or("PRINTER_ATTRIBUTES");
        let attributes = group
            .get("attributes")
            .and_then(Json::as_array)
            .ok_or_else(|| {
                PapertrapError::Protocol("legacy override group lacks \"attributes\"".into())
            })?;

        let target = match tag {
            "OPERATION_ATTRIBUTES" => &mut set.operation,
            _ => &mut set.printer,
        };

        for entry in attributes {
            let name = entry.get("name").and_then(Json::as_str).ok_or_else(|| {
                PapertrapError::Protocol("legacy override attribute lacks \"name\"".into())
            })?;
            let declared = entry.get("type").and_then(Json::as_str);

            let values: Vec<IppValue> = if let Some(list) = entry.get("values").and_then(Json::as_array)
            {
                list.iter()
                    .map(|v| json_to_ipp_value(name, v, declared))
                    .collect::<Result<_>>()?
            } else if let Some(value) = entry.get("value") {
                vec![json_to_ipp_value(name, value, declared)?]
            } else {
                return Err(PapertrapError::Protocol(format!(
                    "override attribute {name} has neither \"value\" nor \"values\""
                )));
            };

            target.push(Attribute::with_values(name, values));
        }
    }

    Ok(set)
}

// ---------------------------------------------------------------------------
// Printer-response shape
// ---------------------------------------------------------------------------

fn parse_response_shape(response: &Json) -> Result<CustomAttributeSet> {
    let mut set = CustomAttributeSet::default();

    for (key, target) in [
        ("operation-attributes", &mut set.operation as &mut Vec<Attribute>),
        ("printer-attributes", &mut set.printer),
    ] {
        let Some(Json::Object(entries)) = response.get(key) else {
            continue;
        };

        for (name, entry) in entries {
            let declared = entry.get("type").and_then(Json::as_str);
            let value = entry.get("value").unwrap_or(entry);

            let values: Vec<IppValue> = match value {
                Json::Array(list) => list
                    .iter()
                    .map(|v| json_to_ipp_value(name, v, declared))
                    .collect::<Result<_>>()?,
                scalar => vec![json_to_ipp_value(name, scalar, declared)?],
            };

            target.push(Attribute::with_values(name.clone(), values));
        }
    }

    Ok(set)
}

// ---------------------------------------------------------------------------
// Scalar conversion
// ---------------------------------------------------------------------------

/// Convert a JSON scalar into an [`IppValue`], honouring a declared type
/// string when given and falling back to a name-driven heuristic.
fn json_to_ipp_value(name: &str, value: &Json, declared: Option<&str>) -> Result<IppValue> {
    if let Some(kind) = declared {
        if let Some(converted) = convert_declared(kind, value) {
            return Ok(converted);
        }
    }

    let converted = match value {
        Json::Bool(b) => IppValue::Boolean(*b),
        Json::Number(n) => {
            let v = n.as_i64().unwrap_or_default() as i32;
            if name.ends_with("-state") || name == "operations-supported" {
                IppValue::Enum(v)
            } else {
                IppValue::Integer(v)
            }
        }
        Json::String(s) => string_value_for(name, s.clone()),
        other => {
            return Err(PapertrapError::Protocol(format!(
                "override attribute {name} has unsupported JSON value: {other}"
            )));
        }
    };
    Ok(converted)
}

/// Conversion for an explicitly declared type.  Returns `None` for unknown
/// declarations so the heuristic can take over.
fn convert_declared(kind: &str, value: &Json) -> Option<IppValue> {
    match kind {
        "STRING" | "string" => value.as_str().map(|s| IppValue::Name(s.to_string())),
        "INTEGER" | "integer" => value.as_i64().map(|v| IppValue::Integer(v as i32)),
        "BOOLEAN" | "boolean" => value.as_bool().map(IppValue::Boolean),
        "enum" => value.as_i64().map(|v| IppValue::Enum(v as i32)),
        "keyword" => value.as_str().map(|s| IppValue::Keyword(s.to_string())),
        "uri" => value.as_str().map(|s| IppValue::Uri(s.to_string())),
        "charset" => value.as_str().map(|s| IppValue::Charset(s.to_string())),
        "naturalLanguage" => value
            .as_str()
            .map(|s| IppValue::NaturalLanguage(s.to_string())),
        "mimeMediaType" => value
            .as_str()
            .map(|s| IppValue::MimeMediaType(s.to_string())),
        "nameWithoutLanguage" => value.as_str().map(|s| IppValue::Name(s.to_string())),
        "textWithoutLanguage" => value.as_str().map(|s| IppValue::Text(s.to_string())),
        _ => None,
    }
}

/// Pick a string value tag from the attribute name.
fn string_value_for(name: &str, value: String) -> IppValue {
    if name.ends_with("-uri") || name.ends_with("-uri-supported") || name == "printer-uri" {
        IppValue::Uri(value)
    } else if name.contains("charset") {
        IppValue::Charset(value)
    } else if name.contains("natural-language") {
        IppValue::NaturalLanguage(value)
    } else if name.contains("document-format") {
        IppValue::MimeMediaType(value)
    } else if name.ends_with("-name") {
        IppValue::Name(value)
    } else if name.ends_with("-info")
        || name.ends_with("-location")
        || name.ends_with("-make-and-model")
        || name.ends_with("-message")
    {
        IppValue::Text(value)
    } else {
        IppValue::Keyword(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_array_shape() {
        let text = r#"[
            { "tag": "PRINTER_ATTRIBUTES",
              "attributes": [
                { "name": "printer-name", "value": "Lab-A", "type": "STRING" },
                { "name": "printer-is-accepting-jobs", "value": false, "type": "BOOLEAN" },
                { "name": "queued-job-count", "value": 3, "type": "INTEGER" },
                { "name": "document-format-supported",
                  "values": ["application/pdf"] }
              ] }
        ]"#;
        let set = parse_override_document(text).expect("parse");

        assert_eq!(set.printer.len(), 4);
        assert_eq!(
            set.printer[0].first(),
            Some(&IppValue::Name("Lab-A".into()))
        );
        assert_eq!(set.accepting_jobs(), Some(false));
        assert_eq!(
            set.supported_formats(),
            Some(vec!["application/pdf".to_string()])
        );
    }

    #[test]
    fn parses_response_shape() {
        let text = r#"{
            "response": {
                "operation-attributes": {
                    "attributes-charset": { "type": "charset", "value": "utf-8" }
                },
                "printer-attributes": {
                    "printer-name": { "type": "nameWithoutLanguage", "value": "Front Desk" },
                    "media-supported": { "type": "keyword",
                        "value": ["iso_a4_210x297mm", "na_letter_8.5x11in"] }
                }
            }
        }"#;
        let set = parse_override_document(text).expect("parse");

        assert_eq!(set.operation.len(), 1);
        assert_eq!(set.printer.len(), 2);
        let media = set
            .printer
            .iter()
            .find(|a| a.name == "media-supported")
            .unwrap();
        assert_eq!(media.values.len(), 2);
    }

    #[test]
    fn heuristic_tags_from_names() {
        let text = r#"[
            { "attributes": [
                { "name": "printer-uri-supported", "value": "ipp://h:8631/" },
                { "name": "printer-info", "value": "front desk" },
                { "name": "media-default", "value": "iso_a4_210x297mm" },
                { "name": "printer-state", "value": 4 }
            ] }
        ]"#;
        let set = parse_override_document(text).expect("parse");

        assert_eq!(
            set.printer[0].first(),
            Some(&IppValue::Uri("ipp://h:8631/".into()))
        );
        assert_eq!(
            set.printer[1].first(),
            Some(&IppValue::Text("front desk".into()))
        );
        assert_eq!(
            set.printer[2].first(),
            Some(&IppValue::Keyword("iso_a4_210x297mm".into()))
        );
        assert_eq!(set.printer[3].first(), Some(&IppValue::Enum(4)));
    }

    #[test]
    fn rejects_scalar_document() {
        assert!(parse_override_document("42").is_err());
        assert!(parse_override_document(r#"{"no-response": {}}"#).is_err());
    }

    #[test]
    fn rejects_attribute_without_value() {
        let text = r#"[ { "attributes": [ { "name": "printer-name" } ] } ]"#;
        assert!(parse_override_document(text).is_err());
    }
}
