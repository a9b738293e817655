// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP binary packet codec (RFC 8010 §3).
//
// Wire layout:
//
// ```text
// version-number:  2 bytes (major, minor)
// operation-id / status-code: 2 bytes (big-endian u16)
// request-id:      4 bytes (big-endian u32)
// attribute-groups: variable
//   delimiter-tag: 1 byte (0x00..=0x0F)
//   attributes:    variable
//     value-tag:    1 byte
//     name-length:  2 bytes (big-endian u16)
//     name:         name-length bytes
//     value-length: 2 bytes (big-endian u16)
//     value:        value-length bytes
// end-of-attributes-tag: 1 byte (0x03)
// document-data: remainder, after optional 0x00/0x0D/0x0A padding
// ```
//
// An attribute with name-length 0 is an additional value of the previous
// attribute (1setOf).  Collections nest via begCollection / memberAttrName /
// endCollection triplets.

use papertrap_core::error::{PapertrapError, Result};
use tracing::warn;

use crate::model::{Attribute, AttributeGroup, DelimiterTag, IppValue, ValueTag};

/// A decoded IPP message.
///
/// `code` is the operation id on requests and the status code on responses;
/// both directions share the same framing.
#[derive(Debug, Clone, PartialEq)]
pub struct IppPacket {
    pub version_major: u8,
    pub version_minor: u8,
    pub code: u16,
    pub request_id: u32,
    pub groups: Vec<AttributeGroup>,
    /// Opaque document bytes following the end-of-attributes tag.
    pub payload: Vec<u8>,
}

impl IppPacket {
    /// The first group with the given delimiter tag.
    pub fn group(&self, tag: DelimiterTag) -> Option<&AttributeGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    pub fn operation_attributes(&self) -> Option<&AttributeGroup> {
        self.group(DelimiterTag::OperationAttributes)
    }

    pub fn job_attributes(&self) -> Option<&AttributeGroup> {
        self.group(DelimiterTag::JobAttributes)
    }

    pub fn printer_attributes(&self) -> Option<&AttributeGroup> {
        self.group(DelimiterTag::PrinterAttributes)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over the input buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_u8(&mut self) -> Result<u8> {
        let byte = self
            .peek_u8()
            .ok_or_else(|| PapertrapError::MalformedPacket("unexpected end of input".into()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(PapertrapError::MalformedPacket(
                "truncated length field".into(),
            ));
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(PapertrapError::MalformedPacket(format!(
                "declared length {len} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// One `name-length name value-length value` pair following a value tag.
    fn read_name_value(&mut self) -> Result<(&'a [u8], &'a [u8])> {
        let name_len = self.read_u16()? as usize;
        let name = self.read_bytes(name_len)?;
        let value_len = self.read_u16()? as usize;
        let value = self.read_bytes(value_len)?;
        Ok((name, value))
    }
}

/// Decode a raw IPP message into an [`IppPacket`].
///
/// The document payload (everything after the end-of-attributes tag, past
/// any 0x00/0x0D/0x0A padding) is returned in [`IppPacket::payload`].
///
/// # Errors
///
/// `MalformedPacket` on a truncated header, an unknown delimiter before the
/// end-of-attributes tag, an unknown value tag, or any declared length that
/// exceeds the buffer.
pub fn decode(data: &[u8]) -> Result<IppPacket> {
    if data.len() < 8 {
        return Err(PapertrapError::MalformedPacket(format!(
            "IPP message too short: {} bytes (minimum 8)",
            data.len()
        )));
    }

    let version_major = data[0];
    let version_minor = data[1];
    let code = u16::from_be_bytes([data[2], data[3]]);
    let request_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let mut reader = Reader::new(data);
    reader.pos = 8;

    let mut groups: Vec<AttributeGroup> = Vec::new();
    let mut current_group: Option<AttributeGroup> = None;
    let mut saw_end = false;

    while reader.remaining() > 0 {
        let tag_byte = reader.peek_u8().expect("remaining() checked");

        // Delimiter tags occupy 0x00..=0x0F.
        if tag_byte <= 0x0F {
            reader.pos += 1;
            let delimiter = DelimiterTag::from_u8(tag_byte).ok_or_else(|| {
                PapertrapError::MalformedPacket(format!(
                    "unknown delimiter tag 0x{tag_byte:02X} before end-of-attributes"
                ))
            })?;

            if let Some(group) = current_group.take() {
                groups.push(group);
            }

            if delimiter == DelimiterTag::EndOfAttributes {
                saw_end = true;
                break;
            }

            current_group = Some(AttributeGroup::new(delimiter));
            continue;
        }

        // A value tag opens an attribute (or an additional value).
        let tag_byte = reader.read_u8()?;
        let value_tag = ValueTag::from_u8(tag_byte).ok_or_else(|| {
            PapertrapError::MalformedPacket(format!("unknown value tag 0x{tag_byte:02X}"))
        })?;
        let (name_bytes, value_bytes) = reader.read_name_value()?;

        let value = if value_tag == ValueTag::BegCollection {
            IppValue::Collection(decode_collection(&mut reader)?)
        } else {
            decode_value(value_tag, value_bytes)?
        };

        let Some(ref mut group) = current_group else {
            // Attribute outside any group: discard, as clients that emit
            // this are otherwise well-formed.
            warn!("IPP attribute outside of any group discarded");
            continue;
        };

        if name_bytes.is_empty() {
            match group.attributes.last_mut() {
                Some(previous) => previous.values.push(value),
                None => {
                    return Err(PapertrapError::MalformedPacket(
                        "additional value with no preceding attribute".into(),
                    ));
                }
            }
        } else {
            let name = String::from_utf8_lossy(name_bytes).into_owned();
            group.push(Attribute::new(name, value));
        }
    }

    if let Some(group) = current_group.take() {
        groups.push(group);
    }

    // Skip padding between end-of-attributes and the document payload.
    let mut payload_start = reader.pos;
    if saw_end {
        while payload_start < data.len()
            && matches!(data[payload_start], 0x00 | 0x0D | 0x0A)
        {
            payload_start += 1;
        }
    }

    let payload = data[payload_start..].to_vec();

    Ok(IppPacket {
        version_major,
        version_minor,
        code,
        request_id,
        groups,
        payload,
    })
}

/// Decode collection members until the matching endCollection.
fn decode_collection(reader: &mut Reader<'_>) -> Result<Vec<(String, IppValue)>> {
    let mut members = Vec::new();

    loop {
        let tag_byte = reader.read_u8()?;
        let tag = ValueTag::from_u8(tag_byte).ok_or_else(|| {
            PapertrapError::MalformedPacket(format!(
                "unknown value tag 0x{tag_byte:02X} inside collection"
            ))
        })?;
        let (_name, value_bytes) = reader.read_name_value()?;

        match tag {
            ValueTag::EndCollection => break,
            ValueTag::MemberAttrName => {
                let member_name = String::from_utf8_lossy(value_bytes).into_owned();

                let member_tag_byte = reader.read_u8()?;
                let member_tag = ValueTag::from_u8(member_tag_byte).ok_or_else(|| {
                    PapertrapError::MalformedPacket(format!(
                        "unknown member value tag 0x{member_tag_byte:02X}"
                    ))
                })?;
                let (_member_name_field, member_value_bytes) = reader.read_name_value()?;

                let member_value = if member_tag == ValueTag::BegCollection {
                    IppValue::Collection(decode_collection(reader)?)
                } else {
                    decode_value(member_tag, member_value_bytes)?
                };

                members.push((member_name, member_value));
            }
            other => {
                return Err(PapertrapError::MalformedPacket(format!(
                    "unexpected {other:?} inside collection"
                )));
            }
        }
    }

    Ok(members)
}

/// Decode a single non-collection value from its wire bytes.
fn decode_value(tag: ValueTag, bytes: &[u8]) -> Result<IppValue> {
    let value = match tag {
        ValueTag::Integer | ValueTag::Enum => {
            if bytes.len() != 4 {
                return Err(PapertrapError::MalformedPacket(format!(
                    "{tag:?} value has {} bytes, expected 4",
                    bytes.len()
                )));
            }
            let v = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if tag == ValueTag::Integer {
                IppValue::Integer(v)
            } else {
                IppValue::Enum(v)
            }
        }
        ValueTag::Boolean => {
            if bytes.len() != 1 {
                return Err(PapertrapError::MalformedPacket(format!(
                    "boolean value has {} bytes, expected 1",
                    bytes.len()
                )));
            }
            IppValue::Boolean(bytes[0] != 0x00)
        }
        ValueTag::RangeOfInteger => {
            if bytes.len() != 8 {
                return Err(PapertrapError::MalformedPacket(format!(
                    "rangeOfInteger value has {} bytes, expected 8",
                    bytes.len()
                )));
            }
            IppValue::RangeOfInteger {
                low: i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                high: i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            }
        }
        ValueTag::Resolution => {
            if bytes.len() != 9 {
                return Err(PapertrapError::MalformedPacket(format!(
                    "resolution value has {} bytes, expected 9",
                    bytes.len()
                )));
            }
            IppValue::Resolution {
                cross_feed: i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                feed: i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
                unit: bytes[8],
            }
        }
        ValueTag::Text => IppValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::Name => IppValue::Name(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::Keyword => IppValue::Keyword(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::Uri => IppValue::Uri(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::UriScheme => IppValue::UriScheme(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::Charset => IppValue::Charset(String::from_utf8_lossy(bytes).into_owned()),
        ValueTag::NaturalLanguage => {
            IppValue::NaturalLanguage(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueTag::MimeMediaType => {
            IppValue::MimeMediaType(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueTag::NoValue if bytes.is_empty() => IppValue::NoValue,
        ValueTag::BegCollection | ValueTag::EndCollection | ValueTag::MemberAttrName => {
            return Err(PapertrapError::MalformedPacket(format!(
                "{tag:?} is not a scalar value tag"
            )));
        }
        other => IppValue::Octet {
            tag: other,
            data: bytes.to_vec(),
        },
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a packet into its wire form.
///
/// Groups are written in the order provided, terminated by the
/// end-of-attributes tag.  The payload field is NOT appended: responses to
/// document uploads carry no document bytes.
pub fn encode(packet: &IppPacket) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    buf.push(packet.version_major);
    buf.push(packet.version_minor);
    buf.extend_from_slice(&packet.code.to_be_bytes());
    buf.extend_from_slice(&packet.request_id.to_be_bytes());

    for group in &packet.groups {
        buf.push(group.tag.as_u8());
        for attribute in &group.attributes {
            for (index, value) in attribute.values.iter().enumerate() {
                let name = if index == 0 { attribute.name.as_str() } else { "" };
                encode_attribute_value(&mut buf, name, value);
            }
        }
    }

    buf.push(DelimiterTag::EndOfAttributes.as_u8());
    buf
}

/// Write one attribute entry (tag, name, value), recursing for collections.
fn encode_attribute_value(buf: &mut Vec<u8>, name: &str, value: &IppValue) {
    match value {
        IppValue::Collection(members) => {
            write_entry(buf, ValueTag::BegCollection.as_u8(), name, &[]);
            for (member_name, member_value) in members {
                write_entry(
                    buf,
                    ValueTag::MemberAttrName.as_u8(),
                    "",
                    member_name.as_bytes(),
                );
                encode_attribute_value(buf, "", member_value);
            }
            write_entry(buf, ValueTag::EndCollection.as_u8(), "", &[]);
        }
        _ => {
            let bytes = scalar_value_bytes(value);
            write_entry(buf, value.tag().as_u8(), name, &bytes);
        }
    }
}

/// Wire bytes for a non-collection value.
fn scalar_value_bytes(value: &IppValue) -> Vec<u8> {
    match value {
        IppValue::Integer(v) | IppValue::Enum(v) => v.to_be_bytes().to_vec(),
        IppValue::Boolean(v) => vec![if *v { 0x01 } else { 0x00 }],
        IppValue::RangeOfInteger { low, high } => {
            let mut bytes = Vec::with_capacity(8);
            bytes.extend_from_slice(&low.to_be_bytes());
            bytes.extend_from_slice(&high.to_be_bytes());
            bytes
        }
        IppValue::Resolution {
            cross_feed,
            feed,
            unit,
        } => {
            let mut bytes = Vec::with_capacity(9);
            bytes.extend_from_slice(&cross_feed.to_be_bytes());
            bytes.extend_from_slice(&feed.to_be_bytes());
            bytes.push(*unit);
            bytes
        }
        IppValue::Text(s)
        | IppValue::Name(s)
        | IppValue::Keyword(s)
        | IppValue::Uri(s)
        | IppValue::UriScheme(s)
        | IppValue::Charset(s)
        | IppValue::NaturalLanguage(s)
        | IppValue::MimeMediaType(s) => s.as_bytes().to_vec(),
        IppValue::NoValue => Vec::new(),
        IppValue::Octet { data, .. } => data.clone(),
        IppValue::Collection(_) => unreachable!("collections are encoded structurally"),
    }
}

fn write_entry(buf: &mut Vec<u8>, tag: u8, name: &str, value: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent constructor for IPP messages, response-flavoured.
///
/// Mirrors the shape of the decoder output so that building and parsing
/// stay symmetric.
pub struct PacketBuilder {
    packet: IppPacket,
}

impl PacketBuilder {
    /// Start a message with the given code (status code for responses) and
    /// request id.  Version defaults to IPP 1.1.
    pub fn new(code: u16, request_id: u32) -> Self {
        Self {
            packet: IppPacket {
                version_major: 1,
                version_minor: 1,
                code,
                request_id,
                groups: Vec::new(),
                payload: Vec::new(),
            },
        }
    }

    /// Open a new attribute group; subsequent attributes land in it.
    pub fn begin_group(&mut self, tag: DelimiterTag) -> &mut Self {
        self.packet.groups.push(AttributeGroup::new(tag));
        self
    }

    /// Append an attribute to the currently open group.
    pub fn attr(&mut self, name: &str, value: IppValue) -> &mut Self {
        self.current().push(Attribute::new(name, value));
        self
    }

    /// Append a multi-valued attribute to the currently open group.
    pub fn attr_values(&mut self, name: &str, values: Vec<IppValue>) -> &mut Self {
        self.current().push(Attribute::with_values(name, values));
        self
    }

    /// Append a whole pre-built group.
    pub fn group(&mut self, group: AttributeGroup) -> &mut Self {
        self.packet.groups.push(group);
        self
    }

    /// The standard response prelude: operation attributes with charset,
    /// natural language, and a status message.
    pub fn operation_prelude(&mut self, status_message: &str) -> &mut Self {
        self.begin_group(DelimiterTag::OperationAttributes)
            .attr("attributes-charset", IppValue::Charset("utf-8".into()))
            .attr(
                "attributes-natural-language",
                IppValue::NaturalLanguage("en".into()),
            )
            .attr("status-message", IppValue::Text(status_message.into()))
    }

    pub fn build(self) -> IppPacket {
        self.packet
    }

    fn current(&mut self) -> &mut AttributeGroup {
        if self.packet.groups.is_empty() {
            self.packet
                .groups
                .push(AttributeGroup::new(DelimiterTag::OperationAttributes));
        }
        self.packet.groups.last_mut().expect("group just ensured")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
