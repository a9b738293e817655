// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed IPP attribute model (RFC 8010 §3.5).
//
// Attribute values are a tagged variant over the IPP value-tag space; every
// access goes through the variant, so there is exactly one place where wire
// bytes and Rust types meet (the codec in `packet.rs`).

// ---------------------------------------------------------------------------
// Delimiter tags (RFC 8010 §3.5.1)
// ---------------------------------------------------------------------------

/// Attribute-group delimiters.  A byte in `0x00..=0x0F` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterTag {
    OperationAttributes,
    JobAttributes,
    EndOfAttributes,
    PrinterAttributes,
    UnsupportedAttributes,
}

impl DelimiterTag {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::OperationAttributes),
            0x02 => Some(Self::JobAttributes),
            0x03 => Some(Self::EndOfAttributes),
            0x04 => Some(Self::PrinterAttributes),
            0x05 => Some(Self::UnsupportedAttributes),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::OperationAttributes => 0x01,
            Self::JobAttributes => 0x02,
            Self::EndOfAttributes => 0x03,
            Self::PrinterAttributes => 0x04,
            Self::UnsupportedAttributes => 0x05,
        }
    }
}

// ---------------------------------------------------------------------------
// Value tags (RFC 8010 §3.5.2)
// ---------------------------------------------------------------------------

/// One-byte type discriminator carried before every attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Unsupported,
    Unknown,
    NoValue,
    Integer,
    Boolean,
    Enum,
    OctetString,
    DateTime,
    Resolution,
    RangeOfInteger,
    BegCollection,
    TextWithLanguage,
    NameWithLanguage,
    EndCollection,
    Text,
    Name,
    Keyword,
    Uri,
    UriScheme,
    Charset,
    NaturalLanguage,
    MimeMediaType,
    MemberAttrName,
}

impl ValueTag {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(Self::Unsupported),
            0x12 => Some(Self::Unknown),
            0x13 => Some(Self::NoValue),
            0x21 => Some(Self::Integer),
            0x22 => Some(Self::Boolean),
            0x23 => Some(Self::Enum),
            0x30 => Some(Self::OctetString),
            0x31 => Some(Self::DateTime),
            0x32 => Some(Self::Resolution),
            0x33 => Some(Self::RangeOfInteger),
            0x34 => Some(Self::BegCollection),
            0x35 => Some(Self::TextWithLanguage),
            0x36 => Some(Self::NameWithLanguage),
            0x37 => Some(Self::EndCollection),
            0x41 => Some(Self::Text),
            0x42 => Some(Self::Name),
            0x44 => Some(Self::Keyword),
            0x45 => Some(Self::Uri),
            0x46 => Some(Self::UriScheme),
            0x47 => Some(Self::Charset),
            0x48 => Some(Self::NaturalLanguage),
            0x49 => Some(Self::MimeMediaType),
            0x4A => Some(Self::MemberAttrName),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Unsupported => 0x10,
            Self::Unknown => 0x12,
            Self::NoValue => 0x13,
            Self::Integer => 0x21,
            Self::Boolean => 0x22,
            Self::Enum => 0x23,
            Self::OctetString => 0x30,
            Self::DateTime => 0x31,
            Self::Resolution => 0x32,
            Self::RangeOfInteger => 0x33,
            Self::BegCollection => 0x34,
            Self::TextWithLanguage => 0x35,
            Self::NameWithLanguage => 0x36,
            Self::EndCollection => 0x37,
            Self::Text => 0x41,
            Self::Name => 0x42,
            Self::Keyword => 0x44,
            Self::Uri => 0x45,
            Self::UriScheme => 0x46,
            Self::Charset => 0x47,
            Self::NaturalLanguage => 0x48,
            Self::MimeMediaType => 0x49,
            Self::MemberAttrName => 0x4A,
        }
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Resolution units (RFC 8011 §5.4.15): 3 = dots per inch, 4 = dots per cm.
pub const RESOLUTION_UNIT_DPI: u8 = 3;
pub const RESOLUTION_UNIT_DPCM: u8 = 4;

/// A single IPP attribute value.
///
/// Each variant maps to exactly one value tag, so the wire tag byte is
/// derived from the variant itself (see [`IppValue::tag`]).  Value families
/// we never interpret (dateTime, octetString, the *WithLanguage strings)
/// are carried as raw octets and round-trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum IppValue {
    Integer(i32),
    Boolean(bool),
    Enum(i32),
    RangeOfInteger { low: i32, high: i32 },
    Resolution { cross_feed: i32, feed: i32, unit: u8 },
    Text(String),
    Name(String),
    Keyword(String),
    Uri(String),
    UriScheme(String),
    Charset(String),
    NaturalLanguage(String),
    MimeMediaType(String),
    /// Ordered member name/value pairs of a collection.
    Collection(Vec<(String, IppValue)>),
    NoValue,
    /// Raw bytes under a tag we carry but do not interpret.
    Octet { tag: ValueTag, data: Vec<u8> },
}

impl IppValue {
    /// The wire value tag for this value.
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Integer(_) => ValueTag::Integer,
            Self::Boolean(_) => ValueTag::Boolean,
            Self::Enum(_) => ValueTag::Enum,
            Self::RangeOfInteger { .. } => ValueTag::RangeOfInteger,
            Self::Resolution { .. } => ValueTag::Resolution,
            Self::Text(_) => ValueTag::Text,
            Self::Name(_) => ValueTag::Name,
            Self::Keyword(_) => ValueTag::Keyword,
            Self::Uri(_) => ValueTag::Uri,
            Self::UriScheme(_) => ValueTag::UriScheme,
            Self::Charset(_) => ValueTag::Charset,
            Self::NaturalLanguage(_) => ValueTag::NaturalLanguage,
            Self::MimeMediaType(_) => ValueTag::MimeMediaType,
            Self::Collection(_) => ValueTag::BegCollection,
            Self::NoValue => ValueTag::NoValue,
            Self::Octet { tag, .. } => *tag,
        }
    }

    /// String content for any of the string-flavoured variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s)
            | Self::Name(s)
            | Self::Keyword(s)
            | Self::Uri(s)
            | Self::UriScheme(s)
            | Self::Charset(s)
            | Self::NaturalLanguage(s)
            | Self::MimeMediaType(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content for `integer` and `enum` values.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) | Self::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes and groups
// ---------------------------------------------------------------------------

/// A named attribute with one or more values in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<IppValue>,
}

impl Attribute {
    /// Single-valued attribute.
    pub fn new(name: impl Into<String>, value: IppValue) -> Self {
        Self {
            name: name.into(),
            values: vec![value],
        }
    }

    /// Multi-valued (1setOf) attribute.
    pub fn with_values(name: impl Into<String>, values: Vec<IppValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// The first value, which every well-formed attribute has.
    pub fn first(&self) -> Option<&IppValue> {
        self.values.first()
    }
}

/// An ordered group of attributes under one delimiter tag.
///
/// Attribute names are unique within a group; [`AttributeGroup::set`]
/// replaces in place to preserve the original position.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroup {
    pub tag: DelimiterTag,
    pub attributes: Vec<Attribute>,
}

impl AttributeGroup {
    pub fn new(tag: DelimiterTag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
        }
    }

    /// Find an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// First value of the named attribute as a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|a| a.first()).and_then(|v| v.as_str())
    }

    /// First value of the named attribute as an i32 (`integer` or `enum`).
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|a| a.first()).and_then(|v| v.as_i32())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|a| a.first()).and_then(|v| v.as_bool())
    }

    /// All values of the named attribute as strings.
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|a| {
                a.values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert or replace by name, preserving the position of a replaced
    /// attribute.
    pub fn set(&mut self, attribute: Attribute) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// Append without checking for duplicates (codec use only).
    pub fn push(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_tag_roundtrip() {
        for byte in [0x01u8, 0x02, 0x03, 0x04, 0x05] {
            let tag = DelimiterTag::from_u8(byte).unwrap();
            assert_eq!(tag.as_u8(), byte);
        }
        assert!(DelimiterTag::from_u8(0x06).is_none());
        assert!(DelimiterTag::from_u8(0x21).is_none());
    }

    #[test]
    fn value_tag_roundtrip() {
        for byte in [
            0x10u8, 0x12, 0x13, 0x21, 0x22, 0x23, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
            0x37, 0x41, 0x42, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A,
        ] {
            let tag = ValueTag::from_u8(byte).unwrap();
            assert_eq!(tag.as_u8(), byte);
        }
        assert!(ValueTag::from_u8(0x00).is_none());
        assert!(ValueTag::from_u8(0xFF).is_none());
    }

    #[test]
    fn value_accessors() {
        assert_eq!(IppValue::Integer(42).as_i32(), Some(42));
        assert_eq!(IppValue::Enum(5).as_i32(), Some(5));
        assert_eq!(IppValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(IppValue::Keyword("none".into()).as_str(), Some("none"));
        assert_eq!(IppValue::Boolean(false).as_str(), None);
    }

    #[test]
    fn group_set_replaces_in_place() {
        let mut group = AttributeGroup::new(DelimiterTag::PrinterAttributes);
        group.set(Attribute::new("printer-name", IppValue::Name("a".into())));
        group.set(Attribute::new("printer-state", IppValue::Enum(3)));
        group.set(Attribute::new("printer-name", IppValue::Name("b".into())));

        assert_eq!(group.attributes.len(), 2);
        assert_eq!(group.attributes[0].name, "printer-name");
        assert_eq!(group.get_str("printer-name"), Some("b"));
    }

    #[test]
    fn multi_value_order_preserved() {
        let attr = Attribute::with_values(
            "media-supported",
            vec![
                IppValue::Keyword("iso_a4_210x297mm".into()),
                IppValue::Keyword("na_letter_8.5x11in".into()),
            ],
        );
        let mut group = AttributeGroup::new(DelimiterTag::PrinterAttributes);
        group.set(attr);
        assert_eq!(
            group.get_strings("media-supported"),
            vec!["iso_a4_210x297mm", "na_letter_8.5x11in"]
        );
    }
}
