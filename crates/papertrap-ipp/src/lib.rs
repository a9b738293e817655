// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// papertrap-ipp — IPP wire model, binary codec, and printer capability
// composition.  The codec is bit-exact against RFC 8010 framing; capability
// responses are composed from defaults, user overrides, and plugin output.

pub mod capabilities;
pub mod model;
pub mod operation;
pub mod overrides;
pub mod packet;

pub use model::{Attribute, AttributeGroup, DelimiterTag, IppValue, ValueTag};
pub use operation::{Operation, StatusCode};
pub use packet::{IppPacket, PacketBuilder, decode, encode};
