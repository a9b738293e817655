// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for papertrap.

use thiserror::Error;

/// Top-level error type for all papertrap operations.
#[derive(Debug, Error)]
pub enum PapertrapError {
    // -- Protocol errors --
    /// The byte stream could not be decoded as an IPP packet.  Surfaced as
    /// HTTP 500 because no valid IPP response can be produced.
    #[error("malformed IPP packet: {0}")]
    MalformedPacket(String),

    /// Valid framing but semantically rejected (missing required operation
    /// attribute, bad value type, ...).  Surfaced as client-error-bad-request.
    #[error("IPP protocol violation: {0}")]
    Protocol(String),

    /// Request rejected by policy (not accepting jobs, unsupported format,
    /// unknown job id).  Surfaced with the matching IPP client-error code.
    #[error("rejected by policy: {0}")]
    Policy(String),

    // -- Plugin errors --
    #[error("plugin {plugin}: {message}")]
    Plugin { plugin: String, message: String },

    #[error("plugin {0} not found")]
    PluginNotFound(String),

    #[error("plugin {plugin} requires {dependency}, which is not loaded")]
    PluginDependency { plugin: String, dependency: String },

    #[error("hook {hook} exceeded its {limit_secs}s deadline")]
    HookTimeout { hook: String, limit_secs: u64 },

    #[error("invalid plugin configuration: {0}")]
    PluginConfig(String),

    // -- Document pipeline --
    #[error("document processing failed: {0}")]
    Document(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Server / advertisement --
    #[error("print server error: {0}")]
    Server(String),

    #[error("service advertisement failed: {0}")]
    Advertise(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PapertrapError>;
