//! Error types for Affect Flux

use thiserror::Error;

/// Errors raised at the edges of the engine (config, parsing, remote transport).
///
/// The stabilization core itself never returns these; remote failures are
/// caught inside the lexical extractor and converted into local scoring.
#[derive(Debug, Error)]
pub enum AffectError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown emotion label: {0}")]
    UnknownLabel(String),

    #[error("Remote classifier returned HTTP {0}")]
    RemoteStatus(u16),

    #[error("Remote classifier transport error: {0}")]
    RemoteTransport(String),

    #[error("Remote classifier rejected the request: {0}")]
    RemoteRejected(String),

    #[error("Malformed remote classifier response: {0}")]
    MalformedResponse(String),
}
