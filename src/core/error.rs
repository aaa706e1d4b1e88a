// Centralized error handling for the tracker

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Internal error taxonomy. Validation variants map 1:1 onto protocol
/// failure messages; store and internal failures are collapsed into a
/// generic message so driver details never reach clients.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("invalid config")]
    InvalidConfig,

    #[error("invalid info_hash")]
    InvalidInfoHash,

    #[error("invalid peer_id")]
    InvalidPeerId,

    #[error("invalid port")]
    InvalidPort,

    #[error("invalid ip")]
    InvalidIp,

    #[error("unauthorized")]
    Unauthorized,

    #[error("duplicate")]
    Duplicate,

    #[error("not found")]
    NotFound,

    #[error("malformed request")]
    MalformedRequest,

    /// Torrent disabled with an operator-supplied reason; the reason text is
    /// surfaced verbatim to the client.
    #[error("{0}")]
    TorrentDisabled(String),

    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl TrackerError {
    /// The protocol-visible failure message for this error.
    pub fn wire_message(&self) -> &str {
        match self {
            TrackerError::InvalidInfoHash => "invalid info_hash",
            TrackerError::InvalidPeerId => "invalid peer_id",
            TrackerError::InvalidPort => "invalid port",
            TrackerError::InvalidIp => "invalid ip",
            TrackerError::Unauthorized => "unauthorized",
            TrackerError::MalformedRequest => "malformed request",
            TrackerError::TorrentDisabled(reason) => reason,
            // Nothing driver- or state-specific may leak to clients
            TrackerError::InvalidConfig
            | TrackerError::Duplicate
            | TrackerError::NotFound
            | TrackerError::StoreUnavailable(_)
            | TrackerError::Internal(_) => "internal error",
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        match &self {
            TrackerError::StoreUnavailable(source) => {
                tracing::error!(error = %source, "Store unavailable during request");
            }
            TrackerError::Internal(source) => {
                tracing::error!(error = %source, "Internal error during request");
            }
            _ => {}
        }

        let body = crate::bencode::response::failure(self.wire_message());

        // Failures are HTTP 200 bencoded bodies per BEP-3
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(body.into())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages() {
        assert_eq!(TrackerError::InvalidPort.wire_message(), "invalid port");
        assert_eq!(TrackerError::Unauthorized.wire_message(), "unauthorized");
        assert_eq!(
            TrackerError::MalformedRequest.wire_message(),
            "malformed request"
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = TrackerError::StoreUnavailable(anyhow::anyhow!("redis timed out at 10.0.0.5"));
        assert_eq!(err.wire_message(), "internal error");

        let err = TrackerError::Internal(anyhow::anyhow!("bug details"));
        assert_eq!(err.wire_message(), "internal error");
    }

    #[test]
    fn test_disabled_reason_surfaced() {
        let err = TrackerError::TorrentDisabled("trumped: use v2 release".to_string());
        assert_eq!(err.wire_message(), "trumped: use v2 release");
    }
}
