//! Error taxonomy for backend calls.
//!
//! Handlers branch on these variants to pick user-facing messages, so the
//! split matters: connectivity problems, missing records, field validation
//! failures, and everything else are distinct cases.

use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// One failed backend call.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend could not be reached at all.
    #[error("backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The backend did not answer within the request deadline.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// The requested record does not exist.
    #[error("record not found")]
    NotFound,

    /// The backend rejected the request payload.
    #[error("{message}")]
    Validation {
        message: String,
        /// Per-field details keyed by field name, ordered for stable output.
        data: BTreeMap<String, FieldError>,
    },

    /// Any other non-success response.
    #[error("backend returned {status}: {message}")]
    Unexpected { status: StatusCode, message: String },

    /// The response body could not be decoded.
    #[error("invalid backend response: {0}")]
    Decode(#[source] reqwest::Error),

    /// The realtime channel broke protocol.
    #[error("realtime protocol error: {0}")]
    Protocol(String),
}

/// Detail for a single rejected field.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FieldError {
    #[serde(default)]
    pub code: String,
    pub message: String,
}

/// Error payload the backend sends alongside non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,

    #[serde(default)]
    data: BTreeMap<String, FieldError>,
}

impl Error {
    /// Map a non-success response to an error, consuming the body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::BAD_REQUEST => Self::Validation {
                message: if body.message.is_empty() {
                    "Bad request".to_string()
                } else {
                    body.message
                },
                data: body.data,
            },
            status => Self::Unexpected {
                status,
                message: if body.message.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string()
                } else {
                    body.message
                },
            },
        }
    }

    /// Status to answer with when relaying this error over HTTP.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) | Self::Decode(_) | Self::Protocol(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unexpected { status, .. } => *status,
        }
    }

    /// Whether the failure is a connectivity problem rather than a verdict
    /// from the backend.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}
