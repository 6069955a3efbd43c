//! Upstream failure classification.

use thiserror::Error;

use legisync_core::error::{AppError, ErrorKind};

/// Why an upstream call failed.
///
/// The class decides how callers react: gateway timeouts make vote syncs
/// fall back to day-by-day fetching, everything else is retried or skipped
/// as ordinary errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream gateway gave up waiting for its backend (HTTP 504).
    #[error("upstream gateway timeout on {endpoint}")]
    GatewayTimeout { endpoint: String },

    /// The client-side request timeout elapsed.
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// HTTP 429.
    #[error("rate limited on {endpoint} (retry after {retry_after_seconds:?}s)")]
    RateLimited {
        endpoint: String,
        retry_after_seconds: Option<u64>,
    },

    /// Any other non-success status.
    #[error("upstream returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// Connection-level failure.
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body did not match the expected shape.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The request could not be built.
    #[error("invalid request for {endpoint}: {message}")]
    InvalidRequest { endpoint: String, message: String },
}

impl UpstreamError {
    /// Whether the failure suggests the request was too large for the
    /// upstream to answer in time, so a smaller request may succeed.
    pub fn is_gateway_timeout(&self) -> bool {
        matches!(self, Self::GatewayTimeout { .. } | Self::Timeout { .. })
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(endpoint: &str, status: u16, retry_after_seconds: Option<u64>) -> Self {
        let endpoint = endpoint.to_string();
        match status {
            504 => Self::GatewayTimeout { endpoint },
            429 => Self::RateLimited {
                endpoint,
                retry_after_seconds,
            },
            _ => Self::Status { endpoint, status },
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::GatewayTimeout { .. } | Self::Timeout { .. } => ErrorKind::GatewayTimeout,
            Self::Decode { .. } => ErrorKind::Serialization,
            Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::RateLimited { .. } | Self::Status { .. } | Self::Transport { .. } => {
                ErrorKind::ExternalService
            }
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        let kind = err.kind();
        AppError::with_source(kind, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(UpstreamError::from_status("/votacoes", 504, None).is_gateway_timeout());
        assert!(matches!(
            UpstreamError::from_status("/votacoes", 429, Some(3)),
            UpstreamError::RateLimited { retry_after_seconds: Some(3), .. }
        ));
        assert!(!UpstreamError::from_status("/votacoes", 500, None).is_gateway_timeout());
    }

    #[test]
    fn test_app_error_keeps_class() {
        let timeout: AppError = UpstreamError::Timeout {
            endpoint: "/votacoes".into(),
        }
        .into();
        assert!(timeout.is_gateway_timeout());

        let server: AppError = UpstreamError::from_status("/proposicoes", 503, None).into();
        assert_eq!(server.kind, ErrorKind::ExternalService);
        assert!(!server.is_gateway_timeout());
    }
}
