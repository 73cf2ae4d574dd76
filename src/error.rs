use crate::ProblemDetails;

/// Status reserved for failures where no HTTP response was received.
pub const TRANSPORT_STATUS: u16 = 0;

/// Error type returned by this crate.
///
/// `status` is the HTTP status of the response, or [`TRANSPORT_STATUS`]
/// when the request never produced one (offline, DNS, TLS, timeout, abort).
/// A transport error never carries a [`ProblemDetails`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human readable message.
    pub message: String,
    /// HTTP status, `0` for transport failures.
    pub status: u16,
    /// Structured payload decoded from a JSON error body.
    pub problem: Option<ProblemDetails>,
}

/// Alias kept for call sites that name the error after the transport.
pub type HttpError = ApiError;

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            problem: None,
        }
    }

    /// Failure before any response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message, TRANSPORT_STATUS)
    }

    /// Builds the error for a non-success response carrying a problem body.
    ///
    /// The message is the problem `title`, then `detail`, then `fallback`.
    pub fn from_problem(status: u16, problem: ProblemDetails, fallback: &str) -> Self {
        if status == TRANSPORT_STATUS {
            return Self::transport(problem.summary().unwrap_or(fallback).to_owned());
        }
        Self {
            message: problem.summary().unwrap_or(fallback).to_owned(),
            status,
            problem: Some(problem),
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_ms: Option<u64>) -> Self {
        if err.is_timeout() {
            return match timeout_ms {
                Some(ms) => Self::transport(format!("Request timed out after {ms} ms")),
                None => Self::transport("Request timed out"),
            };
        }
        if err.is_builder() {
            return Self::transport(format!("Invalid request: {err}"));
        }
        Self::transport(format!("Network error: {err}"))
    }

    pub(crate) fn aborted() -> Self {
        Self::transport("Request aborted")
    }

    /// `true` when no response was received.
    pub fn is_transport(&self) -> bool {
        self.status == TRANSPORT_STATUS
    }

    /// `true` for failures that may succeed on an immediate retry:
    /// no response, 502, 503 or 504.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, TRANSPORT_STATUS | 502 | 503 | 504)
    }

    /// Validation messages for `field` from the attached problem.
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.problem
            .as_ref()
            .map(|problem| problem.field_errors(field))
            .unwrap_or(&[])
    }
}
