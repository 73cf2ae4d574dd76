use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{ApiError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Whether cookies travel with the request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Credentials {
    /// Send cookies, including cross origin.
    #[default]
    Include,
    /// Send cookies for same-origin targets only.
    SameOrigin,
    /// Never send cookies; a caller supplied `Cookie` header is stripped.
    Omit,
}

/// Per-call request descriptor.
///
/// Built fresh for every request; unset fields fall back to the client
/// configuration when the request is executed.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub tenant_id: Option<String>,
    pub clinic_id: Option<String>,
    pub token: Option<String>,
    pub signal: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    pub base_url: Option<String>,
    pub credentials: Option<Credentials>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("tenant_id", &self.tenant_id)
            .field("clinic_id", &self.clinic_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("signal", &self.signal.is_some())
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header. Caller headers are applied after the defaults and
    /// replace any default with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body from an already built value.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` into the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::transport(format!("Invalid request body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn clinic_id(mut self, clinic_id: impl Into<String>) -> Self {
        self.clinic_id = Some(clinic_id.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Cancels the request when `signal` is cancelled.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the base URL for this call only.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Explicit method, otherwise `POST` with a body and `GET` without.
    pub(crate) fn resolved_method(&self) -> Method {
        match (&self.method, &self.body) {
            (Some(method), _) => method.clone(),
            (None, Some(_)) => Method::POST,
            (None, None) => Method::GET,
        }
    }
}

/// Retry policy for transient failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub retries: usize,
    /// Base backoff; retry `i` waits `backoff * (i + 1)`.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(300),
        }
    }
}

impl RetryConfig {
    pub fn new(retries: usize, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Delay before retry number `attempt` (zero based); linear in `attempt`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt.saturating_add(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}
