use std::time::Duration;

use crate::{Credentials, RetryConfig, DEFAULT_TIMEOUT};

/// Environment variable that carries the API base URL.
pub const BASE_URL_ENV: &str = "CLINIC_API_BASE_URL";

/// Base URL captured from the environment when the crate was compiled.
pub const BUILD_TIME_BASE_URL: Option<&str> = option_env!("CLINIC_API_BASE_URL");

/// Storage keys read by [`crate::StorageContextProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageKeys {
    /// Clinic staff auth blob: `{"state": {"token", "user", "activeTenantId"}}`.
    pub clinic_auth: String,
    /// Patient portal tenant id, a plain string.
    pub patient_tenant: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            clinic_auth: "clinic-auth".to_owned(),
            patient_tenant: "patient-tenant-id".to_owned(),
        }
    }
}

/// Configuration shared by every request issued through one client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    /// Runtime base URL, consulted after a per-call override.
    pub base_url: Option<String>,
    /// Timeout applied when a call does not set its own.
    pub timeout: Duration,
    /// Credentials mode applied when a call does not set its own.
    pub credentials: Credentials,
    /// Policy used by `http_with_retry` when no policy is passed.
    pub retry: RetryConfig,
    pub storage_keys: StorageKeys,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            credentials: Credentials::default(),
            retry: RetryConfig::default(),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the base URL read from `CLINIC_API_BASE_URL`.
    ///
    /// A missing or blank variable leaves the runtime base URL unset, so
    /// resolution continues with the build-time value.
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_storage_keys(mut self, storage_keys: StorageKeys) -> Self {
        self.storage_keys = storage_keys;
        self
    }

    /// Base URL for a call: override, then runtime flag, then build time
    /// value, then empty.
    pub fn resolve_base_url<'a>(&'a self, override_url: Option<&'a str>) -> &'a str {
        override_url
            .or(self.base_url.as_deref())
            .or(BUILD_TIME_BASE_URL)
            .unwrap_or("")
    }

    /// Full target URL for `path`.
    pub fn resolve_url(&self, path: &str, override_url: Option<&str>) -> String {
        if is_absolute_url(path) {
            return path.to_owned();
        }
        join_url(self.resolve_base_url(override_url), path)
    }
}

/// `true` when `url` starts with a scheme followed by `://`.
pub fn is_absolute_url(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_owned();
    }
    if path.is_empty() {
        return base.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
