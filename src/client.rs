use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    headers::{build_headers, HeaderParts},
    request_id::request_id,
    response::{classify, content_type},
    retry::retry_with,
    ApiError, ApiResponse, AuthContext, AuthContextProvider, ClientConfig, RequestOptions,
    Result, RetryConfig,
};

#[derive(Clone)]
/// HTTP client for the clinic platform API.
///
/// Every method performs independent requests; the client holds no
/// per-request state and is cheap to clone.
pub struct HttpClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
    pub(crate) context: Arc<dyn AuthContextProvider>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("context", &"<dyn AuthContextProvider>")
            .finish()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl HttpClient {
    /// Creates a client without ambient auth context.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            context: Arc::new(()),
        }
    }

    /// Creates a client configured from `CLINIC_API_BASE_URL`.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Sets the provider consulted by the `*_with_auth` methods.
    pub fn with_context<P: AuthContextProvider + 'static>(mut self, provider: P) -> Self {
        self.context = Arc::new(provider);
        self
    }

    /// Replaces the underlying `reqwest` client, e.g. to tune the pool.
    pub fn with_reqwest_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current ambient context from the configured provider.
    pub fn auth_context(&self) -> AuthContext {
        self.context.resolve()
    }

    /// Performs exactly one request and returns the decoded response.
    ///
    /// Non-success statuses become an [`ApiError`] carrying the decoded
    /// [`crate::ProblemDetails`] when the body is JSON. Failures without a
    /// response (network, timeout, cancellation) have status `0`. The
    /// request is abandoned when the timeout elapses or `opts.signal` is
    /// cancelled, whichever happens first.
    pub async fn http(&self, path: &str, opts: RequestOptions) -> Result<ApiResponse> {
        let request_id = request_id();
        let method = opts.resolved_method();
        let url = self.config.resolve_url(path, opts.base_url.as_deref());
        let timeout = opts.timeout.unwrap_or(self.config.timeout);
        let credentials = opts.credentials.unwrap_or(self.config.credentials);

        let headers = build_headers(&HeaderParts {
            request_id: &request_id,
            token: opts.token.as_deref(),
            clinic_id: opts.clinic_id.as_deref(),
            tenant_id: opts.tenant_id.as_deref(),
            accept_json: true,
            json_body: opts.body.is_some(),
            extra: &opts.headers,
            credentials,
        })?;

        let mut builder = self
            .http
            .request(method.clone(), url.as_str())
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = &opts.body {
            builder = builder.json(body);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %url, %request_id, "sending request");

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(&err, Some(millis(timeout))))?;
            let status = response.status();
            let content_type = content_type(response.headers());
            let body = response
                .text()
                .await
                .map_err(|err| ApiError::from_reqwest(&err, Some(millis(timeout))))?;
            classify(status, &content_type, &body)
        };

        let outcome = match &opts.signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(ApiError::aborted()),
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        };

        #[cfg(feature = "tracing")]
        match &outcome {
            Ok(response) => {
                tracing::debug!(%request_id, status = response.status, "request completed")
            }
            Err(err) => tracing::debug!(%request_id, status = err.status, error = %err, "request failed"),
        }

        outcome
    }

    /// Performs one request and deserializes the body into `T`.
    pub async fn request<T: DeserializeOwned>(&self, path: &str, opts: RequestOptions) -> Result<T> {
        self.http(path, opts).await?.decode()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, opts: RequestOptions) -> Result<T> {
        self.request(path, opts.method(Method::GET)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, opts.method(Method::POST).json(body)?).await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, opts.method(Method::PUT).json(body)?).await
    }

    pub async fn patch_json<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, opts.method(Method::PATCH).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, opts: RequestOptions) -> Result<T> {
        self.request(path, opts.method(Method::DELETE)).await
    }

    /// [`HttpClient::http`] retried with the configured [`RetryConfig`].
    pub async fn http_with_retry(&self, path: &str, opts: RequestOptions) -> Result<ApiResponse> {
        self.http_with_retry_policy(path, opts, &self.config.retry)
            .await
    }

    /// Retries only transient failures (status 0, 502, 503, 504); any
    /// other error is returned from the first attempt.
    pub async fn http_with_retry_policy(
        &self,
        path: &str,
        opts: RequestOptions,
        policy: &RetryConfig,
    ) -> Result<ApiResponse> {
        retry_with(policy, || self.http(path, opts.clone())).await
    }

    /// [`HttpClient::http`] with the ambient context applied.
    ///
    /// Ambient token, clinic and tenant values win when present; the
    /// explicit values on `opts` only fill the gaps.
    pub async fn http_with_auth(&self, path: &str, opts: RequestOptions) -> Result<ApiResponse> {
        self.http(path, self.with_ambient_context(opts)).await
    }

    pub async fn get_with_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T> {
        self.get_json(path, self.with_ambient_context(opts)).await
    }

    pub async fn post_with_auth<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post_json(path, body, self.with_ambient_context(opts))
            .await
    }

    pub async fn put_with_auth<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.put_json(path, body, self.with_ambient_context(opts))
            .await
    }

    pub async fn patch_with_auth<T, B>(&self, path: &str, body: &B, opts: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.patch_json(path, body, self.with_ambient_context(opts))
            .await
    }

    pub async fn delete_with_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T> {
        self.delete(path, self.with_ambient_context(opts)).await
    }

    pub(crate) fn with_ambient_context(&self, mut opts: RequestOptions) -> RequestOptions {
        let ambient = self.context.resolve();
        opts.token = ambient.token.or(opts.token);
        opts.clinic_id = ambient.clinic_id.or(opts.clinic_id);
        opts.tenant_id = ambient.tenant_id.or(opts.tenant_id);
        opts
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::HttpClient;
    use crate::{AuthContext, AuthContextProvider, ClientConfig, RequestOptions, StaticContext};

    struct CountingContext(Arc<AtomicUsize>);

    impl AuthContextProvider for CountingContext {
        fn resolve(&self) -> AuthContext {
            self.0.fetch_add(1, Ordering::SeqCst);
            AuthContext {
                token: Some("secret-token".to_owned()),
                ..AuthContext::default()
            }
        }
    }

    #[test]
    fn ambient_context_wins_over_explicit_values() {
        let client = HttpClient::new(ClientConfig::default()).with_context(StaticContext(
            AuthContext {
                token: Some("ambient-token".to_owned()),
                clinic_id: None,
                tenant_id: Some("ambient-tenant".to_owned()),
            },
        ));

        let opts = client.with_ambient_context(
            RequestOptions::new()
                .token("explicit-token")
                .clinic_id("explicit-clinic")
                .tenant_id("explicit-tenant"),
        );

        assert_eq!(opts.token.as_deref(), Some("ambient-token"));
        assert_eq!(opts.clinic_id.as_deref(), Some("explicit-clinic"));
        assert_eq!(opts.tenant_id.as_deref(), Some("ambient-tenant"));
    }

    #[test]
    fn debug_does_not_resolve_ambient_context() {
        let resolved = Arc::new(AtomicUsize::new(0));
        let client = HttpClient::default().with_context(CountingContext(Arc::clone(&resolved)));

        let debug = format!("{client:?}");
        assert!(debug.contains("context: \"<dyn AuthContextProvider>\""));
        assert!(!debug.contains("secret-token"));
        assert_eq!(resolved.load(Ordering::SeqCst), 0);
    }
}
