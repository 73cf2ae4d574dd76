//! Configured-instance adapter over [`HttpClient`].

use reqwest::Method;
use serde_json::Value as JsonValue;
use url::form_urlencoded;

use crate::{config::join_url, ApiResponse, Credentials, HttpClient, RequestOptions, Result};

/// Values bound once for a [`StructuredClient`].
#[derive(Clone, Debug, Default)]
pub struct FacadeConfig {
    pub base_url: String,
    /// Sent with every request; per-request headers replace them by name.
    pub headers: Vec<(String, String)>,
}

impl FacadeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A single facade request.
#[derive(Clone, Debug, Default)]
pub struct ApiRequest {
    pub url: String,
    /// Inferred from `data` when unset.
    pub method: Option<Method>,
    /// Query parameters in order; `null` values are skipped.
    pub params: Vec<(String, JsonValue)>,
    pub data: Option<JsonValue>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Client with a base URL and default headers bound at construction.
#[derive(Clone, Debug)]
pub struct StructuredClient {
    client: HttpClient,
    config: FacadeConfig,
}

/// Creates a [`StructuredClient`] on top of `client`.
pub fn create_http_client(client: HttpClient, config: FacadeConfig) -> StructuredClient {
    StructuredClient { client, config }
}

impl StructuredClient {
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Sends `request` through [`HttpClient::http`].
    ///
    /// The URL is fully resolved here, so the client base URL is bypassed,
    /// and credentials are always included.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = build_url(&self.config.base_url, &request.url, &request.params);

        let mut opts = RequestOptions::new()
            .base_url("")
            .credentials(Credentials::Include);
        opts.method = request.method;
        opts.body = request.data;
        opts.headers = self.config.headers.clone();
        opts.headers.extend(request.headers);

        self.client.http(&url, opts).await
    }
}

/// Joins `base` and `path` and appends the serialized `params`.
pub fn build_url(base: &str, path: &str, params: &[(String, JsonValue)]) -> String {
    let mut url = if crate::config::is_absolute_url(path) {
        path.to_owned()
    } else {
        join_url(base, path)
    };

    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (name, value) in params {
        if let Some(value) = query_value(value) {
            query.append_pair(name, &value);
            any = true;
        }
    }
    if any {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.finish());
    }
    url
}

fn query_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .map(|item| query_value(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        JsonValue::Object(_) => Some(value.to_string()),
    }
}
