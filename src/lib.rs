//! `clinic-http` is the async HTTP client layer for the clinic platform API.
//!
//! [`HttpClient`] centralizes the request lifecycle shared by every caller:
//! - correlation ids (`X-Request-ID`) and tenant/clinic/bearer headers
//! - timeout and caller-driven cancellation
//! - Problem Details error classification into [`ApiError`]
//! - bounded retry of transient failures ([`HttpClient::http_with_retry`])
//! - ambient auth context ([`HttpClient::http_with_auth`] and friends)
//! - multipart uploads with progress ([`HttpClient::upload_with_progress`])
//!
//! [`create_http_client`] wraps a client in a configured-instance facade.

mod client;
mod config;
mod context;
mod error;
mod facade;
mod headers;
mod options;
mod problem;
mod request_id;
mod response;
mod retry;
mod upload;

pub use client::HttpClient;
pub use config::{is_absolute_url, ClientConfig, StorageKeys, BASE_URL_ENV, BUILD_TIME_BASE_URL};
pub use context::{
    get_auth_token, get_clinic_id, get_tenant_id, AuthContext, AuthContextProvider, KeyValueStore,
    MemoryStore, StaticContext, StorageContextProvider,
};
pub use error::{ApiError, HttpError, TRANSPORT_STATUS};
pub use facade::{build_url, create_http_client, ApiRequest, FacadeConfig, StructuredClient};
pub use headers::{CLINIC_ID, REQUEST_ID, TENANT_ID};
pub use options::{Credentials, RequestOptions, RetryConfig, DEFAULT_TIMEOUT};
pub use problem::ProblemDetails;
pub use request_id::request_id;
pub use response::{ApiResponse, ResponseBody};
pub use retry::retry_with;
pub use upload::{UploadForm, UploadProgress, UPLOAD_CHUNK_SIZE};

pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ApiError>;
