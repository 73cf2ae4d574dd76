use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::{ApiError, ProblemDetails, Result};

const FALLBACK_MESSAGE: &str = "Request failed";

/// Decoded success body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// `204 No Content`, or a response without a content type.
    Empty,
    /// Body of a JSON response.
    Json(JsonValue),
    /// Body of any other response, verbatim.
    Text(String),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Empty => JsonValue::Null,
            Self::Json(value) => value,
            Self::Text(text) => JsonValue::String(text),
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// An empty body decodes as JSON `null` (so `()` and `Option<T>` fit),
    /// a text body as a JSON string.
    pub fn decode<T: DeserializeOwned>(self, status: u16) -> Result<T> {
        serde_json::from_value(self.into_json()).map_err(|err| {
            ApiError::new(format!("Unexpected response body: {err}"), status)
        })
    }
}

/// Decoded response: status plus body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        self.body.decode(self.status)
    }
}

pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

pub(crate) fn content_type(headers: &header::HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Classifies a fully read response into a body or an [`ApiError`].
pub(crate) fn classify(status: StatusCode, content_type: &str, body: &str) -> Result<ApiResponse> {
    let code = status.as_u16();
    if !status.is_success() {
        return Err(error_from_body(status, content_type, body));
    }

    if status == StatusCode::NO_CONTENT || content_type.is_empty() {
        return Ok(ApiResponse {
            status: code,
            body: ResponseBody::Empty,
        });
    }

    let body = if is_json_content_type(content_type) {
        let value = serde_json::from_str::<JsonValue>(body).map_err(|err| {
            ApiError::new(format!("Invalid JSON in response body: {err}"), code)
        })?;
        ResponseBody::Json(value)
    } else {
        ResponseBody::Text(body.to_owned())
    };
    Ok(ApiResponse { status: code, body })
}

fn error_from_body(status: StatusCode, content_type: &str, body: &str) -> ApiError {
    let code = status.as_u16();
    if is_json_content_type(content_type) {
        if let Ok(problem) = serde_json::from_str::<ProblemDetails>(body) {
            return ApiError::from_problem(code, problem, FALLBACK_MESSAGE);
        }
    }
    let message = status.canonical_reason().unwrap_or(FALLBACK_MESSAGE);
    ApiError::new(message, code)
}
