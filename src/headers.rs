use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::{ApiError, Credentials, Result};

pub const REQUEST_ID: &str = "x-request-id";
pub const CLINIC_ID: &str = "x-clinic-id";
pub const TENANT_ID: &str = "x-tenant-id";

/// Inputs for the default request headers.
#[derive(Debug, Default)]
pub(crate) struct HeaderParts<'a> {
    pub request_id: &'a str,
    pub token: Option<&'a str>,
    pub clinic_id: Option<&'a str>,
    pub tenant_id: Option<&'a str>,
    pub accept_json: bool,
    /// Uploads leave the content type to the multipart encoder.
    pub json_body: bool,
    pub extra: &'a [(String, String)],
    pub credentials: Credentials,
}

/// Builds the outgoing header map. Caller supplied `extra` headers are
/// applied last and replace defaults of the same name.
pub(crate) fn build_headers(parts: &HeaderParts<'_>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if parts.accept_json {
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    }
    if parts.json_body {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    headers.insert(REQUEST_ID, header_value(REQUEST_ID, parts.request_id)?);
    if let Some(tenant_id) = parts.tenant_id {
        headers.insert(TENANT_ID, header_value(TENANT_ID, tenant_id)?);
    }
    if let Some(clinic_id) = parts.clinic_id {
        headers.insert(CLINIC_ID, header_value(CLINIC_ID, clinic_id)?);
    }
    if let Some(token) = parts.token {
        let mut value = header_value("authorization", &bearer(token))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    for (name, value) in parts.extra {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ApiError::transport(format!("Invalid header name '{name}': {err}")))?;
        headers.insert(header_name, header_value(name, value)?);
    }

    if parts.credentials == Credentials::Omit {
        headers.remove(header::COOKIE);
    }
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| ApiError::transport(format!("Invalid value for header '{name}': {err}")))
}

/// `Authorization` value for `token`; adds the `Bearer ` prefix when missing.
pub(crate) fn bearer(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
