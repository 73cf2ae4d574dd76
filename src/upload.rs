//! Multipart uploads with progress reporting.
//!
//! Uploads bypass [`HttpClient::http`]: byte parts are streamed in chunks
//! so progress can be reported as the transport consumes the body.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};

use crate::{
    client::millis,
    headers::{build_headers, HeaderParts},
    request_id::request_id,
    ApiError, HttpClient, ProblemDetails, RequestOptions, ResponseBody, Result,
};

/// Size of the chunks byte parts are streamed in.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Progress of an upload in flight.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UploadProgress {
    /// `loaded / total` as a rounded percentage.
    pub percent: u8,
    pub loaded: u64,
    pub total: u64,
}

enum FormPart {
    Text {
        name: String,
        value: String,
    },
    Bytes {
        name: String,
        data: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

/// Multipart form body for [`HttpClient::upload_with_progress`].
#[derive(Default)]
pub struct UploadForm {
    parts: Vec<FormPart>,
}

impl fmt::Debug for UploadForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for part in &self.parts {
            let entry = match part {
                FormPart::Text { name, .. } => format!("text({name})"),
                FormPart::Bytes { name, data, .. } => format!("bytes({name}, {} bytes)", data.len()),
            };
            list.entry(&entry);
        }
        list.finish()
    }
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::Bytes {
            name: name.into(),
            data: data.into(),
            file_name: Some(file_name.into()),
            mime: None,
        });
        self
    }

    /// Adds a byte part with an explicit MIME type, e.g. `application/pdf`.
    pub fn file_with_mime(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::Bytes {
            name: name.into(),
            data: data.into(),
            file_name: Some(file_name.into()),
            mime: Some(mime.into()),
        });
        self
    }

    /// Bytes reported as the progress total.
    pub fn total_bytes(&self) -> u64 {
        self.parts
            .iter()
            .map(|part| match part {
                FormPart::Bytes { data, .. } => data.len() as u64,
                FormPart::Text { .. } => 0,
            })
            .sum()
    }

    fn into_form(self, tracker: &Arc<ProgressTracker>) -> Result<Form> {
        let mut form = Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::Bytes {
                    name,
                    data,
                    file_name,
                    mime,
                } => {
                    let mut part = tracked_part(data, Arc::clone(tracker));
                    if let Some(file_name) = file_name {
                        part = part.file_name(file_name);
                    }
                    if let Some(mime) = mime {
                        part = part.mime_str(&mime).map_err(|err| {
                            ApiError::transport(format!("Invalid MIME type '{mime}': {err}"))
                        })?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

struct ProgressTracker {
    loaded: AtomicU64,
    total: u64,
    on_progress: ProgressCallback,
}

impl ProgressTracker {
    fn advance(&self, bytes: usize) {
        let loaded = self.loaded.fetch_add(bytes as u64, Ordering::SeqCst) + bytes as u64;
        // Without a total no meaningful percentage exists.
        if self.total == 0 {
            return;
        }
        (self.on_progress)(UploadProgress {
            percent: percent(loaded, self.total),
            loaded,
            total: self.total,
        });
    }
}

fn percent(loaded: u64, total: u64) -> u8 {
    let ratio = loaded.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

fn tracked_part(data: Bytes, tracker: Arc<ProgressTracker>) -> Part {
    let length = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();
    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        tracker.advance(chunk.len());
        Ok::<_, std::io::Error>(chunk)
    }));
    Part::stream_with_length(Body::wrap_stream(body), length)
}

impl HttpClient {
    /// POSTs `form` as multipart, calling `on_progress` as byte parts are sent.
    ///
    /// The ambient context is applied like the `*_with_auth` methods and a
    /// correlation id is attached; the multipart encoder sets the content
    /// type. `opts.method` and `opts.body` are ignored. Only an explicit
    /// `opts.timeout` bounds the upload.
    ///
    /// Success bodies are decoded as JSON when possible, otherwise kept as
    /// text. Non-success responses carry the decoded problem when the body
    /// is one; failures without a response have status `0`.
    pub async fn upload_with_progress<F>(
        &self,
        path: &str,
        form: UploadForm,
        opts: RequestOptions,
        on_progress: F,
    ) -> Result<ResponseBody>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let opts = self.with_ambient_context(opts);
        let request_id = request_id();
        let url = self.config.resolve_url(path, opts.base_url.as_deref());
        let credentials = opts.credentials.unwrap_or(self.config.credentials);

        let headers = build_headers(&HeaderParts {
            request_id: &request_id,
            token: opts.token.as_deref(),
            clinic_id: opts.clinic_id.as_deref(),
            tenant_id: opts.tenant_id.as_deref(),
            accept_json: true,
            json_body: false,
            extra: &opts.headers,
            credentials,
        })?;

        let tracker = Arc::new(ProgressTracker {
            loaded: AtomicU64::new(0),
            total: form.total_bytes(),
            on_progress: Arc::new(on_progress),
        });
        let form = form.into_form(&tracker)?;

        let mut builder = self.http.post(url.as_str()).headers(headers).multipart(form);
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        let timeout_ms = opts.timeout.map(millis);

        #[cfg(feature = "tracing")]
        tracing::debug!(%url, %request_id, total = tracker.total, "starting upload");

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(&err, timeout_ms))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| ApiError::from_reqwest(&err, timeout_ms))?;
            classify_upload(status, &body)
        };

        match &opts.signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(ApiError::aborted()),
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        }
    }
}

fn classify_upload(status: StatusCode, body: &str) -> Result<ResponseBody> {
    let code = status.as_u16();
    if !status.is_success() {
        let fallback = format!("Upload failed with status {code}");
        return Err(match serde_json::from_str::<ProblemDetails>(body) {
            Ok(problem) => ApiError::from_problem(code, problem, &fallback),
            Err(_) => ApiError::new(fallback, code),
        });
    }
    if body.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    Ok(match serde_json::from_str(body) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Text(body.to_owned()),
    })
}
