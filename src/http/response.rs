//! Response variants returned by handlers.
//!
//! # Responsibilities
//! - Polymorphic `ApiResponse`: anything that can write itself to the client
//! - JSON envelope (`session`, `errors`, plus handler fields)
//! - Binary download and redirect variants
//! - Wrap raw handler data into the default JSON envelope

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

/// A response a handler can return directly.
pub trait ApiResponse: Send {
    /// Write headers, status and body.
    fn write(self: Box<Self>) -> Response;
}

/// What a handler produces: a finished response or raw data.
pub enum Payload {
    Response(Box<dyn ApiResponse>),
    Data(Value),
}

impl Payload {
    /// Turn the payload into an HTTP response. Raw data becomes the `data`
    /// field of a default JSON envelope.
    pub fn into_http(self) -> Response {
        match self {
            Payload::Response(r) => r.write(),
            Payload::Data(v) => {
                let mut envelope = JsonResponse::new();
                envelope.set("data", v);
                Box::new(envelope).write()
            }
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Response(_) => f.write_str("Payload::Response(..)"),
            Payload::Data(v) => f.debug_tuple("Payload::Data").field(v).finish(),
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Data(v)
    }
}

impl From<JsonResponse> for Payload {
    fn from(r: JsonResponse) -> Self {
        Payload::Response(Box::new(r))
    }
}

impl From<BlobResponse> for Payload {
    fn from(r: BlobResponse) -> Self {
        Payload::Response(Box::new(r))
    }
}

impl From<RedirectResponse> for Payload {
    fn from(r: RedirectResponse) -> Self {
        Payload::Response(Box::new(r))
    }
}

/// Status and headers shared by every variant.
#[derive(Debug, Clone)]
struct BaseResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl BaseResponse {
    fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
        }
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value));
    }

    fn apply(self, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.insert(name, value);
        }
        response
    }
}

/// A JSON document. The body always carries `session` (default `true`) and
/// `errors` (default empty).
#[derive(Debug, Clone)]
pub struct JsonResponse {
    base: BaseResponse,
    data: Map<String, Value>,
    errors: Vec<String>,
}

impl JsonResponse {
    pub fn new() -> Self {
        let mut base = BaseResponse::new();
        base.set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut data = Map::new();
        data.insert("session".into(), Value::Bool(true));

        Self {
            base,
            data,
            errors: Vec::new(),
        }
    }

    /// Add or replace a field in the body.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        if key == "errors" {
            self.errors = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                Value::Null => Vec::new(),
                other => vec![other.to_string()],
            };
        } else {
            self.data.insert(key, value);
        }
        self
    }

    /// Mark whether the client's session is still valid.
    pub fn set_session(&mut self, valid: bool) -> &mut Self {
        self.data.insert("session".into(), Value::Bool(valid));
        self
    }

    pub fn append_error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    /// Append `err` and switch the status to 500, if there is an error.
    pub fn append_error_500<E: std::fmt::Display>(&mut self, err: Option<E>) -> &mut Self {
        if let Some(err) = err {
            self.base.status = StatusCode::INTERNAL_SERVER_ERROR;
            self.errors.push(err.to_string());
        }
        self
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.base.status = status;
        self
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.base.set_header(name, value);
        self
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The body as it will be serialized.
    pub fn body(&self) -> Value {
        let mut body = self.data.clone();
        body.insert(
            "errors".into(),
            Value::Array(self.errors.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(body)
    }
}

impl Default for JsonResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiResponse for JsonResponse {
    fn write(self: Box<Self>) -> Response {
        let body = match serde_json::to_vec(&self.body()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode JSON response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        self.base.apply(Body::from(body))
    }
}

/// A binary download.
#[derive(Debug, Clone)]
pub struct BlobResponse {
    base: BaseResponse,
    blob: Vec<u8>,
}

impl BlobResponse {
    pub fn new(blob: impl Into<Vec<u8>>, mime_type: &str, file_name: &str) -> Self {
        let mut base = BaseResponse::new();
        let content_type = HeaderValue::from_str(mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        base.set_header(header::CONTENT_TYPE, content_type);

        let disposition = format!("attachment; filename={:?}", file_name);
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            base.set_header(header::CONTENT_DISPOSITION, value);
        }

        Self {
            base,
            blob: blob.into(),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.base.status = status;
        self
    }
}

impl ApiResponse for BlobResponse {
    fn write(self: Box<Self>) -> Response {
        let this = *self;
        this.base.apply(Body::from(this.blob))
    }
}

/// A redirect to `location`.
#[derive(Debug, Clone)]
pub struct RedirectResponse {
    base: BaseResponse,
}

impl RedirectResponse {
    pub fn new(location: &str, status: StatusCode) -> Self {
        let mut base = BaseResponse::new();
        base.status = status;
        if let Ok(value) = HeaderValue::from_str(location) {
            base.set_header(header::LOCATION, value);
        }
        Self { base }
    }

    /// `307 Temporary Redirect`.
    pub fn temporary(location: &str) -> Self {
        Self::new(location, StatusCode::TEMPORARY_REDIRECT)
    }
}

impl ApiResponse for RedirectResponse {
    fn write(self: Box<Self>) -> Response {
        self.base.apply(Body::empty())
    }
}
