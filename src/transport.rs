//! The transport seam.
//!
//! Everything above this module talks to the server through [`Transport`]:
//! one call in, one `{status, body}` pair out. Interpreting the status is
//! the normalizer's job ([`crate::normalize`]); a transport only fails when
//! the server could not be reached at all.
//!
//! [`ReqwestTransport`] is the production implementation. Tests substitute
//! scripted implementations of the trait.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::{ClientOptions, EffectiveConfig};
use crate::error::{require_non_empty, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// A single file sent as multipart form field `file`.
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// One call against the API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: &impl Serialize) -> Result<Self> {
        let path = path.into();
        let value = serde_json::to_value(body).map_err(|e| {
            Error::InvalidInput(format!("cannot encode request body for {path}: {e}"))
        })?;
        Ok(Self {
            method: Method::Post,
            path,
            body: RequestBody::Json(value),
        })
    }

    pub fn upload(
        path: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: RequestBody::File {
                file_name: file_name.into(),
                content_type: content_type.into(),
                bytes,
            },
        }
    }

    /// The JSON body, if this request carries one.
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Percent-encodes a caller-supplied id for use as one path segment.
///
/// `.` and `..` are refused outright: URL resolution treats them as
/// relative steps even when their dots are encoded.
pub(crate) fn path_segment(name: &str, value: &str) -> Result<String> {
    require_non_empty(name, value)?;
    if value == "." || value == ".." {
        return Err(Error::InvalidInput(format!("{name} must not be '{value}'")));
    }
    Ok(urlencoding::encode(value).into_owned())
}

/// Status code and undecoded body of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Convenience constructor for a JSON response.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs API calls.
///
/// Implementations must not retry and must not interpret status codes.
/// Return [`Error::Connection`] only when no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<RawResponse>;
}

/// HTTP transport backed by `reqwest` with bearer-token auth.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(config: &EffectiveConfig, options: &ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| Error::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.server_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn call(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!(method = %request.method, %url, "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        }
        .header("Authorization", format!("Bearer {}", self.api_key))
        .header("Accept", "application/json");

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File {
                file_name,
                content_type,
                bytes,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| {
                        Error::InvalidInput(format!("bad content type '{content_type}': {e}"))
                    })?;
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        let response = builder.send().await.map_err(|e| connection_error(&url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| connection_error(&url, e))?;

        tracing::debug!(status, bytes = body.len(), %url, "received response");
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

fn connection_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Connection(format!("request to {url} timed out"))
    } else if e.is_connect() {
        Error::Connection(format!("cannot connect to {url}: {e}"))
    } else {
        Error::Connection(format!("request to {url} failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_json_encodes_body() {
        let req = ApiRequest::post_json("/api/v1/folders/", &json!({"name": "x"})).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.json(), Some(&json!({"name": "x"})));
    }

    #[test]
    fn test_path_segment_stays_inside_one_segment() {
        assert_eq!(path_segment("chat id", "c1").unwrap(), "c1");
        assert_eq!(
            path_segment("chat id", "../folders/f1").unwrap(),
            "..%2Ffolders%2Ff1"
        );
        assert_eq!(path_segment("file id", "a b?x#y").unwrap(), "a%20b%3Fx%23y");
        assert!(matches!(
            path_segment("chat id", ".."),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            path_segment("chat id", " "),
            Err(Error::InvalidInput(_))
        ));

        let url = reqwest::Url::parse(&format!(
            "http://localhost/api/v1/chats/{}",
            path_segment("chat id", "../folders/f1").unwrap()
        ))
        .unwrap();
        assert_eq!(url.path(), "/api/v1/chats/..%2Ffolders%2Ff1");
    }

    #[test]
    fn test_raw_response_helpers() {
        let resp = RawResponse::json(200, &json!({"ok": true}));
        assert!(resp.is_success());
        assert_eq!(resp.text(), r#"{"ok":true}"#);
        assert!(!RawResponse::new(404, "").is_success());
    }

    #[test]
    fn test_reqwest_transport_keeps_base_url() {
        let config = EffectiveConfig {
            server_url: "http://localhost:1".into(),
            api_key: "k".into(),
        };
        let transport = ReqwestTransport::new(&config, &ClientOptions::default()).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:1");
    }
}
