//! HTTP client for the OceanGPT assistant backend
//!
//! The backend exposes three endpoints: `POST /chat`, `POST /upload_csv` and
//! `POST /reset`. Session state lives server-side behind a cookie, so a
//! single [`HttpBackend`] with a cookie store is shared by all three calls.

use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The network operations the conversation needs from a backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<ChatReply, BackendError>;

    /// Returns the server's confirmation text
    async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<String, BackendError>;

    async fn reset(&self) -> Result<(), BackendError>;
}

/// A decoded `/chat` reply: display text plus optional structured data
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub data: Option<Value>,
}

impl ChatReply {
    /// Decode the `response` field of a `/chat` body.
    ///
    /// The current backend sends `[text, data?]`; older versions send a bare
    /// string. A display element that is not a string is shown as JSON.
    pub fn from_response(response: Value) -> Self {
        match response {
            Value::Array(items) => {
                let mut items = items.into_iter();
                let text = items.next().map(display_text).unwrap_or_default();
                let data = items.next().filter(|d| !d.is_null());
                Self { text, data }
            }
            other => Self {
                text: display_text(other),
                data: None,
            },
        }
    }
}

fn display_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Value,
    #[serde(flatten)]
    status: StatusBody,
}

#[derive(Deserialize, Default)]
struct StatusBody {
    message: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

impl StatusBody {
    fn error_text(&self) -> Option<String> {
        match (&self.error, &self.details) {
            (Some(error), Some(details)) if !details.is_empty() => {
                Some(format!("{} ({})", error, details))
            }
            (Some(error), _) => Some(error.clone()),
            (None, _) => None,
        }
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success status into a server error, keeping the body's error text
    async fn check_status(response: Response) -> Result<Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body: StatusBody = response.json().await.unwrap_or_default();
        Err(BackendError::Server {
            status,
            message: body.error_text(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, prompt: &str) -> Result<ChatReply, BackendError> {
        let url = self.url("/chat");
        debug!(%url, "sending chat prompt");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { prompt })
            .send()
            .await?;
        let status = response.status().as_u16();
        let response = Self::check_status(response).await?;

        // A 2xx body can still carry an `error` field
        let body: ChatResponse = response.json().await?;
        if let Some(error) = body.status.error_text() {
            return Err(BackendError::Server {
                status,
                message: Some(error),
            });
        }
        Ok(ChatReply::from_response(body.response))
    }

    async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<String, BackendError> {
        let url = self.url("/upload_csv");
        debug!(%url, file_name, bytes = contents.len(), "uploading csv");

        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let response = Self::check_status(response).await?;

        let body: StatusBody = response.json().await?;
        if let Some(error) = body.error_text() {
            return Err(BackendError::Server {
                status,
                message: Some(error),
            });
        }
        Ok(body
            .message
            .unwrap_or_else(|| format!("Uploaded {}", file_name)))
    }

    async fn reset(&self) -> Result<(), BackendError> {
        let url = self.url("/reset");
        debug!(%url, "resetting server session");

        let response = self.client.post(&url).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
