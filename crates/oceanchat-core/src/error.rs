//! Error types for the chat client.

use std::time::Duration;

/// Failures of a network call to the assistant backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// Non-success status, or a success status carrying an `error` field
    #[error("server error {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("could not read file: {0}")]
    File(String),
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl BackendError {
    /// Text shown to the user when a chat message fails
    pub fn chat_notice(&self) -> String {
        match self {
            BackendError::Server {
                message: Some(message),
                ..
            } => format!("Error: {}", message),
            BackendError::Server { message: None, .. } => {
                "Error: Failed to get a response from the server".to_string()
            }
            BackendError::Transport(_) | BackendError::Decode(_) => {
                "Error: Failed to connect to the server".to_string()
            }
            BackendError::Timeout(after) => format!(
                "Error: The server did not respond within {}s",
                after.as_secs()
            ),
            BackendError::File(reason) => format!("Error: {}", reason),
            BackendError::Aborted(_) => "Error: The request stopped unexpectedly".to_string(),
        }
    }

    /// Text shown to the user when a CSV upload fails
    pub fn upload_notice(&self) -> String {
        match self {
            BackendError::Server {
                message: Some(message),
                ..
            } => format!("Upload failed: {}", message),
            BackendError::Server { message: None, .. } => {
                "Upload failed: the server rejected the file".to_string()
            }
            BackendError::Transport(_) | BackendError::Decode(_) => {
                "Upload failed: could not connect to the server".to_string()
            }
            BackendError::Timeout(after) => format!(
                "Upload failed: the server did not respond within {}s",
                after.as_secs()
            ),
            BackendError::File(reason) => format!("Upload failed: {}", reason),
            BackendError::Aborted(_) => "Upload failed: the request stopped unexpectedly".to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Why a submission was turned away before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("message cannot be empty")]
    EmptyPrompt,
    #[error("another request is still in flight")]
    Busy,
    #[error("{file_name} is not a {expected} file")]
    WrongExtension { file_name: String, expected: String },
}

impl Rejection {
    /// Notice appended to the transcript, if this rejection warrants one
    pub fn notice(&self) -> Option<String> {
        match self {
            Rejection::WrongExtension { file_name, expected } => Some(format!(
                "Please upload a CSV file ({} is not a {} file)",
                file_name, expected
            )),
            Rejection::EmptyPrompt | Rejection::Busy => None,
        }
    }
}
