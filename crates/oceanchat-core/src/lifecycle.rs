//! Request lifecycle: one outstanding chat-or-upload call at a time
//!
//! Every operation is split in two so a UI loop can keep drawing while a
//! call is outstanding:
//!
//! 1. `begin_*` validates, flips the phase to in-flight and returns the
//!    optimistic message plus a [`PendingCall`].
//! 2. Awaiting the [`PendingCall`] runs the network call. It owns everything
//!    it needs, is `'static + Send` (spawnable), applies the request timeout
//!    and turns a panic inside the backend into an error, so it always
//!    resolves to a [`Completion`].
//! 3. [`RequestLifecycle::finish`] turns the completion into exactly one
//!    message and leaves the in-flight phase.

use crate::backend::{Backend, ChatReply};
use crate::classify::classify;
use crate::config::Config;
use crate::error::{BackendError, Rejection};
use crate::message::Message;
use futures_util::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Sending,
    Uploading,
    /// The last call failed. New calls are accepted just like in `Idle`.
    Failed,
}

impl Phase {
    pub fn in_flight(&self) -> bool {
        matches!(self, Phase::Sending | Phase::Uploading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Chat,
    Upload,
}

/// A CSV file chosen for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    source: UploadSource,
}

#[derive(Debug, Clone)]
enum UploadSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl UploadFile {
    /// The file is read when the upload runs, not here
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            source: UploadSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: UploadSource::Bytes(contents),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read(self) -> Result<(String, Vec<u8>), BackendError> {
        match self.source {
            UploadSource::Bytes(contents) => Ok((self.name, contents)),
            UploadSource::Path(path) => match tokio::fs::read(&path).await {
                Ok(contents) => Ok((self.name, contents)),
                Err(e) => Err(BackendError::File(format!("{}: {}", path.display(), e))),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Chat(Result<ChatReply, BackendError>),
    Upload {
        file_name: String,
        result: Result<String, BackendError>,
    },
}

/// The result of a finished [`PendingCall`], tagged with the session generation it was issued in
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    generation: u64,
    result: CallResult,
}

impl Completion {
    pub fn result(&self) -> &CallResult {
        &self.result
    }

    pub fn kind(&self) -> CallKind {
        match self.result {
            CallResult::Chat(_) => CallKind::Chat,
            CallResult::Upload { .. } => CallKind::Upload,
        }
    }
}

/// An issued chat or upload call. Await it (or spawn it) to get the [`Completion`].
#[must_use = "the call only runs when awaited or spawned"]
pub struct PendingCall {
    inner: BoxFuture<'static, Completion>,
}

impl Future for PendingCall {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Completion> {
        self.inner.as_mut().poll(cx)
    }
}

/// The server-side reset, already running on the tokio runtime.
///
/// Dropping it detaches the call; awaiting it resolves once the server
/// answered or the call failed.
pub struct PendingReset {
    task: JoinHandle<()>,
}

impl Future for PendingReset {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Err(err)) => {
                warn!(error = %err, "reset task ended abnormally");
                Poll::Ready(())
            }
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// What a finished call amounts to for the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: CallKind,
    pub succeeded: bool,
    pub message: Message,
}

pub struct RequestLifecycle {
    backend: Arc<dyn Backend>,
    timeout: Duration,
    upload_extension: String,
    phase: Phase,
    generation: u64,
}

impl RequestLifecycle {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            timeout: config.request_timeout(),
            upload_extension: config.upload_extension.to_lowercase(),
            phase: Phase::Idle,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_flight(&self) -> bool {
        self.phase.in_flight()
    }

    pub fn begin_send(&mut self, prompt: &str) -> Result<(Message, PendingCall), Rejection> {
        if prompt.trim().is_empty() {
            return Err(Rejection::EmptyPrompt);
        }
        if self.in_flight() {
            return Err(Rejection::Busy);
        }

        self.phase = Phase::Sending;
        info!(generation = self.generation, "sending message");

        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;
        let generation = self.generation;
        let prompt = prompt.to_string();
        let user_message = Message::user(prompt.clone());

        let inner = async move {
            let result = guarded(async move { backend.chat(&prompt).await }, timeout).await;
            Completion {
                generation,
                result: CallResult::Chat(result),
            }
        }
        .boxed();

        Ok((user_message, PendingCall { inner }))
    }

    pub fn begin_upload(&mut self, file: UploadFile) -> Result<(Message, PendingCall), Rejection> {
        if !file.name().to_lowercase().ends_with(&self.upload_extension) {
            return Err(Rejection::WrongExtension {
                file_name: file.name().to_string(),
                expected: self.upload_extension.clone(),
            });
        }
        if self.in_flight() {
            return Err(Rejection::Busy);
        }

        self.phase = Phase::Uploading;
        info!(generation = self.generation, file = file.name(), "uploading file");

        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;
        let generation = self.generation;
        let file_name = file.name().to_string();
        let notice = Message::system(format!("Uploading {}...", file_name));

        let inner = async move {
            let upload = async move {
                let (name, contents) = file.read().await?;
                backend.upload_csv(&name, contents).await
            };
            let result = guarded(upload, timeout).await;
            Completion {
                generation,
                result: CallResult::Upload { file_name, result },
            }
        }
        .boxed();

        Ok((notice, PendingCall { inner }))
    }

    /// Leave the in-flight phase and produce the message for a finished call.
    ///
    /// Completions of calls issued before the last reset return `None`.
    pub fn finish(&mut self, completion: Completion) -> Option<Outcome> {
        if completion.generation != self.generation {
            warn!(
                issued = completion.generation,
                current = self.generation,
                "discarding completion of a call issued before reset"
            );
            return None;
        }

        let kind = completion.kind();
        let (succeeded, message) = match completion.result {
            CallResult::Chat(Ok(reply)) => {
                let payload = classify(reply.data.as_ref());
                (true, Message::assistant(reply.text, payload))
            }
            CallResult::Chat(Err(err)) => {
                warn!(error = %err, "chat request failed");
                (false, Message::system(err.chat_notice()))
            }
            CallResult::Upload {
                file_name,
                result: Ok(text),
            } => {
                info!(file = %file_name, "upload accepted");
                (true, Message::system(text))
            }
            CallResult::Upload {
                file_name,
                result: Err(err),
            } => {
                warn!(file = %file_name, error = %err, "upload failed");
                (false, Message::system(err.upload_notice()))
            }
        };

        self.phase = if succeeded { Phase::Idle } else { Phase::Failed };
        Some(Outcome {
            kind,
            succeeded,
            message,
        })
    }

    /// Start a fresh session generation and issue the server-side reset.
    ///
    /// The call starts immediately on the tokio runtime. Local state never
    /// waits for it, and a failure is only logged. Must be called from
    /// within a tokio runtime.
    pub fn reset_session(&mut self) -> PendingReset {
        self.generation += 1;
        self.phase = Phase::Idle;
        info!(generation = self.generation, "session reset");

        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            match guarded(async move { backend.reset().await }, timeout).await {
                Ok(()) => debug!("server session reset"),
                Err(err) => warn!(error = %err, "server reset failed, local conversation cleared anyway"),
            }
        });
        PendingReset { task }
    }
}

/// Apply the timeout and turn a panic inside the call into an error
async fn guarded<T, F>(call: F, timeout: Duration) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match AssertUnwindSafe(tokio::time::timeout(timeout, call))
        .catch_unwind()
        .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(_elapsed)) => Err(BackendError::Timeout(timeout)),
        Err(panic) => Err(BackendError::Aborted(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in backend call".to_string()
    }
}
