//! Conversation controller: the single entry point for a presentation layer
//!
//! The controller owns the session (transcript, attached file) and is the
//! only caller of the [`RequestLifecycle`]. The transcript changes only as a
//! result of lifecycle outcomes and resets.

use crate::backend::Backend;
use crate::config::Config;
use crate::lifecycle::{CallKind, Completion, PendingCall, PendingReset, Phase, RequestLifecycle, UploadFile};
use crate::message::Message;
use crate::transcript::Transcript;
use std::sync::Arc;
use tracing::debug;

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct ConversationView<'a> {
    pub messages: &'a [Message],
    pub in_flight: bool,
    pub phase: Phase,
    /// Name of the CSV attached to this session, if any
    pub attached_file: Option<&'a str>,
}

pub struct ConversationController {
    transcript: Transcript,
    pending_upload: Option<String>,
    lifecycle: RequestLifecycle,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            transcript: Transcript::new(),
            pending_upload: None,
            lifecycle: RequestLifecycle::new(backend, config),
        }
    }

    pub fn current_view(&self) -> ConversationView<'_> {
        ConversationView {
            messages: self.transcript.snapshot(),
            in_flight: self.lifecycle.in_flight(),
            phase: self.lifecycle.phase(),
            attached_file: self.pending_upload.as_deref(),
        }
    }

    /// Send a message and wait for the reply. Returns `false` when the
    /// message was rejected (blank, or another call in flight).
    pub async fn submit_message(&mut self, text: &str) -> bool {
        let Some(call) = self.begin_message(text) else {
            return false;
        };
        let completion = call.await;
        self.finish(completion);
        true
    }

    /// Upload a CSV and wait for the server's answer. Returns `false` when
    /// the file was rejected before any network call.
    pub async fn submit_file(&mut self, file: UploadFile) -> bool {
        let Some(call) = self.begin_upload(file) else {
            return false;
        };
        let completion = call.await;
        self.finish(completion);
        true
    }

    /// Clear the conversation right away and issue the server-side reset.
    ///
    /// The reset call is already running when this returns. The local clear
    /// never depends on it; await the handle to wait for the server, or drop
    /// it to let the call finish in the background.
    pub fn reset(&mut self) -> PendingReset {
        let call = self.lifecycle.reset_session();
        self.transcript.clear();
        self.pending_upload = None;
        call
    }

    /// Append the user message and return the chat call to run
    pub fn begin_message(&mut self, text: &str) -> Option<PendingCall> {
        match self.lifecycle.begin_send(text) {
            Ok((message, call)) => {
                self.transcript.append(message);
                Some(call)
            }
            Err(rejection) => {
                debug!(%rejection, "message not sent");
                None
            }
        }
    }

    /// Attach a file and return the upload call to run
    pub fn begin_upload(&mut self, file: UploadFile) -> Option<PendingCall> {
        let file_name = file.name().to_string();
        match self.lifecycle.begin_upload(file) {
            Ok((notice, call)) => {
                self.pending_upload = Some(file_name);
                self.transcript.append(notice);
                Some(call)
            }
            Err(rejection) => {
                debug!(%rejection, "upload not started");
                if let Some(notice) = rejection.notice() {
                    self.transcript.append(Message::system(notice));
                }
                None
            }
        }
    }

    /// Record the outcome of a call started with `begin_message` or `begin_upload`
    pub fn finish(&mut self, completion: Completion) {
        let Some(outcome) = self.lifecycle.finish(completion) else {
            return;
        };
        if outcome.kind == CallKind::Upload && !outcome.succeeded {
            self.pending_upload = None;
        }
        self.transcript.append(outcome.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatReply;
    use crate::error::BackendError;
    use crate::message::{NormalizedPayload, Sender};
    use crate::testing::ScriptedBackend;
    use serde_json::json;

    fn controller(backend: &Arc<ScriptedBackend>) -> ConversationController {
        let backend: Arc<dyn Backend> = backend.clone();
        ConversationController::new(backend, &Config::default())
    }

    fn senders(view: &ConversationView<'_>) -> Vec<Sender> {
        view.messages.iter().map(|m| m.sender).collect()
    }

    #[tokio::test]
    async fn hello_round_trip() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_chat(Ok(ChatReply::from_response(json!(["hi there"]))));
        let mut controller = controller(&backend);

        assert!(controller.submit_message("hello").await);

        let view = controller.current_view();
        assert_eq!(
            view.messages,
            &[
                Message::user("hello"),
                Message::assistant("hi there", NormalizedPayload::None)
            ]
        );
        assert!(!view.in_flight);
    }

    #[tokio::test]
    async fn stats_reply_becomes_table() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_chat(Ok(ChatReply::from_response(json!(["here", [{"x": 1}, {"x": 2}]]))));
        let mut controller = controller(&backend);

        controller.submit_message("stats").await;

        let view = controller.current_view();
        let reply = &view.messages[1];
        assert_eq!(reply.sender, Sender::Assistant);
        assert_eq!(reply.text, "here");
        let table = reply.payload.as_table().unwrap();
        assert_eq!(table.columns, vec!["x"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[tokio::test]
    async fn blank_messages_are_no_ops() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        assert!(!controller.submit_message("").await);
        assert!(!controller.submit_message("   ").await);
        assert!(controller.current_view().messages.is_empty());
        assert_eq!(backend.chat_calls(), 0);
    }

    #[tokio::test]
    async fn user_message_appears_before_reply() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        let call = controller.begin_message("hello").unwrap();
        let view = controller.current_view();
        assert_eq!(senders(&view), vec![Sender::User]);
        assert!(view.in_flight);
        assert_eq!(view.phase, Phase::Sending);

        controller.finish(call.await);
        assert_eq!(senders(&controller.current_view()), vec![Sender::User, Sender::Assistant]);
    }

    #[tokio::test]
    async fn second_message_while_in_flight_is_no_op() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        let call = controller.begin_message("first").unwrap();
        assert!(controller.begin_message("second").is_none());
        assert_eq!(controller.current_view().messages.len(), 1);

        controller.finish(call.await);
        assert_eq!(controller.current_view().messages.len(), 2);
        assert_eq!(backend.chat_calls(), 1);
    }

    #[tokio::test]
    async fn every_prompt_gets_exactly_one_answer() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_chat(Ok(ChatReply::from_response(json!(["one"]))));
        backend.push_chat(Err(BackendError::Transport("refused".to_string())));
        backend.push_chat(Err(BackendError::Server {
            status: 500,
            message: Some("An unexpected error occurred".to_string()),
        }));
        let mut controller = controller(&backend);

        for prompt in ["a", "b", "c"] {
            let before = controller.current_view().messages.len();
            assert!(controller.submit_message(prompt).await);
            assert_eq!(controller.current_view().messages.len(), before + 2);
            assert!(!controller.current_view().in_flight);
        }

        let texts: Vec<&str> = controller
            .current_view()
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                "a",
                "one",
                "b",
                "Error: Failed to connect to the server",
                "c",
                "Error: An unexpected error occurred"
            ]
        );
        assert_eq!(controller.current_view().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn wrong_extension_gives_notice_only() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        assert!(!controller.submit_file(UploadFile::from_bytes("notes.txt", b"hi".to_vec())).await);

        let view = controller.current_view();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].sender, Sender::System);
        assert_eq!(
            view.messages[0].text,
            "Please upload a CSV file (notes.txt is not a .csv file)"
        );
        assert!(view.attached_file.is_none());
        assert!(!view.in_flight);
        assert_eq!(backend.upload_calls(), 0);
    }

    #[tokio::test]
    async fn successful_upload_attaches_file() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_upload(Ok("File saved as levels.csv and processed successfully.".to_string()));
        let mut controller = controller(&backend);

        let call = controller
            .begin_upload(UploadFile::from_bytes("levels.csv", b"year,level\n1993,0.1\n".to_vec()))
            .unwrap();
        assert!(controller.current_view().in_flight);
        assert!(controller.begin_message("too soon").is_none());
        controller.finish(call.await);

        let view = controller.current_view();
        let texts: Vec<&str> = view.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Uploading levels.csv...",
                "File saved as levels.csv and processed successfully."
            ]
        );
        assert_eq!(view.attached_file, Some("levels.csv"));
    }

    #[tokio::test]
    async fn failed_upload_detaches_file() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_upload(Err(BackendError::Server {
            status: 400,
            message: Some("An existing file is still valid and not older than 30 days.".to_string()),
        }));
        let mut controller = controller(&backend);

        controller
            .submit_file(UploadFile::from_bytes("levels.csv", Vec::new()))
            .await;

        let view = controller.current_view();
        assert_eq!(
            view.messages.last().map(|m| m.text.as_str()),
            Some("Upload failed: An existing file is still valid and not older than 30 days.")
        );
        assert!(view.attached_file.is_none());
        assert!(!view.in_flight);
    }

    #[tokio::test]
    async fn reset_clears_even_when_server_fails() {
        let backend = Arc::new(
            ScriptedBackend::new().with_reset(Err(BackendError::Transport("down".to_string()))),
        );
        let mut controller = controller(&backend);
        controller.submit_message("hello").await;
        controller
            .submit_file(UploadFile::from_bytes("levels.csv", Vec::new()))
            .await;

        controller.reset().await;

        let view = controller.current_view();
        assert!(view.messages.is_empty());
        assert!(view.attached_file.is_none());
        assert!(!view.in_flight);
        assert_eq!(backend.reset_calls(), 1);

        assert!(controller.submit_message("again").await);
        assert_eq!(controller.current_view().messages.len(), 2);
    }

    #[tokio::test]
    async fn reset_is_local_before_server_answers() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);
        controller.submit_message("hello").await;

        let server_reset = controller.reset();
        assert!(controller.current_view().messages.is_empty());
        assert!(controller.current_view().attached_file.is_none());

        server_reset.await;
        assert_eq!(backend.reset_calls(), 1);
    }

    #[tokio::test]
    async fn reset_is_issued_without_awaiting() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);
        controller.submit_message("hello").await;

        drop(controller.reset());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(backend.reset_calls(), 1);
        assert!(controller.current_view().messages.is_empty());
    }

    #[tokio::test]
    async fn reply_arriving_after_reset_is_dropped() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        let call = controller.begin_message("hello").unwrap();
        let server_reset = controller.reset();
        assert!(!controller.current_view().in_flight);
        server_reset.await;

        controller.finish(call.await);
        assert!(controller.current_view().messages.is_empty());
    }

    #[tokio::test]
    async fn pending_call_can_be_spawned() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut controller = controller(&backend);

        let call = controller.begin_message("hello").unwrap();
        let completion = tokio::spawn(call).await.unwrap();
        controller.finish(completion);

        assert_eq!(controller.current_view().messages.len(), 2);
    }
}
