//! In-memory backend for unit tests

use crate::backend::{Backend, ChatReply};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued results in order. An empty chat queue answers "ok",
/// an empty upload queue answers "uploaded".
pub struct ScriptedBackend {
    chat_results: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
    upload_results: Mutex<VecDeque<Result<String, BackendError>>>,
    reset_result: Result<(), BackendError>,
    uploaded: Mutex<Vec<(String, Vec<u8>)>>,
    delay: Option<Duration>,
    panics: bool,
    chat_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    reset_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            chat_results: Mutex::new(VecDeque::new()),
            upload_results: Mutex::new(VecDeque::new()),
            reset_result: Ok(()),
            uploaded: Mutex::new(Vec::new()),
            delay: None,
            panics: false,
            chat_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_reset(mut self, result: Result<(), BackendError>) -> Self {
        self.reset_result = result;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn push_chat(&self, result: Result<ChatReply, BackendError>) {
        self.chat_results.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: Result<String, BackendError>) {
        self.upload_results.lock().unwrap().push_back(result);
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self) -> Vec<(String, Vec<u8>)> {
        self.uploaded.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn chat(&self, _prompt: &str) -> Result<ChatReply, BackendError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.panics {
            panic!("scripted backend panic");
        }
        let next = self.chat_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ChatReply {
                text: "ok".to_string(),
                data: None,
            })
        })
    }

    async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<String, BackendError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.uploaded
            .lock()
            .unwrap()
            .push((file_name.to_string(), contents));
        let next = self.upload_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("uploaded".to_string()))
    }

    async fn reset(&self) -> Result<(), BackendError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.reset_result.clone()
    }
}
