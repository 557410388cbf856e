use std::path::PathBuf;
use oceanchat_core::{Completion, ConversationController, PendingCall, UploadFile};
use tokio::sync::mpsc;
use tracing::debug;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Typing a chat message
    Message,
    /// Typing the path of a CSV to attach
    AttachPath,
}

/// Presentation state. Conversation state lives in the controller.
pub struct App {
    pub should_quit: bool,
    pub controller: ConversationController,
    pub backend_label: String,

    // Input box
    pub input_mode: InputMode,
    pub input: String,
    pub cursor: usize,
    pub path_input: String,
    pub path_cursor: usize,

    // Transcript viewport
    pub scroll: u16,
    pub follow: bool,
    pub chat_height: u16,
    pub total_lines: u16,

    pub animation_frame: usize,

    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        controller: ConversationController,
        backend_label: String,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            controller,
            backend_label,

            input_mode: InputMode::Message,
            input: String::new(),
            cursor: 0,
            path_input: String::new(),
            path_cursor: 0,

            scroll: 0,
            follow: true,
            chat_height: 0,
            total_lines: 0,

            animation_frame: 0,

            events,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.controller.current_view().in_flight
    }

    /// Send the input box contents. Ignored while a reply is outstanding.
    pub fn submit_input(&mut self) {
        if self.in_flight() {
            return;
        }
        if let Some(call) = self.controller.begin_message(&self.input) {
            self.input.clear();
            self.cursor = 0;
            self.follow = true;
            self.spawn(call);
        }
    }

    /// Upload the file named in the path prompt
    pub fn submit_path(&mut self) {
        let path = self.path_input.trim().to_string();
        self.input_mode = InputMode::Message;
        self.path_input.clear();
        self.path_cursor = 0;

        if path.is_empty() || self.in_flight() {
            return;
        }

        let file = UploadFile::from_path(expand_home(&path));
        self.follow = true;
        if let Some(call) = self.controller.begin_upload(file) {
            self.spawn(call);
        }
    }

    /// Clear the conversation; the server-side reset finishes in the background
    pub fn reset(&mut self) {
        drop(self.controller.reset());
        self.scroll = 0;
        self.follow = true;
    }

    pub fn on_completed(&mut self, completion: Completion) {
        self.controller.finish(completion);
        self.follow = true;
    }

    fn spawn(&self, call: PendingCall) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            let completion = call.await;
            if tx.send(AppEvent::Completed(completion)).is_err() {
                debug!("event loop closed before the call completed");
            }
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.min(self.max_scroll()).saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        self.follow = self.scroll >= self.max_scroll();
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
