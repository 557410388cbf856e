pub mod backend;
pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod transcript;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use backend::{Backend, ChatReply, HttpBackend};
pub use classify::classify;
pub use config::Config;
pub use controller::{ConversationController, ConversationView};
pub use error::{BackendError, Rejection};
pub use lifecycle::{CallKind, CallResult, Completion, PendingCall, PendingReset, Phase, UploadFile};
pub use message::{Chart, Message, NormalizedPayload, Scalar, Sender, Series, Table};
pub use transcript::Transcript;
