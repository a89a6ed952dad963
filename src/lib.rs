pub mod chat;
pub mod completion;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod sanitizer;
pub mod session;
pub mod web_server;

pub use completion::{CompletionClient, CompletionRequest, GroqClient};
pub use config::{Config, ProviderArgs};
pub use conversation::{ConversationStore, Role, Turn};
pub use error::{CompletionError, CompletionErrorKind, ConfigError, SubmitError};
pub use sanitizer::sanitize;
pub use session::{ChatSession, SessionRegistry, SessionView, SubmissionState};
