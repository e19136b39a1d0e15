//! Conversation relay - history, speaker labels, retries and dispatch

pub mod dispatch;
pub mod history;
pub mod labeler;
pub mod message;
pub mod retry;

pub use dispatch::{Dispatcher, SendOutcome, SendRequest};
pub use history::HistoryStore;
pub use message::{Author, BackendId, LabeledMessage, Message, ProviderRole, Reply, Role, Tag};
pub use retry::{RetryFailure, RetryPolicy};
