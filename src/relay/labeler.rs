//! Speaker labels for provider-facing context

use crate::relay::message::{LabeledMessage, Message, ProviderRole, Role};

const LABEL_OPEN: &str = "[SPEAKER: ";
const LABEL_CLOSE: &str = "] ";

/// Uppercase speaker tag for a stored message
pub fn speaker_tag(message: &Message) -> String {
    match message.role {
        Role::User => "USER".to_string(),
        Role::Assistant => message.author.as_str().to_uppercase(),
    }
}

/// Prefix content with `[SPEAKER: <TAG>] `
pub fn with_label(tag: &str, content: &str) -> String {
    format!("{LABEL_OPEN}{tag}{LABEL_CLOSE}{content}")
}

pub fn label_message(message: &Message) -> LabeledMessage {
    LabeledMessage {
        role: ProviderRole::from(message.role),
        content: with_label(&speaker_tag(message), &message.content),
    }
}

/// Label a whole history, preserving order
pub fn label_history(history: &[Message]) -> Vec<LabeledMessage> {
    history.iter().map(label_message).collect()
}

/// Recover the speaker tag from labeled content, if it carries one
pub fn parse_speaker(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(LABEL_OPEN)?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}
