//! Conversation data model shared by the store, the dispatcher and the API

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// A remote LLM backend a reply can be requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Gpt,
    Claude,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Gpt, BackendId::Claude];

    /// Lowercase identifier, as used in authors and selectors
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Gpt => "gpt",
            BackendId::Claude => "claude",
        }
    }

    /// Title-cased name used in inline error replies
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendId::Gpt => "Gpt",
            BackendId::Claude => "Claude",
        }
    }

    /// Resolve a caller selector such as `@gpt`
    pub fn from_selector(selector: &str) -> Option<Self> {
        let name = selector.strip_prefix('@')?;
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selector from a send request (`"@gpt"`, `"@claude"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(pub BackendId);

impl Tag {
    pub fn backend(&self) -> BackendId {
        self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BackendId::from_selector(&value)
            .map(Tag)
            .ok_or_else(|| format!("unknown backend selector '{}'", value))
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        format!("@{}", tag.0)
    }
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Gpt,
    Claude,
}

impl Author {
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Gpt => "gpt",
            Author::Claude => "claude",
        }
    }
}

impl From<BackendId> for Author {
    fn from(id: BackendId) -> Self {
        match id {
            BackendId::Gpt => Author::Gpt,
            BackendId::Claude => Author::Claude,
        }
    }
}

/// Conversational role of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the shared conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: String,
    pub author: Author,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub ts: i64,
}

impl Message {
    pub fn new(author: Author, role: Role, content: impl Into<String>, ts: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author,
            role,
            content: content.into(),
            ts,
        }
    }
}

/// A backend's answer as returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reply {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub ts: i64,
}

impl From<&Message> for Reply {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.clone(),
            author: msg.author,
            content: msg.content.clone(),
            ts: msg.ts,
        }
    }
}

/// Role as understood by the provider APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ProviderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Assistant,
        }
    }
}

/// Provider-facing message whose content carries a speaker label.
///
/// Never stored in history nor returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledMessage {
    pub role: ProviderRole,
    pub content: String,
}

impl LabeledMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ProviderRole::System,
            content: content.into(),
        }
    }
}
