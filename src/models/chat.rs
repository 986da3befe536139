use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Client,
    Admin,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub admin_id: Option<Uuid>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub last_message_at: Option<OffsetDateTime>,
}

impl Chat {
    pub fn title(&self) -> &str {
        self.subject.as_deref().unwrap_or("Conversation with your advisor")
    }

    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.admin_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub read: bool,
}

impl ChatMessage {
    pub fn is_from(&self, user_id: Uuid) -> bool {
        self.sender_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChatMessage {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: SenderRole,
    pub content: String,
}

impl NewChatMessage {
    /// `None` for blank messages.
    pub fn new(chat_id: Uuid, sender_id: Uuid, sender_role: SenderRole, content: &str) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            chat_id,
            sender_id,
            sender_role,
            content: content.to_owned(),
        })
    }
}
