use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    gateway::{self, ChannelFilter, Gateway, GatewayResult, RowEvent, Subscription},
    models::{ChatMessage, timestamp},
};

use super::{Fetch, queries};

pub const HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Subscribed { chat_id: Uuid },
    TornDown,
}

/// Message list of one open chat, kept current from the realtime channel.
///
/// Subscribing always starts from a fresh copy of the history; nothing missed while torn
/// down is replayed.
pub struct ChatFeed {
    me: Uuid,
    state: FeedState,
    messages: Vec<ChatMessage>,
    subscription: Option<Subscription>,
}

impl ChatFeed {
    pub fn new(me: Uuid) -> Self {
        Self {
            me,
            state: FeedState::TornDown,
            messages: Vec::new(),
            subscription: None,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub async fn subscribe(&mut self, gateway: &dyn Gateway, chat_id: Uuid) -> GatewayResult<()> {
        self.teardown();

        let mut history = queries::recent_messages(chat_id, HISTORY_LEN)
            .fetch(gateway)
            .await?;
        history.reverse();

        let subscription = gateway
            .subscribe(ChannelFilter::new("messages", "chat_id", chat_id))
            .await?;

        self.messages = history;
        self.subscription = Some(subscription);
        self.state = FeedState::Subscribed { chat_id };
        Ok(())
    }

    /// Merges one insert event. Returns the appended message, if any.
    pub fn apply(&mut self, event: &RowEvent) -> Option<&ChatMessage> {
        let FeedState::Subscribed { chat_id } = self.state else {
            return None;
        };
        if event.table != "messages" {
            return None;
        }
        let message: ChatMessage = match serde_json::from_value(event.row.clone()) {
            Ok(message) => message,
            Err(err) => {
                warn!("dropping unreadable message event: {err}");
                return None;
            }
        };

        // the sender appended it when sending
        if message.chat_id != chat_id || message.is_from(self.me) {
            return None;
        }
        self.append(message)
    }

    /// Appends a message this user just sent.
    pub fn push_local(&mut self, message: ChatMessage) -> Option<&ChatMessage> {
        match self.state {
            FeedState::Subscribed { chat_id } if chat_id == message.chat_id => self.append(message),
            _ => None,
        }
    }

    fn append(&mut self, message: ChatMessage) -> Option<&ChatMessage> {
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!("message {} already shown", message.id);
            return None;
        }
        self.messages.push(message);
        self.messages.last()
    }

    /// Waits for the next message from someone else. `None` once torn down or the channel
    /// closes.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        loop {
            let event = self.subscription.as_mut()?.next().await?;
            if let Some(message) = self.apply(&event) {
                return Some(message.clone());
            }
        }
    }

    pub fn teardown(&mut self) {
        if let FeedState::Subscribed { chat_id } = self.state {
            debug!("leaving chat {chat_id}");
        }
        self.subscription = None;
        self.state = FeedState::TornDown;
    }
}

/// A page of older messages through `get_chat_messages`, oldest first.
pub async fn history_page(
    gateway: &dyn Gateway,
    chat_id: Uuid,
    before: Option<OffsetDateTime>,
    limit: usize,
) -> GatewayResult<Vec<ChatMessage>> {
    let args = json!({
        "chat_id": chat_id,
        "page_size": limit,
        "before": before.map(timestamp::to_text),
    });
    let value = gateway.rpc("get_chat_messages", args).await?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    let mut page: Vec<ChatMessage> = serde_json::from_value(value)?;
    page.sort_by_key(|m| m.created_at);
    Ok(page)
}

/// Marks everything in `chat_id` not sent by `reader` as read.
pub async fn mark_read(gateway: &dyn Gateway, chat_id: Uuid, reader: Uuid) -> GatewayResult<()> {
    gateway
        .rpc("mark_messages_read", json!({ "chat_id": chat_id, "reader_id": reader }))
        .await?;
    Ok(())
}

/// Opens a support conversation through `create_chat` and returns its id.
pub async fn open_support_chat(gateway: &dyn Gateway, subject: &str) -> GatewayResult<Uuid> {
    let value = gateway
        .rpc("create_chat", json!({ "subject": subject }))
        .await?;
    let id = match &value {
        serde_json::Value::String(_) => value,
        other => gateway::GetField::get_obj_field(other, "id")?.clone(),
    };
    Ok(serde_json::from_value(id)?)
}
