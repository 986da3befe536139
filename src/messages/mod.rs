//! Conversations between a client and the advisors, live over a websocket.

mod chat;
mod list;
mod ws;

use axum::{Router, routing::get};
use uuid::Uuid;

use crate::{
    AppState,
    gateway::{Gateway, GatewayResult},
    include_res,
    models::{Chat, ChatMessage, SenderRole, timestamp},
    res,
    session::CurrentUser,
    sync::{Fetch, queries},
};

pub(crate) use list::support_chat;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::chats))
        .route("/{chat_id}", get(chat::chat).post(chat::send))
        .route("/{chat_id}/ws", get(ws::chat_ws))
}

pub(crate) fn chat_href(chat_id: Uuid) -> String {
    format!("/dashboard/messages/{chat_id}")
}

/// The chat, if `user` may read it. Advisors may read every chat.
pub(crate) async fn open_chat(
    gateway: &dyn Gateway,
    user: &CurrentUser,
    chat_id: Uuid,
) -> GatewayResult<Option<Chat>> {
    let chat = queries::chat(chat_id).fetch(gateway).await?;
    Ok(chat.filter(|chat| user.is_admin() || chat.has_member(user.id)))
}

pub(crate) fn sender_role(user: &CurrentUser) -> SenderRole {
    if user.is_admin() {
        SenderRole::Admin
    } else {
        SenderRole::Client
    }
}

pub(crate) fn message_html(message: &ChatMessage, me: Uuid) -> String {
    let (class, from) = match message.sender_role {
        _ if message.is_from(me) => ("message mine", "You"),
        SenderRole::Admin => ("message", "Advisor"),
        SenderRole::Client => ("message", "Client"),
        SenderRole::System => ("message system", "Pathway"),
    };

    include_res!(str, "/pages/messages/message.html")
        .replace("{class}", class)
        .replace("{id}", &message.id.to_string())
        .replace("{from}", from)
        .replace("{at}", &timestamp::display(message.created_at))
        .replace("{content}", &res::markdown(&message.content))
}
