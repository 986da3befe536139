use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused, shell},
    gateway::{self, Gateway},
    include_res,
    models::{ChatMessage, NewChatMessage, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Fetch, QueryCache,
        feed::{self, HISTORY_LEN},
        queries,
    },
    toast::{self, Toast},
};

use super::{chat_href, message_html, open_chat, sender_role};

const LIST: &str = "/dashboard/messages";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HistoryQuery {
    #[serde(with = "timestamp::option")]
    before: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendForm {
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat(
    user: CurrentUser,
    Path(chat_id): Path<Uuid>,
    Query(history): Query<HistoryQuery>,
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;

    let chat = match open_chat(&*gateway, &user, chat_id).await {
        Ok(Some(chat)) => chat,
        Ok(None) => return res::sorry("conversation"),
        Err(err) => return refused(&session, "Could not load conversation", err, LIST).await,
    };

    let page = match history.before {
        Some(before) => feed::history_page(&*gateway, chat_id, Some(before), HISTORY_LEN).await,
        None => queries::recent_messages(chat_id, HISTORY_LEN)
            .fetch(&*gateway)
            .await
            .map(|mut newest_first| {
                newest_first.reverse();
                newest_first
            }),
    };
    let messages: Vec<ChatMessage> = match page {
        Ok(messages) => messages,
        Err(err) => {
            warn!("loading messages of {chat_id} failed: {err}");
            toasts.push(Toast::destructive("Could not load messages", &err));
            Vec::new()
        }
    };

    if messages.iter().any(|m| !m.read && !m.is_from(user.id)) {
        if let Err(err) = feed::mark_read(&*gateway, chat_id, user.id).await {
            warn!("marking {chat_id} read failed: {err}");
        }
    }

    let older = match messages.first() {
        Some(oldest) if messages.len() == HISTORY_LEN => format!(
            r#"<a href="{}?before={}">Older messages</a>"#,
            chat_href(chat_id),
            res::encode(&timestamp::to_text(oldest.created_at))
        ),
        _ => String::new(),
    };
    let list = match messages.as_slice() {
        [] => res::empty("No messages yet. Say hello!"),
        messages => messages.iter().map(|m| message_html(m, user.id)).collect(),
    };
    // live updates only make sense on the latest page
    let live = if history.before.is_none() { "live" } else { "" };

    let content = include_res!(str, "/pages/messages/chat.html")
        .replace("{title}", &res::escape(chat.title()))
        .replace("{href}", &chat_href(chat_id))
        .replace("{live}", live)
        .replace("{older}", &older)
        .replace("{messages}", &list);
    Ok(res::page(chat.title(), Some(&user), &toasts, &shell(LIST, &content)).into_response())
}

/// Plain form post, for browsers without the websocket.
#[debug_handler(state = AppState)]
pub(crate) async fn send(
    user: CurrentUser,
    Path(chat_id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<SendForm>,
) -> AppResult<Response> {
    let back = chat_href(chat_id);
    let Some(message) = NewChatMessage::new(chat_id, user.id, sender_role(&user), &form.content) else {
        return refused(&session, "Message not sent", "Message cannot be empty", &back).await;
    };

    let gateway = as_user(&gateway, &user);
    match open_chat(&*gateway, &user, chat_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return res::sorry("conversation"),
        Err(err) => return refused(&session, "Message not sent", err, &back).await,
    }

    let stored: ChatMessage = match gateway::insert(&*gateway, "messages", &message).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Message not sent", err, &back).await,
    };

    info!("u/{} wrote {} in {chat_id}", user.id, stored.id);
    // the client's list and the advisors' list of every chat
    cache.invalidate("chats");
    Ok(Redirect::to(&back).into_response())
}
