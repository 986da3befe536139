use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    dashboard::as_user,
    gateway::{self, Gateway},
    models::{ChatMessage, NewChatMessage},
    res,
    session::CurrentUser,
    sync::{QueryCache, feed::ChatFeed},
};

use super::{message_html, open_chat, sender_role};

#[derive(Deserialize)]
struct Outgoing {
    content: String,
}

type Sender = SplitSink<WebSocket, Message>;

async fn send_html(sender: &mut Sender, html: String) -> bool {
    sender.send(Message::Text(html.into())).await.is_ok()
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    user: CurrentUser,
    Path(chat_id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    if open_chat(&*gateway, &user, chat_id).await?.is_none() {
        return res::sorry("conversation");
    }

    Ok(ws
        .on_upgrade(async move |stream| run(stream, gateway, cache, user, chat_id).await)
        .into_response())
}

/// First frame is the whole history; every later frame is one message.
async fn run(
    stream: WebSocket,
    gateway: Arc<dyn Gateway>,
    cache: Arc<QueryCache>,
    user: CurrentUser,
    chat_id: Uuid,
) {
    let (mut sender, mut receiver) = stream.split();

    let mut feed = ChatFeed::new(user.id);
    if let Err(err) = feed.subscribe(&*gateway, chat_id).await {
        warn!("u/{} could not join {chat_id}: {err}", user.id);
        let _ = sender.send(Message::Close(None)).await;
        return;
    }
    debug!("u/{} joined {chat_id}", user.id);

    let history: String = feed
        .messages()
        .iter()
        .map(|m| message_html(m, user.id))
        .collect();
    if !send_html(&mut sender, history).await {
        return;
    }

    loop {
        tokio::select! {
            incoming = feed.next_message() => {
                let Some(message) = incoming else { break };
                if !send_html(&mut sender, message_html(&message, user.id)).await {
                    break;
                }
            }
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(Outgoing { content }) = serde_json::from_str(text.as_str()) else {
                    continue;
                };
                let Some(message) = NewChatMessage::new(chat_id, user.id, sender_role(&user), &content) else {
                    continue;
                };

                let stored: ChatMessage = match gateway::insert(&*gateway, "messages", &message).await {
                    Ok(stored) => stored,
                    Err(err) => {
                        warn!("u/{} message to {chat_id} refused: {err}", user.id);
                        continue;
                    }
                };
                info!("u/{} wrote {} in {chat_id}", user.id, stored.id);
                cache.invalidate("chats");
                if let Some(shown) = feed.push_local(stored) {
                    let html = message_html(shown, user.id);
                    if !send_html(&mut sender, html).await {
                        break;
                    }
                }
            }
        }
    }

    feed.teardown();
}
