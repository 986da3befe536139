use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused, shell},
    gateway::Gateway,
    include_res,
    models::{Chat, timestamp},
    res,
    session::CurrentUser,
    sync::{Fetch, Loader, QueryCache, Resource, feed, queries},
    toast,
};

use super::chat_href;

const HERE: &str = "/dashboard/messages";

fn chat_item(chat: &Chat) -> String {
    format!(
        r#"<li><a href="{}">{}</a> <span class="muted">{}</span></li>"#,
        chat_href(chat.id),
        res::escape(chat.title()),
        chat.last_message_at
            .or(chat.created_at)
            .map(timestamp::display)
            .unwrap_or_default()
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn chats(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let chats = match user.is_admin() {
        true => Resource::mount(queries::all_chats(), &mut loader).await,
        false => Resource::mount(queries::chats(user.id), &mut loader).await,
    };

    let list = match chats.data.as_slice() {
        [] => res::empty("No conversations yet."),
        chats => format!("<ul>{}</ul>", chats.iter().map(chat_item).collect::<String>()),
    };
    let content = include_res!(str, "/pages/messages/list.html").replace("{chats}", &list);
    Ok(res::page("Messages", Some(&user), &toasts, &shell(HERE, &content)).into_response())
}

/// Sends the user to their support conversation, opening one if they have none.
#[debug_handler(state = AppState)]
pub(crate) async fn support_chat(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);

    let existing = match queries::chats(user.id).fetch(&*gateway).await {
        Ok(chats) => chats.into_iter().next(),
        Err(err) => return refused(&session, "Could not open support chat", err, HERE).await,
    };
    if let Some(chat) = existing {
        return Ok(Redirect::to(&chat_href(chat.id)).into_response());
    }

    let chat_id = match feed::open_support_chat(&*gateway, "Support").await {
        Ok(id) => id,
        Err(err) => return refused(&session, "Could not open support chat", err, HERE).await,
    };
    info!("u/{} opened support chat {chat_id}", user.id);
    cache.invalidate("chats");
    Ok(Redirect::to(&chat_href(chat_id)).into_response())
}
