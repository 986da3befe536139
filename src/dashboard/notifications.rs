use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    gateway::{self, Gateway},
    include_res,
    models::{Notification, NotificationKind, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Loader, QueryCache, Resource,
        filter::{Filtered, NotificationFilter, unread_count},
        queries,
    },
    toast::{self, Toast},
};

use super::{as_user, refused, shell};

const BACK: &str = "/dashboard/notifications";

fn href(kinds: &str, unread_only: bool) -> String {
    let unread = if unread_only { "&unread_only=on" } else { "" };
    format!("{BACK}?kinds={kinds}{unread}")
}

fn chips(filter: &NotificationFilter) -> String {
    let kinds = NotificationKind::ALL.iter().map(|kind| {
        let class = if filter.kinds.contains(kind) { "chip active" } else { "chip" };
        format!(
            r#"<a class="{class}" href="{}">{}</a>"#,
            href(&filter.toggled(*kind), filter.unread_only),
            kind.label()
        )
    });

    let unread = format!(
        r#"<a class="{}" href="{}">Unread only</a>"#,
        if filter.unread_only { "chip active" } else { "chip" },
        href(&filter.kinds_param(), !filter.unread_only)
    );
    kinds.chain(std::iter::once(unread)).collect()
}

fn item(notification: &Notification) -> String {
    let class = if notification.read { "notification" } else { "notification unread" };
    let action = if notification.read {
        String::new()
    } else {
        format!(
            r#"<form method="post" action="{BACK}/{}/read"><button class="link">Mark as read</button></form>"#,
            notification.id
        )
    };
    format!(
        r#"<li class="{class}"><span class="badge">{}</span> <strong>{}</strong><p>{}</p><span class="muted">{}</span>{action}</li>"#,
        notification.kind.label(),
        res::escape(&notification.title),
        res::or_dash(notification.body.as_deref()),
        notification.created_at.map(timestamp::display).unwrap_or_default(),
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn notifications(
    user: CurrentUser,
    Query(filter): Query<NotificationFilter>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let notifications = Resource::mount(queries::notifications(user.id), &mut loader).await;

    let list = match filter.apply(&notifications.data) {
        Filtered::Rows(rows) => format!("<ul>{}</ul>", rows.iter().map(item).collect::<String>()),
        Filtered::NoResults => res::empty("No notifications."),
    };
    let content = include_res!(str, "/pages/dashboard/notifications.html")
        .replace("{unread}", &unread_count(&notifications.data).to_string())
        .replace("{chips}", &chips(&filter))
        .replace("{list}", &list);

    Ok(res::page("Notifications", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let query = gateway::Query::table("notifications")
        .eq("id", id.to_string())
        .eq("user_id", user.id.to_string());

    let gateway = as_user(&gateway, &user);
    if let Err(err) = gateway::update(&*gateway, &query, &json!({ "read": true })).await {
        return refused(&session, "Notification not updated", err, BACK).await;
    }

    cache.invalidate(&queries::user_tag("notifications", user.id));
    Ok(Redirect::to(BACK).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_all_read(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let query = gateway::Query::table("notifications")
        .eq("user_id", user.id.to_string())
        .eq("read", false);

    let gateway = as_user(&gateway, &user);
    match gateway::update(&*gateway, &query, &json!({ "read": true })).await {
        Ok(_) => {}
        // nothing was unread
        Err(err) if err.is_not_found() => {}
        Err(err) => return refused(&session, "Notifications not updated", err, BACK).await,
    }

    cache.invalidate(&queries::user_tag("notifications", user.id));
    toast::redirect(&session, Toast::success("All notifications marked as read"), BACK).await
}
