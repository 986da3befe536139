use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::{AppointmentStatus, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Loader, QueryCache, Resource,
        filter::{active_applications, unread_count},
        queries,
    },
    toast,
};

use super::{as_user, shell};

const RECENT: usize = 3;

#[debug_handler(state = AppState)]
pub(crate) async fn overview(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let profile = Resource::mount(queries::profile(user.id), &mut loader).await;
    let applications = Resource::mount(queries::applications(user.id), &mut loader).await;
    let appointments = Resource::mount(queries::appointments(user.id), &mut loader).await;
    let notifications = Resource::mount(queries::notifications(user.id), &mut loader).await;

    let (name, completion) = match &profile.data {
        Some(profile) => (profile.display_name().to_owned(), profile.completion()),
        None => (user.email.clone(), 0),
    };
    let scheduled = appointments
        .data
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .count();

    let recent: String = match notifications.data.as_slice() {
        [] => res::empty("Nothing new."),
        list => list
            .iter()
            .take(RECENT)
            .map(|n| {
                format!(
                    r#"<li><strong>{}</strong> <span class="muted">{}</span></li>"#,
                    res::escape(&n.title),
                    n.created_at.map(timestamp::display).unwrap_or_default()
                )
            })
            .collect(),
    };

    let content = include_res!(str, "/pages/dashboard/overview.html")
        .replace("{name}", &res::escape(&name))
        .replace("{completion}", &completion.to_string())
        .replace("{active}", &active_applications(&applications.data).to_string())
        .replace("{scheduled}", &scheduled.to_string())
        .replace("{unread}", &unread_count(&notifications.data).to_string())
        .replace("{recent}", &recent);
    Ok(res::page("Dashboard", Some(&user), &toasts, &shell("/dashboard", &content)).into_response())
}
