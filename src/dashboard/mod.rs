//! Signed-in pages. Every handler takes [`CurrentUser`], so anonymous requests never get
//! past the extractor.

mod applications;
mod appointments;
mod notifications;
mod overview;
mod payments;
mod profile;
mod programs;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Response,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res, messages,
    session::CurrentUser,
    toast::{self, Toast},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview::overview))
        .route("/profile", get(profile::profile_page).post(profile::update_profile))
        .route(
            "/profile/avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(profile::AVATAR_BODY_LIMIT)),
        )
        .route(
            "/applications",
            get(applications::applications).post(applications::new_application),
        )
        .route("/applications/{id}/cancel", post(applications::cancel_application))
        .route("/programs", get(programs::programs))
        .route(
            "/appointments",
            get(appointments::appointments).post(appointments::book_appointment),
        )
        .route("/appointments/{id}/cancel", post(appointments::cancel_appointment))
        .route("/payments", get(payments::payments))
        .route("/notifications", get(notifications::notifications))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/chat", get(messages::support_chat))
        .nest("/messages", messages::router())
}

const SECTIONS: [(&str, &str); 8] = [
    ("/dashboard", "Overview"),
    ("/dashboard/profile", "Profile"),
    ("/dashboard/applications", "Applications"),
    ("/dashboard/programs", "Programs"),
    ("/dashboard/appointments", "Appointments"),
    ("/dashboard/payments", "Payments"),
    ("/dashboard/notifications", "Notifications"),
    ("/dashboard/messages", "Messages"),
];

/// Sidebar plus page content.
pub(crate) fn shell(active: &str, content: &str) -> String {
    let links: String = SECTIONS
        .iter()
        .map(|(href, label)| {
            let class = if *href == active { r#" class="active""# } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect();
    include_res!(str, "/pages/dashboard/shell.html")
        .replace("{links}", &links)
        .replace("{content}", content)
}

/// The backend as `user`, so row level security applies.
pub(crate) fn as_user(gateway: &Arc<dyn Gateway>, user: &CurrentUser) -> Arc<dyn Gateway> {
    gateway.scoped(&user.access_token)
}

/// Ends a mutation that did not happen: one destructive toast, back to `back`.
pub(crate) async fn refused(
    session: &Session,
    title: &str,
    reason: impl ToString,
    back: &str,
) -> AppResult<Response> {
    let reason = reason.to_string();
    warn!("{title}: {reason}");
    toast::redirect(session, Toast::destructive(title, reason), back).await
}
