//! Catalogue managers for advisors. Every handler takes [`Admin`](crate::session::Admin).

mod programs;
mod services;
mod slots;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, include_res};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs", get(programs::programs).post(programs::create))
        .route("/programs/{id}", post(programs::update))
        .route("/programs/{id}/delete", post(programs::delete))
        .route("/services", get(services::services).post(services::create))
        .route("/services/{id}/delete", post(services::delete))
        .route("/slots", get(slots::slots).post(slots::create))
}

const SECTIONS: [(&str, &str); 3] = [
    ("/admin/programs", "Programs"),
    ("/admin/services", "Services"),
    ("/admin/slots", "Slots"),
];

fn shell(active: &str, content: &str) -> String {
    let links: String = SECTIONS
        .iter()
        .map(|(href, label)| {
            let class = if *href == active { r#" class="active""# } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect();
    include_res!(str, "/pages/admin/shell.html")
        .replace("{links}", &links)
        .replace("{content}", content)
}
