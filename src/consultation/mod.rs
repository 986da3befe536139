//! The four-step consultation wizard and its ranked results.
//!
//! Answers live in the session between steps; nothing reaches the backend until the last
//! step is posted.

mod result;
mod wizard;

use axum::{
    Router,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    models::{ConsultationDraft, WizardStep},
    session::CONSULTATION,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(wizard::wizard))
        .route("/reset", post(wizard::reset))
        .route("/{step}", post(wizard::answer))
        .route("/result/{id}", get(result::result))
}

pub(crate) async fn draft(session: &Session) -> AppResult<ConsultationDraft> {
    Ok(session
        .get::<ConsultationDraft>(CONSULTATION)
        .await?
        .unwrap_or_default())
}

pub(crate) async fn save_draft(session: &Session, draft: &ConsultationDraft) -> AppResult<()> {
    session.insert(CONSULTATION, draft).await?;
    Ok(())
}

pub(crate) async fn clear_draft(session: &Session) -> AppResult<()> {
    session.remove::<ConsultationDraft>(CONSULTATION).await?;
    Ok(())
}

fn step_href(step: WizardStep) -> String {
    format!("/consultation?step={}", step.as_str())
}
