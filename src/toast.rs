use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppResult, res::escape, session::TOASTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Destructive,
}

/// A transient notice shown once at the top of the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: Option<String>,
}

impl Toast {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl ToString) -> Self {
        Self {
            kind: ToastKind::Destructive,
            title: title.into(),
            description: Some(description.to_string()),
        }
    }

    pub fn render(&self) -> String {
        let class = match self.kind {
            ToastKind::Success => "toast",
            ToastKind::Destructive => "toast destructive",
        };
        let description = self
            .description
            .as_deref()
            .map(|d| format!("<p>{}</p>", escape(d)))
            .unwrap_or_default();
        format!(
            r#"<div class="{class}" role="status"><strong>{}</strong>{description}</div>"#,
            escape(&self.title)
        )
    }
}

/// Toasts raised while handling one request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Toasts(Vec<Toast>);

impl Toasts {
    pub fn push(&mut self, toast: Toast) {
        self.0.push(toast);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Toast> {
        self.0
    }
}

impl Extend<Toast> for Toasts {
    fn extend<I: IntoIterator<Item = Toast>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Keeps a toast in the session until the next page render.
pub async fn flash(session: &Session, toast: Toast) -> AppResult<()> {
    let mut pending: Vec<Toast> = session.get(TOASTS).await?.unwrap_or_default();
    pending.push(toast);
    session.insert(TOASTS, pending).await?;
    Ok(())
}

pub async fn take(session: &Session) -> AppResult<Toasts> {
    let pending: Vec<Toast> = session.remove(TOASTS).await?.unwrap_or_default();
    Ok(Toasts(pending))
}

/// Flashes `toast` and sends the browser on to `to`.
pub async fn redirect(session: &Session, toast: Toast, to: &str) -> AppResult<Response> {
    flash(session, toast).await?;
    Ok(Redirect::to(to).into_response())
}
