use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    session::{CSRF_STATE, PKCE_VERIFIER},
    toast::{self, Toast},
};

use super::lockin_user;

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error_description: Option<String>,
}

async fn refuse(session: &Session, reason: &str) -> AppResult<Response> {
    warn!("provider sign in refused: {reason}");
    toast::redirect(session, Toast::destructive("Sign in failed", reason), "/login").await
}

/// Provider redirect target: checks the CSRF state, then trades the code and the stored
/// PKCE verifier for a session.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Query(LockinQuery {
        state,
        code,
        error_description,
    }): Query<LockinQuery>,
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
) -> AppResult<Response> {
    if let Some(error) = error_description {
        return refuse(&session, &error).await;
    }

    let stored_state: Option<String> = session.remove(CSRF_STATE).await?;
    let pkce_verifier: Option<String> = session.remove(PKCE_VERIFIER).await?;

    let (Some(state), Some(code)) = (state, code) else {
        return refuse(&session, "The sign in response was incomplete").await;
    };
    if stored_state.as_deref() != Some(state.as_str()) {
        return refuse(&session, "csrf tokens don't match").await;
    }
    let Some(pkce_verifier) = pkce_verifier else {
        return refuse(&session, "no pkce_verifier").await;
    };

    match gateway.exchange_code(&code, &pkce_verifier).await {
        Ok(auth) => Ok(lockin_user(&*gateway, &session, auth).await?.into_response()),
        Err(err) => refuse(&session, &err.to_string()).await,
    }
}
