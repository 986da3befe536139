use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use oauth2::{CsrfToken, PkceCodeChallenge};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppResult, AppState,
    config::Config,
    gateway::Gateway,
    include_res, res,
    session::{self, CSRF_STATE, PKCE_VERIFIER, RETURN_URL},
    toast::{self, Toast},
};

use super::{Provider, lockin_user, safe_return};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    email: String,
    password: String,
}

fn provider_buttons() -> String {
    Provider::ALL
        .iter()
        .map(|provider| {
            format!(
                r#"<a class="button secondary" href="/login/{}">Continue with {provider}</a>"#,
                provider.id()
            )
        })
        .collect()
}

#[debug_handler]
pub(crate) async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    session: Session,
) -> AppResult<Response> {
    if let Some(user) = session::current_user(&session).await? {
        warn!("{} is already signed in", user.email);
        return Ok(Redirect::to(safe_return(return_url.as_deref())).into_response());
    }
    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, return_url).await?;
    }

    let toasts = toast::take(&session).await?;
    let content = include_res!(str, "/pages/login.html").replace("{providers}", &provider_buttons());
    Ok(res::page("Sign in", None, &toasts, &content).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
    Form(LoginForm { email, password }): Form<LoginForm>,
) -> AppResult<Response> {
    if email.trim().is_empty() || password.is_empty() {
        return toast::redirect(
            &session,
            Toast::destructive("Sign in failed", "Email and password are required"),
            "/login",
        )
        .await;
    }

    match gateway.sign_in(email.trim(), &password).await {
        Ok(auth) => Ok(lockin_user(&*gateway, &session, auth).await?.into_response()),
        Err(err) => {
            warn!("sign in for {email} failed: {err}");
            toast::redirect(&session, Toast::destructive("Sign in failed", &err), "/login").await
        }
    }
}

/// Starts the provider sign-in with a PKCE challenge; the verifier waits in the session.
#[debug_handler(state = AppState)]
pub(crate) async fn login_with(
    Path(provider): Path<Provider>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Response> {
    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let csrf_state = CsrfToken::new_random();

    let redirect_to = format!(
        "{}/auth/callback?state={}",
        config.public_url.trim_end_matches('/'),
        res::encode(csrf_state.secret())
    );
    let authorize_url = gateway.authorize_url(provider.id(), &redirect_to, pkce_code_challenge.as_str());

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;
    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, return_url).await?;
    }

    Ok(Redirect::to(&authorize_url).into_response())
}
