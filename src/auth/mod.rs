mod lockin;
mod login;
mod logout;
mod provider;
mod signup;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, AppState,
    gateway::{AuthSession, Gateway},
    models::Role,
    session::{self, CurrentUser, RETURN_URL},
    sync::{Fetch, queries},
};

pub use provider::Provider;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/login/{provider}", get(login::login_with))
        .route("/signup", get(signup::signup_page).post(signup::signup))
        .route("/auth/callback", get(lockin::lockin))
        .route("/logout", post(logout::logout).get(logout::logout))
}

/// Only same-site paths are followed after signing in. Browsers read `/\host` as
/// `//host` and drop tabs and newlines, so those never count as paths.
pub(crate) fn safe_return(return_url: Option<&str>) -> &str {
    match return_url {
        Some(url)
            if url.starts_with('/')
                && !matches!(url.as_bytes().get(1), Some(b'/' | b'\\'))
                && !url.contains(|c: char| c.is_control()) =>
        {
            url
        }
        _ => "/dashboard",
    }
}

/// Stores the signed-in user and sends them wherever they were headed.
pub(crate) async fn lockin_user(
    gateway: &dyn Gateway,
    session: &Session,
    auth: AuthSession,
) -> AppResult<Redirect> {
    let scoped = gateway.scoped(&auth.access_token);
    let role = match queries::profile(auth.user_id).fetch(&*scoped).await {
        Ok(Some(profile)) => profile.role,
        Ok(None) => Role::Client,
        Err(err) => {
            warn!("could not read role for {}: {err}", auth.user_id);
            Role::Client
        }
    };

    let return_url: Option<String> = session.remove(RETURN_URL).await?;
    session::sign_in(
        session,
        CurrentUser {
            id: auth.user_id,
            email: auth.email,
            access_token: auth.access_token,
            role,
        },
    )
    .await?;

    info!("welcome u/{}", auth.user_id);
    Ok(Redirect::to(safe_return(return_url.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_urls_stay_on_site() {
        assert_eq!(safe_return(Some("/dashboard/appointments")), "/dashboard/appointments");
        assert_eq!(safe_return(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_return(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_return(Some("/\\evil.example")), "/dashboard");
        assert_eq!(safe_return(Some("/\t/evil.example")), "/dashboard");
        assert_eq!(safe_return(Some("/programs?search=a%2Fb")), "/programs?search=a%2Fb");
        assert_eq!(safe_return(None), "/dashboard");
    }
}
