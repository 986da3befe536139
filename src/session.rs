use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, models::Role, res};

pub const USER: &str = "user";
pub const RETURN_URL: &str = "return_url";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const TOASTS: &str = "toasts";
pub const CONSULTATION: &str = "consultation";

/// The signed-in user, as kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub async fn current_user(session: &Session) -> AppResult<Option<CurrentUser>> {
    Ok(session.get::<CurrentUser>(USER).await?)
}

pub async fn sign_in(session: &Session, user: CurrentUser) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER, user).await?;
    Ok(())
}

fn login_redirect(parts: &Parts) -> Response {
    let return_url = parts
        .uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/dashboard");
    Redirect::to(&format!("/login?return_url={}", res::encode(return_url))).into_response()
}

/// Dashboard routes take this; anonymous visitors are sent to the login page.
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match session.get::<CurrentUser>(USER).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(login_redirect(parts)),
            Err(err) => Err(AppError::from(err).into_response()),
        }
    }
}

/// A signed-in user with the admin role.
pub struct Admin(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(res::sorry("page").into_response());
        }
        Ok(Admin(user))
    }
}
