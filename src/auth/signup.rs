use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::ValidationError,
    res,
    toast::{self, Toast},
};

use super::lockin_user;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SignupForm {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl SignupForm {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::new("full_name", "Please enter your full name"));
        }
        let email = self.email.trim();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ValidationError::new("email", "Please enter a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("Passwords need at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }
}

#[debug_handler]
pub(crate) async fn signup_page(session: Session) -> AppResult<Response> {
    let toasts = toast::take(&session).await?;
    Ok(res::page(
        "Create your account",
        None,
        &toasts,
        include_res!(str, "/pages/signup.html"),
    )
    .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    if let Err(err) = form.validate() {
        return toast::redirect(&session, Toast::destructive("Sign up failed", &err), "/signup").await;
    }

    let email = form.email.trim();
    match gateway.sign_up(email, &form.password, form.full_name.trim()).await {
        Ok(Some(auth)) => Ok(lockin_user(&*gateway, &session, auth).await?.into_response()),
        Ok(None) => {
            info!("{email} signed up, waiting on confirmation");
            toast::redirect(
                &session,
                Toast::success("Check your inbox to confirm your email, then sign in"),
                "/login",
            )
            .await
        }
        Err(err) => {
            warn!("sign up for {email} failed: {err}");
            toast::redirect(&session, Toast::destructive("Sign up failed", &err), "/signup").await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str) -> SignupForm {
        SignupForm {
            full_name: name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    #[test]
    fn signup_checks_fields_in_order() {
        assert_eq!(form(" ", "a@b.c", "longenough").validate().unwrap_err().field, "full_name");
        assert_eq!(form("Aisha", "nope", "longenough").validate().unwrap_err().field, "email");
        assert_eq!(form("Aisha", "a@b.c", "short").validate().unwrap_err().field, "password");
        assert!(form("Aisha", "a@b.c", "longenough").validate().is_ok());
    }
}
