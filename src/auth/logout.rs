use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;
use tracing::info;

use crate::{AppResult, session};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Redirect> {
    if let Some(user) = session::current_user(&session).await? {
        info!("goodbye u/{}", user.id);
    }
    session.flush().await?;
    Ok(Redirect::to("/"))
}
