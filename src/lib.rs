pub mod admin;
pub mod auth;
pub mod config;
pub mod consultation;
pub mod dashboard;
pub mod gateway;
pub mod messages;
pub mod models;
pub mod res;
pub mod session;
pub mod site;
pub mod sync;
pub mod toast;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::error;

use crate::{config::Config, gateway::Gateway, sync::QueryCache};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub cache: Arc<QueryCache>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn Gateway>, config: Config) -> Self {
        Self {
            gateway,
            cache: Arc::new(QueryCache::new(config.query_cache_ttl)),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(state.config.session_idle));

    Router::new()
        .merge(site::router())
        .merge(auth::router())
        .nest("/dashboard", dashboard::router())
        .nest("/consultation", consultation::router())
        .nest("/admin", admin::router())
        .fallback(res::fallback)
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
