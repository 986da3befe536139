//! Access to the hosted backend: table reads and writes, named remote procedures,
//! object storage, auth and the realtime channel.
//!
//! Everything above this module talks to an `Arc<dyn Gateway>` handed down through
//! [`crate::AppState`], so tests swap in [`MemoryGateway`] for [`RestGateway`].

mod memory;
mod query;
mod realtime;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryGateway;
pub use query::{Filter, Op, Order, Query};
pub use realtime::{ChannelFilter, RowEvent, Subscription};
pub use rest::RestGateway;

pub type Row = Value;
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Raw message from the backend, shown to the user as is.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("could not read response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("no {table} row matched")]
    NotFound { table: String },

    #[error("not signed in")]
    Unauthorized,

    #[error("{0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Session handed back by the backend's auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn select(&self, query: &Query) -> GatewayResult<Vec<Row>>;

    /// Inserts one row and returns it as stored (ids and timestamps filled in).
    async fn insert(&self, table: &str, row: Row) -> GatewayResult<Row>;

    async fn update(&self, query: &Query, patch: Row) -> GatewayResult<Vec<Row>>;

    async fn delete(&self, query: &Query) -> GatewayResult<()>;

    async fn rpc(&self, name: &str, args: Value) -> GatewayResult<Value>;

    /// Stores an object and returns its public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<String>;

    async fn subscribe(&self, filter: ChannelFilter) -> GatewayResult<Subscription>;

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession>;

    /// `None` when the backend wants the address confirmed before issuing a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> GatewayResult<Option<AuthSession>>;

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> GatewayResult<AuthSession>;

    /// The same backend, acting with a signed-in user's token.
    fn scoped(&self, access_token: &str) -> Arc<dyn Gateway>;
}

pub async fn fetch<T: DeserializeOwned>(gateway: &dyn Gateway, query: &Query) -> GatewayResult<Vec<T>> {
    gateway
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(GatewayError::from))
        .collect()
}

pub async fn fetch_one<T: DeserializeOwned>(gateway: &dyn Gateway, query: &Query) -> GatewayResult<Option<T>> {
    let query = query.clone().limit(1);
    Ok(fetch(gateway, &query).await?.into_iter().next())
}

pub async fn insert<T, R>(gateway: &dyn Gateway, table: &str, row: &T) -> GatewayResult<R>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let stored = gateway.insert(table, serde_json::to_value(row)?).await?;
    Ok(serde_json::from_value(stored)?)
}

pub async fn update<T: Serialize + ?Sized>(gateway: &dyn Gateway, query: &Query, patch: &T) -> GatewayResult<usize> {
    let rows = gateway.update(query, serde_json::to_value(patch)?).await?;
    if rows.is_empty() {
        return Err(GatewayError::NotFound {
            table: query.table.clone(),
        });
    }
    Ok(rows.len())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> GatewayResult<String>;
    fn get_obj_field(&self, field: &str) -> GatewayResult<&Value>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> GatewayResult<String> {
        Ok(self
            .get(field)
            .ok_or_else(|| GatewayError::Unexpected(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| GatewayError::Unexpected(format!("expected {field} in {self} to be string")))?
            .to_owned())
    }

    fn get_obj_field(&self, field: &str) -> GatewayResult<&Value> {
        self.get(field)
            .ok_or_else(|| GatewayError::Unexpected(format!("expected {field} in {self}")))
    }
}
