use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

use super::{
    AuthSession, ChannelFilter, Gateway, GatewayError, GatewayResult, GetField, Query, Row,
    RowEvent, Subscription,
};

/// Where a poller left off. Rows sharing the cursor's timestamp are remembered
/// so an inclusive poll neither skips nor repeats them.
#[derive(Debug)]
struct PollCursor {
    at: String,
    seen: HashSet<String>,
}

impl PollCursor {
    fn new(at: String) -> Self {
        Self {
            at,
            seen: HashSet::new(),
        }
    }

    /// Drops rows already delivered and moves the cursor past the rest.
    fn advance(&mut self, rows: Vec<Row>) -> Vec<Row> {
        let mut fresh = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.get_str_field("id").unwrap_or_else(|_| row.to_string());
            if let Ok(created_at) = row.get_str_field("created_at") {
                if created_at != self.at {
                    self.at = created_at;
                    self.seen.clear();
                }
            }
            if self.seen.insert(key) {
                fresh.push(row);
            }
        }
        fresh
    }
}

/// Gateway speaking to the hosted backend over HTTP.
#[derive(Clone)]
pub struct RestGateway {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    user: Option<AuthUser>,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Serialize)]
struct SignUpData<'a> {
    full_name: &'a str,
}

impl RestGateway {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        let http = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_owned(),
            anon_key: config.backend_anon_key.clone(),
            access_token: None,
            poll_interval: config.realtime_poll,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(GatewayError::Unauthorized);
            }
            return Err(GatewayError::Backend {
                status: status.as_u16(),
                message: backend_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn auth_session(response: AuthResponse) -> GatewayResult<AuthSession> {
        let user = response
            .user
            .ok_or_else(|| GatewayError::Unexpected("auth response without user".to_owned()))?;
        let access_token = response.access_token.ok_or(GatewayError::Unauthorized)?;
        Ok(AuthSession {
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            access_token,
        })
    }
}

/// Pulls the human readable part out of a PostgREST, GoTrue or storage error body.
fn backend_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_owned();
    };

    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|field| json.get_str_field(field).ok())
        .unwrap_or_else(|| body.trim().to_owned())
}

#[async_trait]
impl Gateway for RestGateway {
    async fn select(&self, query: &Query) -> GatewayResult<Vec<Row>> {
        let response = self
            .request(Method::GET, &format!("/rest/v1/{}", query.table))
            .query(&query.params())
            .send()
            .await?;
        Self::read(response).await
    }

    async fn insert(&self, table: &str, row: Row) -> GatewayResult<Row> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Row> = Self::read(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::Unexpected(format!("insert into {table} returned no row")))
    }

    async fn update(&self, query: &Query, patch: Row) -> GatewayResult<Vec<Row>> {
        let params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|filter| (filter.column.clone(), filter.expr()))
            .collect();
        let response = self
            .request(Method::PATCH, &format!("/rest/v1/{}", query.table))
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn delete(&self, query: &Query) -> GatewayResult<()> {
        let params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|filter| (filter.column.clone(), filter.expr()))
            .collect();
        let response = self
            .request(Method::DELETE, &format!("/rest/v1/{}", query.table))
            .query(&params)
            .send()
            .await?;
        let _: Value = Self::read(response).await?;
        Ok(())
    }

    async fn rpc(&self, name: &str, args: Value) -> GatewayResult<Value> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/rpc/{name}"))
            .json(&args)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<String> {
        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        let _: Value = Self::read(response).await?;
        Ok(format!(
            "{}/storage/v1/object/public/{bucket}/{path}",
            self.base_url
        ))
    }

    /// Polls for rows newer than the last one seen. The task stops when the
    /// subscription is dropped.
    async fn subscribe(&self, filter: ChannelFilter) -> GatewayResult<Subscription> {
        let gateway = self.clone();
        let task_filter = filter.clone();
        let (tx, rx) = mpsc::channel(64);
        let mut cursor = PollCursor::new(
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .map_err(|e| GatewayError::Unexpected(e.to_string()))?,
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gateway.poll_interval);
            loop {
                ticker.tick().await;
                let query = Query::table(&task_filter.table)
                    .eq(&task_filter.column, task_filter.value.clone())
                    .gte("created_at", cursor.at.clone())
                    .order("created_at", true);

                let rows = match gateway.select(&query).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        warn!("{} poll failed: {err}", task_filter.topic());
                        continue;
                    }
                };

                for row in cursor.advance(rows) {
                    let event = RowEvent {
                        table: task_filter.table.clone(),
                        row,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        debug!("subscribed to {}", filter.topic());
        Ok(Subscription::new(filter, rx, task))
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
        let response = self
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        Self::auth_session(Self::read(response).await?)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> GatewayResult<Option<AuthSession>> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&SignUpRequest {
                email,
                password,
                data: SignUpData { full_name },
            })
            .send()
            .await?;
        let response: AuthResponse = Self::read(response).await?;
        if response.access_token.is_none() {
            return Ok(None);
        }
        Self::auth_session(response).map(Some)
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        let mut url = match reqwest::Url::parse(&format!("{}/auth/v1/authorize", self.base_url)) {
            Ok(url) => url,
            Err(err) => {
                warn!("bad backend url: {err}");
                return "/login".to_owned();
            }
        };
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        url.to_string()
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> GatewayResult<AuthSession> {
        let response = self
            .request(Method::POST, "/auth/v1/token?grant_type=pkce")
            .json(&PkceGrant {
                auth_code: code,
                code_verifier,
            })
            .send()
            .await?;
        Self::auth_session(Self::read(response).await?)
    }

    fn scoped(&self, access_token: &str) -> Arc<dyn Gateway> {
        Arc::new(Self {
            access_token: Some(access_token.to_owned()),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_cursor_keeps_rows_sharing_a_timestamp() {
        let at = "2026-10-15T09:00:00Z";
        let mut cursor = PollCursor::new(at.to_owned());

        let first = cursor.advance(vec![serde_json::json!({ "id": "a", "created_at": at })]);
        assert_eq!(first.len(), 1);

        // a second row written in the same instant shows up on the next poll
        let second = cursor.advance(vec![
            serde_json::json!({ "id": "a", "created_at": at }),
            serde_json::json!({ "id": "b", "created_at": at }),
        ]);
        assert_eq!(second, vec![serde_json::json!({ "id": "b", "created_at": at })]);

        let later = "2026-10-15T09:00:01Z";
        let third = cursor.advance(vec![
            serde_json::json!({ "id": "b", "created_at": at }),
            serde_json::json!({ "id": "c", "created_at": later }),
        ]);
        assert_eq!(third, vec![serde_json::json!({ "id": "c", "created_at": later })]);
        assert_eq!(cursor.at, later);
    }

    #[test]
    fn extracts_backend_messages() {
        assert_eq!(
            backend_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(
            backend_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(backend_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn authorize_url_carries_pkce_challenge() {
        let gateway = RestGateway::new(&Config::default()).unwrap();
        let url = gateway.authorize_url("google", "http://localhost:8080/auth/callback", "abc");
        assert!(url.starts_with("http://localhost:54321/auth/v1/authorize?provider=google"));
        assert!(url.contains("code_challenge=abc"));
        assert!(url.contains("code_challenge_method=s256"));
    }
}
