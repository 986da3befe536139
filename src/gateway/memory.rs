use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{
    AuthSession, ChannelFilter, Gateway, GatewayError, GatewayResult, Query, Row, RowEvent,
    Subscription, realtime,
};

pub type Procedure = Arc<dyn Fn(&MemoryGateway, Value) -> GatewayResult<Value> + Send + Sync>;

struct MemoryUser {
    id: Uuid,
    email: String,
    password: String,
}

struct Inner {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    procedures: Mutex<HashMap<String, Procedure>>,
    failures: Mutex<HashMap<String, String>>,
    users: Mutex<Vec<MemoryUser>>,
    codes: Mutex<HashMap<String, Uuid>>,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    events: broadcast::Sender<RowEvent>,
    calls: AtomicUsize,
}

/// Backend held entirely in memory. Inserts are published on the realtime hub the way the
/// hosted channel would publish them.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::default(),
                procedures: Mutex::default(),
                failures: Mutex::default(),
                users: Mutex::default(),
                codes: Mutex::default(),
                objects: Mutex::default(),
                events: broadcast::channel(256).0,
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Appends rows without publishing realtime events.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> &Self {
        lock(&self.inner.tables)
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.inner.tables)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn register<F>(&self, name: &str, procedure: F) -> &Self
    where
        F: Fn(&MemoryGateway, Value) -> GatewayResult<Value> + Send + Sync + 'static,
    {
        lock(&self.inner.procedures).insert(name.to_owned(), Arc::new(procedure));
        self
    }

    /// Makes every call touching `target` fail with `message`. Targets are table names,
    /// `rpc:<name>`, `storage:<bucket>` or `realtime`.
    pub fn fail(&self, target: &str, message: &str) -> &Self {
        lock(&self.inner.failures).insert(target.to_owned(), message.to_owned());
        self
    }

    pub fn recover(&self, target: &str) -> &Self {
        lock(&self.inner.failures).remove(target);
        self
    }

    pub fn add_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.inner.users).push(MemoryUser {
            id,
            email: email.to_owned(),
            password: password.to_owned(),
        });
        id
    }

    /// Issues an authorization code as the provider redirect would.
    pub fn issue_code(&self, user_id: Uuid) -> String {
        let code = Uuid::new_v4().simple().to_string();
        lock(&self.inner.codes).insert(code.clone(), user_id);
        code
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<(String, Vec<u8>)> {
        lock(&self.inner.objects)
            .get(&format!("{bucket}/{path}"))
            .cloned()
    }

    /// Number of gateway operations attempted so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Publishes an insert as if another client had written it.
    pub fn publish(&self, table: &str, row: Row) -> Row {
        let row = self.store(table, row);
        let _ = self.inner.events.send(RowEvent {
            table: table.to_owned(),
            row: row.clone(),
        });
        row
    }

    fn check(&self, target: &str) -> GatewayResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.inner.failures).get(target) {
            Some(message) => Err(GatewayError::Backend {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn store(&self, table: &str, mut row: Row) -> Row {
        if let Some(fields) = row.as_object_mut() {
            if fields.get("id").is_none_or(Value::is_null) {
                fields.insert("id".to_owned(), json!(Uuid::new_v4()));
            }
            if fields.get("created_at").is_none_or(Value::is_null) {
                fields.insert("created_at".to_owned(), json!(now()));
            }
        }
        lock(&self.inner.tables)
            .entry(table.to_owned())
            .or_default()
            .push(row.clone());
        row
    }

    fn session_for(&self, id: Uuid, email: &str) -> AuthSession {
        AuthSession {
            user_id: id,
            email: email.to_owned(),
            access_token: format!("memory-token-{id}"),
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn select(&self, query: &Query) -> GatewayResult<Vec<Row>> {
        self.check(&query.table)?;
        let tables = lock(&self.inner.tables);
        Ok(tables
            .get(&query.table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Row) -> GatewayResult<Row> {
        self.check(table)?;
        if !row.is_object() {
            return Err(GatewayError::Backend {
                status: 400,
                message: format!("{table} rows must be objects"),
            });
        }
        Ok(self.publish(table, row))
    }

    async fn update(&self, query: &Query, patch: Row) -> GatewayResult<Vec<Row>> {
        self.check(&query.table)?;
        let Some(patch) = patch.as_object() else {
            return Err(GatewayError::Backend {
                status: 400,
                message: "patch must be an object".to_owned(),
            });
        };

        let mut tables = lock(&self.inner.tables);
        let mut updated = Vec::new();
        for row in tables.entry(query.table.clone()).or_default().iter_mut() {
            if !query.matches(row) {
                continue;
            }
            if let Some(fields) = row.as_object_mut() {
                for (key, value) in patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> GatewayResult<()> {
        self.check(&query.table)?;
        if let Some(rows) = lock(&self.inner.tables).get_mut(&query.table) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }

    async fn rpc(&self, name: &str, args: Value) -> GatewayResult<Value> {
        self.check(&format!("rpc:{name}"))?;
        let procedure = lock(&self.inner.procedures).get(name).cloned();
        match procedure {
            Some(procedure) => procedure(self, args),
            None => Err(GatewayError::Backend {
                status: 404,
                message: format!("Could not find the function public.{name}"),
            }),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<String> {
        self.check(&format!("storage:{bucket}"))?;
        lock(&self.inner.objects).insert(
            format!("{bucket}/{path}"),
            (content_type.to_owned(), bytes),
        );
        Ok(format!("/storage/v1/object/public/{bucket}/{path}"))
    }

    async fn subscribe(&self, filter: ChannelFilter) -> GatewayResult<Subscription> {
        self.check("realtime")?;
        debug!("subscribing to {}", filter.topic());
        Ok(realtime::forward(filter, self.inner.events.subscribe()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
        self.check("auth")?;
        let users = lock(&self.inner.users);
        users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email) && user.password == password)
            .map(|user| self.session_for(user.id, &user.email))
            .ok_or(GatewayError::Backend {
                status: 400,
                message: "Invalid login credentials".to_owned(),
            })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> GatewayResult<Option<AuthSession>> {
        self.check("auth")?;
        if lock(&self.inner.users)
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(email))
        {
            return Err(GatewayError::Backend {
                status: 422,
                message: "User already registered".to_owned(),
            });
        }

        let id = self.add_user(email, password);
        // the hosted schema creates the profile row from a signup trigger
        self.store(
            "profiles",
            json!({ "id": id, "email": email, "full_name": full_name, "role": "client" }),
        );
        Ok(Some(self.session_for(id, email)))
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "/auth/v1/authorize?provider={provider}&redirect_to={redirect_to}&code_challenge={code_challenge}&code_challenge_method=s256"
        )
    }

    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> GatewayResult<AuthSession> {
        self.check("auth")?;
        let user_id = lock(&self.inner.codes)
            .remove(code)
            .ok_or(GatewayError::Unauthorized)?;
        let users = lock(&self.inner.users);
        let user = users
            .iter()
            .find(|user| user.id == user_id)
            .ok_or(GatewayError::Unauthorized)?;
        Ok(self.session_for(user.id, &user.email))
    }

    fn scoped(&self, _access_token: &str) -> Arc<dyn Gateway> {
        Arc::new(self.clone())
    }
}
