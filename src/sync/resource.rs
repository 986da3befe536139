use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{
    gateway::{self, Gateway, GatewayError, GatewayResult, Query},
    toast::{Toast, Toasts},
};

use super::QueryCache;

/// One read the dashboard knows how to issue.
#[async_trait]
pub trait Fetch: Send + Sync {
    type Output: Default + Clone + Send + Sync + 'static;

    /// Shown to the user as "Could not load {label}".
    fn label(&self) -> &str;
    fn key(&self) -> String;
    /// Entity tags whose invalidation makes this read stale.
    fn tags(&self) -> Vec<String>;

    /// Reads that change under us (chat history, slot capacity) are never cached.
    fn cacheable(&self) -> bool {
        true
    }
    async fn fetch(&self, gateway: &dyn Gateway) -> GatewayResult<Self::Output>;
}

/// What a page needs to load its resources.
pub struct Loader<'a> {
    gateway: &'a dyn Gateway,
    cache: &'a QueryCache,
    toasts: &'a mut Toasts,
}

impl<'a> Loader<'a> {
    pub fn new(gateway: &'a dyn Gateway, cache: &'a QueryCache, toasts: &'a mut Toasts) -> Self {
        Self {
            gateway,
            cache,
            toasts,
        }
    }

    pub fn gateway(&self) -> &'a dyn Gateway {
        self.gateway
    }
}

/// `{ data, is_loading, error }` for one read, plus a manual `refetch`.
///
/// A failed load leaves `data` at its default and raises exactly one toast. Nothing is
/// retried; the next refetch is the only recovery.
pub struct Resource<F: Fetch> {
    fetcher: F,
    pub data: F::Output,
    pub is_loading: bool,
    pub error: Option<GatewayError>,
}

impl<F: Fetch> Resource<F> {
    pub async fn mount(fetcher: F, loader: &mut Loader<'_>) -> Self {
        let cached = match fetcher.cacheable() {
            true => loader.cache.get::<F::Output>(&fetcher.key()),
            false => None,
        };
        if let Some(data) = cached {
            return Self {
                fetcher,
                data,
                is_loading: false,
                error: None,
            };
        }

        let mut resource = Self {
            fetcher,
            data: F::Output::default(),
            is_loading: true,
            error: None,
        };
        resource.load(loader).await;
        resource
    }

    /// Re-issues the read, bypassing the cache.
    pub async fn refetch(&mut self, loader: &mut Loader<'_>) {
        self.is_loading = true;
        self.load(loader).await;
    }

    async fn load(&mut self, loader: &mut Loader<'_>) {
        match self.fetcher.fetch(loader.gateway).await {
            Ok(data) => {
                if self.fetcher.cacheable() {
                    loader
                        .cache
                        .put(&self.fetcher.key(), &self.fetcher.tags(), data.clone());
                }
                self.data = data;
                self.error = None;
            }
            Err(err) => {
                warn!("loading {} failed: {err}", self.fetcher.label());
                loader.toasts.push(Toast::destructive(
                    format!("Could not load {}", self.fetcher.label()),
                    &err,
                ));
                self.data = F::Output::default();
                self.error = Some(err);
            }
        }
        self.is_loading = false;
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_data(self) -> F::Output {
        self.data
    }
}

/// Rows of one table.
pub struct Rows<T> {
    label: &'static str,
    query: Query,
    tags: Vec<String>,
    live: bool,
    _row: PhantomData<fn() -> T>,
}

impl<T> Rows<T> {
    pub fn new(label: &'static str, query: Query) -> Self {
        Self {
            label,
            tags: vec![query.table.clone()],
            query,
            live: false,
            _row: PhantomData,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Always read from the backend.
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

#[async_trait]
impl<T> Fetch for Rows<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Output = Vec<T>;

    fn label(&self) -> &str {
        self.label
    }

    fn key(&self) -> String {
        self.query.key()
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn cacheable(&self) -> bool {
        !self.live
    }

    async fn fetch(&self, gateway: &dyn Gateway) -> GatewayResult<Vec<T>> {
        gateway::fetch(gateway, &self.query).await
    }
}

/// At most one row.
pub struct One<T>(Rows<T>);

impl<T> One<T> {
    pub fn new(label: &'static str, query: Query) -> Self {
        One(Rows::new(label, query))
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        One(self.0.tag(tag))
    }

    pub fn live(self) -> Self {
        One(self.0.live())
    }
}

#[async_trait]
impl<T> Fetch for One<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Output = Option<T>;

    fn label(&self) -> &str {
        self.0.label
    }

    fn key(&self) -> String {
        format!("{}#one", self.0.query.key())
    }

    fn tags(&self) -> Vec<String> {
        self.0.tags.clone()
    }

    fn cacheable(&self) -> bool {
        !self.0.live
    }

    async fn fetch(&self, gateway: &dyn Gateway) -> GatewayResult<Option<T>> {
        gateway::fetch_one(gateway, &self.0.query).await
    }
}

/// The result of a read-only remote procedure.
pub struct Call<T> {
    label: &'static str,
    name: &'static str,
    args: Value,
    tags: Vec<String>,
    _out: PhantomData<fn() -> T>,
}

impl<T> Call<T> {
    pub fn new(label: &'static str, name: &'static str, args: Value) -> Self {
        Self {
            label,
            name,
            args,
            tags: Vec::new(),
            _out: PhantomData,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[async_trait]
impl<T> Fetch for Call<T>
where
    T: DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    type Output = T;

    fn label(&self) -> &str {
        self.label
    }

    fn key(&self) -> String {
        format!("rpc/{}?{}", self.name, self.args)
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    async fn fetch(&self, gateway: &dyn Gateway) -> GatewayResult<T> {
        let value = gateway.rpc(self.name, self.args.clone()).await?;
        if value.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;

    use crate::gateway::MemoryGateway;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        name: String,
    }

    fn items() -> Rows<Item> {
        Rows::new("items", Query::table("items").order("name", true))
    }

    #[tokio::test]
    async fn mount_fetches_once() {
        let gateway = MemoryGateway::new();
        gateway.seed("items", [json!({"name": "b"}), json!({"name": "a"})]);
        let cache = QueryCache::new(Duration::ZERO);
        let mut toasts = Toasts::default();
        let mut loader = Loader::new(&gateway, &cache, &mut toasts);

        let resource = Resource::mount(items(), &mut loader).await;

        assert!(!resource.is_loading);
        assert!(resource.is_ok());
        assert_eq!(resource.data[0].name, "a");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn failure_yields_default_data_and_one_toast() {
        let gateway = MemoryGateway::new();
        gateway.seed("items", [json!({"name": "a"})]);
        gateway.fail("items", "relation \"items\" does not exist");
        let cache = QueryCache::new(Duration::from_secs(60));
        let mut toasts = Toasts::default();
        let mut loader = Loader::new(&gateway, &cache, &mut toasts);

        let resource = Resource::mount(items(), &mut loader).await;

        assert!(resource.error.is_some());
        assert!(resource.data.is_empty());
        assert_eq!(gateway.calls(), 1);
        assert_eq!(toasts.len(), 1);
        let toast = toasts.iter().next().unwrap();
        assert_eq!(toast.title, "Could not load items");
        assert_eq!(toast.description.as_deref(), Some("relation \"items\" does not exist"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn refetch_recovers_after_failure() {
        let gateway = MemoryGateway::new();
        gateway.seed("items", [json!({"name": "a"})]);
        gateway.fail("items", "timeout");
        let cache = QueryCache::new(Duration::ZERO);
        let mut toasts = Toasts::default();
        let mut loader = Loader::new(&gateway, &cache, &mut toasts);

        let mut resource = Resource::mount(items(), &mut loader).await;
        gateway.recover("items");
        resource.refetch(&mut loader).await;

        assert!(resource.is_ok());
        assert_eq!(resource.data.len(), 1);
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn cached_reads_skip_the_gateway_until_invalidated() {
        let gateway = MemoryGateway::new();
        gateway.seed("items", [json!({"name": "a"})]);
        let cache = QueryCache::new(Duration::from_secs(60));
        let mut toasts = Toasts::default();
        let mut loader = Loader::new(&gateway, &cache, &mut toasts);

        Resource::mount(items(), &mut loader).await;
        gateway.seed("items", [json!({"name": "b"})]);
        let cached = Resource::mount(items(), &mut loader).await;
        assert_eq!(cached.data.len(), 1);
        assert_eq!(gateway.calls(), 1);

        cache.invalidate("items");
        let fresh = Resource::mount(items(), &mut loader).await;
        assert_eq!(fresh.data.len(), 2);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn one_returns_none_for_no_rows() {
        let gateway = MemoryGateway::new();
        let cache = QueryCache::new(Duration::ZERO);
        let mut toasts = Toasts::default();
        let mut loader = Loader::new(&gateway, &cache, &mut toasts);

        let one = Resource::mount(One::<Item>::new("item", Query::table("items")), &mut loader).await;
        assert!(one.is_ok());
        assert_eq!(one.data, None);
    }
}
