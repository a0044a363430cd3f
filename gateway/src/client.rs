//! The multi-shard supervisor.

use crate::{
    callback::{DispatchCallback, StatusCallback},
    error::GatewayCriticalError,
    intents::Intents,
    shard::Shard,
};
use corvid_gateway_queue::{GatewayRateLimiter, InMemoryGatewayRateLimiter};
use corvid_http::{routing::Route, Client};
use http::Method;
use serde::Deserialize;
use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    sync::{Arc, RwLock},
};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{info, instrument};
use url::Url;

/// Body of `GET /gateway/bot`.
#[derive(Clone, Debug, Deserialize)]
struct SessionInfo {
    url: String,
    shards: u64,
    session_start_limit: SessionStartLimit,
}

#[derive(Clone, Debug, Deserialize)]
struct SessionStartLimit {
    max_concurrency: usize,
}

/// A failure of [`GatewayClient::spawn_shards`].
#[derive(Debug)]
pub enum SpawnError {
    /// The `GET /gateway/bot` bootstrap call failed.
    Bootstrap(corvid_http::Error),
    /// A shard already running hit a critical close code before startup
    /// finished; no further shards were started.
    Critical(GatewayCriticalError),
}

impl Display for SpawnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bootstrap(source) => write!(f, "failed to fetch gateway session info: {source}"),
            Self::Critical(critical) => write!(f, "startup halted: {critical}"),
        }
    }
}

impl StdError for SpawnError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Bootstrap(source) => Some(source),
            Self::Critical(critical) => Some(critical),
        }
    }
}

/// Builder for [`GatewayClient`].
pub struct GatewayClientBuilder {
    http: Client,
    token: String,
    intents: Intents,
    shard_count: Option<u64>,
    shard_ids: Option<Vec<u64>>,
    start_limiter: Option<Arc<dyn GatewayRateLimiter>>,
    status_hooks: Vec<StatusCallback>,
    dispatch_callbacks: Vec<DispatchCallback>,
}

impl GatewayClientBuilder {
    /// Start building a client. `http` is used for the `GET /gateway/bot`
    /// bootstrap call; `token` authenticates every shard's IDENTIFY.
    #[must_use]
    pub fn new(http: Client, token: impl Into<String>, intents: Intents) -> Self {
        Self {
            http,
            token: token.into(),
            intents,
            shard_count: None,
            shard_ids: None,
            start_limiter: None,
            status_hooks: Vec::new(),
            dispatch_callbacks: Vec::new(),
        }
    }

    /// Fix the total shard count instead of using Discord's recommendation.
    ///
    /// Without `shard_ids`, all ids in `[0, shard_count)` are spawned.
    #[must_use]
    pub fn shard_count(mut self, shard_count: u64) -> Self {
        self.shard_count = Some(shard_count);
        self
    }

    /// Spawn only these ids (requires [`Self::shard_count`]).
    #[must_use]
    pub fn shard_ids(mut self, shard_ids: Vec<u64>) -> Self {
        self.shard_ids = Some(shard_ids);
        self
    }

    /// Override the session-start concurrency gate instead of deriving one
    /// from `session_start_limit.max_concurrency`.
    #[must_use]
    pub fn start_limiter(mut self, start_limiter: Arc<dyn GatewayRateLimiter>) -> Self {
        self.start_limiter = Some(start_limiter);
        self
    }

    /// Register a status-change hook, invoked fire-and-forget for every
    /// shard this client spawns.
    #[must_use]
    pub fn status_hook(mut self, hook: StatusCallback) -> Self {
        self.status_hooks.push(hook);
        self
    }

    /// Register a dispatch callback, invoked in registration order for
    /// every inbound and outbound frame of every shard this client spawns.
    #[must_use]
    pub fn dispatch_callback(mut self, callback: DispatchCallback) -> Self {
        self.dispatch_callbacks.push(callback);
        self
    }

    /// Build the client. Does not connect; call [`GatewayClient::spawn_shards`].
    #[must_use]
    pub fn build(self) -> GatewayClient {
        GatewayClient(Arc::new(ClientRef {
            http: self.http,
            token: self.token,
            intents: self.intents,
            shard_count: self.shard_count,
            shard_ids: self.shard_ids,
            start_limiter: self.start_limiter,
            status_hooks: self.status_hooks.into(),
            dispatch_callbacks: self.dispatch_callbacks.into(),
            shards: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            panic: RwLock::new(None),
            stop: Notify::new(),
        }))
    }
}

struct ClientRef {
    http: Client,
    token: String,
    intents: Intents,
    shard_count: Option<u64>,
    shard_ids: Option<Vec<u64>>,
    start_limiter: Option<Arc<dyn GatewayRateLimiter>>,
    status_hooks: Arc<[StatusCallback]>,
    dispatch_callbacks: Arc<[DispatchCallback]>,
    shards: RwLock<HashMap<u64, Arc<Shard>>>,
    tasks: RwLock<HashMap<u64, JoinHandle<()>>>,
    /// Set once any shard has observed a critical close code. Carries the
    /// actual close code that caused it, not merely whether one occurred.
    panic: RwLock<Option<GatewayCriticalError>>,
    stop: Notify,
}

/// Owns every [`Shard`] a bot runs and the task supervising each of them.
///
/// Cheaply [`Clone`]able; every clone shares the same shard map and panic
/// flag.
#[derive(Clone)]
pub struct GatewayClient(Arc<ClientRef>);

impl GatewayClient {
    /// Start building a client that authenticates through `http` and `token`.
    #[must_use]
    pub fn builder(http: Client, token: impl Into<String>, intents: Intents) -> GatewayClientBuilder {
        GatewayClientBuilder::new(http, token, intents)
    }

    /// Resolve the shard list, construct each [`Shard`], and spawn a
    /// background task running its connect loop.
    ///
    /// Identify operations are paced by the session-start concurrency gate
    /// Discord reports (or [`GatewayClientBuilder::start_limiter`], if
    /// set); startup stops early with the first critical error any shard
    /// observes, without starting shards not yet begun.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::Bootstrap`] if `GET /gateway/bot` fails, or
    /// [`SpawnError::Critical`] if a shard already spawned hit a critical
    /// close code before startup finished.
    #[instrument(skip(self))]
    pub async fn spawn_shards(&self) -> Result<(), SpawnError> {
        let info = self.fetch_session_info().await.map_err(SpawnError::Bootstrap)?;
        let url = Self::connection_url(&info.url);

        let ids: Vec<u64> = match (self.0.shard_count, &self.0.shard_ids) {
            (Some(_), Some(ids)) => ids.clone(),
            (Some(count), None) => (0..count).collect(),
            (None, _) => (0..info.shards).collect(),
        };

        let shard_count = self.0.shard_count.unwrap_or(info.shards);

        let start_limiter = self.0.start_limiter.clone().unwrap_or_else(|| {
            Arc::new(InMemoryGatewayRateLimiter::new(
                info.session_start_limit.max_concurrency.max(1),
                5,
            ))
        });

        for id in ids {
            if let Some(critical) = *self.0.panic.read().expect("poisoned") {
                return Err(SpawnError::Critical(critical));
            }

            start_limiter.acquire().await;

            let send_limiter = Arc::new(InMemoryGatewayRateLimiter::new(120, 60));

            let shard = Arc::new(Shard::new(
                id,
                shard_count,
                self.0.token.clone(),
                self.0.intents,
                Arc::clone(&self.0.dispatch_callbacks),
                Arc::clone(&self.0.status_hooks),
                send_limiter,
            ));

            self.0
                .shards
                .write()
                .expect("poisoned")
                .insert(id, Arc::clone(&shard));

            let client = self.clone();
            let url = url.clone();

            let handle = tokio::spawn(async move {
                let critical = shard.connect(&url).await;
                info!(shard = id, code = critical.code(), "shard stopped, setting panic flag");
                *client.0.panic.write().expect("poisoned") = Some(critical);
            });

            self.0.tasks.write().expect("poisoned").insert(id, handle);
        }

        Ok(())
    }

    /// Idle supervisor loop: ticks every second, returning the first
    /// critical error observed, or `None` if [`Self::stop`] was called
    /// first.
    pub async fn run(&self) -> Option<GatewayCriticalError> {
        loop {
            tokio::select! {
                () = tokio::time::sleep(std::time::Duration::from_secs(1)) => {
                    if let Some(critical) = *self.0.panic.read().expect("poisoned") {
                        return Some(critical);
                    }
                }
                () = self.0.stop.notified() => return None,
            }
        }
    }

    /// Signal [`Self::run`] to return and abort every shard's task.
    pub fn stop(&self) {
        for (_, handle) in self.0.tasks.write().expect("poisoned").drain() {
            handle.abort();
        }

        self.0.stop.notify_waiters();
    }

    /// Look up a spawned shard by id.
    #[must_use]
    pub fn get_shard(&self, id: u64) -> Option<Arc<Shard>> {
        self.0.shards.read().expect("poisoned").get(&id).cloned()
    }

    /// The critical error that halted startup, if any.
    #[must_use]
    pub fn panic(&self) -> Option<GatewayCriticalError> {
        *self.0.panic.read().expect("poisoned")
    }

    async fn fetch_session_info(&self) -> Result<SessionInfo, corvid_http::Error> {
        let route = Route::new(Method::GET, "gateway/bot");

        let response = self.0.http.request(route, None, None, &[], None, 3).await?;

        response.json().await
    }

    /// Append the version/encoding query parameters every shard's socket
    /// URL needs, falling back to the bare URL if it doesn't parse (the
    /// connect attempt will then fail and the backoff loop retries).
    fn connection_url(base: &str) -> String {
        Url::parse(base).map_or_else(
            |_| base.to_owned(),
            |mut url| {
                url.query_pairs_mut()
                    .append_pair("v", "10")
                    .append_pair("encoding", "json");
                url.to_string()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayClient;
    use static_assertions::assert_impl_all;

    assert_impl_all!(GatewayClient: Clone, Send, Sync);

    #[test]
    fn connection_url_appends_version_and_encoding() {
        let url = GatewayClient::connection_url("wss://gateway.discord.gg");

        assert!(url.starts_with("wss://gateway.discord.gg?"));
        assert!(url.contains("v=10"));
        assert!(url.contains("encoding=json"));
    }

    #[test]
    fn connection_url_falls_back_on_unparseable_input() {
        assert_eq!("not a url", GatewayClient::connection_url("not a url"));
    }

    #[test]
    fn no_shards_spawned_until_bot_gate() {
        let client = GatewayClient::builder(
            corvid_http::Client::new("token"),
            "token",
            crate::intents::Intents::empty(),
        )
        .build();

        assert!(client.get_shard(0).is_none());
        assert!(client.panic().is_none());
    }
}
