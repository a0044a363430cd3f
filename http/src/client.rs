//! The REST client.

use crate::{
    error::Error,
    file::File,
    request::Form,
    response::Response,
    routing::Route,
};
use corvid_http_ratelimiting::{InMemoryRateLimiter, RateLimiter};
use http::{
    header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    HeaderMap, StatusCode,
};
use hyper::{client::HttpConnector, Body};
use hyper_rustls::HttpsConnector;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    future::Future,
    pin::Pin,
    sync::{Arc, RwLock},
    time::Duration,
};
use tracing::instrument;

/// Discord API version this crate speaks.
pub const API_VERSION: u8 = 10;

/// Default base URL requests are issued against.
const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Metadata handed to response callbacks.
///
/// Callbacks can't receive the full [`Response`], since its body is a
/// single-consumption stream and the same response is also handed back to
/// the caller of [`Client::request`]; they instead see its status and
/// headers.
#[derive(Clone, Debug)]
pub struct ResponseInfo {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseInfo {
    /// The response's status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The response's headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

type CallbackFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A fire-and-forget observer of completed requests.
pub type ResponseCallback = Arc<dyn Fn(ResponseInfo, Route<'static>) -> CallbackFuture + Send + Sync>;

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    token: String,
    api_url: Option<String>,
    user_agent: Option<String>,
    proxy_url: Option<String>,
    ratelimiter: Option<Arc<dyn RateLimiter>>,
}

impl ClientBuilder {
    /// Start building a client authenticating with `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Override the `User-Agent` header sent with every request.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Route requests through an HTTP proxy that mirrors Discord's API
    /// surface at a different base URL.
    #[must_use]
    pub fn proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Use a custom ratelimiter instead of [`InMemoryRateLimiter`].
    #[must_use]
    pub fn ratelimiter(mut self, ratelimiter: Arc<dyn RateLimiter>) -> Self {
        self.ratelimiter = Some(ratelimiter);
        self
    }

    /// Build the client.
    #[must_use]
    pub fn build(self) -> Client {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let http = hyper::Client::builder().build::<_, Body>(https);

        Client(Arc::new(ClientRef {
            token: self.token.trim().to_owned(),
            api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            user_agent: self.user_agent.unwrap_or_else(|| {
                format!(
                    "DiscordBot (https://github.com/corvid-rs/corvid, {})",
                    env!("CARGO_PKG_VERSION")
                )
            }),
            proxy_url: self.proxy_url,
            http,
            ratelimiter: self
                .ratelimiter
                .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::new())),
            on_success: RwLock::new(Vec::new()),
            on_error: RwLock::new(Vec::new()),
            on_ratelimit: RwLock::new(Vec::new()),
        }))
    }
}

struct ClientRef {
    token: String,
    api_url: String,
    user_agent: String,
    proxy_url: Option<String>,
    http: hyper::Client<HttpsConnector<HttpConnector>>,
    ratelimiter: Arc<dyn RateLimiter>,
    on_success: RwLock<Vec<ResponseCallback>>,
    on_error: RwLock<Vec<ResponseCallback>>,
    on_ratelimit: RwLock<Vec<ResponseCallback>>,
}

impl Debug for ClientRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ClientRef")
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .field("proxy_url", &self.proxy_url)
            .finish_non_exhaustive()
    }
}

/// REST client for the Discord HTTP API.
///
/// Cheaply [`Clone`]able; every clone shares the same connection pool,
/// ratelimiter state, and callback registrations.
#[derive(Clone, Debug)]
pub struct Client(Arc<ClientRef>);

impl Client {
    /// Create a client authenticating with `token`, using default settings.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        ClientBuilder::new(token).build()
    }

    /// Start building a client with non-default settings.
    #[must_use]
    pub fn builder(token: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(token)
    }

    /// Register a callback invoked, fire-and-forget, after every successful
    /// (2xx) response.
    pub fn on_success(&self, callback: ResponseCallback) {
        self.0.on_success.write().expect("poisoned").push(callback);
    }

    /// Register a callback invoked, fire-and-forget, after every
    /// unsuccessful response.
    pub fn on_error(&self, callback: ResponseCallback) {
        self.0.on_error.write().expect("poisoned").push(callback);
    }

    /// Register a callback invoked, fire-and-forget, whenever a response
    /// indicates a ratelimit (bucket exhaustion or a 429).
    pub fn on_ratelimit(&self, callback: ResponseCallback) {
        self.0.on_ratelimit.write().expect("poisoned").push(callback);
    }

    fn dispatch(&self, which: &RwLock<Vec<ResponseCallback>>, info: ResponseInfo, route: Route<'static>) {
        let callbacks = which.read().expect("poisoned").clone();

        for callback in callbacks {
            tokio::spawn(callback(info.clone(), route.clone()));
        }
    }

    /// Issue a request against `route`, retrying up to `max_attempts` times.
    ///
    /// `json` distinguishes "no body" (`None`) from "an explicit JSON
    /// `null` body" (`Some(&Value::Null)`).
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the request could not be built or sent, or
    /// if the final attempt still produced a non-2xx response.
    #[instrument(skip(self, route, files, json), fields(method = %route.method(), path = route.path()))]
    pub async fn request(
        &self,
        route: Route<'_>,
        qparams: Option<&[(&str, &str)]>,
        reason: Option<&str>,
        files: &[File<'_>],
        json: Option<&serde_json::Value>,
        max_attempts: u32,
    ) -> Result<Response, Error> {
        let owned_route = route.clone().into_owned();
        let bucket = route.bucket();

        let path = Self::build_path(route.path(), qparams);

        let mut last_status = None;
        let mut last_body = Vec::new();

        for attempt in 0..max_attempts {
            let outcome = self
                .attempt(&path, &route, &bucket, reason, files, json, &owned_route)
                .await?;

            match outcome {
                Attempt::Success(response) => return Ok(response),
                Attempt::Retry { status, body } => {
                    last_status = Some(status);
                    last_body = body;

                    if attempt + 1 == max_attempts {
                        break;
                    }

                    let backoff = Duration::from_secs_f64(1.0 + 2.0 * f64::from(attempt));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(Error::response(
            last_status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            last_body,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        path: &str,
        route: &Route<'_>,
        bucket: &str,
        reason: Option<&str>,
        files: &[File<'_>],
        json: Option<&serde_json::Value>,
        owned_route: &Route<'static>,
    ) -> Result<Attempt, Error> {
        let (content_type, body_bytes) = Self::build_body(files, json)?;

        let base = self.0.proxy_url.as_deref().unwrap_or(&self.0.api_url);
        let uri = format!("{base}{path}");

        let mut builder = hyper::Request::builder().method(route.method().clone()).uri(uri);

        builder = builder.header(AUTHORIZATION, format!("Bot {}", self.0.token));
        builder = builder.header(USER_AGENT, self.0.user_agent.as_str());

        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        if let Some(reason) = reason {
            let value = HeaderValue::from_str(&utf8_percent_encode(reason, NON_ALPHANUMERIC).to_string())
                .map_err(|_| Error::building("audit log reason is not valid for a header value"))?;
            builder = builder.header(HeaderName::from_static("x-audit-log-reason"), value);
        }

        let body = body_bytes.map_or_else(Body::empty, Body::from);
        let request = builder.body(body).map_err(|_| Error::building("failed to assemble request"))?;

        let lock = self.0.ratelimiter.acquire(bucket.to_owned()).await;
        lock.acquire().await;

        let response = self.0.http.request(request).await;

        let response = match response {
            Ok(response) => response,
            Err(source) => {
                lock.release(Duration::ZERO);
                return Err(Error::request(source));
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        let remaining: u64 = header_str(&headers, "x-ratelimit-remaining")
            .and_then(|value| value.parse().ok())
            .unwrap_or(1);
        let reset_after: f64 = header_str(&headers, "x-ratelimit-reset-after")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0);

        let info = ResponseInfo {
            status,
            headers: headers.clone(),
        };

        if status.is_success() {
            self.dispatch(&self.0.on_success, info.clone(), owned_route.clone());

            if remaining == 0 {
                self.dispatch(&self.0.on_ratelimit, info, owned_route.clone());
                lock.release(Duration::from_secs_f64(reset_after));
            } else {
                lock.release(Duration::ZERO);
            }

            return Ok(Attempt::Success(Response::new(status, headers, response.into_body())));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.dispatch(&self.0.on_error, info.clone(), owned_route.clone());
            self.dispatch(&self.0.on_ratelimit, info, owned_route.clone());

            if !headers.contains_key("via") {
                lock.release(Duration::ZERO);
                return Err(Error::response(status, Vec::new()).with_cloudflare_ban());
            }

            let body = Response::new(status, headers.clone(), response.into_body())
                .bytes()
                .await?;

            let parsed: RatelimitBody = serde_json::from_slice(&body).unwrap_or(RatelimitBody {
                global: false,
                retry_after: reset_after,
            });

            if parsed.global {
                lock.release(Duration::ZERO);
                self.0
                    .ratelimiter
                    .lock_globally(Duration::from_secs_f64(parsed.retry_after))
                    .await;
            } else {
                lock.release(Duration::from_secs_f64(parsed.retry_after));
            }

            return Ok(Attempt::Retry { status, body });
        }

        self.dispatch(&self.0.on_error, info, owned_route.clone());
        lock.release(Duration::ZERO);

        let body = Response::new(status, headers, response.into_body())
            .bytes()
            .await
            .unwrap_or_default();

        Err(Error::response(status, body))
    }

    fn build_path(path: &str, qparams: Option<&[(&str, &str)]>) -> String {
        let mut full = format!("/{path}");

        if let Some(qparams) = qparams {
            if !qparams.is_empty() {
                full.push('?');

                for (i, (key, value)) in qparams.iter().enumerate() {
                    if i > 0 {
                        full.push('&');
                    }

                    full.push_str(key);
                    full.push('=');
                    full.push_str(&utf8_percent_encode(value, NON_ALPHANUMERIC).to_string());
                }
            }
        }

        full
    }

    fn build_body(files: &[File<'_>], json: Option<&serde_json::Value>) -> Result<(Option<String>, Option<Vec<u8>>), Error> {
        if files.is_empty() {
            return match json {
                Some(value) => {
                    let bytes = serde_json::to_vec(value).map_err(Error::json)?;
                    Ok((Some("application/json".to_owned()), Some(bytes)))
                }
                None => Ok((None, None)),
            };
        }

        let mut form = Form::new();

        for (index, file) in files.iter().enumerate() {
            form.file(index, file);
        }

        if let Some(value) = json {
            let bytes = serde_json::to_vec(value).map_err(Error::json)?;
            form.payload_json(&bytes);
        }

        let (content_type, body) = form.build();

        Ok((Some(content_type), Some(body)))
    }
}

enum Attempt {
    Success(Response),
    Retry { status: StatusCode, body: Vec<u8> },
}

#[derive(serde::Deserialize)]
struct RatelimitBody {
    #[serde(default)]
    global: bool,
    retry_after: f64,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

impl Error {
    fn with_cloudflare_ban(self) -> Self {
        let (_, source) = self.into_parts();
        Self {
            kind: crate::error::ErrorType::CloudflareBan,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(Client: Clone, Debug, Send, Sync);

    #[test]
    fn builder_trims_token() {
        let client = Client::builder(" token.value ".to_owned()).build();
        assert_eq!(client.0.token, "token.value");
    }
}
