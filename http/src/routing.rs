//! Description of a single REST endpoint invocation.

use http::Method;
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

/// One REST endpoint invocation.
///
/// A `Route` carries just enough information to issue the request and to
/// compute the key of the ratelimit bucket it belongs to: the method, the
/// already-formatted path, and the handful of path segments Discord uses to
/// discriminate buckets (`guild_id`, `channel_id`, `webhook_id` paired with
/// `webhook_token`).
///
/// Routes are immutable after construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route<'a> {
    method: Method,
    path: Cow<'a, str>,
    guild_id: Option<u64>,
    channel_id: Option<u64>,
    webhook_id: Option<u64>,
    webhook_token: Option<Cow<'a, str>>,
}

impl<'a> Route<'a> {
    /// Create a route for `method` against an already-formatted `path`
    /// (no leading slash, e.g. `"channels/123/messages"`).
    pub fn new(method: Method, path: impl Into<Cow<'a, str>>) -> Self {
        Self {
            method,
            path: path.into(),
            guild_id: None,
            channel_id: None,
            webhook_id: None,
            webhook_token: None,
        }
    }

    /// Mark this route as belonging to a guild, for bucket derivation.
    #[must_use]
    pub const fn guild_id(mut self, guild_id: u64) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// Mark this route as belonging to a channel, for bucket derivation.
    #[must_use]
    pub const fn channel_id(mut self, channel_id: u64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    /// Mark this route as belonging to a webhook, for bucket derivation.
    #[must_use]
    pub fn webhook(mut self, webhook_id: u64, webhook_token: impl Into<Cow<'a, str>>) -> Self {
        self.webhook_id = Some(webhook_id);
        self.webhook_token = Some(webhook_token.into());
        self
    }

    /// The HTTP method this route is invoked with.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The formatted path, relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Clone this route's borrowed data into an owned, `'static` copy, so it
    /// can be handed to a callback running in a detached task.
    #[must_use]
    pub fn into_owned(self) -> Route<'static> {
        Route {
            method: self.method,
            path: Cow::Owned(self.path.into_owned()),
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            webhook_id: self.webhook_id,
            webhook_token: self.webhook_token.map(|token| Cow::Owned(token.into_owned())),
        }
    }

    /// The ratelimit bucket key this route falls into.
    ///
    /// Two routes with equal method, formatted path, and
    /// `(guild_id, channel_id, webhook_id, webhook_token)` always compute
    /// equal bucket keys; distinct tuples are not guaranteed distinct keys,
    /// but collisions are harmless since they'd simply over-serialize.
    #[must_use]
    pub fn bucket(&self) -> String {
        struct OrNone<'a, T>(&'a Option<T>);

        impl<T: Display> Display for OrNone<'_, T> {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                match self.0 {
                    Some(value) => Display::fmt(value, f),
                    None => f.write_str("None"),
                }
            }
        }

        let webhook_bucket = self
            .webhook_id
            .map(|id| format!("{}:{}", id, self.webhook_token.as_deref().unwrap_or("")));

        format!(
            "{}-{}:{}:{}",
            self.path,
            OrNone(&self.guild_id),
            OrNone(&self.channel_id),
            OrNone(&webhook_bucket),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Route;
    use http::Method;

    #[test]
    fn equal_routes_share_a_bucket() {
        let a = Route::new(Method::POST, "channels/123/messages").channel_id(123);
        let b = Route::new(Method::POST, "channels/123/messages").channel_id(123);

        assert_eq!(a.bucket(), b.bucket());
    }

    #[test]
    fn distinct_channels_diverge() {
        let a = Route::new(Method::POST, "channels/123/messages").channel_id(123);
        let b = Route::new(Method::POST, "channels/456/messages").channel_id(456);

        assert_ne!(a.bucket(), b.bucket());
    }

    #[test]
    fn webhook_bucket_includes_token() {
        let a = Route::new(Method::POST, "webhooks/1/a").webhook(1, "a");
        let b = Route::new(Method::POST, "webhooks/1/a").webhook(1, "b");

        assert_ne!(a.bucket(), b.bucket());
    }
}
