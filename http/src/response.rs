//! The response handle returned by a successful request.

use crate::{error::Error, json};
use http::{HeaderMap, StatusCode};
use hyper::Body;
use serde::de::DeserializeOwned;

/// A raw response to a [`crate::Client::request`] call.
///
/// This is intentionally thin: the core library has no model of Discord's
/// entities, so a response exposes its status, headers, and body, and
/// leaves interpreting the body to the caller.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    pub(crate) const fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

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

    /// Consume the response, reading its body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ErrorType::ChunkingResponse`] if the body
    /// can't be fully read.
    pub async fn bytes(self) -> Result<Vec<u8>, Error> {
        let bytes = hyper::body::to_bytes(self.body)
            .await
            .map_err(Error::chunking)?;

        Ok(bytes.to_vec())
    }

    /// Consume the response, deserializing its body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ErrorType::ChunkingResponse`] if the body
    /// can't be fully read, or [`crate::error::ErrorType::Json`] if it
    /// isn't valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, Error> {
        let bytes = self.bytes().await?;

        json::from_bytes(&bytes).map_err(Error::json)
    }
}
