//! The error type returned by [`crate::Client::request`].

use http::StatusCode;
use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    result::Result as StdResult,
};

/// Convenience alias for a [`Result`] with [`Error`] as the error variant.
pub type Result<T, E = Error> = StdResult<T, E>;

/// The error that occurred.
#[derive(Debug)]
pub struct Error {
    pub(crate) source: Option<Box<dyn StdError + Send + Sync>>,
    pub(crate) kind: ErrorType,
}

impl Error {
    /// Immutable reference to the type of error that occurred.
    #[must_use = "retrieving the type has no effect if left unused"]
    pub const fn kind(&self) -> &ErrorType {
        &self.kind
    }

    /// Consume the error, returning the source error if there is any.
    #[must_use = "consuming the error and retrieving the source has no effect if left unused"]
    pub fn into_source(self) -> Option<Box<dyn StdError + Send + Sync>> {
        self.source
    }

    /// Consume the error, returning the owned error type and the source.
    #[must_use = "consuming the error into its parts has no effect if left unused"]
    pub fn into_parts(self) -> (ErrorType, Option<Box<dyn StdError + Send + Sync>>) {
        (self.kind, self.source)
    }

    pub(crate) fn json(source: serde_json::Error) -> Self {
        Self {
            kind: ErrorType::Json,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn request(source: hyper::Error) -> Self {
        Self {
            kind: ErrorType::RequestError,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn chunking(source: hyper::Error) -> Self {
        Self {
            kind: ErrorType::ChunkingResponse,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn building(message: &'static str) -> Self {
        Self {
            kind: ErrorType::BuildingRequest,
            source: Some(Box::new(BuildError(message))),
        }
    }

    pub(crate) fn response(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            kind: ErrorType::Response {
                api: ApiErrorKind::from_status(status),
                body,
                status,
            },
            source: None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ErrorType::BuildingRequest => f.write_str("failed to build the request"),
            ErrorType::ChunkingResponse => f.write_str("chunking the response body failed"),
            ErrorType::Json => f.write_str("a value couldn't be (de)serialized as json"),
            ErrorType::RequestError => f.write_str("sending the request failed"),
            ErrorType::Response { api, status, .. } => {
                write!(f, "response error: status code {status}, kind {api:?}")
            }
            ErrorType::CloudflareBan => {
                f.write_str("request was rejected by cloudflare rather than the discord api")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// The type of [`Error`] that occurred.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorType {
    /// Building the outgoing request failed, for example because a header
    /// value contained characters invalid for HTTP headers.
    BuildingRequest,
    /// Reading the response body into memory failed.
    ChunkingResponse,
    /// (De)serializing a JSON value failed.
    Json,
    /// The underlying HTTP client failed to send the request or receive a
    /// response at all (as opposed to receiving a non-2xx response).
    RequestError,
    /// The API returned a non-2xx response after exhausting all retries.
    Response {
        /// Classification of `status` into one of Discord's named error
        /// conditions.
        api: ApiErrorKind,
        /// Raw response body, for callers that want to parse Discord's JSON
        /// error body themselves.
        body: Vec<u8>,
        /// The response's status code.
        status: StatusCode,
    },
    /// A 429 response was received with no `Via` header, meaning it was
    /// rejected by Cloudflare rather than the Discord API proper. This is
    /// raised immediately, without consuming a retry attempt.
    CloudflareBan,
}

/// Classification of a non-2xx status code into Discord's named error
/// conditions.
///
/// This mirrors a set of distinct exception types in languages that model
/// each condition as its own class; in Rust a single enum is more useful for
/// exhaustive matching.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ApiErrorKind {
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
    /// 403.
    Forbidden,
    /// 404.
    NotFound,
    /// 405.
    MethodNotAllowed,
    /// 422.
    UnprocessableEntity,
    /// 429, with a `Via` header present (a genuine Discord ratelimit
    /// response rather than a Cloudflare-level ban).
    TooManyRequests,
    /// 500.
    ServerError,
    /// 502.
    BadGateway,
    /// 503.
    ServiceUnavailable,
    /// 504.
    GatewayTimeout,
    /// Any other non-2xx status code.
    Other,
}

impl ApiErrorKind {
    /// Map a status code onto its named condition.
    #[must_use]
    pub const fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            422 => Self::UnprocessableEntity,
            429 => Self::TooManyRequests,
            500 => Self::ServerError,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            _ => Self::Other,
        }
    }
}

#[derive(Debug)]
struct BuildError(&'static str);

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.0)
    }
}

impl StdError for BuildError {}

#[cfg(test)]
mod tests {
    use super::ApiErrorKind;
    use http::StatusCode;

    #[test]
    fn status_mapping_matches_spec() {
        assert_eq!(
            ApiErrorKind::BadRequest,
            ApiErrorKind::from_status(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            ApiErrorKind::TooManyRequests,
            ApiErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS)
        );
        assert_eq!(
            ApiErrorKind::Other,
            ApiErrorKind::from_status(StatusCode::IM_A_TEAPOT)
        );
    }
}
