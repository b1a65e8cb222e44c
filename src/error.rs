//! Error taxonomy for the gateway.
//!
//! # Classes
//! - `BuildError`: configuration-time failures, surfaced before any request is served
//! - `ForwardError`: per-request failures, fatal to that one request
//! - `DispatchError`: transport failures, classified by the exception translator
//!
//! # Design Decisions
//! - Dispatch failures carry a `DispatchErrorKind` tag so classification is a table lookup
//! - A connect-phase failure is wrapped in `Unprocessed` (the request never left the gateway)

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::template::PatternError;

/// Boxed error used for opaque transport causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building upstreams, filters, remappers and routes.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Path pattern could not be parsed.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// A header filter was given no names.
    #[error("header name set should not be empty")]
    EmptyHeaderSet,

    /// A header name is not a valid HTTP field name.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    /// A header filter configuration names neither or both modes.
    #[error("invalid header filter: {0}")]
    InvalidHeaderFilter(String),

    /// A status remapper was given no statuses.
    #[error("status set should not be empty")]
    EmptyStatusSet,

    /// Status name is not part of the vocabulary.
    #[error("unknown HTTP status: {0}")]
    UnknownStatusName(String),

    /// Numeric status outside 100..=999.
    #[error("invalid HTTP status code: {0}")]
    InvalidStatusCode(u16),

    /// Method name could not be parsed.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Target URI or endpoint is malformed.
    #[error("invalid upstream target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Scheme is not handled by the bundled transport.
    #[error("unsupported upstream scheme: {0}")]
    UnsupportedScheme(String),

    /// Endpoint set is empty.
    #[error("upstream endpoints should not be empty")]
    EmptyEndpoints,
}

/// Errors that end the forwarding of a single request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The routing context has no value for a template parameter.
    #[error("path parameter '{name}' does not exist")]
    MissingParameter { name: String },

    /// A transform broke its contract.
    #[error("transform '{stage}' failed: {message}")]
    Transform { stage: &'static str, message: String },

    /// Dispatch failed and no status translation applied.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ForwardError {
    /// Build a transform-contract failure.
    pub fn transform(stage: &'static str, message: impl Into<String>) -> Self {
        ForwardError::Transform {
            stage,
            message: message.into(),
        }
    }
}

/// Tag identifying the class of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    UnknownHost,
    ConnectionRefused,
    NoHealthyEndpoint,
    Timeout,
    Transport,
}

impl std::fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchErrorKind::UnknownHost => "unknown_host",
            DispatchErrorKind::ConnectionRefused => "connection_refused",
            DispatchErrorKind::NoHealthyEndpoint => "no_healthy_endpoint",
            DispatchErrorKind::Timeout => "timeout",
            DispatchErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

/// Failures reported by the transport client.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was never written to the upstream.
    #[error("request not processed: {0}")]
    Unprocessed(#[source] Box<DispatchError>),

    /// Name resolution failed.
    #[error("unknown host '{host}'")]
    UnknownHost {
        host: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The upstream refused the connection.
    #[error("connection refused by {authority}")]
    ConnectionRefused { authority: String },

    /// No endpoint is available to take the request.
    #[error("no healthy endpoint available")]
    NoHealthyEndpoint,

    /// The upstream did not answer in time.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport failure.
    #[error("upstream transport error: {0}")]
    Transport(#[source] BoxError),
}

impl DispatchError {
    /// Kind of the outermost failure. `Unprocessed` reports the kind of its cause.
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Unprocessed(cause) => cause.kind(),
            DispatchError::UnknownHost { .. } => DispatchErrorKind::UnknownHost,
            DispatchError::ConnectionRefused { .. } => DispatchErrorKind::ConnectionRefused,
            DispatchError::NoHealthyEndpoint => DispatchErrorKind::NoHealthyEndpoint,
            DispatchError::Timeout(_) => DispatchErrorKind::Timeout,
            DispatchError::Transport(_) => DispatchErrorKind::Transport,
        }
    }

    /// Wrap a connect-phase failure.
    pub fn unprocessed(cause: DispatchError) -> Self {
        DispatchError::Unprocessed(Box::new(cause))
    }
}
