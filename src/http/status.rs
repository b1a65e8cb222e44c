//! Status remapping and the status-name vocabulary.
//!
//! # Responsibilities
//! - Resolve symbolic status names used in configuration
//! - Replace the status of an upstream response when a predicate matches
//!
//! # Design Decisions
//! - Names are matched case-sensitively against a fixed table
//! - A remapper only touches the status line; headers and body pass through

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, ForwardError};
use crate::http::message::{ProxyResponse, RoutingContext};
use crate::transform::chain::ResponseTransform;

const STATUS_NAMES: &[(&str, u16)] = &[
    // 1xx
    ("CONTINUE", 100),
    ("SWITCHING_PROTOCOLS", 101),
    ("PROCESSING", 102),
    // 2xx
    ("OK", 200),
    ("CREATED", 201),
    ("ACCEPTED", 202),
    ("NON_AUTHORITATIVE_INFORMATION", 203),
    ("NO_CONTENT", 204),
    ("RESET_CONTENT", 205),
    ("PARTIAL_CONTENT", 206),
    ("MULTI_STATUS", 207),
    // 3xx
    ("MULTIPLE_CHOICES", 300),
    ("MOVED_PERMANENTLY", 301),
    ("FOUND", 302),
    ("SEE_OTHER", 303),
    ("NOT_MODIFIED", 304),
    ("USE_PROXY", 305),
    ("TEMPORARY_REDIRECT", 307),
    // 4xx
    ("BAD_REQUEST", 400),
    ("UNAUTHORIZED", 401),
    ("PAYMENT_REQUIRED", 402),
    ("FORBIDDEN", 403),
    ("NOT_FOUND", 404),
    ("METHOD_NOT_ALLOWED", 405),
    ("NOT_ACCEPTABLE", 406),
    ("PROXY_AUTHENTICATION_REQUIRED", 407),
    ("REQUEST_TIMEOUT", 408),
    ("CONFLICT", 409),
    ("GONE", 410),
    ("LENGTH_REQUIRED", 411),
    ("PRECONDITION_FAILED", 412),
    ("REQUEST_ENTITY_TOO_LARGE", 413),
    ("REQUEST_URI_TOO_LONG", 414),
    ("UNSUPPORTED_MEDIA_TYPE", 415),
    ("REQUESTED_RANGE_NOT_SATISFIABLE", 416),
    ("EXPECTATION_FAILED", 417),
    ("MISDIRECTED_REQUEST", 421),
    ("UNPROCESSABLE_ENTITY", 422),
    ("LOCKED", 423),
    ("FAILED_DEPENDENCY", 424),
    ("UNORDERED_COLLECTION", 425),
    ("UPGRADE_REQUIRED", 426),
    ("PRECONDITION_REQUIRED", 428),
    ("TOO_MANY_REQUESTS", 429),
    ("REQUEST_HEADER_FIELDS_TOO_LARGE", 431),
    ("CLIENT_CLOSED_REQUEST", 499),
    // 5xx
    ("INTERNAL_SERVER_ERROR", 500),
    ("NOT_IMPLEMENTED", 501),
    ("BAD_GATEWAY", 502),
    ("SERVICE_UNAVAILABLE", 503),
    ("GATEWAY_TIMEOUT", 504),
    ("HTTP_VERSION_NOT_SUPPORTED", 505),
    ("VARIANT_ALSO_NEGOTIATES", 506),
    ("INSUFFICIENT_STORAGE", 507),
    ("NOT_EXTENDED", 510),
    ("NETWORK_AUTHENTICATION_REQUIRED", 511),
];

/// Look up a symbolic status name such as `NOT_FOUND`.
pub fn status_from_name(name: &str) -> Result<StatusCode, BuildError> {
    STATUS_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .and_then(|(_, code)| StatusCode::from_u16(*code).ok())
        .ok_or_else(|| BuildError::UnknownStatusName(name.to_string()))
}

/// Validate a numeric status code.
pub fn status_from_code(code: u16) -> Result<StatusCode, BuildError> {
    StatusCode::from_u16(code).map_err(|_| BuildError::InvalidStatusCode(code))
}

/// A status as written in configuration: `404` or `"NOT_FOUND"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusSpec {
    Code(u16),
    Name(String),
}

impl StatusSpec {
    pub fn resolve(&self) -> Result<StatusCode, BuildError> {
        match self {
            StatusSpec::Code(code) => status_from_code(*code),
            StatusSpec::Name(name) => status_from_name(name),
        }
    }
}

type StatusPredicate = dyn Fn(StatusCode) -> bool + Send + Sync;

/// Replaces the status of responses whose status matches a predicate.
#[derive(Clone)]
pub struct StatusRemapper {
    matches: Arc<StatusPredicate>,
    to: StatusCode,
}

/// First half of a remapper: the predicate, waiting for its replacement status.
pub struct StatusRemapperBuilder {
    matches: Arc<StatusPredicate>,
}

impl StatusRemapper {
    /// Remap every status for which `predicate` holds.
    pub fn when<F>(predicate: F) -> StatusRemapperBuilder
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        StatusRemapperBuilder {
            matches: Arc::new(predicate),
        }
    }

    /// Remap any status in `statuses`.
    #[allow(clippy::should_implement_trait)]
    pub fn from<I>(statuses: I) -> Result<StatusRemapperBuilder, BuildError>
    where
        I: IntoIterator<Item = StatusCode>,
    {
        let set: HashSet<StatusCode> = statuses.into_iter().collect();
        if set.is_empty() {
            return Err(BuildError::EmptyStatusSet);
        }
        Ok(Self::when(move |status| set.contains(&status)))
    }

    /// Remap any status named in `names`; names follow [`status_from_name`].
    pub fn from_names<I, S>(names: I) -> Result<StatusRemapperBuilder, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let statuses = names
            .into_iter()
            .map(|name| status_from_name(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from(statuses)
    }

    pub fn apply(&self, status: StatusCode) -> StatusCode {
        if (self.matches)(status) {
            self.to
        } else {
            status
        }
    }

    /// Replacement status.
    pub fn target(&self) -> StatusCode {
        self.to
    }
}

impl StatusRemapperBuilder {
    pub fn to(self, status: StatusCode) -> StatusRemapper {
        StatusRemapper {
            matches: self.matches,
            to: status,
        }
    }
}

impl fmt::Debug for StatusRemapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusRemapper")
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl ResponseTransform for StatusRemapper {
    fn transform_response(
        &self,
        _ctx: &RoutingContext,
        mut res: ProxyResponse,
    ) -> Result<ProxyResponse, ForwardError> {
        let status = self.apply(res.status());
        *res.status_mut() = status;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{Method, Response};

    #[test]
    fn test_status_names() {
        assert_eq!(status_from_name("OK").unwrap(), StatusCode::OK);
        assert_eq!(status_from_name("CLIENT_CLOSED_REQUEST").unwrap().as_u16(), 499);
        assert_eq!(status_from_name("UNORDERED_COLLECTION").unwrap().as_u16(), 425);
        assert_eq!(
            status_from_name("NETWORK_AUTHENTICATION_REQUIRED").unwrap().as_u16(),
            511
        );

        let err = status_from_name("ok").unwrap_err();
        assert_eq!(err.to_string(), "unknown HTTP status: ok");
        assert!(status_from_name("I_AM_A_TEAPOT").is_err());
    }

    #[test]
    fn test_status_spec_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            statuses: Vec<StatusSpec>,
        }
        let parsed: Wrapper = toml::from_str(r#"statuses = [404, "NOT_FOUND"]"#).unwrap();
        let resolved: Vec<_> = parsed
            .statuses
            .iter()
            .map(|s| s.resolve().unwrap())
            .collect();
        assert_eq!(resolved, vec![StatusCode::NOT_FOUND, StatusCode::NOT_FOUND]);
        assert!(StatusSpec::Code(42).resolve().is_err());
    }

    #[test]
    fn test_remap_from_set() {
        let remapper = StatusRemapper::from([StatusCode::CREATED, StatusCode::ACCEPTED])
            .unwrap()
            .to(StatusCode::OK);
        assert_eq!(remapper.apply(StatusCode::CREATED), StatusCode::OK);
        assert_eq!(remapper.apply(StatusCode::ACCEPTED), StatusCode::OK);
        assert_eq!(remapper.apply(StatusCode::NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(remapper.apply(StatusCode::NO_CONTENT), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_remap_predicate() {
        let remapper = StatusRemapper::when(|s| s.is_server_error()).to(StatusCode::BAD_GATEWAY);
        assert_eq!(
            remapper.apply(StatusCode::INTERNAL_SERVER_ERROR),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(remapper.apply(StatusCode::NOT_FOUND), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_remap_leaves_headers_and_body() {
        let remapper = StatusRemapper::from_names(["CREATED"])
            .unwrap()
            .to(StatusCode::OK);
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("loc", "/items/1")
            .body(Bytes::from_static(b"created"))
            .unwrap();
        let ctx = RoutingContext::new("items", Method::POST, "/items");

        let out = remapper.transform_response(&ctx, res).unwrap();
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.headers()["loc"], "/items/1");
        assert_eq!(out.body(), &Bytes::from_static(b"created"));
    }

    #[test]
    fn test_empty_status_set_is_rejected() {
        assert!(matches!(
            StatusRemapper::from(Vec::<StatusCode>::new()),
            Err(BuildError::EmptyStatusSet)
        ));
        assert!(matches!(
            StatusRemapper::from_names(["NOPE"]),
            Err(BuildError::UnknownStatusName(_))
        ));
    }
}
