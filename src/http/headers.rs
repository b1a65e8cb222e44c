//! Header filtering and hop-by-hop stripping.
//!
//! # Responsibilities
//! - Remove request/response header fields matching an allow-list or deny-list
//! - Never touch protocol pseudo-header fields
//! - Strip hop-by-hop headers on both legs of the proxy
//!
//! # Design Decisions
//! - Pseudo-header fields are carried by the method, URI and status of a message,
//!   so a filter working on the header map cannot discard them. Pseudo names given
//!   to a filter are dropped at construction and never reach the predicate.
//! - A name is discarded as a whole: when the predicate holds for any of its
//!   values, every value under that name goes

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::error::{BuildError, ForwardError};
use crate::http::message::{ProxyRequest, ProxyResponse, RoutingContext};
use crate::transform::chain::{RequestTransform, ResponseTransform};

/// Request pseudo-header fields (RFC 9113, section 8.3.1).
pub const REQUEST_PSEUDO_HEADERS: [&str; 4] = [":method", ":scheme", ":authority", ":path"];

/// Response pseudo-header fields (RFC 9113, section 8.3.2).
pub const RESPONSE_PSEUDO_HEADERS: [&str; 1] = [":status"];

/// Hop-by-hop headers that are never forwarded (RFC 9110, section 7.6.1).
pub static HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn is_request_pseudo_header(name: &str) -> bool {
    REQUEST_PSEUDO_HEADERS.contains(&name)
}

pub fn is_response_pseudo_header(name: &str) -> bool {
    RESPONSE_PSEUDO_HEADERS.contains(&name)
}

fn is_pseudo_header(name: &str) -> bool {
    is_request_pseudo_header(name) || is_response_pseudo_header(name)
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

type DiscardPredicate = dyn Fn(&HeaderName, &HeaderValue) -> bool + Send + Sync;

/// Predicate-based header filter.
#[derive(Clone)]
pub struct HeaderFilter {
    discard: Arc<DiscardPredicate>,
    description: String,
}

impl HeaderFilter {
    /// Keep only the headers named in `names`.
    pub fn allow<I, S>(names: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = header_name_set(names)?;
        let description = format!("allow {}", describe(&allowed));
        Ok(Self {
            discard: Arc::new(move |name, _| !allowed.contains(name)),
            description,
        })
    }

    /// Discard the headers named in `names`.
    pub fn deny<I, S>(names: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denied = header_name_set(names)?;
        let description = format!("deny {}", describe(&denied));
        Ok(Self {
            discard: Arc::new(move |name, _| denied.contains(name)),
            description,
        })
    }

    /// Discard every header for which `predicate(name, value)` holds.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&HeaderName, &HeaderValue) -> bool + Send + Sync + 'static,
    {
        Self {
            discard: Arc::new(predicate),
            description: "predicate".to_string(),
        }
    }

    /// Return a copy of `headers` without the discarded names.
    pub fn filter(&self, headers: &HeaderMap) -> HeaderMap {
        let mut kept = HeaderMap::with_capacity(headers.keys_len());
        for name in headers.keys() {
            let values = headers.get_all(name);
            if values.iter().any(|value| (self.discard)(name, value)) {
                continue;
            }
            for value in values {
                kept.append(name.clone(), value.clone());
            }
        }
        kept
    }
}

impl fmt::Debug for HeaderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HeaderFilter")
            .field(&self.description)
            .finish()
    }
}

impl RequestTransform for HeaderFilter {
    fn transform_request(
        &self,
        _ctx: &RoutingContext,
        mut req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError> {
        let filtered = self.filter(req.headers());
        *req.headers_mut() = filtered;
        Ok(req)
    }
}

impl ResponseTransform for HeaderFilter {
    fn transform_response(
        &self,
        _ctx: &RoutingContext,
        mut res: ProxyResponse,
    ) -> Result<ProxyResponse, ForwardError> {
        let filtered = self.filter(res.headers());
        *res.headers_mut() = filtered;
        Ok(res)
    }
}

fn header_name_set<I, S>(names: I) -> Result<HashSet<HeaderName>, BuildError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = HashSet::new();
    let mut seen_any = false;
    for name in names {
        let name = name.as_ref().trim();
        seen_any = true;
        if is_pseudo_header(name) {
            tracing::warn!(header = %name, "Pseudo-header in header filter ignored");
            continue;
        }
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BuildError::InvalidHeaderName(name.to_string()))?;
        set.insert(parsed);
    }
    if !seen_any {
        return Err(BuildError::EmptyHeaderSet);
    }
    Ok(set)
}

fn describe(names: &HashSet<HeaderName>) -> String {
    let mut names: Vec<&str> = names.iter().map(HeaderName::as_str).collect();
    names.sort_unstable();
    names.join(",")
}
