//! Route predicate matching.
//!
//! # Responsibilities
//! - Match the request method against an allowed set
//! - Match the Host header (exact, case-insensitive, port ignored)
//! - Match header presence or equality
//! - Match query parameter presence or equality
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Matchers see only the request head; the body is never read for routing
//! - Empty condition set = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use std::fmt;

use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::request::Parts;
use axum::http::Method;

/// Trait for matching a request head against a condition.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, parts: &Parts) -> bool;
}

/// Matches when the request method is in the set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        self.methods.contains(&parts.method)
    }
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.host());

        host.map(|h| h.rsplit_once(':').map_or(h, |(name, _)| name))
            .map(|h| h.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches header presence, or a header value when one is given.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<HeaderValue>,
}

impl HeaderMatcher {
    pub fn present(name: HeaderName) -> Self {
        Self { name, value: None }
    }

    pub fn equals(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            value: Some(value),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        let mut values = parts.headers.get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v == expected),
        }
    }
}

/// Matches query parameter presence, or its value when one is given.
#[derive(Debug, Clone)]
pub struct QueryParamMatcher {
    name: String,
    value: Option<String>,
}

impl QueryParamMatcher {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl Matcher for QueryParamMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        let Some(query) = parts.uri.query() else {
            return false;
        };
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| k == self.name.as_str())
            .any(|(_, v)| self.value.as_deref().map_or(true, |expected| v == expected))
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn push(&mut self, matcher: impl Matcher + 'static) {
        self.matchers.push(Box::new(matcher));
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        self.matchers.iter().all(|m| m.matches(parts))
    }
}
