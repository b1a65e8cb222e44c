//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request head
//! - Return the matched route with captured parameters, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks); reloads build a new table
//! - Higher priority first, then declaration order (stable sort)
//! - O(n) scan (acceptable for typical route counts)

use std::sync::Arc;

use axum::http::request::Parts;

use crate::http::message::RoutingContext;
use crate::routing::matcher::{AndMatcher, Matcher};
use crate::routing::template::PathTemplate;
use crate::upstream::Upstream;

/// How a route matches the request path.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    /// Segment-by-segment template; parameters are captured.
    Template(PathTemplate),
    /// Plain prefix; nothing is captured.
    Prefix(String),
}

impl RoutePattern {
    fn capture(&self, path: &str) -> Option<Vec<(String, String)>> {
        match self {
            RoutePattern::Template(template) => template.capture(path),
            RoutePattern::Prefix(prefix) => path.starts_with(prefix.as_str()).then(Vec::new),
        }
    }
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    name: String,
    priority: i32,
    pattern: RoutePattern,
    conditions: AndMatcher,
    upstream: Arc<Upstream>,
}

impl Route {
    pub fn new(name: impl Into<String>, pattern: RoutePattern, upstream: Arc<Upstream>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            pattern,
            conditions: AndMatcher::default(),
            upstream,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a condition; every condition must hold.
    pub fn with_condition(mut self, matcher: impl Matcher + 'static) -> Self {
        self.conditions.push(matcher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }
}

/// A route together with the parameters captured from the path.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Vec<(String, String)>,
}

impl RouteMatch<'_> {
    /// Routing context for this match.
    pub fn context(self, parts: &Parts, request_id: &str) -> RoutingContext {
        RoutingContext::new(self.route.name.clone(), parts.method.clone(), parts.uri.path())
            .with_params(self.params)
            .with_request_id(request_id)
    }
}

/// Ordered, immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// First route matching the request head.
    pub fn match_request(&self, parts: &Parts) -> Option<RouteMatch<'_>> {
        let path = parts.uri.path();
        self.routes.iter().find_map(|route| {
            if !route.conditions.matches(parts) {
                return None;
            }
            route
                .pattern
                .capture(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
