//! Structured request/response types handled by the forwarding engine.
//!
//! Bodies are fully buffered; headers are `HeaderMap` (case-insensitive names,
//! multiple values per name kept in insertion order). Pseudo-header fields live
//! in the method, URI and status of the message, never in its header map.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{Method, Request, Response};

/// Request as seen by transforms and the transport.
pub type ProxyRequest = Request<Bytes>;

/// Response as seen by transforms and the transport.
pub type ProxyResponse = Response<Bytes>;

/// Lookup from parameter name to captured value.
pub trait ParamLookup {
    fn param(&self, name: &str) -> Option<&str>;
}

impl ParamLookup for HashMap<String, String> {
    fn param(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl ParamLookup for [(String, String)] {
    fn param(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Per-request routing information produced by the route table.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    route: String,
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    request_id: String,
}

impl RoutingContext {
    pub fn new(route: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method,
            path: path.into(),
            params: Vec::new(),
            request_id: String::new(),
        }
    }

    /// Attach captured path parameters.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Attach the request id used for log correlation.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Name of the matched route.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Inbound method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Inbound path (no query).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl ParamLookup for RoutingContext {
    fn param(&self, name: &str) -> Option<&str> {
        self.params.as_slice().param(name)
    }
}
