//! Ordered request and response transform chains.

use std::fmt;
use std::sync::Arc;

use crate::error::ForwardError;
use crate::http::message::{ProxyRequest, ProxyResponse, RoutingContext};

/// A stage applied to the outbound request before dispatch.
pub trait RequestTransform: Send + Sync {
    fn transform_request(
        &self,
        ctx: &RoutingContext,
        req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError>;
}

/// A stage applied to the upstream response after a successful dispatch.
pub trait ResponseTransform: Send + Sync {
    fn transform_response(
        &self,
        ctx: &RoutingContext,
        res: ProxyResponse,
    ) -> Result<ProxyResponse, ForwardError>;
}

impl<F> RequestTransform for F
where
    F: Fn(&RoutingContext, ProxyRequest) -> Result<ProxyRequest, ForwardError> + Send + Sync,
{
    fn transform_request(
        &self,
        ctx: &RoutingContext,
        req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError> {
        self(ctx, req)
    }
}

impl<F> ResponseTransform for F
where
    F: Fn(&RoutingContext, ProxyResponse) -> Result<ProxyResponse, ForwardError> + Send + Sync,
{
    fn transform_response(
        &self,
        ctx: &RoutingContext,
        res: ProxyResponse,
    ) -> Result<ProxyResponse, ForwardError> {
        self(ctx, res)
    }
}

/// Two independent, ordered lists of transforms.
///
/// Application is a left fold in registration order; an empty chain is the
/// identity. Stages are shared between clones and must not hold unsynchronized
/// mutable state, since one chain serves many concurrent requests.
#[derive(Clone, Default)]
pub struct TransformChain {
    request: Vec<Arc<dyn RequestTransform>>,
    response: Vec<Arc<dyn ResponseTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request stage; it runs after every stage already present.
    pub fn append_request<T>(&mut self, transform: T) -> &mut Self
    where
        T: RequestTransform + 'static,
    {
        self.request.push(Arc::new(transform));
        self
    }

    /// Append a response stage; it runs after every stage already present.
    pub fn append_response<T>(&mut self, transform: T) -> &mut Self
    where
        T: ResponseTransform + 'static,
    {
        self.response.push(Arc::new(transform));
        self
    }

    /// Concatenate `other` after this chain, for both directions.
    pub fn then(mut self, other: TransformChain) -> Self {
        self.request.extend(other.request);
        self.response.extend(other.response);
        self
    }

    /// Wrap `inner`: this chain's request stages run first and its response
    /// stages run last.
    pub fn around(self, inner: TransformChain) -> Self {
        let mut request = self.request;
        request.extend(inner.request);
        let mut response = inner.response;
        response.extend(self.response);
        Self { request, response }
    }

    pub fn apply_request(
        &self,
        ctx: &RoutingContext,
        req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError> {
        self.request
            .iter()
            .try_fold(req, |req, stage| stage.transform_request(ctx, req))
    }

    pub fn apply_response(
        &self,
        ctx: &RoutingContext,
        res: ProxyResponse,
    ) -> Result<ProxyResponse, ForwardError> {
        self.response
            .iter()
            .try_fold(res, |res, stage| stage.transform_response(ctx, res))
    }

    pub fn request_len(&self) -> usize {
        self.request.len()
    }

    pub fn response_len(&self) -> usize {
        self.response.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty()
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("request_stages", &self.request.len())
            .field("response_stages", &self.response.len())
            .finish()
    }
}
