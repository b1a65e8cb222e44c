//! Upstream binding and forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! RoutingContext + ProxyRequest
//!     → Upstream::forward
//!     → pipeline.rs (request transforms)
//!     → client.rs (dispatch via the client from registry.rs)
//!     → translate.rs on failure / pipeline.rs response transforms on success
//!     → ProxyResponse or ForwardError
//! ```
//!
//! # Design Decisions
//! - An `Upstream` is immutable once built and shared across requests via `Arc`
//! - Clients come from an injected `ClientRegistry`, never from a global
//! - Decoration is `Upstream -> Upstream`: the wrapping chain surrounds the inner one

pub mod client;
pub mod pipeline;
pub mod registry;
pub mod target;
pub mod translate;

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::error::ForwardError;
use crate::http::headers::HeaderFilter;
use crate::http::message::{ProxyRequest, ProxyResponse, RoutingContext};
use crate::http::status::StatusRemapper;
use crate::routing::template::PathTemplate;
use crate::transform::chain::TransformChain;
use crate::transform::remap::{OverrideMethod, RemapPath};

pub use client::{HttpTransport, Transport, TransportOptions};
pub use pipeline::{ForwardOutcome, ForwardState, ForwardingPipeline};
pub use registry::ClientRegistry;
pub use target::{Endpoint, Scheme, Target};
pub use translate::{ExceptionTranslator, Translation};

/// Target, transform chain and client handle bound together.
#[derive(Clone)]
pub struct Upstream {
    target: Target,
    chain: TransformChain,
    client: Arc<dyn Transport>,
    translator: ExceptionTranslator,
}

impl Upstream {
    pub fn builder(target: Target) -> UpstreamBuilder {
        UpstreamBuilder {
            target,
            chain: TransformChain::new(),
            translator: ExceptionTranslator::default(),
        }
    }

    /// Forward one request and return the final response.
    pub async fn forward(
        &self,
        ctx: &RoutingContext,
        req: ProxyRequest,
    ) -> Result<ProxyResponse, ForwardError> {
        self.execute(ctx, req).await.into_result()
    }

    /// Like [`forward`](Self::forward), but keeps the terminal state.
    pub async fn execute(&self, ctx: &RoutingContext, req: ProxyRequest) -> ForwardOutcome {
        ForwardingPipeline::new(&self.chain, self.client.as_ref(), &self.translator)
            .execute(ctx, req)
            .await
    }

    /// Wrap this upstream with `outer`.
    ///
    /// `outer`'s request stages run before this upstream's, its response stages
    /// after. Target and client are unchanged.
    pub fn decorate(self, outer: TransformChain) -> Upstream {
        Upstream {
            chain: outer.around(self.chain),
            ..self
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn chain(&self) -> &TransformChain {
        &self.chain
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("target", &self.target)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

/// Builder appending transforms in call order.
pub struct UpstreamBuilder {
    target: Target,
    chain: TransformChain,
    translator: ExceptionTranslator,
}

impl UpstreamBuilder {
    /// Replace the outbound path with `template` rendered from route parameters.
    pub fn remap_path(mut self, template: PathTemplate) -> Self {
        self.chain.append_request(RemapPath::new(template));
        self
    }

    /// Force the outbound method.
    pub fn method(mut self, method: Method) -> Self {
        self.chain.append_request(OverrideMethod(method));
        self
    }

    pub fn map_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&RoutingContext, ProxyRequest) -> Result<ProxyRequest, ForwardError>
            + Send
            + Sync
            + 'static,
    {
        self.chain.append_request(f);
        self
    }

    pub fn filter_request_headers(mut self, filter: HeaderFilter) -> Self {
        self.chain.append_request(filter);
        self
    }

    pub fn map_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&RoutingContext, ProxyResponse) -> Result<ProxyResponse, ForwardError>
            + Send
            + Sync
            + 'static,
    {
        self.chain.append_response(f);
        self
    }

    pub fn status(mut self, remapper: StatusRemapper) -> Self {
        self.chain.append_response(remapper);
        self
    }

    pub fn filter_response_headers(mut self, filter: HeaderFilter) -> Self {
        self.chain.append_response(filter);
        self
    }

    /// Append every stage of `chain`.
    pub fn transforms(mut self, chain: TransformChain) -> Self {
        self.chain = self.chain.then(chain);
        self
    }

    pub fn translator(mut self, translator: ExceptionTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Resolve the client for the target and freeze the upstream.
    pub fn build(self, registry: &ClientRegistry) -> Upstream {
        let client = registry.get(&self.target);
        Upstream {
            target: self.target,
            chain: self.chain,
            client,
            translator: self.translator,
        }
    }
}
