//! Request lifecycle for one forwarded request.
//!
//! ```text
//! Received → RequestTransformed → Dispatched → Completed
//!                                            → Translated
//!                                            → Propagated
//! ```
//!
//! `Propagated` is also reachable from `Received` (request transform failure)
//! and from `Dispatched` when a response transform fails. No transition
//! re-enters `Dispatched`.

use std::fmt;

use axum::body::Bytes;
use axum::http::Response;

use crate::error::ForwardError;
use crate::http::message::{ProxyRequest, ProxyResponse, RoutingContext};
use crate::transform::chain::TransformChain;
use crate::upstream::client::Transport;
use crate::upstream::translate::{ExceptionTranslator, Translation};

/// Lifecycle state of a forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    Received,
    RequestTransformed,
    Dispatched,
    Completed,
    Translated,
    Propagated,
}

impl ForwardState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ForwardState::Completed | ForwardState::Translated | ForwardState::Propagated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardState::Received => "received",
            ForwardState::RequestTransformed => "request_transformed",
            ForwardState::Dispatched => "dispatched",
            ForwardState::Completed => "completed",
            ForwardState::Translated => "translated",
            ForwardState::Propagated => "propagated",
        }
    }
}

impl fmt::Display for ForwardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of the pipeline.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// Upstream answered; response transforms applied.
    Completed(ProxyResponse),
    /// Dispatch failed and was translated into a status-only response.
    Translated(ProxyResponse),
    /// The request failed.
    Propagated(ForwardError),
}

impl ForwardOutcome {
    pub fn state(&self) -> ForwardState {
        match self {
            ForwardOutcome::Completed(_) => ForwardState::Completed,
            ForwardOutcome::Translated(_) => ForwardState::Translated,
            ForwardOutcome::Propagated(_) => ForwardState::Propagated,
        }
    }

    pub fn into_result(self) -> Result<ProxyResponse, ForwardError> {
        match self {
            ForwardOutcome::Completed(res) | ForwardOutcome::Translated(res) => Ok(res),
            ForwardOutcome::Propagated(err) => Err(err),
        }
    }
}

/// Drives one request through transforms, dispatch and translation.
pub struct ForwardingPipeline<'a> {
    chain: &'a TransformChain,
    client: &'a dyn Transport,
    translator: &'a ExceptionTranslator,
}

impl<'a> ForwardingPipeline<'a> {
    pub fn new(
        chain: &'a TransformChain,
        client: &'a dyn Transport,
        translator: &'a ExceptionTranslator,
    ) -> Self {
        Self {
            chain,
            client,
            translator,
        }
    }

    /// Run the request to a terminal state.
    ///
    /// The only suspension point is the wait on the transport. Dropping the
    /// returned future drops the in-flight dispatch with it.
    pub async fn execute(&self, ctx: &RoutingContext, req: ProxyRequest) -> ForwardOutcome {
        let mut state = ForwardState::Received;

        let req = match self.chain.apply_request(ctx, req) {
            Ok(req) => req,
            Err(err) => return propagate(ctx, &mut state, err),
        };
        advance(ctx, &mut state, ForwardState::RequestTransformed);

        let dispatched = self.client.send(req).await;
        advance(ctx, &mut state, ForwardState::Dispatched);

        match dispatched {
            Ok(res) => match self.chain.apply_response(ctx, res) {
                Ok(res) => {
                    advance(ctx, &mut state, ForwardState::Completed);
                    ForwardOutcome::Completed(res)
                }
                Err(err) => propagate(ctx, &mut state, err),
            },
            Err(err) => match self.translator.translate(&err) {
                Translation::Status(status) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        route = %ctx.route(),
                        kind = %err.kind(),
                        status = status.as_u16(),
                        error = %err,
                        "Upstream dispatch failed, translated"
                    );
                    advance(ctx, &mut state, ForwardState::Translated);
                    let mut res = Response::new(Bytes::new());
                    *res.status_mut() = status;
                    ForwardOutcome::Translated(res)
                }
                Translation::Propagate => propagate(ctx, &mut state, ForwardError::Dispatch(err)),
            },
        }
    }
}

fn advance(ctx: &RoutingContext, state: &mut ForwardState, next: ForwardState) {
    tracing::trace!(
        request_id = %ctx.request_id(),
        route = %ctx.route(),
        from = %state,
        to = %next,
        "Forward state transition"
    );
    *state = next;
}

fn propagate(ctx: &RoutingContext, state: &mut ForwardState, err: ForwardError) -> ForwardOutcome {
    match &err {
        ForwardError::Transform { stage, message } => tracing::error!(
            request_id = %ctx.request_id(),
            route = %ctx.route(),
            stage = %stage,
            message = %message,
            "Transform contract violated"
        ),
        other => tracing::error!(
            request_id = %ctx.request_id(),
            route = %ctx.route(),
            state = %state,
            error = %other,
            "Forwarding failed"
        ),
    }
    advance(ctx, state, ForwardState::Propagated);
    ForwardOutcome::Propagated(err)
}
