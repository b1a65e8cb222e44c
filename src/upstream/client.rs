//! Transport client used to dispatch requests to an upstream.
//!
//! # Responsibilities
//! - Pick an endpoint of the target (round-robin)
//! - Build the absolute outbound URI from the target and the request path
//! - Apply connect and total request timeouts
//! - Buffer the upstream response body
//! - Tag failures with a `DispatchError` the translator can classify

use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{Request, Response, Uri, Version};
use futures_util::future::{self, BoxFuture, FutureExt};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::DispatchError;
use crate::http::headers::strip_hop_by_hop;
use crate::http::message::{ProxyRequest, ProxyResponse};
use crate::transform::remap::RemappedPath;
use crate::upstream::target::{Endpoint, Target};

/// Asynchronous dispatch of a fully-buffered request.
pub trait Transport: Send + Sync {
    /// Send `req` and resolve with the buffered response.
    ///
    /// Dropping the returned future abandons the exchange.
    fn send(&self, req: ProxyRequest) -> BoxFuture<'static, Result<ProxyResponse, DispatchError>>;
}

/// Tunables shared by every client the registry creates.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_response_body: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_response_body: 8 * 1024 * 1024,
        }
    }
}

/// hyper-based transport bound to one target.
pub struct HttpTransport {
    target: Target,
    client: Client<HttpConnector, Body>,
    options: TransportOptions,
    counter: AtomicUsize,
}

impl HttpTransport {
    pub fn new(target: Target, options: TransportOptions) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(options.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            target,
            client,
            options,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn next_endpoint(&self) -> Option<&Endpoint> {
        let endpoints = self.target.endpoints();
        if endpoints.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % endpoints.len();
        endpoints.get(index)
    }

    fn outbound(&self, endpoint: &Endpoint, req: ProxyRequest) -> Result<Request<Body>, DispatchError> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        // A remapped path is already the full upstream path.
        let base_path = if parts.extensions.remove::<RemappedPath>().is_some() {
            ""
        } else {
            self.target.base_path()
        };
        let uri = format!(
            "{}://{}{}{}",
            self.target.scheme(),
            endpoint,
            base_path,
            path_and_query
        );
        parts.uri = uri
            .parse::<Uri>()
            .map_err(|e| DispatchError::Transport(Box::new(e)))?;

        parts.headers.remove(HOST);
        parts.headers.remove(CONTENT_LENGTH);
        strip_hop_by_hop(&mut parts.headers);
        parts.version = Version::HTTP_11;

        Ok(Request::from_parts(parts, Body::from(body)))
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: ProxyRequest) -> BoxFuture<'static, Result<ProxyResponse, DispatchError>> {
        let Some(endpoint) = self.next_endpoint().cloned() else {
            return future::ready(Err(DispatchError::NoHealthyEndpoint)).boxed();
        };
        let outbound = match self.outbound(&endpoint, req) {
            Ok(outbound) => outbound,
            Err(e) => return future::ready(Err(e)).boxed(),
        };

        let client = self.client.clone();
        let TransportOptions {
            request_timeout,
            max_response_body,
            ..
        } = self.options;

        async move {
            tracing::trace!(endpoint = %endpoint, uri = %outbound.uri(), "Dispatching upstream request");

            let exchange = async move {
                let response = client
                    .request(outbound)
                    .await
                    .map_err(|e| classify(e, &endpoint))?;

                let (mut parts, incoming) = response.into_parts();
                let bytes = body::to_bytes(Body::new(incoming), max_response_body)
                    .await
                    .map_err(|e| DispatchError::Transport(Box::new(e)))?;

                parts.headers.remove(CONTENT_LENGTH);
                strip_hop_by_hop(&mut parts.headers);
                Ok::<_, DispatchError>(Response::from_parts(parts, bytes))
            };

            match tokio::time::timeout(request_timeout, exchange).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(request_timeout)),
            }
        }
        .boxed()
    }
}

enum ConnectCause {
    Refused,
    Resolve,
    Other,
}

/// Map a client error onto the dispatch taxonomy.
///
/// Connect-phase errors mean the request was never written and are wrapped in
/// `Unprocessed`.
fn classify(err: hyper_util::client::legacy::Error, endpoint: &Endpoint) -> DispatchError {
    if !err.is_connect() {
        return DispatchError::Transport(Box::new(err));
    }

    let mut cause = ConnectCause::Other;
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                cause = ConnectCause::Refused;
                break;
            }
        }
        if inner.to_string().starts_with("dns error") {
            cause = ConnectCause::Resolve;
            break;
        }
        source = inner.source();
    }

    let inner = match cause {
        ConnectCause::Refused => DispatchError::ConnectionRefused {
            authority: endpoint.to_string(),
        },
        ConnectCause::Resolve => DispatchError::UnknownHost {
            host: endpoint.host().to_string(),
            source: Some(Box::new(err)),
        },
        ConnectCause::Other => DispatchError::Transport(Box::new(err)),
    };
    DispatchError::unprocessed(inner)
}
