//! Reverse-proxy forwarding and remapping gateway.
//!
//! Requests are matched to a route, run through the route's request transforms,
//! dispatched to its upstream, and the response is run back through the response
//! transforms. Transport failures are translated into plain statuses where a
//! mapping exists.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod transform;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use error::{BuildError, DispatchError, DispatchErrorKind, ForwardError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transform::TransformChain;
pub use upstream::{ClientRegistry, Upstream};
