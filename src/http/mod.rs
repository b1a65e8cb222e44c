//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route lookup)
//!     → request.rs (request ID, buffer body under the size limit)
//!     → message.rs (ProxyRequest + RoutingContext handed to the upstream)
//!     → headers.rs / status.rs (transforms applied by the upstream chain)
//!     → response.rs (back to Axum, or the default error policy)
//!     → Send to client
//! ```

pub mod headers;
pub mod message;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use headers::HeaderFilter;
pub use message::{ParamLookup, ProxyRequest, ProxyResponse, RoutingContext};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
pub use status::{StatusRemapper, StatusSpec};
