//! Request and response transformation subsystem.
//!
//! # Data Flow
//! ```text
//! inbound ProxyRequest
//!     → chain.rs (request stages, registration order)
//!     → remap.rs (path template / method override are ordinary stages)
//!     → transport
//!     → chain.rs (response stages, registration order)
//!     → outbound ProxyResponse
//! ```
//!
//! # Design Decisions
//! - Stages are pure functions of (context, message); no shared mutable state
//! - Header filters and status remappers live in `http` and implement the same traits

pub mod chain;
pub mod remap;

pub use chain::{RequestTransform, ResponseTransform, TransformChain};
pub use remap::{OverrideMethod, RemapPath, RemappedPath};
