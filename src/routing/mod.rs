//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request head (method, host, path, query, headers)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (evaluate conditions)
//!     → template.rs (match path, capture parameters)
//!     → Return: RouteMatch (route + parameters) or no match
//!
//! Route Compilation (at startup and on every reload):
//!     RouteConfig[]
//!     → config::compile builds upstreams and matchers
//!     → Sort by priority (stable)
//!     → Freeze as immutable RouteTable, swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority, then declaration)
//! - No regex in hot path

pub mod matcher;
pub mod router;
pub mod template;

pub use router::{Route, RouteMatch, RoutePattern, RouteTable};
pub use template::{PathTemplate, PatternError, Segment};
