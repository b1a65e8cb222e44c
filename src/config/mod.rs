//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig (validated, immutable)
//!     → compile.rs (RouteTable, clients from the shared registry)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server recompiles and atomically swaps the RouteTable
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid reload is logged and ignored; the running table stays

pub mod compile;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use compile::{compile_routes, transport_options};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, RouteConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
