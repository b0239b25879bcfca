//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → IngressConfig (validated, immutable)
//!     → shared by value with every subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config, including the catch-all policy, is read once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Routing rules are not config; they arrive through `source`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ControllerConfig, IngressConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig,
};
