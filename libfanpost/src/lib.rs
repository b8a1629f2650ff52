//! Fanpost - scheduled multi-platform publishing
//!
//! This library holds the publishing core: the post and credential model,
//! one adapter per platform, the concurrent dispatcher, the status rollup
//! and the flows that tie them to storage. The `fan-send` and `fan-gateway`
//! binaries are thin drivers around [`publisher::Publisher`].

pub mod config;
pub mod credentials;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod rollup;
pub mod scheduling;
pub mod types;
pub mod verifier;

// Re-export commonly used types
pub use config::{Config, DispatchSettings};
pub use credentials::Credentials;
pub use db::Database;
pub use error::{FanpostError, Result};
pub use publisher::{Publisher, TickReport};
pub use types::{Platform, PlatformResult, Post, PostStatus};
pub use verifier::{ConnectionStatus, ConnectionVerifier};
