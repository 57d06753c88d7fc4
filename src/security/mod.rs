//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → origin.rs (Origin header vs allow-list)
//!     → auth.rs (extract API key, check against KeyStore)
//!     → admitted: dial upstream / rejected: 401
//! ```
//!
//! # Design Decisions
//! - Both checks are in-memory and never block
//! - Strategy selection is a closed enum with an explicit Disabled variant

pub mod auth;
pub mod origin;

pub use auth::AuthStrategy;
pub use origin::OriginGate;
