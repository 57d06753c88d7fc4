//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build server (load keys) → Probe upstream → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close sessions → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: keys and upstream first, listener last
//! - Fail fast: any startup error is fatal
//! - Drain has a deadline; remaining sessions are abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
