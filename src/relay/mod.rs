//! Session relay subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted upgrade request
//!     → upstream.rs (dial the fixed backend)
//!     → session.rs (ProxySession: downstream + upstream sockets)
//!     → engine.rs (register, two copy loops, teardown)
//!         frame.rs (axum ⇄ tungstenite frame translation)
//!     → registry.rs (live sessions; drained on shutdown)
//!
//! Session States:
//!     Created → Authenticating → Dialing → Relaying → Closed
//! ```
//!
//! # Design Decisions
//! - A session is created only after the upstream dial succeeds
//! - Frames are copied opaquely, in order, per direction
//! - Closing a session is idempotent and reaches both copy loops

pub mod engine;
pub mod frame;
pub mod registry;
pub mod session;
pub mod upstream;

pub use engine::{Direction, PumpEnd, RelayEngine, RelayOutcome};
pub use registry::SessionRegistry;
pub use session::{ProxySession, SessionHandle, SessionId, SessionState};
pub use upstream::{DialError, UpstreamDialer, UpstreamSocket};
