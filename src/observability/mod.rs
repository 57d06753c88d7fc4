//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission, relay and lifecycle code produce:
//!     → logging.rs (structured tracing events, session/request IDs)
//!     → metrics.rs (admissions, active sessions, relayed frames)
//!
//! Consumers:
//!     → stdout log lines
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never formatted message payloads
//! - Request ID (x-request-id) and session ID tie events together
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
