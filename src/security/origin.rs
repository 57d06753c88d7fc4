//! Origin allow-list.
//!
//! Matching is deliberately minimal: the `Origin` header must equal one
//! configured entry byte for byte. There is no case folding, no default-port
//! stripping and no wildcard support. An empty allow-list admits every
//! origin, including requests that send no `Origin` header at all.

use axum::http::{header::ORIGIN, HeaderMap};

#[derive(Debug, Clone, Default)]
pub struct OriginGate {
    allowed: Vec<String>,
}

impl OriginGate {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Check a declared origin. A missing header is compared as "".
    pub fn allows(&self, origin: Option<&str>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let origin = origin.unwrap_or_default();
        self.allowed.iter().any(|allowed| allowed == origin)
    }

    /// Check the `Origin` header of an upgrade request.
    pub fn check(&self, headers: &HeaderMap) -> bool {
        self.allows(headers.get(ORIGIN).and_then(|v| v.to_str().ok()))
    }
}
