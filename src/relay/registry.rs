//! Process-wide registry of live sessions.
//!
//! Appended to when a session starts relaying, pruned when it finishes, and
//! drained by [`SessionRegistry::close_all`]. [`SessionRegistry::shut_down`]
//! additionally latches the registry so no session is admitted afterwards.
//! All access goes through one mutex; closing works on a snapshot so no lock
//! is held while sessions tear down.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::relay::session::{SessionHandle, SessionId};

#[derive(Debug, Default)]
struct Inner {
    sessions: BTreeMap<SessionId, SessionHandle>,
    /// Set by `shut_down`; later registrations are refused.
    shut_down: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a session. Returns false once the registry has been shut down.
    pub fn register(&self, handle: SessionHandle) -> bool {
        let mut inner = self.lock();
        if inner.shut_down {
            return false;
        }
        inner.sessions.insert(handle.id(), handle);
        true
    }

    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.lock().sessions.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable copy of the live sessions in creation order.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.lock().sessions.values().cloned().collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Force-close every tracked session. New sessions are still accepted.
    ///
    /// Returns how many sessions were moved to `Closed` by this call.
    pub fn close_all(&self) -> usize {
        Self::close_snapshot(self.snapshot())
    }

    /// Refuse every later registration, then close every tracked session.
    pub fn shut_down(&self) -> usize {
        let snapshot = {
            let mut inner = self.lock();
            inner.shut_down = true;
            inner.sessions.values().cloned().collect::<Vec<_>>()
        };
        Self::close_snapshot(snapshot)
    }

    fn close_snapshot(snapshot: Vec<SessionHandle>) -> usize {
        let closed = snapshot.iter().filter(|handle| handle.close()).count();
        tracing::info!(sessions = snapshot.len(), closed, "Closing all sessions");
        closed
    }

    /// Wait until every session has finished tearing down, or `timeout` passes.
    pub async fn wait_until_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_empty() {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::session::SessionState;

    fn handle() -> SessionHandle {
        SessionHandle::new(SessionId::new(), "127.0.0.1:40000".parse().unwrap()).0
    }

    #[test]
    fn register_and_remove() {
        let registry = SessionRegistry::new();
        let a = handle();
        let b = handle();
        assert!(registry.register(a.clone()));
        assert!(registry.register(b.clone()));
        assert_eq!(registry.len(), 2);

        let ids: Vec<_> = registry.snapshot().iter().map(SessionHandle::id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);

        assert!(registry.remove(a.id()).is_some());
        assert!(registry.remove(a.id()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn close_all_closes_every_session() {
        let registry = SessionRegistry::new();
        let a = handle();
        let b = handle();
        registry.register(a.clone());
        registry.register(b.clone());

        // One session already closing on its own.
        b.close();

        assert_eq!(registry.close_all(), 1);
        assert_eq!(a.state(), SessionState::Closed);
        assert_eq!(b.state(), SessionState::Closed);

        // Second pass is a no-op.
        assert_eq!(registry.close_all(), 0);
    }

    #[test]
    fn close_all_keeps_accepting_sessions() {
        let registry = SessionRegistry::new();
        registry.close_all();
        assert!(!registry.is_shut_down());
        assert!(registry.register(handle()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn refuses_registration_after_shut_down() {
        let registry = SessionRegistry::new();
        let a = handle();
        registry.register(a.clone());

        assert_eq!(registry.shut_down(), 1);
        assert_eq!(a.state(), SessionState::Closed);
        assert!(registry.is_shut_down());
        assert!(!registry.register(handle()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn wait_until_empty_observes_removal() {
        let registry = std::sync::Arc::new(SessionRegistry::new());
        let a = handle();
        registry.register(a.clone());

        assert!(!registry.wait_until_empty(Duration::from_millis(150)).await);

        let r = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            r.remove(a.id());
        });
        assert!(registry.wait_until_empty(Duration::from_secs(2)).await);
    }
}
