//! Task-local binding of the active session.
//!
//! The binding lives in the runtime's task-local storage, so it follows a
//! logical task across suspension points, shadows correctly when sessions
//! nest, and is invisible to sibling or parent tasks. It is deliberately
//! not a process-wide variable: two concurrent tasks each see only their
//! own binding.

use std::future::Future;
use std::sync::Arc;

use crate::error::{BrowserError, Result};
use crate::session::SessionState;

tokio::task_local! {
    static CURRENT_SESSION: Arc<SessionState>;
}

/// The session bound for the calling task.
///
/// Fails with [`BrowserError::NoActiveSession`] outside the dynamic
/// extent of an `isolated_session` — the designed signal that a tool was
/// misused, never caught internally.
pub fn current() -> Result<Arc<SessionState>> {
    CURRENT_SESSION
        .try_with(Arc::clone)
        .map_err(|_| BrowserError::NoActiveSession)
}

/// Run `fut` with `state` bound as the calling task's active session.
///
/// Entering the scope is the bind, leaving it (normal return, error, or
/// drop on cancellation) is the restore; the previous binding, if any,
/// comes back exactly. LIFO nesting holds by construction.
pub(crate) async fn scope<F: Future>(state: Arc<SessionState>, fut: F) -> F::Output {
    CURRENT_SESSION.scope(state, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextId, PageId};

    fn state() -> Arc<SessionState> {
        Arc::new(SessionState::new(ContextId::new(), PageId::new()))
    }

    #[tokio::test]
    async fn test_current_outside_scope_fails() {
        let err = current().unwrap_err();
        assert!(matches!(err, BrowserError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_lifo() {
        let outer = state();
        let inner = state();

        scope(outer.clone(), async {
            assert_eq!(current().unwrap().context_id(), outer.context_id());

            scope(inner.clone(), async {
                assert_eq!(current().unwrap().context_id(), inner.context_id());
            })
            .await;

            // inner scope closed; outer binding is back
            assert_eq!(current().unwrap().context_id(), outer.context_id());
        })
        .await;

        assert!(current().is_err());
    }

    #[tokio::test]
    async fn test_binding_survives_suspension() {
        let bound = state();
        scope(bound.clone(), async {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert_eq!(current().unwrap().context_id(), bound.context_id());
        })
        .await;
    }

    #[tokio::test]
    async fn test_binding_invisible_to_spawned_task() {
        let bound = state();
        scope(bound, async {
            let sibling = tokio::spawn(async { current().is_err() });
            assert!(sibling.await.unwrap());
        })
        .await;
    }
}
