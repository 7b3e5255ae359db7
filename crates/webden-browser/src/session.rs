//! Session state and the scoped-acquisition coordinator.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::binding;
use crate::error::{BrowserError, Result};
use crate::registry::BrowserRegistry;
use crate::types::{ContextId, PageId};

#[derive(Debug)]
struct SessionInner {
    context_id: ContextId,
    current_page: PageId,
    page_ids: Vec<PageId>,
}

/// State of one isolated session: the context it owns and its open tabs.
///
/// Exclusively owned by the task whose `isolated_session` scope created
/// it; tools mutate only their own task's state through these accessors.
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
}

impl SessionState {
    pub(crate) fn new(context_id: ContextId, initial_page: PageId) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                context_id,
                current_page: initial_page,
                page_ids: vec![initial_page],
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The context this session owns for its lifetime.
    pub fn context_id(&self) -> ContextId {
        self.lock().context_id
    }

    /// The page tool calls act on by default.
    pub fn current_page(&self) -> PageId {
        self.lock().current_page
    }

    /// Pages belonging to this session, in tab order.
    pub fn pages(&self) -> Vec<PageId> {
        self.lock().page_ids.clone()
    }

    /// Record a newly opened tab and make it current.
    pub fn push_page(&self, page_id: PageId) {
        let mut inner = self.lock();
        inner.page_ids.push(page_id);
        inner.current_page = page_id;
    }

    /// Make `page_id` the current tab. Fails if this session does not own it.
    pub fn switch_to(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.lock();
        if !inner.page_ids.contains(&page_id) {
            return Err(BrowserError::UnknownPage(page_id));
        }
        inner.current_page = page_id;
        Ok(())
    }

    /// Swap in a fresh context and initial page, dropping all tab state.
    fn reset(&self, context_id: ContextId, initial_page: PageId) {
        let mut inner = self.lock();
        inner.context_id = context_id;
        inner.current_page = initial_page;
        inner.page_ids = vec![initial_page];
    }
}

/// Awaits a spawned acquisition; if dropped before it finishes (caller
/// cancelled), a reaper waits for the in-flight creation and deletes
/// whatever context it produced, so nothing is ever orphaned.
struct ReapOnCancel {
    registry: Arc<BrowserRegistry>,
    handle: Option<JoinHandle<Result<(ContextId, PageId)>>>,
}

impl ReapOnCancel {
    fn new(registry: Arc<BrowserRegistry>, handle: JoinHandle<Result<(ContextId, PageId)>>) -> Self {
        Self {
            registry,
            handle: Some(handle),
        }
    }

    async fn wait(mut self) -> Result<(ContextId, PageId)> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(BrowserError::ContextCreation(anyhow!(
                "session acquisition already consumed"
            )));
        };
        let joined = handle.await;
        self.handle = None;
        match joined {
            Ok(result) => result,
            Err(err) => Err(BrowserError::ContextCreation(anyhow!(err))),
        }
    }
}

impl Drop for ReapOnCancel {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Ok(Ok((context_id, _))) = handle.await {
                debug!(context_id = %context_id, "reaping context from cancelled acquisition");
                if let Err(err) = registry.delete_context(context_id).await {
                    warn!(context_id = %context_id, error = %err, "failed to reap cancelled acquisition");
                }
            }
        });
    }
}

/// Deletes the session's context when the session scope ends, on every
/// exit path. The normal path releases explicitly; drop covers
/// cancellation by spawning the deletion.
struct ReleaseGuard {
    registry: Arc<BrowserRegistry>,
    state: Arc<SessionState>,
    armed: bool,
}

impl ReleaseGuard {
    fn new(registry: Arc<BrowserRegistry>, state: Arc<SessionState>) -> Self {
        Self {
            registry,
            state,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.armed = false;
        // The spawned teardown runs to completion even if this await is
        // cancelled, so the context is deleted on every exit path.
        let _ = spawn_release(self.registry.clone(), self.state.context_id()).await;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let _ = spawn_release(self.registry.clone(), self.state.context_id());
    }
}

/// Run context deletion in its own task so teardown finishes even when
/// the caller is cancelled while awaiting it.
fn spawn_release(registry: Arc<BrowserRegistry>, context_id: ContextId) -> JoinHandle<()> {
    tokio::spawn(async move { release_context(&registry, context_id).await })
}

/// Best-effort context deletion during teardown. Failures are surfaced in
/// the log but never corrupt session scoping, which has already been
/// restored by the time this runs.
async fn release_context(registry: &BrowserRegistry, context_id: ContextId) {
    match registry.delete_context(context_id).await {
        Ok(()) => {}
        // Already gone (e.g. registry shut down, or refresh swapped it out
        // mid-teardown). Defensive double-delete is non-fatal.
        Err(BrowserError::UnknownContext(_)) => {
            debug!(context_id = %context_id, "context already released");
        }
        Err(err) => {
            warn!(context_id = %context_id, error = %err, "session teardown failed");
        }
    }
}

/// High-level entry point for creating isolated browser sessions.
pub struct WebBrowser {
    registry: Arc<BrowserRegistry>,
}

impl WebBrowser {
    pub fn new(registry: Arc<BrowserRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BrowserRegistry> {
        &self.registry
    }

    /// Run `f` inside a fresh isolated session.
    ///
    /// The session's state is bound for the calling task across the whole
    /// extent of the returned future, so any tool invoked from `f` —
    /// however deeply nested — acts on this session without being handed
    /// it explicitly. The context and all its pages are released on every
    /// exit path: normal return, error value, or cancellation.
    pub async fn isolated_session<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (context_id, initial_page) = self.acquire().await?;
        let state = Arc::new(SessionState::new(context_id, initial_page));
        info!(context_id = %context_id, "opened isolated session");

        let guard = ReleaseGuard::new(self.registry.clone(), state.clone());
        let output = binding::scope(state.clone(), f()).await;
        // The task-local binding is gone; only now report the teardown.
        guard.release().await;
        info!(context_id = %state.context_id(), "closed isolated session");
        Ok(output)
    }

    /// Tear down the active session's context and swap in a fresh one,
    /// clearing cookies, storage, and all open tabs.
    pub async fn refresh(&self) -> Result<()> {
        let state = binding::current()?;
        let old_context = state.context_id();

        // Build the replacement before touching the old context so the
        // session never points at a dead one. The old context's teardown
        // is detached: once the session tracks the new context, nothing
        // would ever retry the old deletion if this caller were cancelled
        // mid-await.
        let (context_id, initial_page) = self.acquire().await?;
        state.reset(context_id, initial_page);
        let _ = spawn_release(self.registry.clone(), old_context).await;
        debug!(old = %old_context, new = %context_id, "refreshed session context");
        Ok(())
    }

    /// Create a context plus its initial page, unwinding the context if
    /// the page cannot be opened. Runs in a spawned task so a cancelled
    /// caller leaves no half-created context behind.
    async fn acquire(&self) -> Result<(ContextId, PageId)> {
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let context_id = registry.create_context().await?;
            match registry.create_page(context_id).await {
                Ok(page_id) => Ok((context_id, page_id)),
                Err(err) => {
                    if let Err(unwind) = registry.delete_context(context_id).await {
                        warn!(context_id = %context_id, error = %unwind,
                            "failed to unwind context after page creation failure");
                    }
                    Err(err)
                }
            }
        });
        ReapOnCancel::new(self.registry.clone(), handle).wait().await
    }
}
