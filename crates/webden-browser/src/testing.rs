//! In-process driver double used by the test suites.
//!
//! [`FakeDriver`] records contexts, pages, and navigations in memory and
//! serves a synthetic page source per navigated URL, so session-isolation
//! behavior can be asserted without a real browser.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::driver::Driver;

#[derive(Default)]
struct FakeState {
    launched: bool,
    next_id: u64,
    /// context handle -> page handles open in it
    contexts: HashMap<String, Vec<String>>,
    /// page handle -> (owning context handle, navigated URL)
    pages: HashMap<String, (String, Option<String>)>,
    fail_next_create_context: bool,
    create_context_delay: Duration,
    delete_context_delay: Duration,
}

/// A scriptable in-memory [`Driver`].
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_context` call fail with a driver rejection.
    pub async fn fail_next_create_context(&self) {
        self.state.lock().await.fail_next_create_context = true;
    }

    /// Delay every `create_context` call, for in-flight cancellation tests.
    pub async fn set_create_context_delay(&self, delay: Duration) {
        self.state.lock().await.create_context_delay = delay;
    }

    /// Delay every `delete_context` call, for mid-teardown cancellation tests.
    pub async fn set_delete_context_delay(&self, delay: Duration) {
        self.state.lock().await.delete_context_delay = delay;
    }

    pub async fn launched(&self) -> bool {
        self.state.lock().await.launched
    }

    pub async fn context_count(&self) -> usize {
        self.state.lock().await.contexts.len()
    }

    pub async fn page_count(&self) -> usize {
        self.state.lock().await.pages.len()
    }

    /// URL the given page was last navigated to, if any.
    pub async fn page_url(&self, page_handle: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .pages
            .get(page_handle)
            .and_then(|(_, url)| url.clone())
    }

    /// Synthetic HTML served for a navigated URL.
    pub fn source_for(url: &str) -> String {
        format!("<html><head><title>{url}</title></head><body><p>content of {url}</p></body></html>")
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn launch(&self) -> anyhow::Result<()> {
        self.state.lock().await.launched = true;
        Ok(())
    }

    async fn terminate(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.launched = false;
        state.contexts.clear();
        state.pages.clear();
        Ok(())
    }

    async fn create_context(&self) -> anyhow::Result<String> {
        let delay = {
            let mut state = self.state.lock().await;
            if !state.launched {
                bail!("browser process not running");
            }
            if state.fail_next_create_context {
                state.fail_next_create_context = false;
                bail!("browser refused to create a context");
            }
            state.create_context_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let handle = format!("ctx-{}", state.next_id);
        state.contexts.insert(handle.clone(), Vec::new());
        Ok(handle)
    }

    async fn delete_context(&self, context_handle: &str) -> anyhow::Result<()> {
        let delay = self.state.lock().await.delete_context_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        let pages = state
            .contexts
            .remove(context_handle)
            .ok_or_else(|| anyhow!("unknown context handle: {context_handle}"))?;
        for page in pages {
            state.pages.remove(&page);
        }
        Ok(())
    }

    async fn open_page(&self, context_handle: &str) -> anyhow::Result<String> {
        let mut state = self.state.lock().await;
        if !state.contexts.contains_key(context_handle) {
            bail!("unknown context handle: {context_handle}");
        }
        state.next_id += 1;
        let handle = format!("page-{}", state.next_id);
        if let Some(pages) = state.contexts.get_mut(context_handle) {
            pages.push(handle.clone());
        }
        state
            .pages
            .insert(handle.clone(), (context_handle.to_string(), None));
        Ok(handle)
    }

    async fn close_page(&self, page_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some((context, _)) = state.pages.remove(page_handle) {
            if let Some(pages) = state.contexts.get_mut(&context) {
                pages.retain(|p| p != page_handle);
            }
        }
        Ok(())
    }

    async fn navigate(&self, page_handle: &str, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let (_, current) = state
            .pages
            .get_mut(page_handle)
            .ok_or_else(|| anyhow!("unknown page handle: {page_handle}"))?;
        *current = Some(url.to_string());
        Ok(())
    }

    async fn page_source(&self, page_handle: &str) -> anyhow::Result<String> {
        let state = self.state.lock().await;
        let (_, url) = state
            .pages
            .get(page_handle)
            .ok_or_else(|| anyhow!("unknown page handle: {page_handle}"))?;
        Ok(match url {
            Some(url) => Self::source_for(url),
            None => "<html><body></body></html>".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_fake_driver_round_trip() {
        let driver = Arc::new(FakeDriver::new());
        driver.launch().await.unwrap();

        let ctx = driver.create_context().await.unwrap();
        let page = driver.open_page(&ctx).await.unwrap();
        driver.navigate(&page, "https://example.com").await.unwrap();

        let source = driver.page_source(&page).await.unwrap();
        assert!(source.contains("https://example.com"));

        driver.delete_context(&ctx).await.unwrap();
        assert_eq!(driver.context_count().await, 0);
        assert_eq!(driver.page_count().await, 0);
    }

    #[tokio::test]
    async fn test_fake_driver_requires_launch() {
        let driver = FakeDriver::new();
        assert!(driver.create_context().await.is_err());
    }
}
