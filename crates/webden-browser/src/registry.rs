//! Resource registry — sole owner of the driver process and the
//! authoritative mapping from opaque ids to native resource handles.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::RwLock;
use tracing::{debug, info};

use webden_core::config::BrowserConfig;

use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::types::{ContextId, PageId};

/// One isolated browsing context. `page_ids` keeps insertion order,
/// which is the tab order sessions observe.
struct ContextRecord {
    native: String,
    page_ids: Vec<PageId>,
}

/// One addressable page. `owning_context_id` is for lookup only; the
/// context record owns the page's lifecycle.
struct PageRecord {
    native: String,
    owning_context_id: ContextId,
}

#[derive(Default)]
struct RegistryInner {
    started: bool,
    contexts: HashMap<ContextId, ContextRecord>,
    pages: HashMap<PageId, PageRecord>,
}

/// Thread-safe registry multiplexing isolated contexts and pages onto one
/// driver process.
///
/// All mutations of the id→handle maps are serialized by the internal
/// write lock; lookups share the read side. Every driver round-trip is
/// bounded by the configured timeout.
pub struct BrowserRegistry {
    driver: Arc<dyn Driver>,
    config: BrowserConfig,
    inner: RwLock<RegistryInner>,
}

impl BrowserRegistry {
    pub fn new(driver: Arc<dyn Driver>, config: BrowserConfig) -> Self {
        Self {
            driver,
            config,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Bound a driver call by the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<anyhow::Result<T>>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::time::timeout(self.config.timeout(), fut)
            .await
            .map_err(|_| BrowserError::Timeout(self.config.timeout()))
    }

    /// Launch the driver process. Idempotent.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.started {
            return Ok(());
        }
        self.bounded(self.driver.launch())
            .await?
            .map_err(BrowserError::DriverStart)?;
        inner.started = true;
        info!("browser driver started");
        Ok(())
    }

    /// Terminate the driver process and invalidate every outstanding
    /// context and page record. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.started {
            return Ok(());
        }
        let contexts = inner.contexts.len();
        let pages = inner.pages.len();
        inner.contexts.clear();
        inner.pages.clear();
        inner.started = false;
        self.bounded(self.driver.terminate())
            .await?
            .map_err(BrowserError::Release)?;
        info!(contexts, pages, "browser driver shut down");
        Ok(())
    }

    /// Create a new isolated context.
    ///
    /// Rejects once `max_contexts` contexts are live; callers own any
    /// retry or backoff policy.
    pub async fn create_context(&self) -> Result<ContextId> {
        let mut inner = self.inner.write().await;
        if !inner.started {
            return Err(BrowserError::NotStarted);
        }
        if inner.contexts.len() >= self.config.max_contexts {
            return Err(BrowserError::ContextCreation(anyhow!(
                "context limit reached ({})",
                self.config.max_contexts
            )));
        }
        let native = self
            .bounded(self.driver.create_context())
            .await?
            .map_err(BrowserError::ContextCreation)?;
        let context_id = ContextId::new();
        inner.contexts.insert(
            context_id,
            ContextRecord {
                native,
                page_ids: Vec::new(),
            },
        );
        debug!(context_id = %context_id, "created isolated context");
        Ok(context_id)
    }

    /// Open a new page inside `context_id`.
    pub async fn create_page(&self, context_id: ContextId) -> Result<PageId> {
        let mut inner = self.inner.write().await;
        if !inner.started {
            return Err(BrowserError::NotStarted);
        }
        let native_context = match inner.contexts.get(&context_id) {
            Some(record) => record.native.clone(),
            None => return Err(BrowserError::UnknownContext(context_id)),
        };
        let native = self
            .bounded(self.driver.open_page(&native_context))
            .await?
            .map_err(BrowserError::PageCreation)?;
        let page_id = PageId::new();
        inner.pages.insert(
            page_id,
            PageRecord {
                native,
                owning_context_id: context_id,
            },
        );
        if let Some(record) = inner.contexts.get_mut(&context_id) {
            record.page_ids.push(page_id);
        }
        debug!(context_id = %context_id, page_id = %page_id, "opened page");
        Ok(page_id)
    }

    /// Resolve a page id to its driver-native handle.
    ///
    /// This is the safety check that turns "use outside a live session"
    /// into a typed failure instead of silent misbehavior.
    pub async fn get_page(&self, page_id: PageId) -> Result<String> {
        let inner = self.inner.read().await;
        inner
            .pages
            .get(&page_id)
            .map(|record| record.native.clone())
            .ok_or(BrowserError::UnknownPage(page_id))
    }

    /// Close a single page. No-op if the page is already gone.
    pub async fn close_page(&self, page_id: PageId) -> Result<()> {
        let native = {
            let mut inner = self.inner.write().await;
            let Some(record) = inner.pages.remove(&page_id) else {
                return Ok(());
            };
            if let Some(context) = inner.contexts.get_mut(&record.owning_context_id) {
                context.page_ids.retain(|p| *p != page_id);
            }
            record.native
        };
        self.bounded(self.driver.close_page(&native))
            .await?
            .map_err(BrowserError::Release)?;
        debug!(page_id = %page_id, "closed page");
        Ok(())
    }

    /// Delete a context and every page belonging to it.
    ///
    /// The records disappear from the maps in one critical section; no
    /// reader can observe a partially torn-down context.
    pub async fn delete_context(&self, context_id: ContextId) -> Result<()> {
        let (native, page_count) = {
            let mut inner = self.inner.write().await;
            let Some(record) = inner.contexts.remove(&context_id) else {
                return Err(BrowserError::UnknownContext(context_id));
            };
            for page_id in &record.page_ids {
                inner.pages.remove(page_id);
            }
            (record.native, record.page_ids.len())
        };
        self.bounded(self.driver.delete_context(&native))
            .await?
            .map_err(BrowserError::Release)?;
        debug!(context_id = %context_id, pages = page_count, "deleted isolated context");
        Ok(())
    }

    /// Navigate a page. The registry stays the only caller of the driver,
    /// so tools go through here rather than holding a driver reference.
    pub async fn navigate(&self, page_id: PageId, url: &str) -> Result<()> {
        let native = self.get_page(page_id).await?;
        self.bounded(self.driver.navigate(&native, url))
            .await?
            .map_err(BrowserError::Action)?;
        debug!(page_id = %page_id, url, "navigated");
        Ok(())
    }

    /// Current HTML source of a page.
    pub async fn page_source(&self, page_id: PageId) -> Result<String> {
        let native = self.get_page(page_id).await?;
        self.bounded(self.driver.page_source(&native))
            .await?
            .map_err(BrowserError::Action)
    }

    /// Number of live contexts.
    pub async fn context_count(&self) -> usize {
        self.inner.read().await.contexts.len()
    }

    /// Number of live pages across all contexts.
    pub async fn page_count(&self) -> usize {
        self.inner.read().await.pages.len()
    }

    /// Whether `context_id` is currently live.
    pub async fn has_context(&self, context_id: ContextId) -> bool {
        self.inner.read().await.contexts.contains_key(&context_id)
    }

    /// Pages currently open in `context_id`, in tab order.
    pub async fn pages_in_context(&self, context_id: ContextId) -> Result<Vec<PageId>> {
        let inner = self.inner.read().await;
        inner
            .contexts
            .get(&context_id)
            .map(|record| record.page_ids.clone())
            .ok_or(BrowserError::UnknownContext(context_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::FakeDriver;

    fn registry_with(max_contexts: usize) -> (Arc<FakeDriver>, BrowserRegistry) {
        let driver = Arc::new(FakeDriver::new());
        let config = BrowserConfig {
            max_contexts,
            ..BrowserConfig::default()
        };
        let registry = BrowserRegistry::new(driver.clone(), config);
        (driver, registry)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        registry.start().await.unwrap();
        assert!(driver.launched().await);
    }

    #[tokio::test]
    async fn test_create_context_requires_start() {
        let (_driver, registry) = registry_with(8);
        let err = registry.create_context().await.unwrap_err();
        assert!(matches!(err, BrowserError::NotStarted));
    }

    #[tokio::test]
    async fn test_context_limit_rejects() {
        let (_driver, registry) = registry_with(1);
        registry.start().await.unwrap();
        registry.create_context().await.unwrap();
        let err = registry.create_context().await.unwrap_err();
        assert!(matches!(err, BrowserError::ContextCreation(_)));
    }

    #[tokio::test]
    async fn test_create_page_unknown_context() {
        let (_driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        let context_id = registry.create_context().await.unwrap();
        registry.delete_context(context_id).await.unwrap();
        let err = registry.create_page(context_id).await.unwrap_err();
        assert!(matches!(err, BrowserError::UnknownContext(id) if id == context_id));
    }

    #[tokio::test]
    async fn test_get_page_after_close_fails_typed() {
        let (_driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        let context_id = registry.create_context().await.unwrap();
        let page_id = registry.create_page(context_id).await.unwrap();
        assert!(registry.get_page(page_id).await.is_ok());

        registry.close_page(page_id).await.unwrap();
        let err = registry.get_page(page_id).await.unwrap_err();
        assert!(matches!(err, BrowserError::UnknownPage(id) if id == page_id));
        // close is idempotent
        registry.close_page(page_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_context_removes_all_pages() {
        let (driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        let context_id = registry.create_context().await.unwrap();
        registry.create_page(context_id).await.unwrap();
        registry.create_page(context_id).await.unwrap();
        assert_eq!(registry.page_count().await, 2);

        registry.delete_context(context_id).await.unwrap();
        assert_eq!(registry.page_count().await, 0);
        assert_eq!(registry.context_count().await, 0);
        assert_eq!(driver.page_count().await, 0);

        let err = registry.delete_context(context_id).await.unwrap_err();
        assert!(matches!(err, BrowserError::UnknownContext(_)));
    }

    #[tokio::test]
    async fn test_navigate_and_page_source() {
        let (_driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        let context_id = registry.create_context().await.unwrap();
        let page_id = registry.create_page(context_id).await.unwrap();

        registry.navigate(page_id, "https://example.com").await.unwrap();
        let source = registry.page_source(page_id).await.unwrap();
        assert!(source.contains("https://example.com"));
    }

    #[tokio::test]
    async fn test_shutdown_invalidates_records() {
        let (_driver, registry) = registry_with(8);
        registry.start().await.unwrap();
        let context_id = registry.create_context().await.unwrap();
        let page_id = registry.create_page(context_id).await.unwrap();

        registry.shutdown().await.unwrap();
        registry.shutdown().await.unwrap(); // no-op

        assert!(matches!(
            registry.get_page(page_id).await.unwrap_err(),
            BrowserError::UnknownPage(_)
        ));
        assert!(!registry.has_context(context_id).await);
    }

    #[tokio::test]
    async fn test_unresponsive_driver_times_out() {
        let driver = Arc::new(FakeDriver::new());
        let config = BrowserConfig {
            timeout_ms: 20,
            ..BrowserConfig::default()
        };
        let registry = BrowserRegistry::new(driver.clone(), config);
        registry.start().await.unwrap();

        driver.set_create_context_delay(Duration::from_millis(500)).await;
        let err = registry.create_context().await.unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)));
    }
}
