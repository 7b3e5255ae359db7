//! chromiumoxide-backed [`Driver`] (feature `browser`).
//!
//! Isolation maps directly onto CDP: one `Target.createBrowserContext`
//! per session context, pages opened as targets inside that context, and
//! `Target.disposeBrowserContext` on teardown.

use std::collections::HashMap;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use webden_core::config::BrowserConfig;

use crate::driver::Driver;

struct CdpState {
    browser: Browser,
    /// driver-native page handle (CDP target id) -> live page
    pages: HashMap<String, Page>,
    /// context handle -> page handles opened in it
    context_pages: HashMap<String, Vec<String>>,
    handler_task: tokio::task::JoinHandle<()>,
}

/// Driver over a single long-lived Chrome/Chromium process.
pub struct CdpDriver {
    settings: BrowserConfig,
    state: Mutex<Option<CdpState>>,
}

impl CdpDriver {
    pub fn new(settings: BrowserConfig) -> Self {
        Self {
            settings,
            state: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn launch(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Ok(());
        }

        let mut builder = chromiumoxide::browser::BrowserConfig::builder();
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| anyhow!(e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser process")?;

        // The handler stream must be drained for the browser to function.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler event error");
                }
            }
        });

        *state = Some(CdpState {
            browser,
            pages: HashMap::new(),
            context_pages: HashMap::new(),
            handler_task,
        });
        debug!("browser process launched");
        Ok(())
    }

    async fn terminate(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let Some(mut cdp) = state.take() else {
            return Ok(());
        };
        for (_, page) in cdp.pages.drain() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "failed to close page during termination");
            }
        }
        cdp.browser
            .close()
            .await
            .context("failed to close browser process")?;
        cdp.handler_task.abort();
        debug!("browser process terminated");
        Ok(())
    }

    async fn create_context(&self) -> anyhow::Result<String> {
        let mut state = self.state.lock().await;
        let cdp = state.as_mut().ok_or_else(|| anyhow!("browser not launched"))?;
        let response = cdp
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Target.createBrowserContext failed")?;
        let handle = response.browser_context_id.inner().clone();
        cdp.context_pages.insert(handle.clone(), Vec::new());
        Ok(handle)
    }

    async fn delete_context(&self, context_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let cdp = state.as_mut().ok_or_else(|| anyhow!("browser not launched"))?;
        // Disposing the context closes its targets; drop our page entries too.
        for page_handle in cdp.context_pages.remove(context_handle).unwrap_or_default() {
            cdp.pages.remove(&page_handle);
        }
        cdp.browser
            .execute(DisposeBrowserContextParams::new(BrowserContextId::new(
                context_handle,
            )))
            .await
            .context("Target.disposeBrowserContext failed")?;
        Ok(())
    }

    async fn open_page(&self, context_handle: &str) -> anyhow::Result<String> {
        let mut state = self.state.lock().await;
        let cdp = state.as_mut().ok_or_else(|| anyhow!("browser not launched"))?;
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(BrowserContextId::new(context_handle))
            .build()
            .map_err(|e| anyhow!(e))?;
        let page = cdp
            .browser
            .new_page(params)
            .await
            .context("failed to open page")?;
        let handle = page.target_id().inner().clone();
        cdp.pages.insert(handle.clone(), page);
        cdp.context_pages
            .entry(context_handle.to_string())
            .or_default()
            .push(handle.clone());
        Ok(handle)
    }

    async fn close_page(&self, page_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let cdp = state.as_mut().ok_or_else(|| anyhow!("browser not launched"))?;
        if let Some(page) = cdp.pages.remove(page_handle) {
            for pages in cdp.context_pages.values_mut() {
                pages.retain(|h| h != page_handle);
            }
            page.close().await.context("failed to close page")?;
        }
        Ok(())
    }

    async fn navigate(&self, page_handle: &str, url: &str) -> anyhow::Result<()> {
        let page = {
            let state = self.state.lock().await;
            let cdp = state.as_ref().ok_or_else(|| anyhow!("browser not launched"))?;
            cdp.pages
                .get(page_handle)
                .cloned()
                .ok_or_else(|| anyhow!("unknown page handle: {page_handle}"))?
        };
        page.goto(url).await.context("navigation failed")?;
        // Best effort; some pages never fire a load event.
        let _ = page.wait_for_navigation().await;
        Ok(())
    }

    async fn page_source(&self, page_handle: &str) -> anyhow::Result<String> {
        let page = {
            let state = self.state.lock().await;
            let cdp = state.as_ref().ok_or_else(|| anyhow!("browser not launched"))?;
            cdp.pages
                .get(page_handle)
                .cloned()
                .ok_or_else(|| anyhow!("unknown page handle: {page_handle}"))?
        };
        page.content().await.context("failed to read page source")
    }
}
