//! Browser tools for the agent.
//!
//! Every function here acts on the session bound for the calling task;
//! outside an `isolated_session` scope it fails with
//! [`BrowserError::NoActiveSession`] before touching the registry.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use webden_browser::{binding, BrowserError, PageId, Result, WebBrowser};

use crate::render::html_to_markdown;
use crate::{Tool, ToolContext, ToolOutput};

/// One entry of a session's tab list.
#[derive(Debug, Clone, Serialize)]
pub struct TabInfo {
    pub index: usize,
    pub page_id: PageId,
    pub current: bool,
}

/// Navigate the current tab to `url` and return the page as markdown.
///
/// `url` must be complete, including the protocol
/// (e.g. `https://www.example.com`).
pub async fn go_to_url(web: &WebBrowser, url: &str) -> Result<String> {
    let state = binding::current()?;
    let page = state.current_page();
    web.registry().navigate(page, url).await?;
    let html = web.registry().page_source(page).await?;
    debug!(url, bytes = html.len(), "fetched page");
    Ok(html_to_markdown(&html))
}

/// Markdown rendering of the current tab's page source.
pub async fn get_page_content(web: &WebBrowser) -> Result<String> {
    let state = binding::current()?;
    let html = web.registry().page_source(state.current_page()).await?;
    Ok(html_to_markdown(&html))
}

/// Open a blank tab in the session's context, make it current, and
/// return its index in the tab order.
pub async fn open_new_tab(web: &WebBrowser) -> Result<usize> {
    let state = binding::current()?;
    let page = web.registry().create_page(state.context_id()).await?;
    state.push_page(page);
    Ok(state.pages().len() - 1)
}

/// Make the tab at `index` current.
pub async fn switch_tab(index: usize) -> Result<()> {
    let state = binding::current()?;
    let pages = state.pages();
    let page = pages
        .get(index)
        .copied()
        .ok_or_else(|| BrowserError::Action(anyhow::anyhow!("no tab at index {index}")))?;
    state.switch_to(page)
}

/// The session's tabs, in tab order.
pub async fn list_tabs() -> Result<Vec<TabInfo>> {
    let state = binding::current()?;
    let current = state.current_page();
    Ok(state
        .pages()
        .into_iter()
        .enumerate()
        .map(|(index, page_id)| TabInfo {
            index,
            page_id,
            current: page_id == current,
        })
        .collect())
}

/// Discard the session's cookies, storage, and tabs by swapping in a
/// fresh context with one blank tab.
pub async fn refresh_context(web: &WebBrowser) -> Result<()> {
    web.refresh().await
}

/// All browser tools, ready for [`ToolRegistry`](crate::ToolRegistry)
/// registration.
pub fn browser_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(GoToUrlTool),
        Box::new(PageContentTool),
        Box::new(NewTabTool),
        Box::new(SwitchTabTool),
        Box::new(ListTabsTool),
        Box::new(RefreshContextTool),
    ]
}

fn failure(err: BrowserError) -> ToolOutput {
    ToolOutput::error(err.to_string())
}

/// Navigate to a URL in the calling task's session.
pub struct GoToUrlTool;

#[async_trait]
impl Tool for GoToUrlTool {
    fn name(&self) -> &str {
        "go_to_url"
    }

    fn description(&self) -> &str {
        "Navigate the current browser tab to a URL and return the page content as markdown. \
         Provide the full URL including the protocol, e.g. 'https://www.example.com'. \
         Acts on the session bound for the calling task; fails if none is bound."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The full URL to navigate to"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
        if url.is_empty() {
            return Ok(ToolOutput::error("Error: url parameter is required"));
        }

        match go_to_url(&context.web, url).await {
            Ok(markdown) => Ok(ToolOutput::ok(markdown)),
            Err(err) => Ok(failure(err)),
        }
    }
}

/// Return the current page's content as markdown.
pub struct PageContentTool;

#[async_trait]
impl Tool for PageContentTool {
    fn name(&self) -> &str {
        "get_page_content"
    }

    fn description(&self) -> &str {
        "Return the current browser tab's page content as markdown. \
         Acts on the session bound for the calling task; fails if none is bound."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        match get_page_content(&context.web).await {
            Ok(markdown) => Ok(ToolOutput::ok(markdown)),
            Err(err) => Ok(failure(err)),
        }
    }
}

/// Open a new tab in the session and switch to it.
pub struct NewTabTool;

#[async_trait]
impl Tool for NewTabTool {
    fn name(&self) -> &str {
        "open_new_tab"
    }

    fn description(&self) -> &str {
        "Open a new blank tab in the current session and switch to it. \
         Returns the new tab's index."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        match open_new_tab(&context.web).await {
            Ok(index) => Ok(ToolOutput::ok(format!(
                "Opened tab {index} and switched to it"
            ))),
            Err(err) => Ok(failure(err)),
        }
    }
}

/// Switch the session's current tab by index.
pub struct SwitchTabTool;

#[async_trait]
impl Tool for SwitchTabTool {
    fn name(&self) -> &str {
        "switch_tab"
    }

    fn description(&self) -> &str {
        "Switch the current session to the tab at the given index (see list_tabs)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "integer",
                    "description": "Zero-based tab index"
                }
            },
            "required": ["index"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let Some(index) = params.get("index").and_then(|v| v.as_u64()) else {
            return Ok(ToolOutput::error("Error: index parameter is required"));
        };

        match switch_tab(index as usize).await {
            Ok(()) => Ok(ToolOutput::ok(format!("Switched to tab {index}"))),
            Err(err) => Ok(failure(err)),
        }
    }
}

/// List the session's open tabs.
pub struct ListTabsTool;

#[async_trait]
impl Tool for ListTabsTool {
    fn name(&self) -> &str {
        "list_tabs"
    }

    fn description(&self) -> &str {
        "List the tabs open in the current session, marking the current one."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        match list_tabs().await {
            Ok(tabs) => {
                let lines: Vec<String> = tabs
                    .iter()
                    .map(|tab| {
                        let marker = if tab.current { " (current)" } else { "" };
                        format!("{}: {}{}", tab.index, tab.page_id, marker)
                    })
                    .collect();
                Ok(ToolOutput::ok(lines.join("\n")))
            }
            Err(err) => Ok(failure(err)),
        }
    }
}

/// Reset the session to a pristine context.
pub struct RefreshContextTool;

#[async_trait]
impl Tool for RefreshContextTool {
    fn name(&self) -> &str {
        "refresh_context"
    }

    fn description(&self) -> &str {
        "Discard the current session's cookies, storage, and tabs, \
         replacing them with a fresh private context and one blank tab."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        match refresh_context(&context.web).await {
            Ok(()) => Ok(ToolOutput::ok("Session context refreshed")),
            Err(err) => Ok(failure(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use webden_browser::testing::FakeDriver;
    use webden_browser::BrowserRegistry;
    use webden_core::config::BrowserConfig;

    use super::*;

    async fn setup() -> (Arc<FakeDriver>, Arc<WebBrowser>) {
        let driver = Arc::new(FakeDriver::new());
        let registry = Arc::new(BrowserRegistry::new(
            driver.clone(),
            BrowserConfig::default(),
        ));
        registry.start().await.unwrap();
        (driver, Arc::new(WebBrowser::new(registry)))
    }

    #[tokio::test]
    async fn test_tool_outside_session_fails_without_registry_mutation() {
        let (driver, web) = setup().await;

        let err = go_to_url(&web, "https://example.com").await.unwrap_err();
        assert!(matches!(err, BrowserError::NoActiveSession));

        assert_eq!(web.registry().context_count().await, 0);
        assert_eq!(web.registry().page_count().await, 0);
        assert_eq!(driver.context_count().await, 0);
    }

    #[tokio::test]
    async fn test_go_to_url_returns_page_markdown() {
        let (_driver, web) = setup().await;

        let content = web
            .isolated_session(|| async {
                go_to_url(&web, "https://example.com").await.unwrap()
            })
            .await
            .unwrap();

        assert!(content.contains("https://example.com"));
        assert!(!content.contains("<html>"));
    }

    #[tokio::test]
    async fn test_tab_workflow() {
        let (_driver, web) = setup().await;

        web.isolated_session(|| async {
            assert_eq!(list_tabs().await.unwrap().len(), 1);

            let index = open_new_tab(&web).await.unwrap();
            assert_eq!(index, 1);

            let tabs = list_tabs().await.unwrap();
            assert_eq!(tabs.len(), 2);
            assert!(tabs[1].current);

            switch_tab(0).await.unwrap();
            let tabs = list_tabs().await.unwrap();
            assert!(tabs[0].current);

            assert!(switch_tab(5).await.is_err());
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_context_tool_resets_session() {
        let (_driver, web) = setup().await;

        web.isolated_session(|| async {
            let before = binding::current().unwrap().context_id();
            open_new_tab(&web).await.unwrap();

            refresh_context(&web).await.unwrap();

            let state = binding::current().unwrap();
            assert_ne!(state.context_id(), before);
            assert_eq!(state.pages().len(), 1);
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_navigate_tool_requires_url_param() {
        let (_driver, web) = setup().await;
        let context = ToolContext { web };

        let output = GoToUrlTool
            .execute(json!({}), &context)
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content.contains("url"));
    }

    #[tokio::test]
    async fn test_navigate_tool_reports_missing_session() {
        let (_driver, web) = setup().await;
        let context = ToolContext { web };

        let output = GoToUrlTool
            .execute(json!({"url": "https://example.com"}), &context)
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content.contains("no active browser session"));
    }

    #[tokio::test]
    async fn test_navigate_tool_happy_path() {
        let (_driver, web) = setup().await;
        let context = ToolContext { web: web.clone() };

        let output = web
            .isolated_session(|| async {
                GoToUrlTool
                    .execute(json!({"url": "https://example.com"}), &context)
                    .await
                    .unwrap()
            })
            .await
            .unwrap();

        assert!(!output.is_error);
        assert!(output.content.contains("https://example.com"));
    }
}
