//! Boundary to the native browser automation layer.

use async_trait::async_trait;

/// The external automation collaborator.
///
/// Handles are driver-native opaque identifiers (CDP target and browser
/// context ids). The [`BrowserRegistry`](crate::registry::BrowserRegistry)
/// is the sole caller; everything above it speaks [`ContextId`] and
/// [`PageId`] instead.
///
/// [`ContextId`]: crate::types::ContextId
/// [`PageId`]: crate::types::PageId
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch the underlying browser process.
    async fn launch(&self) -> anyhow::Result<()>;

    /// Terminate the browser process and everything in it.
    async fn terminate(&self) -> anyhow::Result<()>;

    /// Create a new isolated browsing context (private profile).
    async fn create_context(&self) -> anyhow::Result<String>;

    /// Delete a context, closing every page that belongs to it.
    async fn delete_context(&self, context_handle: &str) -> anyhow::Result<()>;

    /// Open a blank page inside a context.
    async fn open_page(&self, context_handle: &str) -> anyhow::Result<String>;

    /// Close a single page.
    async fn close_page(&self, page_handle: &str) -> anyhow::Result<()>;

    /// Navigate a page and wait for the load to settle.
    async fn navigate(&self, page_handle: &str, url: &str) -> anyhow::Result<()>;

    /// Current HTML of a page.
    async fn page_source(&self, page_handle: &str) -> anyhow::Result<String>;
}
