use std::time::Duration;

use thiserror::Error;

use crate::types::{ContextId, PageId};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to start browser driver: {0}")]
    DriverStart(anyhow::Error),

    #[error("browser driver not started")]
    NotStarted,

    #[error("failed to create browsing context: {0}")]
    ContextCreation(anyhow::Error),

    #[error("failed to open page: {0}")]
    PageCreation(anyhow::Error),

    #[error("unknown browsing context: {0}")]
    UnknownContext(ContextId),

    #[error("unknown page: {0}")]
    UnknownPage(PageId),

    /// A tool ran outside the dynamic extent of an `isolated_session`.
    /// Never caught below the tool boundary.
    #[error("no active browser session for this task")]
    NoActiveSession,

    #[error("browser action failed: {0}")]
    Action(anyhow::Error),

    #[error("session teardown failed: {0}")]
    Release(anyhow::Error),

    #[error("browser driver call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
