//! Isolated browser sessions for concurrent agent tasks.
//!
//! One long-lived browser process is shared by many logically independent
//! sessions, each backed by its own private browsing context. The active
//! session is bound per task, so tool functions never take a session
//! parameter and never see another task's state.
//!
//! The pieces, leaf to root:
//! - [`registry::BrowserRegistry`] owns the driver process and the live
//!   id-to-handle maps.
//! - [`session::WebBrowser`] opens and tears down sessions with
//!   [`session::WebBrowser::isolated_session`].
//! - [`binding`] exposes the calling task's active session to arbitrarily
//!   nested code.

pub mod binding;
#[cfg(feature = "browser")]
pub mod cdp;
pub mod driver;
pub mod error;
pub mod registry;
pub mod session;
pub mod testing;
pub mod types;

pub use error::{BrowserError, Result};
pub use registry::BrowserRegistry;
pub use session::{SessionState, WebBrowser};
pub use types::{ContextId, PageId};
