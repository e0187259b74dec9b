//! Browser session abstraction.
//!
//! A [`Launcher`] hands out one exclusively owned [`PageSession`] per scrape.
//! Sessions share nothing, so concurrent scrapes each get their own.

pub mod chromium;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use chromium::{ChromiumLauncher, LaunchOptions};

/// Opens fresh page sessions.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

/// A single browser page owned by one scrape.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait for the load to finish, bounded by `timeout_ms`.
    /// Fails with `AppError::Navigation`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    /// URL of the current document after redirects.
    async fn current_url(&self) -> Result<String>;

    /// Full-page PNG written to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Release the page and whatever browser resources back it.
    async fn close(self: Box<Self>) -> Result<()>;
}
