//! Acquisition → extraction → assembly for one scrape.
//!
//! The page session is opened at the start of [`Scraper::scrape`] and closed
//! on every exit path. If the scrape future is dropped mid-flight (wall-clock
//! budget expired), the guard hands the close to the runtime instead.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::acquisition::{acquire, snapshot, Timings};
use crate::browser::{Launcher, PageSession};
use crate::error::{AppError, Result};
use crate::extract::extract_markets;
use crate::extract::markers::Markers;
use crate::trace::Trace;
use crate::types::ScrapeResult;

pub struct Scraper {
    launcher: Arc<dyn Launcher>,
    markers: Markers,
    timings: Timings,
    screenshot: Option<PathBuf>,
}

impl Scraper {
    pub fn new(launcher: Arc<dyn Launcher>, timings: Timings) -> Self {
        Self {
            launcher,
            markers: Markers::default(),
            timings,
            screenshot: None,
        }
    }

    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    /// Save a full-page screenshot to `path` once the page has settled.
    pub fn with_screenshot(mut self, path: PathBuf) -> Self {
        self.screenshot = Some(path);
        self
    }

    /// Scrapes `url` into a [`ScrapeResult`]. Diagnostic lines go to `trace`.
    pub async fn scrape(&self, url: &str, trace: &mut Trace) -> Result<ScrapeResult> {
        let mut guard = SessionGuard::new(self.launcher.open().await?);

        let outcome = match guard.session_mut() {
            Some(session) => self.run(session, url, trace).await,
            None => Err(AppError::Browser("page session already released".to_string())),
        };

        guard.release().await;
        outcome
    }

    async fn run(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        trace: &mut Trace,
    ) -> Result<ScrapeResult> {
        acquire(session, url, self.markers.question_css(), &self.timings, trace).await?;

        if let Some(path) = &self.screenshot {
            match session.screenshot(path).await {
                Ok(()) => info!(path = %path.display(), "Screenshot saved"),
                Err(e) => warn!("Screenshot failed: {e}"),
            }
        }

        trace.note("Extracting prediction markets data...");
        let page = snapshot(session, url)
            .await
            .map_err(|e| extraction_failure(url, e))?;
        let base = Url::parse(&page.url).map_err(|e| AppError::Extraction {
            url: url.to_string(),
            reason: format!("page URL `{}` is not absolute: {e}", page.url),
        })?;

        let markets = extract_markets(&page.html, &base, &self.markers, trace);
        let result = ScrapeResult::assemble(url, markets);

        let options = result.total_options();
        trace.note(format!(
            "Found {} markets with {options} total options",
            result.total_markets_found
        ));
        info!(
            url,
            markets = result.total_markets_found,
            options,
            "Market data extraction completed"
        );
        Ok(result)
    }
}

/// Page failures keep their kind; anything else becomes an extraction failure for `url`.
fn extraction_failure(url: &str, err: AppError) -> AppError {
    if err.is_page_failure() {
        return err;
    }
    AppError::Extraction {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

/// Owns the page session for the lifetime of one scrape.
struct SessionGuard {
    session: Option<Box<dyn PageSession>>,
}

impl SessionGuard {
    fn new(session: Box<dyn PageSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session_mut(&mut self) -> Option<&mut (dyn PageSession + 'static)> {
        self.session.as_deref_mut()
    }

    async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close page session: {e}");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("Failed to close cancelled page session: {e}");
                    }
                });
            }
            Err(_) => warn!("No runtime to close cancelled page session"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
