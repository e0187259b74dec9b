//! Page acquisition: navigate, settle, then wait for the first market marker.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::browser::PageSession;
use crate::error::{AppError, Result};
use crate::trace::Trace;

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub nav_timeout_ms: u64,
    /// Fixed wait after navigation; the page keeps mutating after the network goes quiet.
    pub settle_delay_ms: u64,
    pub content_timeout_ms: u64,
    pub poll_ms: u64,
}

/// A page whose markets have rendered.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects, falling back to the requested one.
    pub url: String,
    pub html: String,
}

/// Brings `session` to a state where market cards can be read.
///
/// Fails with `Navigation` when the load does not finish in time and with
/// `ContentNotFound` when no element matches `marker` within the content
/// budget (layout change, or a page with no markets at all).
pub async fn acquire(
    session: &mut dyn PageSession,
    url: &str,
    marker: &str,
    timings: &Timings,
    trace: &mut Trace,
) -> Result<()> {
    trace.note(format!("Navigating to {url}"));
    info!(url, "Navigating");
    session.navigate(url, timings.nav_timeout_ms).await?;

    trace.note("Waiting for content to load...");
    tokio::time::sleep(Duration::from_millis(timings.settle_delay_ms)).await;

    wait_for_marker(session, marker, timings).await?;
    trace.note(format!("Found elements using selector: {marker}"));
    Ok(())
}

/// Reads the settled document.
pub async fn snapshot(session: &dyn PageSession, requested_url: &str) -> Result<RenderedPage> {
    let html = session.content().await?;
    let url = session
        .current_url()
        .await
        .ok()
        .filter(|u| !u.is_empty() && u != "about:blank")
        .unwrap_or_else(|| requested_url.to_string());
    Ok(RenderedPage { url, html })
}

/// Polls until at least one element matches `marker`, bounded by the content budget.
///
/// A failed probe counts as "not yet": the page's script context is torn down
/// and rebuilt while the client framework re-renders.
async fn wait_for_marker(session: &dyn PageSession, marker: &str, timings: &Timings) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timings.content_timeout_ms);
    let poll = Duration::from_millis(timings.poll_ms.max(1));

    loop {
        match session.count(marker).await {
            Ok(n) if n > 0 => return Ok(()),
            Ok(_) => {}
            Err(e) => debug!(marker, "Marker probe failed, retrying: {e}"),
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(AppError::ContentNotFound {
                selector: marker.to_string(),
                timeout_ms: timings.content_timeout_ms,
            });
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::browser::{Launcher, PageSession};

    /// Scripted page: the marker shows up after `appear_after` probes.
    /// The first `failing_probes` probes error instead of answering.
    pub(crate) struct FakePage {
        pub html: String,
        pub appear_after: Option<usize>,
        pub failing_probes: usize,
        pub fail_navigation: bool,
        pub probes: AtomicUsize,
        pub closed: Arc<AtomicBool>,
    }

    impl FakePage {
        pub(crate) fn new(html: &str) -> Self {
            Self {
                html: html.to_string(),
                appear_after: Some(0),
                failing_probes: 0,
                fail_navigation: false,
                probes: AtomicUsize::new(0),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl PageSession for FakePage {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<()> {
            if self.fail_navigation {
                return Err(AppError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        async fn count(&self, _selector: &str) -> Result<usize> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if n < self.failing_probes {
                return Err(AppError::Browser("Execution context was destroyed".to_string()));
            }
            Ok(match self.appear_after {
                Some(after) if n >= after => 1,
                _ => 0,
            })
        }

        async fn content(&self) -> Result<String> {
            Ok(self.html.clone())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn screenshot(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands out one prepared [`FakePage`] per `open`.
    pub(crate) struct FakeLauncher {
        pub page: std::sync::Mutex<Option<FakePage>>,
    }

    impl FakeLauncher {
        pub(crate) fn new(page: FakePage) -> Self {
            Self {
                page: std::sync::Mutex::new(Some(page)),
            }
        }
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn open(&self) -> Result<Box<dyn PageSession>> {
            let page = self
                .page
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| AppError::Browser("no more fake pages".to_string()))?;
            Ok(Box::new(page))
        }
    }

    pub(crate) fn fast_timings() -> Timings {
        Timings {
            nav_timeout_ms: 1_000,
            settle_delay_ms: 0,
            content_timeout_ms: 50,
            poll_ms: 5,
        }
    }

    #[tokio::test]
    async fn waits_until_marker_appears() {
        let mut page = FakePage::new("<html></html>");
        page.appear_after = Some(3);
        let mut trace = Trace::new();

        acquire(&mut page, "https://example.com", "span.q", &fast_timings(), &mut trace)
            .await
            .expect("marker should appear");
        assert!(page.probes.load(Ordering::SeqCst) >= 4);
        assert_eq!(trace.lines()[0], "Navigating to https://example.com");
    }

    #[tokio::test]
    async fn failed_probe_keeps_polling() {
        let mut page = FakePage::new("<html></html>");
        page.failing_probes = 1;
        let mut timings = fast_timings();
        timings.content_timeout_ms = 500;
        let mut trace = Trace::new();

        acquire(&mut page, "https://example.com", "span.q", &timings, &mut trace)
            .await
            .expect("second probe should find the marker");
        assert_eq!(page.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn probes_failing_until_deadline_are_content_not_found() {
        let mut page = FakePage::new("<html></html>");
        page.failing_probes = usize::MAX;
        let mut trace = Trace::new();

        let err = acquire(&mut page, "https://example.com", "span.q", &fast_timings(), &mut trace)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ContentNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_marker_is_content_not_found() {
        let mut page = FakePage::new("<html></html>");
        page.appear_after = None;
        let mut trace = Trace::new();

        let err = acquire(&mut page, "https://example.com", "span.q", &fast_timings(), &mut trace)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ContentNotFound { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn navigation_failure_propagates() {
        let mut page = FakePage::new("<html></html>");
        page.fail_navigation = true;
        let mut trace = Trace::new();

        let err = acquire(&mut page, "https://nowhere.invalid", "span.q", &fast_timings(), &mut trace)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Navigation { .. }));
        assert_eq!(page.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn snapshot_falls_back_to_requested_url() {
        let page = FakePage::new("<p>hi</p>");
        let rendered = snapshot(&page, "https://example.com/x").await.unwrap();
        assert_eq!(rendered.url, "https://example.com/x");
        assert_eq!(rendered.html, "<p>hi</p>");
    }
}
