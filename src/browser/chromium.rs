//! Chromium-backed sessions using chromiumoxide.
//!
//! Each session launches its own browser process, so closing the session
//! tears down the page, the process and the CDP handler task together.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Launcher, PageSession};
use crate::config::{Config, USER_AGENT, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Auto-detected by chromiumoxide when `None`.
    pub chrome_path: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            headless: cfg.headless,
            chrome_path: cfg.chrome_path.clone(),
        }
    }
}

pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let viewport = Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        };

        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(viewport)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage");
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| AppError::Browser(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Browser(format!("failed to launch Chromium: {e}")))?;

        // From here on, dropping this future (scrape timeout) still stops the
        // handler via `HandlerTask`, and `Browser`'s own drop kills the process.
        let handler_task = HandlerTask(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {e}");
                }
            }
        }));

        let page = match open_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(&mut browser, handler_task).await;
                return Err(e);
            }
        };

        debug!(headless = self.options.headless, "Chromium session opened");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

async fn open_page(browser: &Browser) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| AppError::Browser(format!("failed to create page: {e}")))?;
    page.set_user_agent(USER_AGENT)
        .await
        .map_err(|e| AppError::Browser(format!("failed to set user agent: {e}")))?;
    Ok(page)
}

/// CDP event loop for one browser; aborted when dropped.
struct HandlerTask(JoinHandle<()>);

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn shutdown_browser(browser: &mut Browser, handler_task: HandlerTask) {
    if let Err(e) = browser.close().await {
        warn!("Browser close failed: {e}");
    }
    if let Err(e) = browser.wait().await {
        warn!("Browser process wait failed: {e}");
    }
    drop(handler_task);
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: HandlerTask,
}

#[async_trait]
impl PageSession for ChromiumSession {
    /// Waits for the load event, not for network idle; the caller's settle
    /// delay covers requests still in flight after it.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let nav = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), nav).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AppError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {timeout_ms}ms"),
            }),
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| AppError::Browser(format!("selector probe failed: {e}")))?;
        result
            .into_value::<usize>()
            .map_err(|e| AppError::Browser(format!("unexpected selector probe result: {e}")))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| AppError::Browser(format!("failed to read page content: {e}")))
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| AppError::Browser(format!("failed to read page URL: {e}")))?;
        Ok(url.unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| AppError::Browser(format!("screenshot failed: {e}")))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;
        if let Err(e) = page.close().await {
            debug!("Page close failed: {e}");
        }
        shutdown_browser(&mut browser, handler_task).await;
        debug!("Chromium session closed");
        Ok(())
    }
}
