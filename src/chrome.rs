//! [`Engine`] backed by a local Chrome/Chromium through `headless_chrome`.

use crate::engine::{CancelToken, Engine, LoadPolicy, PdfLayout, Session, SessionError};
use anyhow::{anyhow, Context};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ChromeEngine {
    executable: Option<PathBuf>,
    sandbox: bool,
}

impl Default for ChromeEngine {
    fn default() -> Self {
        ChromeEngine {
            executable: None,
            sandbox: true,
        }
    }
}

impl ChromeEngine {
    /// Browser binary to launch. Without one, the usual install locations
    /// and `PATH` are searched.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

impl Engine for ChromeEngine {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession, SessionError> {
        let options = LaunchOptions {
            headless: true,
            sandbox: self.sandbox,
            path: self.executable.clone(),
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            ..Default::default()
        };

        let browser = Browser::new(options).context("Failed to launch browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        debug!(executable = ?self.executable, sandbox = self.sandbox, "Browser launched");

        Ok(ChromeSession {
            tab: Some(tab),
            browser: Some(browser),
        })
    }
}

pub struct ChromeSession {
    tab: Option<Arc<Tab>>,
    browser: Option<Browser>,
}

impl ChromeSession {
    fn tab(&self) -> Result<&Arc<Tab>, SessionError> {
        self.tab
            .as_ref()
            .ok_or_else(|| anyhow!("Session already closed").into())
    }
}

impl Session for ChromeSession {
    /// Navigates and waits for Chrome's `networkIdle` lifecycle event on the
    /// main frame, the signal behind "no connections for 500ms". Navigation
    /// and the idle wait share one deadline.
    fn load(
        &mut self,
        url: &Url,
        policy: &LoadPolicy,
        cancel: &CancelToken,
    ) -> Result<(), SessionError> {
        let tab = self.tab()?;
        let deadline = Instant::now() + policy.timeout;

        let lifecycle = Arc::new(Mutex::new(Lifecycle::default()));
        let main_frame = tab.get_target_id().clone();
        let listener = {
            let lifecycle = Arc::clone(&lifecycle);
            tab.add_event_listener(Arc::new(move |event: &Event| {
                if let Event::PageLifecycleEvent(event) = event {
                    if event.params.frame_id == main_frame {
                        if let Ok(mut lifecycle) = lifecycle.lock() {
                            lifecycle.observe(&event.params.name);
                        }
                    }
                }
            }))?
        };

        let result = (|| -> Result<(), SessionError> {
            tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })?;
            tab.set_default_timeout(policy.timeout);
            tab.navigate_to(url.as_str())?;
            tab.wait_until_navigated()?;
            wait_until(deadline, policy.timeout, cancel, || {
                lifecycle.lock().map(|state| state.network_idle).unwrap_or(false)
            })
        })();

        if let Err(err) = tab.remove_event_listener(&listener) {
            debug!("Failed to remove lifecycle listener: {err:#}");
        }
        if result.is_ok() {
            debug!("Document reached network idle");
        }
        result
    }

    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, SessionError> {
        let object = self.tab()?.evaluate(expression, false)?;
        Ok(object.value.unwrap_or(serde_json::Value::Null))
    }

    fn print_to_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, SessionError> {
        let bytes = self.tab()?.print_to_pdf(Some(print_options(layout)))?;
        Ok(bytes)
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(err) = tab.close(false) {
                warn!("Failed to close tab: {err:#}");
            }
        }
        // Dropping the browser kills its process.
        if self.browser.take().is_some() {
            debug!("Browser closed");
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Maps a layout onto Chrome's `Page.printToPDF` parameters, which take
/// inches.
pub fn print_options(layout: &PdfLayout) -> PrintToPdfOptions {
    let (paper_width, paper_height) = layout.format.size_in_inches();
    let margins = &layout.margins;

    PrintToPdfOptions {
        print_background: Some(layout.print_background),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(margins.top.to_inches()),
        margin_right: Some(margins.right.to_inches()),
        margin_bottom: Some(margins.bottom.to_inches()),
        margin_left: Some(margins.left.to_inches()),
        prefer_css_page_size: Some(false),
        display_header_footer: Some(layout.header_footer.is_some()),
        header_template: layout
            .header_footer
            .as_ref()
            .map(|template| template.header().to_string()),
        footer_template: layout
            .header_footer
            .as_ref()
            .map(|template| template.footer().to_string()),
        ..Default::default()
    }
}

/// Main-frame lifecycle as reported by `Page.lifecycleEvent`.
///
/// Only a `networkIdle` that follows the navigation's own `init` counts, so
/// events left over from the blank tab are ignored.
#[derive(Debug, Default)]
struct Lifecycle {
    navigated: bool,
    network_idle: bool,
}

impl Lifecycle {
    fn observe(&mut self, name: &str) {
        match name {
            "init" => {
                self.navigated = true;
                self.network_idle = false;
            }
            "networkIdle" if self.navigated => self.network_idle = true,
            _ => {}
        }
    }
}

/// Polls `ready` until it holds, the caller cancels, or `deadline` passes.
fn wait_until(
    deadline: Instant,
    timeout: Duration,
    cancel: &CancelToken,
    mut ready: impl FnMut() -> bool,
) -> Result<(), SessionError> {
    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if ready() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(SessionError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
