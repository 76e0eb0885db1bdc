//! Browser session bootstrap and DOM state polling over CDP.
//!
//! One Chromium-family browser, one page, reused for the whole run. The
//! polling helpers are the confirmation primitive for every roster gesture:
//! the page re-renders asynchronously, so "did it work" always means "does
//! the DOM eventually look right", never "did the click return Ok".

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::args::BrowserKind;
use crate::retry::RetryReason;

/// How a course-team page interaction went wrong.
///
/// The retry classifier divides these into transient causes (worth another
/// attempt) and terminal ones (the page will answer the same way every time).
#[derive(Debug, Error)]
pub enum PageError {
    #[error("could not sign in: {0}")]
    SignIn(String),

    #[error("this account has no access to the course")]
    Forbidden,

    #[error("page never became ready (waited {waited_secs}s)")]
    NotReady { waited_secs: u64 },

    #[error("element never appeared: {selector}")]
    Missing { selector: String },

    #[error("element never left the page: {selector}")]
    Lingering { selector: String },

    #[error("{gesture} failed on {selector}: {message}")]
    Rejected {
        gesture: &'static str,
        selector: String,
        message: String,
    },

    #[error("no confirmation that {0}")]
    Unconfirmed(String),

    #[error("browser transport error: {0}")]
    Transport(String),
}

impl PageError {
    /// The transient cause this error maps to, or `None` if it is terminal.
    pub fn retry_reason(&self) -> Option<RetryReason> {
        match self {
            Self::Missing { .. } | Self::Lingering { .. } => Some(RetryReason::Missing),
            Self::Rejected { .. } => Some(RetryReason::Rejected),
            Self::Unconfirmed(_) => Some(RetryReason::Unconfirmed),
            Self::Transport(_) => Some(RetryReason::Transport),
            Self::SignIn(_) | Self::Forbidden | Self::NotReady { .. } => None,
        }
    }

    pub(crate) fn rejected(
        gesture: &'static str,
        selector: &str,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::Rejected {
            gesture,
            selector: selector.to_string(),
            message: err.to_string(),
        }
    }
}

/// Options for launching the browser, resolved from the CLI.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub kind: BrowserKind,
    pub executable: Option<PathBuf>,
    pub visible: bool,
}

/// A live browser with one page and the handler task draining its events.
pub struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl Session {
    /// Launch the browser and open a blank page.
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let executable = resolve_executable(opts)?;
        debug!(binary = %executable.display(), visible = opts.visible, "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .viewport(None);
        if opts.visible {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        // The CDP connection stalls unless its event stream is drained.
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open a page")?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the page and browser. Shutdown failures are logged, not raised:
    /// by this point the run's results are already decided.
    pub async fn shutdown(self) {
        let Session {
            mut browser,
            page,
            handler,
        } = self;
        if let Err(err) = page.close().await {
            debug!(error = %err, "page did not close cleanly");
        }
        if let Err(err) = browser.close().await {
            warn!(error = %err, "browser did not close cleanly");
        }
        handler.abort();
    }
}

/// Find the browser executable: an explicit path wins, otherwise the first
/// candidate binary name for the chosen kind that resolves on PATH.
fn resolve_executable(opts: &LaunchOptions) -> Result<PathBuf> {
    if let Some(path) = &opts.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        bail!("browser executable not found at {}", path.display());
    }

    for candidate in opts.kind.candidates() {
        if let Ok(found) = which::which(candidate) {
            debug!(binary = %found.display(), "resolved browser executable");
            return Ok(found);
        }
    }

    bail!(
        "no {} binary found on PATH; point --browser-path at one",
        opts.kind.as_str()
    )
}

// ── DOM state polling ───────────────────────────────────────────────────────
//
// Poll cadence: 100ms start, doubling, capped at 1s. The page renders its
// roster via JavaScript well after the load event, so one-shot lookups lie.

const POLL_START: Duration = Duration::from_millis(100);
const POLL_CAP: Duration = Duration::from_secs(1);

/// Poll until `selector` matches an element, or time out.
pub async fn wait_for(page: &Page, selector: &str, timeout: Duration) -> Result<Element, PageError> {
    let start = Instant::now();
    let mut interval = POLL_START;

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if start.elapsed() >= timeout {
            return Err(PageError::Missing {
                selector: selector.to_string(),
            });
        }
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(POLL_CAP);
    }
}

/// Poll until `selector` matches nothing, or time out.
pub async fn wait_for_gone(page: &Page, selector: &str, timeout: Duration) -> Result<(), PageError> {
    let start = Instant::now();
    let mut interval = POLL_START;

    loop {
        if page.find_element(selector).await.is_err() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(PageError::Lingering {
                selector: selector.to_string(),
            });
        }
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(POLL_CAP);
    }
}

/// Poll until `selector` matches nothing or only invisible elements.
///
/// Dialog markup stays in the DOM when dismissed; visibility is the signal.
pub async fn wait_for_hidden(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<(), PageError> {
    let start = Instant::now();
    let mut interval = POLL_START;

    loop {
        if !is_visible(page, selector).await? {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(PageError::Lingering {
                selector: selector.to_string(),
            });
        }
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(POLL_CAP);
    }
}

/// Single non-waiting probe for `selector`.
pub async fn is_present(page: &Page, selector: &str) -> bool {
    page.find_element(selector).await.is_ok()
}

/// Whether `selector` matches an element that is actually rendered.
pub async fn is_visible(page: &Page, selector: &str) -> Result<bool, PageError> {
    let script = format!(
        "(() => {{ const el = document.querySelector({selector:?}); \
         return !!el && el.offsetParent !== null; }})()"
    );
    page.evaluate(script)
        .await
        .map_err(|e| PageError::Transport(e.to_string()))?
        .into_value::<bool>()
        .map_err(|e| PageError::Transport(e.to_string()))
}

/// Current document title ("" when it cannot be read).
pub async fn title(page: &Page) -> String {
    match page.evaluate("document.title").await {
        Ok(result) => result.into_value::<String>().unwrap_or_default(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_executable_must_exist() {
        let opts = LaunchOptions {
            kind: BrowserKind::Chrome,
            executable: Some(PathBuf::from("/nonexistent/definitely-not-a-browser")),
            visible: false,
        };
        let err = resolve_executable(&opts).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn retry_reasons_split_transient_from_terminal() {
        assert_eq!(
            PageError::Missing {
                selector: "x".into()
            }
            .retry_reason(),
            Some(RetryReason::Missing)
        );
        assert_eq!(
            PageError::Unconfirmed("y".into()).retry_reason(),
            Some(RetryReason::Unconfirmed)
        );
        assert_eq!(PageError::Forbidden.retry_reason(), None);
        assert_eq!(
            PageError::NotReady { waited_secs: 10 }.retry_reason(),
            None
        );
    }
}
