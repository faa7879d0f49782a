use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("element is not interactable: {0}")]
    NotInteractable(String),

    #[error("element is no longer attached to the page: {0}")]
    Detached(String),

    #[error("browser already closed")]
    Closed,
}

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Id(Cow<'static, str>),
    Css(Cow<'static, str>),
    /// First `tag` element whose text contains `contains`.
    Text {
        tag: Cow<'static, str>,
        contains: Cow<'static, str>,
    },
}

impl Locator {
    pub const fn id(id: &'static str) -> Self {
        Locator::Id(Cow::Borrowed(id))
    }

    pub const fn css(selector: &'static str) -> Self {
        Locator::Css(Cow::Borrowed(selector))
    }

    pub const fn text(tag: &'static str, contains: &'static str) -> Self {
        Locator::Text {
            tag: Cow::Borrowed(tag),
            contains: Cow::Borrowed(contains),
        }
    }

    /// CSS selector matching the candidate elements.
    pub fn selector(&self) -> String {
        match self {
            Locator::Id(id) => format!("[id=\"{id}\"]"),
            Locator::Css(css) => css.to_string(),
            Locator::Text { tag, .. } => tag.to_string(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{id}"),
            Locator::Css(css) => f.write_str(css),
            Locator::Text { tag, contains } => write!(f, "{tag}:contains('{contains}')"),
        }
    }
}

/// The browser capabilities the game logic relies on. One driver is one page
/// in one browser, owned by exactly one game session.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Absence is an ordinary outcome, not an error.
    async fn find(&self, locator: &Locator) -> Result<Option<Self::Element>, BrowserError>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool, BrowserError>;

    async fn text(&self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Native click through normal hit-testing. A target covered by another
    /// element must fail with `NotInteractable` rather than click the cover.
    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    /// Call a JS function declaration with the element bound to `this`.
    async fn call_on(&self, element: &Self::Element, function: &str) -> Result<(), BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError>;

    async fn page_source(&self) -> Result<String, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Opens a fresh browser for each new game.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    type Driver: Driver + 'static;

    async fn launch(&self) -> Result<Self::Driver, BrowserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Present,
    Visible,
}

/// Find an element, returning it as soon as it is visible.
pub async fn find_visible<D: Driver + ?Sized>(
    driver: &D,
    locator: &Locator,
) -> Result<Option<D::Element>, BrowserError> {
    match driver.find(locator).await? {
        Some(element) if driver.is_visible(&element).await? => Ok(Some(element)),
        _ => Ok(None),
    }
}

/// Poll for an element until it reaches `readiness` or `timeout` elapses.
///
/// A timeout is reported as `Ok(None)`. Polling starts at 100ms and doubles up
/// to 1s between probes; a zero timeout probes exactly once.
pub async fn wait_for<D: Driver + ?Sized>(
    driver: &D,
    locator: &Locator,
    readiness: Readiness,
    timeout: Duration,
) -> Result<Option<D::Element>, BrowserError> {
    let start = Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        let found = match readiness {
            Readiness::Present => driver.find(locator).await?,
            Readiness::Visible => find_visible(driver, locator).await?,
        };
        if found.is_some() {
            return Ok(found);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::debug!("{locator} not {readiness:?} after {}ms", timeout.as_millis());
            return Ok(None);
        }

        sleep(poll_interval.min(timeout - elapsed)).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
