use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::driver::{BrowserError, Driver, Launcher, Locator};

const IS_VISIBLE: &str = r#"
function() {
    const style = window.getComputedStyle(this);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length);
}
"#;

/// Describes the element hit at (x, y) when it is neither `this` nor inside it,
/// otherwise returns null.
fn hit_test(x: f64, y: f64) -> String {
    format!(
        r#"
function() {{
    const hit = document.elementFromPoint({x}, {y});
    if (!hit || hit === this || this.contains(hit)) return null;
    const class_name = hit.getAttribute('class');
    return hit.tagName.toLowerCase() + (class_name ? '.' + class_name.trim().split(/\s+/).join('.') : '');
}}
"#
    )
}

/// The covering element reported by `hit_test`, if any.
fn obscured_by(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(hit)) => Some(hit.clone()),
        _ => None,
    }
}

fn cdp(e: CdpError) -> BrowserError {
    let message = e.to_string();
    // Node handles go stale once the page re-renders.
    if message.contains("does not exist") || message.contains("not attached") {
        BrowserError::Detached(message)
    } else {
        BrowserError::Protocol(message)
    }
}

/// A Chromium instance with a single page, driven over CDP.
pub struct ChromeDriver {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile_dir: tempfile::TempDir,
    page: Page,
    closed: bool,
}

impl ChromeDriver {
    pub async fn launch(config: &Config) -> Result<Self, BrowserError> {
        // Fresh temp profile per game so no cookies/state leak between sessions
        let user_data_dir = tempfile::tempdir()
            .map_err(|e| BrowserError::LaunchFailed(format!("temp profile dir: {e}")))?;

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            })
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--user-agent=Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36")
            // Use the tempdir via the builder method (not .arg()) so chromiumoxide
            // doesn't silently override it with /tmp/chromiumoxide-runner.
            .user_data_dir(user_data_dir.path());

        if config.headless {
            // .with_head() stops chromiumoxide adding the old --headless flag
            builder = builder.with_head().arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp)?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            "Object.defineProperty(navigator, 'webdriver', { get: () => false });".to_string(),
        ))
        .await
        .map_err(cdp)?;

        Ok(ChromeDriver {
            browser,
            handler,
            _profile_dir: user_data_dir,
            page,
            closed: false,
        })
    }

    async fn find_by_text(&self, tag: &str, needle: &str) -> Result<Option<Element>, BrowserError> {
        for element in self.page.find_elements(tag).await.map_err(cdp)? {
            let text = element.inner_text().await.map_err(cdp)?.unwrap_or_default();
            if text.contains(needle) {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        tracing::info!("navigating to {url}");
        self.page.goto(url).await.map_err(cdp)?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        match locator {
            Locator::Text { tag, contains } => self.find_by_text(tag, contains).await,
            _ => Ok(self
                .page
                .find_elements(locator.selector())
                .await
                .map_err(cdp)?
                .into_iter()
                .next()),
        }
    }

    async fn is_visible(&self, element: &Element) -> Result<bool, BrowserError> {
        let returns = element.call_js_fn(IS_VISIBLE, false).await.map_err(cdp)?;
        Ok(returns.result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn text(&self, element: &Element) -> Result<String, BrowserError> {
        let text = element.inner_text().await.map_err(cdp)?.unwrap_or_default();
        Ok(text.trim().to_owned())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        element.attribute(name).await.map_err(cdp)
    }

    async fn click(&self, element: &Element) -> Result<(), BrowserError> {
        // Page::click dispatches mouse events at screen coordinates, so an overlay
        // would swallow the click silently. Hit-test the point first.
        element.scroll_into_view().await.map_err(cdp)?;
        let point = element
            .clickable_point()
            .await
            .map_err(|e| BrowserError::NotInteractable(e.to_string()))?;

        let returns = element
            .call_js_fn(hit_test(point.x, point.y), false)
            .await
            .map_err(cdp)?;
        if let Some(cover) = obscured_by(returns.result.value.as_ref()) {
            return Err(BrowserError::NotInteractable(format!("obscured by {cover}")));
        }

        self.page
            .click(point)
            .await
            .map_err(|e| BrowserError::NotInteractable(e.to_string()))?;
        Ok(())
    }

    async fn call_on(&self, element: &Element, function: &str) -> Result<(), BrowserError> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        if let Some(exception) = returns.exception_details {
            return Err(BrowserError::Script(exception.text));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(cdp)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        self.closed = true;
        let closed = self.browser.close().await.map(|_| ()).map_err(cdp);
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("waiting for browser exit failed: {e}");
        }
        self.handler.abort();
        closed
    }
}

pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self) -> Result<ChromeDriver, BrowserError> {
        tracing::info!("launching browser");
        ChromeDriver::launch(&self.config).await
    }
}
