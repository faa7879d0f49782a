use std::fmt;

use tokio::time::sleep;

use crate::config::Timings;
use crate::driver::{BrowserError, Driver, Locator, find_visible};

pub const SCRIPT_CLICK: &str = "function() { this.click(); }";
const SCROLL_INTO_VIEW: &str = "function() { this.scrollIntoView(true); }";

/// Close buttons of popups and ads that tend to cover the game controls, in probe order.
pub const OVERLAY_CLOSERS: [Locator; 9] = [
    Locator::css("button[class*=\"close\"]"),
    Locator::css("span[class*=\"close\"]"),
    Locator::css("div[class*=\"close\"]"),
    Locator::css("[aria-label=\"Close\"]"),
    Locator::text("button", "×"),
    Locator::text("button", "Close"),
    Locator::css(".modal-close"),
    Locator::css(".popup-close"),
    Locator::css(".overlay-close"),
];

pub const BODY: Locator = Locator::css("body");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStrategy {
    Direct,
    DismissOverlays,
    Script,
    ScrollIntoView,
}

/// Tried in order until one lands.
pub const STRATEGIES: [ClickStrategy; 4] = [
    ClickStrategy::Direct,
    ClickStrategy::DismissOverlays,
    ClickStrategy::Script,
    ClickStrategy::ScrollIntoView,
];

impl fmt::Display for ClickStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClickStrategy::Direct => "direct",
            ClickStrategy::DismissOverlays => "post-overlay",
            ClickStrategy::Script => "script",
            ClickStrategy::ScrollIntoView => "scroll-then-script",
        })
    }
}

impl ClickStrategy {
    async fn attempt<D: Driver + ?Sized>(
        self,
        driver: &D,
        element: &D::Element,
        timings: &Timings,
    ) -> Result<(), BrowserError> {
        match self {
            ClickStrategy::Direct => driver.click(element).await,
            ClickStrategy::DismissOverlays => {
                dismiss_overlays(driver, timings).await;
                driver.click(element).await
            }
            ClickStrategy::Script => driver.call_on(element, SCRIPT_CLICK).await,
            ClickStrategy::ScrollIntoView => {
                driver.call_on(element, SCROLL_INTO_VIEW).await?;
                sleep(timings.scroll_settle).await;
                driver.call_on(element, SCRIPT_CLICK).await
            }
        }
    }
}

/// Click `element`, falling back through every strategy. Returns whether any landed.
pub async fn click<D: Driver + ?Sized>(driver: &D, element: &D::Element, timings: &Timings) -> bool {
    for strategy in STRATEGIES {
        match strategy.attempt(driver, element, timings).await {
            Ok(()) => {
                if strategy != ClickStrategy::Direct {
                    tracing::info!("clicked using {strategy} strategy");
                }
                return true;
            }
            Err(e) => tracing::warn!("{strategy} click failed: {e}"),
        }
    }
    tracing::error!("all click strategies failed");
    false
}

/// Try to close whatever overlay sits on top of the page. Returns true when a
/// close button was found and clicked; otherwise clicks the page body as a
/// generic dismiss and returns false.
pub async fn dismiss_overlays<D: Driver + ?Sized>(driver: &D, timings: &Timings) -> bool {
    for closer in &OVERLAY_CLOSERS {
        let button = match find_visible(driver, closer).await {
            Ok(Some(button)) => button,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!("overlay probe {closer} failed: {e}");
                continue;
            }
        };
        match driver.click(&button).await {
            Ok(()) => {
                tracing::info!("closed overlay using {closer}");
                sleep(timings.overlay_settle).await;
                return true;
            }
            Err(e) => tracing::debug!("overlay closer {closer} not clickable: {e}"),
        }
    }

    match driver.find(&BODY).await {
        Ok(Some(body)) => {
            if let Err(e) = driver.call_on(&body, SCRIPT_CLICK).await {
                tracing::warn!("error dismissing overlays: {e}");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("error dismissing overlays: {e}"),
    }
    sleep(timings.overlay_settle).await;
    false
}
