use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::answer::{Answer, CONTINUE_BUTTONS, GuessReply};
use crate::config::{GameSettings, Timings};
use crate::driver::{BrowserError, Driver, Locator, Readiness, wait_for};
use crate::interactor;
use crate::reader::{self, Payload};

pub const PLAY_BUTTON: Locator = Locator::css("div[class*=\"btn-play\"] a");
pub const THEME_SELECTION: Locator = Locator::css("div[class*=\"database-selection\"]");
const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStage {
    Starting,
    Playing,
    Guess,
    Finished,
    Error,
}

impl GameStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStage::Finished | GameStage::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStage::Starting => "starting",
            GameStage::Playing => "playing",
            GameStage::Guess => "guess",
            GameStage::Finished => "finished",
            GameStage::Error => "error",
        }
    }
}

impl fmt::Display for GameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    InvalidAnswer(String),

    #[error("{0}")]
    Interaction(String),

    #[error("timed out after {}s waiting for {locator}", .after.as_secs_f32())]
    Timeout { locator: Locator, after: Duration },

    #[error("game is over (stage: {0})")]
    GameOver(GameStage),

    #[error("game session already ended")]
    Closed,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub stage: GameStage,
    pub content: Payload,
}

/// One game, bound to one browser for its whole life.
pub struct GameSession<D: Driver> {
    driver: D,
    site_url: String,
    timings: Timings,
    stage: GameStage,
    content: Option<Payload>,
    closed: bool,
}

impl<D: Driver> GameSession<D> {
    pub fn new(driver: D, settings: GameSettings) -> Self {
        Self {
            driver,
            site_url: settings.site_url,
            timings: settings.timings,
            stage: GameStage::Starting,
            content: None,
            closed: false,
        }
    }

    pub fn stage(&self) -> GameStage {
        self.stage
    }

    /// Last observed page content; `None` only before `start` has run.
    pub fn content(&self) -> Option<&Payload> {
        self.content.as_ref()
    }

    /// Open the site, pick `theme` and wait for the first question.
    ///
    /// On failure the session moves to `Error` for good and its content
    /// describes what went wrong; the session itself stays usable for inspection.
    pub async fn start(&mut self, theme: &str) -> Result<&Payload, GameError> {
        match self.open(theme).await {
            Ok(()) => {
                tracing::info!("game started with theme {theme}");
                self.stage = GameStage::Playing;
                Ok(self.refresh().await)
            }
            Err(e) => {
                tracing::error!("error starting game: {e}");
                match self.driver.page_source().await {
                    Ok(html) => tracing::debug!("page at failure: {html}"),
                    Err(page_err) => tracing::debug!("could not retrieve page source: {page_err}"),
                }
                self.stage = GameStage::Error;
                self.content = Some(Payload::error(format!("Error starting game: {e}")));
                Err(e)
            }
        }
    }

    async fn open(&self, theme: &str) -> Result<(), GameError> {
        self.driver.navigate(&self.site_url).await?;

        let play = self.await_element(&PLAY_BUTTON, Readiness::Visible).await?;
        self.press(&play, "play").await?;

        self.await_element(&THEME_SELECTION, Readiness::Present).await?;

        let theme_button = Locator::Css(
            format!("li[class*=\"li-game\"][onclick*=\"chooseTheme('{theme}')\"]").into(),
        );
        let choice = self.await_element(&theme_button, Readiness::Visible).await?;
        self.press(&choice, "theme").await?;

        self.await_element(&reader::QUESTION_LABEL, Readiness::Present).await?;
        Ok(())
    }

    /// Answer the current question or guess and report the page that follows.
    pub async fn turn(&mut self, answer: &str) -> Result<TurnOutcome, GameError> {
        if self.closed {
            return Err(GameError::Closed);
        }
        if self.stage.is_terminal() {
            return Err(GameError::GameOver(self.stage));
        }

        if self.stage == GameStage::Guess {
            let reply: GuessReply = answer.parse()?;
            let result = self.reply_to_guess(reply).await;
            // Keep the answer controls in view for the next turn, whatever happened.
            if let Err(e) = self.driver.evaluate(SCROLL_TO_BOTTOM).await {
                tracing::warn!("scroll to bottom failed: {e}");
            }
            result?;
        } else {
            let answer: Answer = answer.parse()?;
            self.answer_question(answer).await?;
        }

        let content = self.refresh().await.clone();
        Ok(TurnOutcome {
            stage: self.stage,
            content,
        })
    }

    async fn answer_question(&mut self, answer: Answer) -> Result<(), GameError> {
        let button = self.await_element(&answer.button(), Readiness::Present).await?;
        tracing::info!("found button for answer: {answer}");

        if !interactor::click(&self.driver, &button, &self.timings).await {
            return Err(GameError::Interaction(format!(
                "Could not click button for answer: {answer}"
            )));
        }
        tracing::info!("clicked button for answer: {answer}");

        sleep(self.timings.settle).await;
        Ok(())
    }

    async fn reply_to_guess(&mut self, reply: GuessReply) -> Result<(), GameError> {
        let button = self.await_element(&reply.button(), Readiness::Present).await?;

        tracing::info!("clicking guess button: {reply}");
        if !interactor::click(&self.driver, &button, &self.timings).await {
            return Err(GameError::Interaction(format!(
                "Could not click guess button for: {reply}"
            )));
        }

        if reply == GuessReply::No {
            sleep(self.timings.continue_delay).await;
            if !self.continue_after_rejection().await? {
                tracing::warn!("could not find or click continue button after 'No' guess");
            }
        }

        sleep(self.timings.settle).await;
        Ok(())
    }

    /// Resume play after a rejected guess. The site may also have moved on by
    /// itself, so finding no control is not an error.
    async fn continue_after_rejection(&self) -> Result<bool, GameError> {
        for control in &CONTINUE_BUTTONS {
            let Some(button) = wait_for(
                &self.driver,
                control,
                Readiness::Present,
                self.timings.continue_timeout,
            )
            .await?
            else {
                continue;
            };

            if self.driver.is_visible(&button).await? {
                tracing::info!("auto-clicking continue button: {control}");
                if interactor::click(&self.driver, &button, &self.timings).await {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Release the browser. Not idempotent: a second call reports the driver's error.
    pub async fn end(&mut self) -> Result<(), GameError> {
        self.closed = true;
        self.driver.close().await?;
        Ok(())
    }

    async fn refresh(&mut self) -> &Payload {
        let payload = reader::read(&self.driver).await;
        if let Some(stage) = payload.stage() {
            self.stage = stage;
        }
        tracing::debug!("page reads as {}: {}", self.stage, payload.message());
        self.content.insert(payload)
    }

    async fn await_element(
        &self,
        locator: &Locator,
        readiness: Readiness,
    ) -> Result<D::Element, GameError> {
        let timeout = self.timings.element_timeout;
        wait_for(&self.driver, locator, readiness, timeout)
            .await?
            .ok_or_else(|| GameError::Timeout {
                locator: locator.clone(),
                after: timeout,
            })
    }

    async fn press(&self, element: &D::Element, what: &str) -> Result<(), GameError> {
        if interactor::click(&self.driver, element, &self.timings).await {
            Ok(())
        } else {
            Err(GameError::Interaction(format!("Could not click {what} button")))
        }
    }
}
