use serde::Serialize;

use crate::driver::{BrowserError, Driver, Locator, find_visible};
use crate::game::GameStage;

pub const PROPOSE_BLOCK: Locator = Locator::id("proposeGameBlock");
pub const PROPOSED_NAME: Locator = Locator::id("name_proposition");
pub const PROPOSED_DESCRIPTION: Locator = Locator::id("description_proposition");
pub const PROPOSED_IMAGE: Locator = Locator::css("#img_character img");
pub const QUESTION_BLOCK: Locator = Locator::id("questionGameBlock");
pub const QUESTION_LABEL: Locator = Locator::id("question-label");

/// Probed in order; the first visible one marks the end of the game.
pub const END_MARKERS: [Locator; 3] = [
    Locator::css("p[class*=\"end-text\"]"),
    Locator::css(".end-text"),
    Locator::css(".game-over"),
];

/// The site shows this in place of an empty description.
const NO_DESCRIPTION: &str = "-";

pub const UNKNOWN_STATE: &str = "Couldn't identify the current game state";
const UNREADABLE_GUESS: &str = "A guess was made but its details couldn't be read";

/// What the page currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Question { message: String },
    Guess(Guess),
    Finished { message: String },
    Unknown { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guess {
    #[serde(flatten)]
    pub proposal: Option<Proposal>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub character_name: String,
    pub character_description: String,
    pub image_url: String,
}

impl Guess {
    pub fn new(proposal: Proposal) -> Self {
        let mut message = format!("I think of: {}", proposal.character_name);
        if !proposal.character_description.is_empty() {
            message.push_str(" - ");
            message.push_str(&proposal.character_description);
        }
        Guess {
            proposal: Some(proposal),
            message,
        }
    }

    pub fn unreadable() -> Self {
        Guess {
            proposal: None,
            message: UNREADABLE_GUESS.into(),
        }
    }
}

impl Payload {
    pub fn error(message: impl Into<String>) -> Self {
        Payload::Error {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Payload::Question { message }
            | Payload::Finished { message }
            | Payload::Unknown { message }
            | Payload::Error { message } => message,
            Payload::Guess(guess) => &guess.message,
        }
    }

    /// The stage this payload puts a session in. `Unknown` says nothing about
    /// the stage, so it keeps whatever the session had.
    pub fn stage(&self) -> Option<GameStage> {
        match self {
            Payload::Question { .. } => Some(GameStage::Playing),
            Payload::Guess(_) => Some(GameStage::Guess),
            Payload::Finished { .. } => Some(GameStage::Finished),
            Payload::Error { .. } => Some(GameStage::Error),
            Payload::Unknown { .. } => None,
        }
    }
}

/// Classify the current page. Never fails: browser errors become an error payload.
pub async fn read<D: Driver + ?Sized>(driver: &D) -> Payload {
    match classify(driver).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("reading game state failed: {e}");
            Payload::error(format!("Error getting question: {e}"))
        }
    }
}

async fn classify<D: Driver + ?Sized>(driver: &D) -> Result<Payload, BrowserError> {
    // Guess first: the question block can linger underneath the proposal.
    if find_visible(driver, &PROPOSE_BLOCK).await?.is_some() {
        return read_guess(driver).await.map(Payload::Guess);
    }

    if find_visible(driver, &QUESTION_BLOCK).await?.is_some()
        && let Some(label) = driver.find(&QUESTION_LABEL).await?
    {
        let message = driver.text(&label).await?;
        tracing::info!("found question: {message}");
        return Ok(Payload::Question { message });
    }

    for marker in &END_MARKERS {
        match find_visible(driver, marker).await {
            Ok(Some(end)) => match driver.text(&end).await {
                Ok(message) => return Ok(Payload::Finished { message }),
                Err(e) => tracing::debug!("end marker {marker} unreadable: {e}"),
            },
            Ok(None) => {}
            Err(e) => tracing::debug!("end marker {marker} probe failed: {e}"),
        }
    }

    Ok(Payload::Unknown {
        message: UNKNOWN_STATE.into(),
    })
}

async fn read_guess<D: Driver + ?Sized>(driver: &D) -> Result<Guess, BrowserError> {
    let Some(name) = driver.find(&PROPOSED_NAME).await? else {
        tracing::error!("guess shown but {PROPOSED_NAME} is missing");
        return Ok(Guess::unreadable());
    };
    let character_name = driver.text(&name).await?;

    let image_url = match driver.find(&PROPOSED_IMAGE).await? {
        Some(img) => driver.attribute(&img, "src").await?.unwrap_or_default(),
        None => {
            tracing::warn!("could not find character image");
            String::new()
        }
    };

    let character_description = match driver.find(&PROPOSED_DESCRIPTION).await? {
        Some(desc) => {
            let text = driver.text(&desc).await?;
            if text == NO_DESCRIPTION { String::new() } else { text }
        }
        None => String::new(),
    };

    tracing::info!("guess made: {character_name}");
    Ok(Guess::new(Proposal {
        character_name,
        character_description,
        image_url,
    }))
}
