use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidNumber { name: String, value: String },

    #[error("invalid window size: {0} (expected WIDTHxHEIGHT)")]
    InvalidWindowSize(String),
}

/// Delays and bounded waits used while driving the game page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Upper bound for any awaited element during start and turn.
    pub element_timeout: Duration,
    /// Per-control bound when probing the continuation dialog after a rejected guess.
    pub continue_timeout: Duration,
    /// Pause before probing the continuation dialog.
    pub continue_delay: Duration,
    /// Pause after a click so the page can transition before it is read again.
    pub settle: Duration,
    pub overlay_settle: Duration,
    pub scroll_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(30),
            continue_timeout: Duration::from_secs(5),
            continue_delay: Duration::from_secs(2),
            settle: Duration::from_secs(3),
            overlay_settle: Duration::from_secs(1),
            scroll_settle: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
impl Timings {
    /// No pauses and single-probe waits, for driving a fake page.
    pub fn immediate() -> Self {
        Self {
            element_timeout: Duration::ZERO,
            continue_timeout: Duration::ZERO,
            continue_delay: Duration::ZERO,
            settle: Duration::ZERO,
            overlay_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        }
    }
}

/// Everything a game session needs besides its browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    pub site_url: String,
    pub timings: Timings,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub chromium_path: Option<String>,
    /// Run browser in new-headless mode (default true)
    pub headless: bool,
    pub window_size: (u32, u32),
    pub game: GameSettings,
    /// Sessions idle longer than this are ended by the reaper. `None` disables reaping.
    pub idle_timeout: Option<Duration>,
    pub reap_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = lookup("SEER_LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:8080".into());

        let site_url = lookup("SEER_SITE_URL").unwrap_or_else(|| "https://en.akinator.com".into());

        let chromium_path = lookup("SEER_CHROMIUM_PATH");

        let headless = lookup("SEER_HEADLESS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let window_size = match lookup("SEER_WINDOW_SIZE") {
            Some(raw) => parse_window_size(&raw)?,
            None => (1366, 768),
        };

        let mut timings = Timings::default();
        if let Some(secs) = number(&lookup, "SEER_WAIT_TIMEOUT_SECS")? {
            timings.element_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = number(&lookup, "SEER_SETTLE_MS")? {
            timings.settle = Duration::from_millis(ms);
        }

        let idle_timeout = match number(&lookup, "SEER_IDLE_TIMEOUT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(30 * 60)),
        };

        let reap_interval =
            Duration::from_secs(number(&lookup, "SEER_REAP_INTERVAL_SECS")?.unwrap_or(60).max(1));

        Ok(Config {
            listen_addr,
            chromium_path,
            headless,
            window_size,
            game: GameSettings { site_url, timings },
            idle_timeout,
            reap_interval,
        })
    }
}

fn number(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>, ConfigError> {
    lookup(name)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                name: name.into(),
                value: v.clone(),
            })
        })
        .transpose()
}

fn parse_window_size(raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidWindowSize(raw.into());
    let (w, h) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let h = h.trim().parse::<u32>().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}
