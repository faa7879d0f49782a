use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::driver::Driver;
use crate::game::{GameError, GameSession, GameStage, TurnOutcome};
use crate::reader::Payload;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("game not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub game_id: String,
    pub stage: GameStage,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub stage: GameStage,
    pub content: Option<Payload>,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    stage: GameStage,
    started_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

/// A registered game. The session lock serializes every browser operation on
/// this game; `activity` mirrors its stage so listing never waits on a turn.
struct Slot<D: Driver> {
    session: Mutex<GameSession<D>>,
    activity: Mutex<Activity>,
}

impl<D: Driver> Slot<D> {
    async fn touch(&self, stage: GameStage) {
        let mut activity = self.activity.lock().await;
        activity.stage = stage;
        activity.last_active = Utc::now();
    }
}

/// Live games by id.
pub struct SessionRegistry<D: Driver> {
    slots: Mutex<HashMap<String, Arc<Slot<D>>>>,
}

impl<D: Driver> Default for SessionRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> SessionRegistry<D> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session under a fresh id.
    pub async fn insert(&self, session: GameSession<D>) -> String {
        let game_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let slot = Arc::new(Slot {
            activity: Mutex::new(Activity {
                stage: session.stage(),
                started_at: now,
                last_active: now,
            }),
            session: Mutex::new(session),
        });
        self.slots.lock().await.insert(game_id.clone(), slot);
        game_id
    }

    async fn slot(&self, game_id: &str) -> Result<Arc<Slot<D>>, SessionError> {
        self.slots
            .lock()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(game_id.into()))
    }

    /// Play one turn. Turns on the same game queue behind each other.
    pub async fn turn(&self, game_id: &str, answer: &str) -> Result<TurnOutcome, SessionError> {
        let slot = self.slot(game_id).await?;
        let mut session = slot.session.lock().await;
        let result = session.turn(answer).await;
        slot.touch(session.stage()).await;
        Ok(result?)
    }

    /// Remove the game and release its browser, after any in-flight turn.
    pub async fn end(&self, game_id: &str) -> Result<(), SessionError> {
        let slot = self
            .slots
            .lock()
            .await
            .remove(game_id)
            .ok_or_else(|| SessionError::NotFound(game_id.into()))?;
        slot.session.lock().await.end().await?;
        tracing::info!("game {game_id} ended");
        Ok(())
    }

    pub async fn list(&self) -> Vec<GameSummary> {
        let slots: Vec<_> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut games = Vec::with_capacity(slots.len());
        for (game_id, slot) in slots {
            let activity = *slot.activity.lock().await;
            games.push(GameSummary {
                game_id,
                stage: activity.stage,
                started_at: activity.started_at,
            });
        }
        games.sort_by_key(|g| g.started_at);
        games
    }

    /// Stage and last content of one game. Waits for an in-flight turn.
    pub async fn snapshot(&self, game_id: &str) -> Result<GameSnapshot, SessionError> {
        let slot = self.slot(game_id).await?;
        let session = slot.session.lock().await;
        let activity = *slot.activity.lock().await;
        Ok(GameSnapshot {
            game_id: game_id.into(),
            stage: session.stage(),
            content: session.content().cloned(),
            started_at: activity.started_at,
            last_active: activity.last_active,
        })
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// End games untouched for longer than `max_idle`. Games with a turn in
    /// flight are left for the next sweep. Returns how many were ended.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let candidates: Vec<_> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut reaped = 0;
        for (game_id, slot) in candidates {
            let last_active = slot.activity.lock().await.last_active;
            if now - last_active < max_idle {
                continue;
            }
            let Ok(mut session) = slot.session.try_lock() else {
                continue;
            };

            // The id may have been ended concurrently; only close what we removed.
            if self.slots.lock().await.remove(&game_id).is_none() {
                continue;
            }
            if let Err(e) = session.end().await {
                tracing::warn!("closing idle game {game_id} failed: {e}");
            }
            tracing::info!("reaped game {game_id}, idle since {last_active}");
            reaped += 1;
        }
        reaped
    }

    /// End every game. Used on shutdown.
    pub async fn shutdown(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().await.drain().collect();
        let count = slots.len();
        for (game_id, slot) in slots {
            if let Err(e) = slot.session.lock().await.end().await {
                tracing::warn!("closing game {game_id} failed: {e}");
            }
        }
        count
    }
}

/// Periodically end games idle for longer than `max_idle`.
pub fn spawn_reaper<D>(
    registry: Arc<SessionRegistry<D>>,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()>
where
    D: Driver + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let reaped = registry.reap_idle(max_idle).await;
            if reaped > 0 {
                tracing::info!("reaper ended {reaped} idle game(s)");
            }
        }
    })
}
