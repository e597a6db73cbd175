//! Shared register port: a persisted key/value slot per presentation that every surface
//! can write and read, with change notifications delivered to every *other* process.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::PresentationId;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

mod loopback;

pub use loopback::{LoopbackHub, LoopbackRegister};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKey {
    Control,
    Rotation,
    Output,
}

impl RegisterKey {
    pub const ALL: [RegisterKey; 3] = [RegisterKey::Control, RegisterKey::Rotation, RegisterKey::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            RegisterKey::Control => "control",
            RegisterKey::Rotation => "rotation",
            RegisterKey::Output => "output",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "control" => Some(RegisterKey::Control),
            "rotation" => Some(RegisterKey::Rotation),
            "output" => Some(RegisterKey::Output),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterChange {
    pub presentation_id: PresentationId,
    pub key: RegisterKey,
    pub payload: String,
    /// Identifies the process that performed the write.
    pub origin: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait SharedRegister: Send + Sync {
    /// Identity of this process as recorded on its writes.
    fn origin(&self) -> &str;

    /// Unconditionally overwrites the slot; last writer wins.
    async fn write(&self, presentation_id: PresentationId, key: RegisterKey, payload: String)
        -> Result<()>;

    async fn read(&self, presentation_id: PresentationId, key: RegisterKey)
        -> Result<Option<String>>;

    /// Changes made by other processes to this slot. Own writes are never delivered.
    fn subscribe(&self, presentation_id: PresentationId, key: RegisterKey) -> RegisterSubscription;
}

pub struct RegisterSubscription {
    events: broadcast::Receiver<RegisterChange>,
    presentation_id: PresentationId,
    key: RegisterKey,
    own_origin: String,
}

impl RegisterSubscription {
    pub fn new(
        events: broadcast::Receiver<RegisterChange>,
        presentation_id: PresentationId,
        key: RegisterKey,
        own_origin: impl Into<String>,
    ) -> Self {
        Self {
            events,
            presentation_id,
            key,
            own_origin: own_origin.into(),
        }
    }

    pub fn key(&self) -> RegisterKey {
        self.key
    }

    /// Waits for the next foreign change to this slot. Returns `None` once the backend is gone.
    pub async fn recv(&mut self) -> Option<RegisterChange> {
        loop {
            match self.events.recv().await {
                Ok(change) if self.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        presentation_id = self.presentation_id.0,
                        key = self.key.as_str(),
                        skipped,
                        "register subscription lagged; older changes dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, change: &RegisterChange) -> bool {
        change.presentation_id == self.presentation_id
            && change.key == self.key
            && change.origin != self.own_origin
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
