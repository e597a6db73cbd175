use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use register::{RegisterChange, RegisterKey, RegisterSubscription, SharedRegister};
use shared::domain::PresentationId;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::Storage;

const REGISTER_EVENT_CAPACITY: usize = 256;

/// Shared register persisted in the `register_entries` table. Several processes opening the
/// same database file see each other's writes through a polling watcher.
pub struct SqliteRegister {
    storage: Storage,
    origin: String,
    events: broadcast::Sender<RegisterChange>,
    watcher: JoinHandle<()>,
}

impl SqliteRegister {
    pub async fn open(
        storage: Storage,
        origin: impl Into<String>,
        watch_interval: Duration,
    ) -> Result<Self> {
        let origin = origin.into();
        let last_seen = storage
            .latest_register_revision()
            .await
            .context("failed to read register revision")?;
        let (events, _) = broadcast::channel(REGISTER_EVENT_CAPACITY);
        let watcher = tokio::spawn(watch_register(
            storage.clone(),
            events.clone(),
            last_seen,
            watch_interval,
        ));

        Ok(Self {
            storage,
            origin,
            events,
            watcher,
        })
    }
}

impl Drop for SqliteRegister {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch_register(
    storage: Storage,
    events: broadcast::Sender<RegisterChange>,
    mut last_seen: i64,
    watch_interval: Duration,
) {
    let mut ticker = tokio::time::interval(watch_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let entries = match storage.register_entries_since(last_seen).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("register watcher poll failed: {err:#}");
                continue;
            }
        };

        for entry in entries {
            last_seen = last_seen.max(entry.revision);
            let Some(key) = RegisterKey::parse(&entry.key) else {
                debug!(key = %entry.key, "ignoring unknown register key");
                continue;
            };
            let _ = events.send(RegisterChange {
                presentation_id: entry.presentation_id,
                key,
                payload: entry.payload,
                origin: entry.origin,
                updated_at: entry.updated_at,
            });
        }
    }
}

#[async_trait]
impl SharedRegister for SqliteRegister {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn write(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
        payload: String,
    ) -> Result<()> {
        let revision = self
            .storage
            .write_register_entry(presentation_id, key, &payload, &self.origin, Utc::now())
            .await?;
        debug!(
            presentation_id = presentation_id.0,
            key = key.as_str(),
            revision,
            "register write persisted"
        );
        Ok(())
    }

    async fn read(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
    ) -> Result<Option<String>> {
        self.storage.read_register_entry(presentation_id, key).await
    }

    fn subscribe(&self, presentation_id: PresentationId, key: RegisterKey) -> RegisterSubscription {
        RegisterSubscription::new(
            self.events.subscribe(),
            presentation_id,
            key,
            self.origin.clone(),
        )
    }
}
