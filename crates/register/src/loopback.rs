use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::PresentationId;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::{RegisterChange, RegisterKey, RegisterSubscription, SharedRegister};

const LOOPBACK_BUS_CAPACITY: usize = 256;

/// In-memory register shared by several simulated processes. Each `attach` hands out the
/// view of one process.
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    entries: RwLock<HashMap<(PresentationId, RegisterKey), String>>,
    events: broadcast::Sender<RegisterChange>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(LOOPBACK_BUS_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                entries: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn attach(&self, origin: impl Into<String>) -> LoopbackRegister {
        LoopbackRegister {
            hub: self.clone(),
            origin: origin.into(),
        }
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoopbackRegister {
    hub: LoopbackHub,
    origin: String,
}

#[async_trait]
impl SharedRegister for LoopbackRegister {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn write(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
        payload: String,
    ) -> Result<()> {
        self.hub
            .inner
            .entries
            .write()
            .await
            .insert((presentation_id, key), payload.clone());

        let delivered = self
            .hub
            .inner
            .events
            .send(RegisterChange {
                presentation_id,
                key,
                payload,
                origin: self.origin.clone(),
                updated_at: Utc::now(),
            })
            .unwrap_or(0);
        debug!(
            presentation_id = presentation_id.0,
            key = key.as_str(),
            origin = %self.origin,
            delivered,
            "loopback register write"
        );
        Ok(())
    }

    async fn read(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
    ) -> Result<Option<String>> {
        Ok(self
            .hub
            .inner
            .entries
            .read()
            .await
            .get(&(presentation_id, key))
            .cloned())
    }

    fn subscribe(&self, presentation_id: PresentationId, key: RegisterKey) -> RegisterSubscription {
        RegisterSubscription::new(
            self.hub.inner.events.subscribe(),
            presentation_id,
            key,
            self.origin.clone(),
        )
    }
}
