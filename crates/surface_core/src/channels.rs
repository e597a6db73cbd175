//! Typed views over the shared register: the control channel (current slide), the rotation
//! channel and the output status slot.

use std::sync::Arc;

use anyhow::{Context, Result};
use register::{RegisterChange, RegisterKey, RegisterSubscription, SharedRegister};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{PresentationId, RotationGroupId},
    protocol::{ControlState, OutputStatus, RotationState},
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SyncChannels {
    register: Arc<dyn SharedRegister>,
    presentation_id: PresentationId,
}

impl SyncChannels {
    pub fn new(register: Arc<dyn SharedRegister>, presentation_id: PresentationId) -> Self {
        Self {
            register,
            presentation_id,
        }
    }

    pub fn presentation_id(&self) -> PresentationId {
        self.presentation_id
    }

    pub fn origin(&self) -> &str {
        self.register.origin()
    }

    pub async fn read_control(&self) -> ControlState {
        self.read_or_default(RegisterKey::Control).await
    }

    /// Reads the control channel, creating it at slide 0 when no surface has written it yet.
    pub async fn ensure_control(&self) -> Result<ControlState> {
        let raw = self.read_raw(RegisterKey::Control).await;
        if let Some(state) = raw.as_deref().and_then(|raw| decode::<ControlState>(RegisterKey::Control, raw)) {
            return Ok(state);
        }
        self.write_control(0).await
    }

    pub async fn write_control(&self, slide_index: usize) -> Result<ControlState> {
        let state = ControlState::new(slide_index);
        self.write(RegisterKey::Control, &state).await?;
        Ok(state)
    }

    pub async fn read_rotation(&self) -> RotationState {
        self.read_or_default(RegisterKey::Rotation).await
    }

    pub async fn write_rotation_active(&self, group_id: RotationGroupId) -> Result<RotationState> {
        let state = RotationState::active(group_id);
        self.write(RegisterKey::Rotation, &state).await?;
        Ok(state)
    }

    pub async fn write_rotation_inactive(
        &self,
        group_id: Option<RotationGroupId>,
    ) -> Result<RotationState> {
        let state = RotationState::inactive(group_id);
        self.write(RegisterKey::Rotation, &state).await?;
        Ok(state)
    }

    pub async fn read_output(&self) -> OutputStatus {
        self.read_or_default(RegisterKey::Output).await
    }

    pub async fn write_output(&self, status: OutputStatus) -> Result<()> {
        self.write(RegisterKey::Output, &status).await
    }

    pub fn subscribe(&self, key: RegisterKey) -> RegisterSubscription {
        self.register.subscribe(self.presentation_id, key)
    }

    async fn write<T: Serialize>(&self, key: RegisterKey, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("failed to encode {key} payload"))?;
        self.register
            .write(self.presentation_id, key, payload)
            .await
            .with_context(|| format!("failed to write {key} register"))?;
        debug!(
            presentation_id = self.presentation_id.0,
            key = key.as_str(),
            origin = self.register.origin(),
            "register written"
        );
        Ok(())
    }

    async fn read_raw(&self, key: RegisterKey) -> Option<String> {
        match self.register.read(self.presentation_id, key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    presentation_id = self.presentation_id.0,
                    key = key.as_str(),
                    "register read failed, using default: {err:#}"
                );
                None
            }
        }
    }

    async fn read_or_default<T: DeserializeOwned + Default>(&self, key: RegisterKey) -> T {
        self.read_raw(key)
            .await
            .and_then(|raw| decode(key, &raw))
            .unwrap_or_default()
    }
}

/// Decodes a register payload; malformed payloads are logged and treated as absent.
pub fn decode<T: DeserializeOwned>(key: RegisterKey, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key = key.as_str(), "malformed register payload ignored: {err}");
            None
        }
    }
}

/// Decodes a change notification, falling back to the documented default when malformed.
pub fn decode_change<T: DeserializeOwned + Default>(change: &RegisterChange) -> T {
    decode(change.key, &change.payload).unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/channels_tests.rs"]
mod tests;
