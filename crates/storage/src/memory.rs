use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{
    Presentation, PresentationId, RotationGroup, RotationGroupDraft, RotationGroupId, SlideId,
    SlideRemoval,
};
use tokio::sync::RwLock;

use crate::ContentStore;

/// Content store kept entirely in memory. Used by tests and single-process demos.
pub struct MemoryContentStore {
    presentations: RwLock<HashMap<PresentationId, Presentation>>,
    next_group_id: AtomicI64,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            presentations: RwLock::new(HashMap::new()),
            next_group_id: AtomicI64::new(1),
        }
    }

    pub async fn insert(&self, presentation: Presentation) {
        let highest_group = presentation
            .rotation_groups
            .iter()
            .map(|group| group.id.0)
            .max()
            .unwrap_or(0);
        self.next_group_id
            .fetch_max(highest_group + 1, Ordering::SeqCst);
        self.presentations
            .write()
            .await
            .insert(presentation.id, presentation);
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn load_presentation(&self, presentation_id: PresentationId) -> Result<Option<Presentation>> {
        Ok(self.presentations.read().await.get(&presentation_id).cloned())
    }

    async fn create_rotation_group(
        &self,
        presentation_id: PresentationId,
        draft: RotationGroupDraft,
    ) -> Result<RotationGroupId> {
        draft.validate()?;
        let mut presentations = self.presentations.write().await;
        let presentation = presentations
            .get_mut(&presentation_id)
            .ok_or_else(|| anyhow!("presentation {presentation_id} not found"))?;

        let group_id = RotationGroupId(self.next_group_id.fetch_add(1, Ordering::SeqCst));
        presentation.rotation_groups.push(draft.into_group(group_id));
        Ok(group_id)
    }

    async fn update_rotation_group(
        &self,
        presentation_id: PresentationId,
        group: &RotationGroup,
    ) -> Result<bool> {
        group.validate()?;
        let mut presentations = self.presentations.write().await;
        let Some(existing) = presentations
            .get_mut(&presentation_id)
            .and_then(|presentation| presentation.group_mut(group.id))
        else {
            return Ok(false);
        };
        *existing = group.clone();
        Ok(true)
    }

    async fn delete_rotation_group(
        &self,
        presentation_id: PresentationId,
        group_id: RotationGroupId,
    ) -> Result<bool> {
        let mut presentations = self.presentations.write().await;
        let Some(presentation) = presentations.get_mut(&presentation_id) else {
            return Ok(false);
        };
        let before = presentation.rotation_groups.len();
        presentation
            .rotation_groups
            .retain(|group| group.id != group_id);
        Ok(presentation.rotation_groups.len() != before)
    }

    async fn delete_slide(
        &self,
        presentation_id: PresentationId,
        slide_id: SlideId,
    ) -> Result<Option<SlideRemoval>> {
        let mut presentations = self.presentations.write().await;
        Ok(presentations
            .get_mut(&presentation_id)
            .and_then(|presentation| presentation.remove_slide(slide_id)))
    }
}
