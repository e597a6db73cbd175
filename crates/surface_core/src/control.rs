//! The operator's surface: navigation, rotation authoring and the output-window flag.

use anyhow::Result;
use register::{RegisterKey, RegisterSubscription};
use shared::{
    domain::{RotationGroup, RotationGroupDraft, RotationGroupId, SlideId, SlideRemoval},
    protocol::OutputStatus,
};
use tracing::info;

use crate::{
    channels::decode_change,
    error::{NavigationError, SurfaceError},
    navigation::{Navigation, SurfaceDriver},
    renderer::SlideRenderer,
    scheduler::{InteractionOutcome, StartOutcome},
    surface::{SurfaceChange, SurfaceCore},
};

pub struct ControlSurface<R: SlideRenderer> {
    driver: SurfaceDriver<R>,
    output_changes: RegisterSubscription,
    output_open: bool,
}

impl<R: SlideRenderer> ControlSurface<R> {
    pub async fn new(core: SurfaceCore<R>) -> Self {
        let output_changes = core.channels().subscribe(RegisterKey::Output);
        let output_open = core.channels().read_output().await.open;
        Self {
            driver: SurfaceDriver::new(core),
            output_changes,
            output_open,
        }
    }

    pub fn core(&self) -> &SurfaceCore<R> {
        self.driver.core()
    }

    pub fn driver(&self) -> &SurfaceDriver<R> {
        &self.driver
    }

    pub async fn advance(&mut self) -> Result<Navigation, NavigationError> {
        self.driver.advance().await
    }

    pub async fn back(&mut self) -> Result<Navigation, NavigationError> {
        self.driver.back().await
    }

    pub async fn jump_to(&mut self, index: usize) -> Result<Navigation, NavigationError> {
        self.driver.jump_to(index).await
    }

    pub async fn exit(&mut self) -> Result<InteractionOutcome, NavigationError> {
        self.driver.exit().await
    }

    pub async fn start_rotation(&mut self, group_id: Option<RotationGroupId>) -> Result<StartOutcome> {
        self.driver.start_rotation(group_id).await
    }

    pub async fn stop_rotation(&mut self) -> Result<()> {
        self.driver.stop_rotation().await
    }

    pub async fn create_group(&mut self, draft: RotationGroupDraft) -> Result<RotationGroupId, SurfaceError> {
        draft.validate()?;
        let presentation_id = self.core().channels().presentation_id();
        let group_id = self
            .core()
            .content()
            .create_rotation_group(presentation_id, draft)
            .await
            .map_err(SurfaceError::Content)?;
        info!(presentation_id = presentation_id.0, group_id = group_id.0, "rotation group created");
        self.after_content_edit().await?;
        Ok(group_id)
    }

    /// Returns `false` when the group does not exist.
    pub async fn update_group(&mut self, group: &RotationGroup) -> Result<bool, SurfaceError> {
        group.validate()?;
        let presentation_id = self.core().channels().presentation_id();
        let updated = self
            .core()
            .content()
            .update_rotation_group(presentation_id, group)
            .await
            .map_err(SurfaceError::Content)?;
        if updated {
            info!(presentation_id = presentation_id.0, group_id = group.id.0, "rotation group updated");
            self.after_content_edit().await?;
        }
        Ok(updated)
    }

    pub async fn delete_group(&mut self, group_id: RotationGroupId) -> Result<bool, SurfaceError> {
        let presentation_id = self.core().channels().presentation_id();
        let deleted = self
            .core()
            .content()
            .delete_rotation_group(presentation_id, group_id)
            .await
            .map_err(SurfaceError::Content)?;
        if deleted {
            info!(presentation_id = presentation_id.0, group_id = group_id.0, "rotation group deleted");
            self.after_content_edit().await?;
        }
        Ok(deleted)
    }

    /// Deletes a slide, pruning it from rotation groups. The control channel is rewritten so
    /// every surface reloads and the same slide stays on screen where it still exists.
    pub async fn remove_slide(&mut self, slide_id: SlideId) -> Result<Option<SlideRemoval>, SurfaceError> {
        let presentation_id = self.core().channels().presentation_id();
        let before = self.core().slide_index();
        let Some(removal) = self
            .core()
            .content()
            .delete_slide(presentation_id, slide_id)
            .await
            .map_err(SurfaceError::Content)?
        else {
            return Ok(None);
        };
        let rotation_affected = self
            .core()
            .rotation()
            .active_group()
            .is_some_and(|group_id| removal.touches(group_id));
        info!(
            presentation_id = presentation_id.0,
            slide_id = slide_id.0,
            rotation_affected,
            pruned = removal.pruned_groups.len(),
            deleted_groups = removal.deleted_groups.len(),
            "slide removed"
        );
        self.after_content_edit().await?;

        let len = self.core().presentation().len();
        let shifted = if removal.removed_index < before {
            before - 1
        } else {
            before
        };
        let target = if len == 0 { 0 } else { shifted.min(len - 1) };
        let state = self
            .core()
            .channels()
            .write_control(target)
            .await
            .map_err(SurfaceError::Register)?;
        self.driver.core_mut().apply_control(state);
        Ok(Some(removal))
    }

    /// Records that this surface opened the output window.
    pub async fn mark_output_opened(&mut self) -> Result<()> {
        self.core()
            .channels()
            .write_output(OutputStatus::opened())
            .await?;
        self.output_open = true;
        Ok(())
    }

    pub fn is_output_open(&self) -> bool {
        self.output_open
    }

    /// Cancel safe, like [`SurfaceDriver::next_change`].
    pub async fn next_change(&mut self) -> Option<SurfaceChange> {
        if !self.driver.has_pending() {
            tokio::select! {
                _ = self.driver.wait_pending() => {}
                change = self.output_changes.recv() => {
                    let status: OutputStatus = decode_change(&change?);
                    self.output_open = status.open;
                    return Some(SurfaceChange::Output(status));
                }
            }
        }
        self.driver.apply_pending().await
    }

    async fn after_content_edit(&mut self) -> Result<(), SurfaceError> {
        self.driver.core_mut().reload_presentation().await?;
        self.driver
            .group_mutated()
            .await
            .map_err(SurfaceError::Register)
    }
}
