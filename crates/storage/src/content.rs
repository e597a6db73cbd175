use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{
    Presentation, PresentationId, RotationGroup, RotationGroupDraft, RotationGroupId, SlideId,
    SlideRemoval,
};

/// Read access to presentations plus the few writes the sync layer needs: rotation group
/// authoring and slide deletion with membership pruning.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn load_presentation(&self, presentation_id: PresentationId) -> Result<Option<Presentation>>;

    async fn create_rotation_group(
        &self,
        presentation_id: PresentationId,
        draft: RotationGroupDraft,
    ) -> Result<RotationGroupId>;

    /// Returns `false` when the group does not exist.
    async fn update_rotation_group(
        &self,
        presentation_id: PresentationId,
        group: &RotationGroup,
    ) -> Result<bool>;

    async fn delete_rotation_group(
        &self,
        presentation_id: PresentationId,
        group_id: RotationGroupId,
    ) -> Result<bool>;

    /// Deletes the slide, prunes it from every rotation group and deletes groups left empty.
    async fn delete_slide(
        &self,
        presentation_id: PresentationId,
        slide_id: SlideId,
    ) -> Result<Option<SlideRemoval>>;
}
