//! State every surface variant shares: the last observed control and rotation values, the
//! loaded presentation and the frame rendered from them.

use std::sync::Arc;

use register::{RegisterChange, RegisterKey, RegisterSubscription};
use shared::{
    domain::{Presentation, Slide},
    protocol::{ControlState, OutputStatus, RotationState},
};
use storage::ContentStore;
use tracing::{debug, warn};

use crate::{
    channels::{decode_change, SyncChannels},
    error::SurfaceError,
    renderer::{fit_scale, SlideRenderer, Viewport},
    scheduler::SchedulerEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Control,
    Output,
    Presenter,
}

impl SurfaceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceRole::Control => "control",
            SurfaceRole::Output => "output",
            SurfaceRole::Presenter => "presenter",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "control" => Some(SurfaceRole::Control),
            "output" => Some(SurfaceRole::Output),
            "presenter" => Some(SurfaceRole::Presenter),
            _ => None,
        }
    }

    /// Whether this surface may write the control channel.
    pub fn navigates(self) -> bool {
        !matches!(self, SurfaceRole::Output)
    }
}

impl std::fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a call to `next_change` observed and applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceChange {
    Slide { slide_index: usize },
    Rotation(RotationState),
    Output(OutputStatus),
    Scheduler(SchedulerEvent),
    /// Events were dropped; state was re-read from the registers.
    Resynced,
}

pub struct SurfaceCore<R: SlideRenderer> {
    role: SurfaceRole,
    channels: SyncChannels,
    content: Arc<dyn ContentStore>,
    renderer: R,
    scale: f32,
    presentation: Presentation,
    control: ControlState,
    rotation: RotationState,
    frame: Option<R::Frame>,
    control_changes: RegisterSubscription,
    rotation_changes: RegisterSubscription,
}

impl<R: SlideRenderer> SurfaceCore<R> {
    /// Loads the presentation and the current register values and renders the first frame.
    /// Navigating surfaces create the control channel at slide 0 if no one has yet.
    pub async fn open(
        role: SurfaceRole,
        channels: SyncChannels,
        content: Arc<dyn ContentStore>,
        renderer: R,
        viewport: Viewport,
    ) -> Result<Self, SurfaceError> {
        let presentation_id = channels.presentation_id();
        let presentation = content
            .load_presentation(presentation_id)
            .await
            .map_err(SurfaceError::Content)?
            .ok_or(SurfaceError::PresentationNotFound(presentation_id))?;

        // Subscribe before reading so no change slips between the read and the subscription.
        let control_changes = channels.subscribe(RegisterKey::Control);
        let rotation_changes = channels.subscribe(RegisterKey::Rotation);
        let control = if role.navigates() {
            channels
                .ensure_control()
                .await
                .map_err(SurfaceError::Register)?
        } else {
            channels.read_control().await
        };
        let rotation = channels.read_rotation().await;

        let mut core = Self {
            role,
            channels,
            content,
            renderer,
            scale: fit_scale(viewport),
            presentation,
            control,
            rotation,
            frame: None,
            control_changes,
            rotation_changes,
        };
        core.render();
        debug!(
            presentation_id = presentation_id.0,
            role = role.as_str(),
            origin = core.channels.origin(),
            slide_index = core.slide_index(),
            "surface opened"
        );
        Ok(core)
    }

    pub fn role(&self) -> SurfaceRole {
        self.role
    }

    pub fn channels(&self) -> &SyncChannels {
        &self.channels
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Index of the slide on screen, always inside the loaded presentation.
    pub fn slide_index(&self) -> usize {
        self.control.clamped(self.presentation.len())
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.presentation.slide(self.slide_index())
    }

    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// `None` while the presentation has no slides.
    pub fn frame(&self) -> Option<&R::Frame> {
        self.frame.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.scale = fit_scale(viewport);
        self.render();
    }

    pub async fn reload_presentation(&mut self) -> Result<(), SurfaceError> {
        let presentation_id = self.channels.presentation_id();
        self.presentation = self
            .content
            .load_presentation(presentation_id)
            .await
            .map_err(SurfaceError::Content)?
            .ok_or(SurfaceError::PresentationNotFound(presentation_id))?;
        self.render();
        Ok(())
    }

    /// Waits for the next control or rotation write made by another process.
    pub(crate) async fn next_remote(&mut self) -> Option<RegisterChange> {
        tokio::select! {
            change = self.control_changes.recv() => change,
            change = self.rotation_changes.recv() => change,
        }
    }

    pub(crate) async fn apply_remote(&mut self, change: RegisterChange) -> SurfaceChange {
        match change.key {
            RegisterKey::Rotation => {
                self.rotation = decode_change(&change);
                SurfaceChange::Rotation(self.rotation)
            }
            _ => {
                // Slides may have been added or deleted by whoever moved the slide.
                self.refresh_presentation().await;
                self.apply_control(decode_change(&change));
                SurfaceChange::Slide {
                    slide_index: self.slide_index(),
                }
            }
        }
    }

    pub(crate) fn apply_control(&mut self, control: ControlState) {
        self.control = control;
        self.render();
    }

    pub(crate) async fn refresh_control(&mut self) {
        let control = self.channels.read_control().await;
        self.apply_control(control);
    }

    pub(crate) async fn refresh_rotation(&mut self) {
        self.rotation = self.channels.read_rotation().await;
    }

    pub(crate) async fn resync(&mut self) {
        self.refresh_presentation().await;
        self.refresh_rotation().await;
        self.refresh_control().await;
    }

    async fn refresh_presentation(&mut self) {
        if let Err(err) = self.reload_presentation().await {
            warn!(
                presentation_id = self.channels.presentation_id().0,
                role = self.role.as_str(),
                "keeping cached presentation: {err}"
            );
        }
    }

    fn render(&mut self) {
        self.frame = self
            .presentation
            .slide(self.slide_index())
            .map(|slide| self.renderer.render(slide, self.scale));
    }
}
