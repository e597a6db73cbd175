use anyhow::Result;
use shared::domain::{RotationGroupId, Slide};

use crate::{
    error::NavigationError,
    navigation::{Navigation, SurfaceDriver},
    renderer::SlideRenderer,
    scheduler::{InteractionOutcome, StartOutcome},
    stopwatch::Stopwatch,
    surface::{SurfaceChange, SurfaceCore},
};

/// Operator notes view. Navigates and drives rotation like the control surface, but cannot
/// author rotation groups.
pub struct PresenterSurface<R: SlideRenderer> {
    driver: SurfaceDriver<R>,
    stopwatch: Stopwatch,
}

impl<R: SlideRenderer> PresenterSurface<R> {
    pub fn new(core: SurfaceCore<R>) -> Self {
        Self {
            driver: SurfaceDriver::new(core),
            stopwatch: Stopwatch::new(),
        }
    }

    pub fn core(&self) -> &SurfaceCore<R> {
        self.driver.core()
    }

    pub fn driver(&self) -> &SurfaceDriver<R> {
        &self.driver
    }

    /// The slide after the current one in presentation order, if any.
    pub fn next_slide(&self) -> Option<&Slide> {
        let core = self.driver.core();
        core.presentation().slide(core.slide_index() + 1)
    }

    pub fn next_preview(&self) -> Option<R::Frame> {
        let core = self.driver.core();
        self.next_slide()
            .map(|slide| core.renderer().render(slide, core.scale()))
    }

    pub fn notes(&self) -> &str {
        self.driver
            .core()
            .current_slide()
            .map(|slide| slide.notes.as_str())
            .unwrap_or_default()
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn stopwatch_mut(&mut self) -> &mut Stopwatch {
        &mut self.stopwatch
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

    pub async fn next_change(&mut self) -> Option<SurfaceChange> {
        self.driver.next_change().await
    }
}
