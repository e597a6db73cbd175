//! Manual navigation and rotation control shared by the control and presenter surfaces.

use std::sync::Arc;

use anyhow::Result;
use register::RegisterChange;
use shared::domain::RotationGroupId;
use storage::ContentStore;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{
    error::NavigationError,
    renderer::SlideRenderer,
    scheduler::{InteractionOutcome, RotationScheduler, SchedulerEvent, StartOutcome},
    surface::{SurfaceChange, SurfaceCore},
};

/// Result of a manual move: the slide now showing and what the interaction did to rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub slide_index: usize,
    pub rotation: InteractionOutcome,
}

#[derive(Clone)]
pub(crate) enum Wake {
    Remote(Option<RegisterChange>),
    Scheduler(Result<SchedulerEvent, RecvError>),
}

pub struct SurfaceDriver<R: SlideRenderer> {
    core: SurfaceCore<R>,
    scheduler: RotationScheduler,
    scheduler_events: broadcast::Receiver<SchedulerEvent>,
    /// Observed but not yet fully applied; survives cancellation of `next_change`.
    pending: Option<Wake>,
}

impl<R: SlideRenderer> SurfaceDriver<R> {
    /// Hosts a rotation scheduler for this surface's process.
    pub fn new(core: SurfaceCore<R>) -> Self {
        let content: Arc<dyn ContentStore> = core.content().clone();
        let scheduler = RotationScheduler::spawn(core.channels().clone(), content);
        let scheduler_events = scheduler.subscribe_events();
        Self {
            core,
            scheduler,
            scheduler_events,
            pending: None,
        }
    }

    pub fn core(&self) -> &SurfaceCore<R> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut SurfaceCore<R> {
        &mut self.core
    }

    pub fn scheduler(&self) -> &RotationScheduler {
        &self.scheduler
    }

    pub async fn advance(&mut self) -> Result<Navigation, NavigationError> {
        let len = self.len()?;
        let target = (self.core.slide_index() + 1).min(len - 1);
        self.navigate_to(target).await
    }

    pub async fn back(&mut self) -> Result<Navigation, NavigationError> {
        self.len()?;
        let target = self.core.slide_index().saturating_sub(1);
        self.navigate_to(target).await
    }

    pub async fn jump_to(&mut self, index: usize) -> Result<Navigation, NavigationError> {
        let len = self.len()?;
        if index >= len {
            return Err(NavigationError::OutOfRange { index, len });
        }
        self.navigate_to(index).await
    }

    /// Leaving presentation mode counts as an interaction but does not move the slide.
    pub async fn exit(&mut self) -> Result<InteractionOutcome, NavigationError> {
        let outcome = self.interact().await?;
        debug!(
            presentation_id = self.core.channels().presentation_id().0,
            ?outcome,
            "surface exited presentation mode"
        );
        Ok(outcome)
    }

    pub async fn start_rotation(&mut self, group_id: Option<RotationGroupId>) -> Result<StartOutcome> {
        let outcome = self.scheduler.start(group_id).await?;
        if let StartOutcome::Started { .. } = outcome {
            self.core.refresh_rotation().await;
            self.core.refresh_control().await;
        }
        Ok(outcome)
    }

    pub async fn stop_rotation(&mut self) -> Result<()> {
        self.scheduler.stop().await?;
        self.core.refresh_rotation().await;
        Ok(())
    }

    /// Tells the scheduler that groups or slides changed so it can stop or retime.
    pub async fn group_mutated(&mut self) -> Result<()> {
        self.scheduler.on_group_mutated().await?;
        self.core.refresh_rotation().await;
        Ok(())
    }

    /// Cancel safe: a change interrupted while being applied is applied again on the next call.
    pub async fn next_change(&mut self) -> Option<SurfaceChange> {
        self.wait_pending().await;
        self.apply_pending().await
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) async fn wait_pending(&mut self) {
        if self.pending.is_none() {
            let wake = tokio::select! {
                change = self.core.next_remote() => Wake::Remote(change),
                event = self.scheduler_events.recv() => Wake::Scheduler(event),
            };
            self.pending = Some(wake);
        }
    }

    pub(crate) async fn apply_pending(&mut self) -> Option<SurfaceChange> {
        let wake = self.pending.clone()?;
        let change = self.apply(wake).await;
        self.pending = None;
        change
    }

    async fn apply(&mut self, wake: Wake) -> Option<SurfaceChange> {
        match wake {
            Wake::Remote(change) => Some(self.core.apply_remote(change?).await),
            Wake::Scheduler(Ok(event)) => {
                self.apply_scheduler_event(&event).await;
                Some(SurfaceChange::Scheduler(event))
            }
            Wake::Scheduler(Err(RecvError::Lagged(skipped))) => {
                warn!(
                    presentation_id = self.core.channels().presentation_id().0,
                    skipped,
                    "scheduler events lagged; re-reading registers"
                );
                self.core.resync().await;
                Some(SurfaceChange::Resynced)
            }
            Wake::Scheduler(Err(RecvError::Closed)) => None,
        }
    }

    /// Own scheduler writes are not echoed back by the register, so apply them here.
    async fn apply_scheduler_event(&mut self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::Started { .. } => {
                self.core.refresh_rotation().await;
                self.core.refresh_control().await;
            }
            SchedulerEvent::Advanced { .. } => self.core.refresh_control().await,
            SchedulerEvent::Stopped { .. } => self.core.refresh_rotation().await,
            SchedulerEvent::Held { .. } | SchedulerEvent::Warning(_) => {}
        }
    }

    fn len(&self) -> Result<usize, NavigationError> {
        match self.core.presentation().len() {
            0 => Err(NavigationError::EmptyPresentation),
            len => Ok(len),
        }
    }

    async fn interact(&mut self) -> Result<InteractionOutcome, NavigationError> {
        let outcome = self
            .scheduler
            .on_interaction()
            .await
            .map_err(NavigationError::Register)?;
        if let InteractionOutcome::Stopped { .. } = outcome {
            self.core.refresh_rotation().await;
        }
        Ok(outcome)
    }

    async fn navigate_to(&mut self, target: usize) -> Result<Navigation, NavigationError> {
        let rotation = self.interact().await?;
        if target != self.core.slide_index() {
            let state = self
                .core
                .channels()
                .write_control(target)
                .await
                .map_err(NavigationError::Register)?;
            self.core.apply_control(state);
        }
        debug!(
            presentation_id = self.core.channels().presentation_id().0,
            slide_index = target,
            ?rotation,
            "manual navigation"
        );
        Ok(Navigation {
            slide_index: target,
            rotation,
        })
    }
}
