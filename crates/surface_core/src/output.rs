use anyhow::Result;
use register::RegisterChange;
use shared::protocol::OutputStatus;
use tracing::info;

use crate::{
    renderer::SlideRenderer,
    surface::{SurfaceChange, SurfaceCore},
};

/// Audience display. Never writes the control or rotation channels.
pub struct OutputSurface<R: SlideRenderer> {
    core: SurfaceCore<R>,
    pending: Option<RegisterChange>,
}

impl<R: SlideRenderer> OutputSurface<R> {
    pub fn new(core: SurfaceCore<R>) -> Self {
        Self {
            core,
            pending: None,
        }
    }

    pub fn core(&self) -> &SurfaceCore<R> {
        &self.core
    }

    pub fn frame(&self) -> Option<&R::Frame> {
        self.core.frame()
    }

    /// Cancel safe: a change interrupted while being applied is applied again on the next call.
    pub async fn next_change(&mut self) -> Option<SurfaceChange> {
        if self.pending.is_none() {
            self.pending = Some(self.core.next_remote().await?);
        }
        let change = self.pending.clone()?;
        let applied = self.core.apply_remote(change).await;
        self.pending = None;
        Some(applied)
    }

    /// Signals the control surface that the output window is gone. No reopen is attempted.
    pub async fn close(self) -> Result<()> {
        self.core
            .channels()
            .write_output(OutputStatus::closed())
            .await?;
        info!(
            presentation_id = self.core.channels().presentation_id().0,
            "output surface closed"
        );
        Ok(())
    }
}
