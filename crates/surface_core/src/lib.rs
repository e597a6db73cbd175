//! Keeps the control, output and presenter surfaces on the same slide and runs timed
//! rotation through a group of slides.

pub mod channels;
pub mod control;
pub mod error;
pub mod navigation;
pub mod output;
pub mod presenter;
pub mod renderer;
pub mod scheduler;
pub mod stopwatch;
pub mod surface;
pub mod traversal;

pub use channels::SyncChannels;
pub use control::ControlSurface;
pub use error::{NavigationError, SurfaceError};
pub use navigation::{Navigation, SurfaceDriver};
pub use output::OutputSurface;
pub use presenter::PresenterSurface;
pub use renderer::{fit_scale, OutlineRenderer, SlideRenderer, Viewport};
pub use scheduler::{
    InteractionOutcome, RotationScheduler, SchedulerEvent, SchedulerSnapshot, StartOutcome,
    StopReason,
};
pub use stopwatch::Stopwatch;
pub use surface::{SurfaceChange, SurfaceCore, SurfaceRole};

#[cfg(test)]
#[path = "tests/surface_tests.rs"]
mod tests;
