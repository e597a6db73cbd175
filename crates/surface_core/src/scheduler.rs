//! Rotation scheduler: a single task owns all mutable rotation state. Callers talk to it
//! through a cloneable handle; every tick re-reads the authoritative registers and content
//! instead of trusting values captured at `start` time.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use register::{RegisterKey, RegisterSubscription};
use shared::{
    domain::{Presentation, RotationGroupId},
    error::{NoticeCode, OperatorNotice},
    protocol::RotationState,
};
use storage::ContentStore;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    channels::{decode_change, SyncChannels},
    traversal::{plan_tick, Direction, TickPlan, TraversalRules},
};

const SCHEDULER_COMMAND_CAPACITY: usize = 32;
const SCHEDULER_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    Interaction,
    /// Reached the end of a non-repeating traversal.
    Completed,
    GroupEmptied,
    GroupMissing,
    /// Another process stopped or took over the rotation.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Started {
        group_id: RotationGroupId,
        slide_index: usize,
    },
    Advanced {
        group_id: RotationGroupId,
        slide_index: usize,
    },
    Held {
        group_id: RotationGroupId,
    },
    Stopped {
        group_id: Option<RotationGroupId>,
        reason: StopReason,
    },
    Warning(OperatorNotice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started {
        group_id: RotationGroupId,
        slide_index: usize,
    },
    Rejected(OperatorNotice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    NotRotating,
    Continued,
    Stopped { group_id: RotationGroupId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub running: bool,
    pub group_id: Option<RotationGroupId>,
    pub direction: Direction,
}

enum SchedulerCommand {
    Start {
        group_id: Option<RotationGroupId>,
        reply: oneshot::Sender<Result<StartOutcome>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    Interaction {
        reply: oneshot::Sender<Result<InteractionOutcome>>,
    },
    GroupMutated {
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<SchedulerSnapshot>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct RotationScheduler {
    commands: mpsc::Sender<SchedulerCommand>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl RotationScheduler {
    /// Spawns the scheduler task on the current runtime. The task ends on `shutdown` or once
    /// every handle is dropped.
    pub fn spawn(channels: SyncChannels, content: Arc<dyn ContentStore>) -> Self {
        let (commands, command_rx) = mpsc::channel(SCHEDULER_COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(SCHEDULER_EVENT_CAPACITY);
        let rotation_changes = channels.subscribe(RegisterKey::Rotation);
        let actor = SchedulerActor {
            channels,
            content,
            events: events.clone(),
            running: None,
            direction: Direction::Forward,
        };
        tokio::spawn(actor.run(command_rx, rotation_changes));
        Self { commands, events }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Starts rotating `group_id`, or resumes the group recorded in the rotation channel.
    pub async fn start(&self, group_id: Option<RotationGroupId>) -> Result<StartOutcome> {
        self.request(|reply| SchedulerCommand::Start { group_id, reply })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| SchedulerCommand::Stop { reply }).await?
    }

    pub async fn on_interaction(&self) -> Result<InteractionOutcome> {
        self.request(|reply| SchedulerCommand::Interaction { reply })
            .await?
    }

    pub async fn on_group_mutated(&self) -> Result<()> {
        self.request(|reply| SchedulerCommand::GroupMutated { reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        self.request(|reply| SchedulerCommand::Snapshot { reply })
            .await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SchedulerCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| anyhow!("rotation scheduler is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("rotation scheduler dropped the request"))
    }
}

struct RunningRotation {
    group_id: RotationGroupId,
    interval_seconds: u32,
    ticker: Interval,
    /// The `active` payload this process wrote when the rotation started.
    claim: RotationState,
}

impl RunningRotation {
    fn new(claim: RotationState, group_id: RotationGroupId, interval_seconds: u32) -> Self {
        Self {
            group_id,
            interval_seconds,
            ticker: ticker_for(interval_seconds),
            claim,
        }
    }

    /// A notification written before our own claim, or the register still holding our claim,
    /// does not take the rotation away from this process.
    fn outlives(&self, remote: &RotationState, current: &RotationState) -> bool {
        remote.updated_at < self.claim.updated_at || *current == self.claim
    }

    fn retime(&mut self, interval_seconds: u32) {
        if interval_seconds == 0 || interval_seconds == self.interval_seconds {
            return;
        }
        debug!(
            group_id = self.group_id.0,
            interval_seconds, "rotation interval changed, re-arming timer"
        );
        self.interval_seconds = interval_seconds;
        self.ticker = ticker_for(interval_seconds);
    }
}

fn ticker_for(interval_seconds: u32) -> Interval {
    let period = Duration::from_secs(u64::from(interval_seconds));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(running: &mut Option<RunningRotation>) {
    match running {
        Some(rotation) => {
            rotation.ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

struct SchedulerActor {
    channels: SyncChannels,
    content: Arc<dyn ContentStore>,
    events: broadcast::Sender<SchedulerEvent>,
    running: Option<RunningRotation>,
    direction: Direction,
}

impl SchedulerActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SchedulerCommand>,
        mut rotation_changes: RegisterSubscription,
    ) {
        let mut watching_remote = true;
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if !self.handle(command).await {
                        break;
                    }
                }
                _ = next_tick(&mut self.running) => {
                    self.tick().await;
                }
                change = rotation_changes.recv(), if watching_remote => {
                    match change {
                        Some(change) => self.observe_remote_rotation(decode_change(&change)).await,
                        None => watching_remote = false,
                    }
                }
            }
        }
        debug!(
            presentation_id = self.channels.presentation_id().0,
            "rotation scheduler stopped"
        );
    }

    async fn handle(&mut self, command: SchedulerCommand) -> bool {
        match command {
            SchedulerCommand::Start { group_id, reply } => {
                let _ = reply.send(self.start(group_id).await);
            }
            SchedulerCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            SchedulerCommand::Interaction { reply } => {
                let _ = reply.send(self.interaction().await);
            }
            SchedulerCommand::GroupMutated { reply } => {
                let _ = reply.send(self.group_mutated().await);
            }
            SchedulerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SchedulerCommand::Shutdown => return false,
        }
        true
    }

    fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            running: self.running.is_some(),
            group_id: self.running.as_ref().map(|rotation| rotation.group_id),
            direction: self.direction,
        }
    }

    async fn load_presentation(&self) -> Result<Option<Presentation>> {
        self.content
            .load_presentation(self.channels.presentation_id())
            .await
    }

    async fn start(&mut self, requested: Option<RotationGroupId>) -> Result<StartOutcome> {
        let group_id = match requested {
            Some(group_id) => group_id,
            None => match self.channels.read_rotation().await.group_id {
                Some(group_id) => group_id,
                None => {
                    return Ok(self.reject(OperatorNotice::new(
                        NoticeCode::NoGroupSelected,
                        "no rotation group to resume",
                    )))
                }
            },
        };

        let Some(presentation) = self.load_presentation().await? else {
            return Ok(self.reject(OperatorNotice::new(
                NoticeCode::PresentationMissing,
                format!(
                    "presentation {} is not available",
                    self.channels.presentation_id()
                ),
            )));
        };
        let Some((group, indices)) = presentation.resolve_group(group_id) else {
            return Ok(self.reject(OperatorNotice::unknown_group(group_id)));
        };
        if indices.is_empty() {
            return Ok(self.reject(OperatorNotice::empty_group(group_id)));
        }
        if group.interval_seconds == 0 {
            return Ok(self.reject(OperatorNotice::new(
                NoticeCode::InvalidGroup,
                format!("rotation group {group_id} has no interval"),
            )));
        }

        // Replaces any rotation this process was already running.
        self.running = None;
        let claim = self.channels.write_rotation_active(group_id).await?;
        self.direction = Direction::Forward;

        let current = self
            .channels
            .read_control()
            .await
            .clamped(presentation.len());
        let slide_index = if indices.contains(&current) {
            current
        } else {
            self.channels.write_control(indices[0]).await?;
            indices[0]
        };

        self.running = Some(RunningRotation::new(claim, group_id, group.interval_seconds));
        info!(
            presentation_id = self.channels.presentation_id().0,
            group_id = group_id.0,
            slide_index,
            interval_seconds = group.interval_seconds,
            mode = group.mode.as_str(),
            "rotation started"
        );
        self.emit(SchedulerEvent::Started {
            group_id,
            slide_index,
        });
        Ok(StartOutcome::Started {
            group_id,
            slide_index,
        })
    }

    fn reject(&self, notice: OperatorNotice) -> StartOutcome {
        warn!(
            presentation_id = self.channels.presentation_id().0,
            "rotation start ignored: {notice}"
        );
        self.emit(SchedulerEvent::Warning(notice.clone()));
        StartOutcome::Rejected(notice)
    }

    async fn stop(&mut self) -> Result<()> {
        let group_id = match &self.running {
            Some(rotation) => Some(rotation.group_id),
            None => self.channels.read_rotation().await.group_id,
        };
        self.channels.write_rotation_inactive(group_id).await?;
        self.go_idle(group_id, StopReason::Requested);
        Ok(())
    }

    async fn interaction(&mut self) -> Result<InteractionOutcome> {
        let rotation = self.channels.read_rotation().await;
        let Some(group_id) = rotation.active_group() else {
            if let Some(stale) = self.running.as_ref().map(|rotation| rotation.group_id) {
                self.go_idle(Some(stale), StopReason::Superseded);
            }
            return Ok(InteractionOutcome::NotRotating);
        };

        let stop_on_interaction = self
            .load_presentation()
            .await?
            .and_then(|presentation| {
                presentation
                    .group(group_id)
                    .map(|group| group.stop_on_interaction)
            })
            .unwrap_or(true);
        if !stop_on_interaction {
            return Ok(InteractionOutcome::Continued);
        }

        self.channels
            .write_rotation_inactive(Some(group_id))
            .await?;
        self.go_idle(Some(group_id), StopReason::Interaction);
        Ok(InteractionOutcome::Stopped { group_id })
    }

    async fn group_mutated(&mut self) -> Result<()> {
        let group_id = match &self.running {
            Some(rotation) => rotation.group_id,
            None => match self.channels.read_rotation().await.active_group() {
                Some(group_id) => group_id,
                None => return Ok(()),
            },
        };

        let presentation = self.load_presentation().await?;
        let resolved = presentation
            .as_ref()
            .and_then(|presentation| presentation.resolve_group(group_id));
        match resolved {
            None => self.halt(group_id, StopReason::GroupMissing).await,
            Some((_, indices)) if indices.is_empty() => {
                self.halt(group_id, StopReason::GroupEmptied).await
            }
            Some((group, _)) => {
                if let Some(rotation) = self.running.as_mut() {
                    rotation.retime(group.interval_seconds);
                }
                Ok(())
            }
        }
    }

    async fn tick(&mut self) {
        let Some(group_id) = self.running.as_ref().map(|rotation| rotation.group_id) else {
            return;
        };
        if let Err(err) = self.advance(group_id).await {
            warn!(
                presentation_id = self.channels.presentation_id().0,
                group_id = group_id.0,
                "rotation tick failed: {err:#}"
            );
        }
    }

    async fn advance(&mut self, group_id: RotationGroupId) -> Result<()> {
        let rotation = self.channels.read_rotation().await;
        if rotation.active_group() != Some(group_id) {
            self.go_idle(Some(group_id), StopReason::Superseded);
            return Ok(());
        }

        let Some(presentation) = self.load_presentation().await? else {
            return self.halt(group_id, StopReason::GroupMissing).await;
        };
        let Some((group, indices)) = presentation.resolve_group(group_id) else {
            return self.halt(group_id, StopReason::GroupMissing).await;
        };
        if indices.is_empty() {
            return self.halt(group_id, StopReason::GroupEmptied).await;
        }
        if let Some(rotation) = self.running.as_mut() {
            rotation.retime(group.interval_seconds);
        }

        let current = self
            .channels
            .read_control()
            .await
            .clamped(presentation.len());
        match plan_tick(TraversalRules::from(group), &indices, current, self.direction) {
            TickPlan::Advance {
                index,
                direction,
            } => {
                self.direction = direction;
                self.channels.write_control(index).await?;
                debug!(group_id = group_id.0, slide_index = index, "rotation advanced");
                self.emit(SchedulerEvent::Advanced {
                    group_id,
                    slide_index: index,
                });
            }
            TickPlan::Hold { direction } => {
                self.direction = direction;
                self.emit(SchedulerEvent::Held { group_id });
            }
            TickPlan::Stop => {
                self.halt(group_id, StopReason::Completed).await?;
            }
        }
        Ok(())
    }

    /// Records the stop in the rotation channel, keeping the group for a later resume.
    async fn halt(&mut self, group_id: RotationGroupId, reason: StopReason) -> Result<()> {
        self.channels
            .write_rotation_inactive(Some(group_id))
            .await?;
        self.go_idle(Some(group_id), reason);
        Ok(())
    }

    fn go_idle(&mut self, group_id: Option<RotationGroupId>, reason: StopReason) {
        let was_running = self.running.take().is_some();
        info!(
            presentation_id = self.channels.presentation_id().0,
            group_id = group_id.map(|id| id.0),
            was_running,
            ?reason,
            "rotation stopped"
        );
        self.emit(SchedulerEvent::Stopped { group_id, reason });
    }

    async fn observe_remote_rotation(&mut self, state: RotationState) {
        let Some(local) = self.running.as_ref().map(|rotation| rotation.group_id) else {
            return;
        };
        let current = self.channels.read_rotation().await;
        if self
            .running
            .as_ref()
            .is_some_and(|rotation| rotation.outlives(&state, &current))
        {
            debug!(
                group_id = local.0,
                remote_active = state.active,
                "ignoring rotation change older than the local start"
            );
            return;
        }
        debug!(
            group_id = local.0,
            remote_active = state.active,
            remote_group = state.group_id.map(|id| id.0),
            "rotation changed by another surface"
        );
        self.go_idle(Some(local), StopReason::Superseded);
    }

    fn emit(&self, event: SchedulerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
