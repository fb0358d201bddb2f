//! The station scheduler.
//!
//! A single worker task owns the sink, the catalog position and the
//! reconnection policy. It runs a cooperative loop that reconnects with
//! exponential backoff when the sink drops, starts the next track
//! whenever the sink sits idle, and applies user commands received over
//! an inbox channel. Track ends arrive as messages on a second channel,
//! so every state mutation happens on this one task.
//!
//! The stored track index is a look-ahead: it is advanced as soon as a
//! play command is issued, so while a track is audible the index already
//! points at the one that follows. Consumers deriving "now playing" must
//! step the index back by one (see [`TrackIndex::previous`]).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use qafcatalog::{CatalogError, RecitationCatalog};
use qafsink::{AudioSink, PlaybackEnd, RoomTarget};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, error, info, warn};

use crate::backoff::ReconnectBackoff;
use crate::constants::{COMMAND_QUEUE_DEPTH, FAULT_PAUSE, TICK};
use crate::error::{Result, StationError};
use crate::presence::PresenceNotifier;
use crate::state::StationState;
use crate::track::TrackIndex;

/// Scheduler lifecycle as exposed to status consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Disconnected,
    Connecting,
    Playing,
    Paused,
    AwaitingReconnect,
}

/// Snapshot returned by [`StationHandle::status`].
///
/// `track` is the audible track while playing or paused, and the next
/// track to start otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub state: PlaybackState,
    pub track: u16,
    pub title: String,
    pub reciter: String,
    pub connected: bool,
}

#[derive(Debug)]
enum StationCommand {
    Skip { reply: oneshot::Sender<Result<()>> },
    Previous { reply: oneshot::Sender<Result<()>> },
    SetReciter { name: String, reply: oneshot::Sender<Result<()>> },
    Pause { reply: oneshot::Sender<Result<()>> },
    Resume { reply: oneshot::Sender<Result<()>> },
    Stop { reply: oneshot::Sender<Result<()>> },
    Status { reply: oneshot::Sender<StationStatus> },
    Snapshot { reply: oneshot::Sender<StationState> },
    Shutdown { reply: oneshot::Sender<StationState> },
}

impl StationCommand {
    fn name(&self) -> &'static str {
        match self {
            StationCommand::Skip { .. } => "skip",
            StationCommand::Previous { .. } => "previous",
            StationCommand::SetReciter { .. } => "set_reciter",
            StationCommand::Pause { .. } => "pause",
            StationCommand::Resume { .. } => "resume",
            StationCommand::Stop { .. } => "stop",
            StationCommand::Status { .. } => "status",
            StationCommand::Snapshot { .. } => "snapshot",
            StationCommand::Shutdown { .. } => "shutdown",
        }
    }
}

/// Cloneable handle for talking to a running scheduler.
#[derive(Debug, Clone)]
pub struct StationHandle {
    commands: mpsc::Sender<StationCommand>,
}

impl StationHandle {
    async fn roundtrip<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> StationCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| StationError::StationGone)?;
        rx.await.map_err(|_| StationError::StationGone)
    }

    /// Stop the current track; the loop starts the next one within a tick.
    pub async fn skip(&self) -> Result<()> {
        self.roundtrip(|reply| StationCommand::Skip { reply }).await?
    }

    /// Step back to the track before the one currently playing.
    pub async fn previous(&self) -> Result<()> {
        self.roundtrip(|reply| StationCommand::Previous { reply })
            .await?
    }

    /// Switch reciter; the current track replays under the new voice.
    pub async fn set_reciter(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.roundtrip(move |reply| StationCommand::SetReciter { name, reply })
            .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.roundtrip(|reply| StationCommand::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.roundtrip(|reply| StationCommand::Resume { reply })
            .await?
    }

    /// Stop playback and blank the presence display.
    pub async fn stop(&self) -> Result<()> {
        self.roundtrip(|reply| StationCommand::Stop { reply }).await?
    }

    pub async fn status(&self) -> Result<StationStatus> {
        self.roundtrip(|reply| StationCommand::Status { reply }).await
    }

    /// Raw resume position, as persisted across restarts.
    pub async fn snapshot(&self) -> Result<StationState> {
        self.roundtrip(|reply| StationCommand::Snapshot { reply })
            .await
    }

    /// Stop playback, release the sink and end the worker task.
    /// Returns the final position for the shutdown save.
    pub async fn shutdown(&self) -> Result<StationState> {
        self.roundtrip(|reply| StationCommand::Shutdown { reply })
            .await
    }
}

/// Owner of the spawned scheduler task.
pub struct StationScheduler {
    join_handle: JoinHandle<Result<()>>,
}

impl StationScheduler {
    /// Spawn the scheduler worker.
    ///
    /// `target` is the room the sink should stream to; without one the
    /// worker exits with [`StationError::NoTargetConfigured`] on its
    /// first pass. `resume` seeds the catalog position.
    pub fn spawn(
        sink: impl AudioSink + 'static,
        catalog: RecitationCatalog,
        presence: Arc<dyn PresenceNotifier>,
        target: Option<RoomTarget>,
        resume: StationState,
    ) -> (Self, StationHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (end_tx, end_rx) = mpsc::channel(4);

        let worker = StationWorker {
            sink,
            catalog,
            presence,
            target,
            index: resume.track,
            reciter: resume.reciter,
            backoff: ReconnectBackoff::new(),
            last_attempt: None,
            connecting: false,
            shutdown: false,
            end_tx,
        };
        let join_handle = tokio::spawn(worker.run(commands_rx, end_rx));

        (
            Self { join_handle },
            StationHandle {
                commands: commands_tx,
            },
        )
    }

    /// Wait for the worker to finish.
    pub async fn wait(self) -> Result<()> {
        match self.join_handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => {
                warn!("scheduler task cancelled");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "scheduler task panicked");
                Err(StationError::StationGone)
            }
        }
    }
}

struct StationWorker<S> {
    sink: S,
    catalog: RecitationCatalog,
    presence: Arc<dyn PresenceNotifier>,
    target: Option<RoomTarget>,
    index: TrackIndex,
    reciter: String,
    backoff: ReconnectBackoff,
    last_attempt: Option<Instant>,
    connecting: bool,
    shutdown: bool,
    end_tx: mpsc::Sender<PlaybackEnd>,
}

impl<S: AudioSink> StationWorker<S> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<StationCommand>,
        mut ended: mpsc::Receiver<PlaybackEnd>,
    ) -> Result<()> {
        info!(
            track = self.index.get(),
            reciter = %self.reciter,
            "station scheduler starting"
        );

        // Join once at startup; from here on the loop owns repairs, so a
        // failure here is only logged.
        if let Some(target) = self.target.clone() {
            match self.sink.connect(&target).await {
                Ok(()) => info!(%target, "sink connected"),
                Err(err) => {
                    warn!(%target, error = %err, "initial connect failed, retrying from the loop");
                }
            }
        }

        let mut wake = ScheduledWake::tick(Duration::ZERO);
        loop {
            tokio::select! {
                maybe_cmd = commands.recv() => match maybe_cmd {
                    Some(cmd) => {
                        self.handle_command(cmd).await;
                        if self.shutdown {
                            info!("station scheduler stopped");
                            return Ok(());
                        }
                    }
                    None => {
                        self.release().await;
                        info!("command channel closed, station scheduler stopped");
                        return Ok(());
                    }
                },
                Some(end) = ended.recv() => self.on_playback_end(end),
                _ = &mut wake.sleep => {
                    wake = match self.run_pass(wake.kind).await {
                        Ok(next) => next,
                        Err(StationError::NoTargetConfigured) => {
                            error!("no room target configured, scheduler cannot run");
                            return Err(StationError::NoTargetConfigured);
                        }
                        Err(err) => {
                            error!(error = %err, "scheduler pass failed");
                            ScheduledWake::tick(FAULT_PAUSE)
                        }
                    };
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: StationCommand) {
        debug!(command = cmd.name(), "station command");

        match cmd {
            StationCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            StationCommand::Previous { reply } => {
                let _ = reply.send(self.previous().await);
            }
            StationCommand::SetReciter { name, reply } => {
                let _ = reply.send(self.set_reciter(name).await);
            }
            StationCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            StationCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            StationCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            StationCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            StationCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            StationCommand::Shutdown { reply } => {
                let state = self.release().await;
                self.shutdown = true;
                let _ = reply.send(state);
            }
        }
    }

    async fn run_pass(&mut self, kind: WakeKind) -> Result<ScheduledWake> {
        match kind {
            WakeKind::Tick => self.tick_pass().await,
            WakeKind::Reconnect => self.reconnect_pass().await,
        }
    }

    async fn tick_pass(&mut self) -> Result<ScheduledWake> {
        if !self.sink.is_connected() {
            if self.target.is_none() {
                return Err(StationError::NoTargetConfigured);
            }
            if let Some(at) = self.last_attempt {
                // Hold until the backoff window has passed.
                if at.elapsed() < self.backoff.current() {
                    return Ok(ScheduledWake::tick(TICK));
                }
            }

            self.last_attempt = Some(Instant::now());
            // Drop any stale half-open session before the next join.
            self.sink.disconnect().await;
            self.connecting = true;
            // The gateway rate-limits rejoins; wait out the current delay
            // before attempting.
            return Ok(ScheduledWake::reconnect(self.backoff.current()));
        }

        if !self.sink.is_playing() && !self.sink.is_paused() {
            self.play_next().await?;
        }
        Ok(ScheduledWake::tick(TICK))
    }

    async fn reconnect_pass(&mut self) -> Result<ScheduledWake> {
        let Some(target) = self.target.clone() else {
            return Err(StationError::NoTargetConfigured);
        };

        match self.sink.connect(&target).await {
            Ok(()) => {
                info!(%target, "sink connected");
                self.backoff.reset();
            }
            Err(err) => {
                self.backoff.advance();
                warn!(
                    %target,
                    error = %err,
                    backoff_secs = self.backoff.current().as_secs(),
                    "connect failed"
                );
            }
        }
        self.connecting = false;

        // Re-enter the loop right away; a successful join should not
        // wait a full tick before audio starts.
        Ok(ScheduledWake::tick(Duration::ZERO))
    }

    async fn play_next(&mut self) -> Result<()> {
        let track = self.index;
        let resolved = match self.catalog.resolve(track.get(), &self.reciter) {
            Ok(resolved) => resolved,
            Err(CatalogError::TrackNotFound { .. }) => {
                warn!(
                    track = track.get(),
                    reciter = %self.reciter,
                    "no source has this track, skipping"
                );
                self.index = self.index.next();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        self.sink.play(&resolved, self.end_tx.clone()).await?;
        // Announce before advancing: the stored index moves one past the
        // audible track as soon as play is issued.
        self.presence.notify_playing(track, &self.reciter);
        self.index = self.index.next();
        info!(
            track = track.get(),
            reciter = %self.reciter,
            next = self.index.get(),
            "track started"
        );
        Ok(())
    }

    fn on_playback_end(&mut self, end: PlaybackEnd) {
        let finished = self.index.previous();
        match end.error {
            Some(error) => warn!(track = finished.get(), %error, "track ended with error"),
            None => info!(track = finished.get(), "track finished"),
        }
        // The next tick notices the idle sink and starts the following
        // track; nothing to do here.
    }

    async fn skip(&mut self) -> Result<()> {
        if !self.sink.is_playing() {
            debug!("skip requested while nothing is playing");
            return Ok(());
        }
        // The look-ahead index already points at the next track, so
        // stopping is all it takes.
        self.sink.stop().await;
        Ok(())
    }

    async fn previous(&mut self) -> Result<()> {
        // One step undoes the look-ahead, the second lands on the track
        // before the one that was playing.
        self.index = self.index.previous().previous();
        if self.sink.is_playing() {
            self.sink.stop().await;
        }
        Ok(())
    }

    async fn set_reciter(&mut self, name: String) -> Result<()> {
        if !self.catalog.reciter_exists(&name) {
            warn!(reciter = %name, "rejecting switch to unknown reciter");
            return Err(StationError::UnknownReciter(name));
        }

        info!(reciter = %name, "switching reciter");
        self.reciter = name;
        if self.sink.is_playing() {
            // Rewind one step so the same track replays under the new
            // voice.
            self.index = self.index.previous();
            self.sink.stop().await;
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        if self.sink.is_playing() {
            self.sink.pause().await;
            self.presence.notify_idle();
        } else {
            debug!("pause requested while nothing is playing");
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        // Presence stays idle until the next track start announces itself.
        self.sink.resume().await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.sink.is_playing() && !self.sink.is_paused() {
            debug!("stop requested while already idle");
            return Ok(());
        }
        self.sink.stop().await;
        self.presence.notify_cleared();
        Ok(())
    }

    fn status(&self) -> StationStatus {
        let connected = self.sink.is_connected();
        let state = if self.sink.is_paused() {
            PlaybackState::Paused
        } else if connected {
            PlaybackState::Playing
        } else if self.connecting {
            PlaybackState::Connecting
        } else if self.last_attempt.is_some() {
            PlaybackState::AwaitingReconnect
        } else {
            PlaybackState::Disconnected
        };

        let track = if self.sink.is_playing() || self.sink.is_paused() {
            self.index.previous()
        } else {
            self.index
        };

        StationStatus {
            state,
            track: track.get(),
            title: qafcatalog::track_label(track.get()),
            reciter: self.reciter.clone(),
            connected,
        }
    }

    fn snapshot(&self) -> StationState {
        StationState {
            track: self.index,
            reciter: self.reciter.clone(),
        }
    }

    async fn release(&mut self) -> StationState {
        self.sink.stop().await;
        self.presence.notify_cleared();
        self.sink.disconnect().await;
        self.snapshot()
    }
}

struct ScheduledWake {
    kind: WakeKind,
    sleep: Pin<Box<Sleep>>,
}

impl ScheduledWake {
    fn new(kind: WakeKind, delay: Duration) -> Self {
        Self {
            kind,
            sleep: Box::pin(sleep(delay)),
        }
    }

    fn tick(delay: Duration) -> Self {
        Self::new(WakeKind::Tick, delay)
    }

    fn reconnect(delay: Duration) -> Self {
        Self::new(WakeKind::Reconnect, delay)
    }
}

#[derive(Debug, Clone, Copy)]
enum WakeKind {
    Tick,
    Reconnect,
}
