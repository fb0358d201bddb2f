//! HTTP client for the room gateway renderer.
//!
//! The gateway is a networked renderer that joins a named voice or
//! broadcast room and pulls media from URLs we hand it. Control is plain
//! HTTP: a session endpoint for joining/leaving, a player endpoint for
//! transport commands, and a status endpoint the per-play monitor task
//! polls to detect the end of a track.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qafcatalog::ResolvedTrack;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SinkError};
use crate::sink::{AudioSink, PlaybackEnd, RoomKind, RoomTarget};

/// Timeout for ordinary gateway requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Overall bound on a room join; busy rooms can take a while to admit us.
pub const CONNECT_TIMEOUT_SECS: u64 = 60;

/// Interval between player status polls while a track runs.
pub const MONITOR_POLL_SECONDS: u64 = 1;

/// Consecutive poll failures after which the session counts as lost.
pub const MONITOR_FAILURE_LIMIT: u32 = 3;

/// User agent presented to the gateway.
pub const DEFAULT_USER_AGENT: &str = "QafRadio/0.1";

#[derive(Debug, Default)]
struct SessionFlags {
    connected: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
}

#[derive(Debug, Serialize)]
struct SessionRequest {
    room: String,
    auto_retry: bool,
}

#[derive(Debug, Serialize)]
struct PlayRequest {
    url: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlayerStatusBody {
    state: PlayerState,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PlayerState {
    Playing,
    Paused,
    Stopped,
    #[serde(other)]
    Unknown,
}

/// Sink backed by a room gateway.
///
/// Session state lives in atomics shared with the monitor task, so the
/// scheduler's synchronous `is_*` reads stay cheap while the monitor keeps
/// them honest in the background.
#[derive(Debug)]
pub struct GatewaySink {
    client: Client,
    media_base: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    target: Option<RoomTarget>,
    session: Arc<SessionFlags>,
    monitor: Option<JoinHandle<()>>,
}

impl GatewaySink {
    /// Build a sink that serves media URLs under `media_base`
    /// (the externally reachable prefix of this daemon's media routes).
    pub fn new(media_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self {
            client,
            media_base: media_base.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            target: None,
            session: Arc::new(SessionFlags::default()),
            monitor: None,
        })
    }

    /// Override the request/join timeouts.
    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    fn abort_monitor(&mut self) {
        if let Some(handle) = self.monitor.take() {
            handle.abort();
        }
    }

    /// Broadcast rooms stay silent until the transmitter slot is claimed.
    /// A refusal is logged and swallowed: the session still counts as
    /// connected and the state machine proceeds.
    async fn claim_transmitter(&self, target: &RoomTarget) {
        let url = endpoint(&target.base_url, "api/session/transmitter");
        match self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!(room = %target.room, "claimed transmitter slot");
            }
            Ok(resp) => {
                warn!(
                    room = %target.room,
                    status = resp.status().as_u16(),
                    "transmitter slot refused, audio may stay muted"
                );
            }
            Err(err) => {
                warn!(room = %target.room, error = %err, "transmitter claim failed");
            }
        }
    }

    async fn post_player(&self, base_url: &str, command: &'static str) -> Result<()> {
        let url = format!("{}/{}", endpoint(base_url, "api/player"), command);
        let resp = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SinkError::Rejected {
                operation: command,
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSink for GatewaySink {
    async fn connect(&mut self, target: &RoomTarget) -> Result<()> {
        if self.is_connected() {
            if self.target.as_ref() == Some(target) {
                debug!(%target, "already connected to requested room");
                return Ok(());
            }
            info!(%target, "connected elsewhere, leaving current room first");
            self.disconnect().await;
        }

        // Remember the room before attempting so a failed join can still
        // be retried against the same target later.
        self.target = Some(target.clone());

        let url = endpoint(&target.base_url, "api/session");
        let body = SessionRequest {
            room: target.room.clone(),
            auto_retry: true,
        };
        let resp = self
            .client
            .post(&url)
            .timeout(self.connect_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| SinkError::ConnectFailed(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(SinkError::ConnectFailed(format!(
                "gateway returned {}",
                resp.status()
            )));
        }

        self.session.connected.store(true, Ordering::SeqCst);
        info!(room = %target.room, "joined room");

        if target.kind == RoomKind::Broadcast {
            self.claim_transmitter(target).await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.abort_monitor();
        self.session.playing.store(false, Ordering::SeqCst);
        self.session.paused.store(false, Ordering::SeqCst);
        self.session.connected.store(false, Ordering::SeqCst);

        // Always tell the gateway to leave: this also clears half-open
        // sessions left behind by a lost connection.
        if let Some(target) = &self.target {
            let url = endpoint(&target.base_url, "api/session");
            match self
                .client
                .delete(&url)
                .timeout(self.request_timeout)
                .send()
                .await
            {
                Ok(_) => debug!(room = %target.room, "left room"),
                Err(err) => debug!(room = %target.room, error = %err, "leave request failed"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::SeqCst)
    }

    fn is_playing(&self) -> bool {
        self.session.playing.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.session.paused.load(Ordering::SeqCst)
    }

    async fn play(&mut self, media: &ResolvedTrack, done: mpsc::Sender<PlaybackEnd>) -> Result<()> {
        let Some(target) = self.target.clone() else {
            return Err(SinkError::NotConnected);
        };
        if !self.is_connected() {
            return Err(SinkError::NotConnected);
        }

        // One monitor at a time; a fresh play supersedes any stale one.
        self.abort_monitor();

        let body = PlayRequest {
            url: media_url(&self.media_base, &media.reciter, &media.file_name),
            title: format!(
                "{} - {}",
                qafcatalog::track_label(media.track),
                media.reciter
            ),
        };
        let url = format!("{}/play", endpoint(&target.base_url, "api/player"));
        let resp = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SinkError::Rejected {
                operation: "play",
                status: resp.status().as_u16(),
            });
        }

        self.session.playing.store(true, Ordering::SeqCst);
        self.session.paused.store(false, Ordering::SeqCst);
        info!(track = media.track, reciter = %media.reciter, url = %body.url, "play issued");

        self.monitor = Some(spawn_monitor(
            self.client.clone(),
            target.base_url,
            self.request_timeout,
            Arc::clone(&self.session),
            done,
        ));
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.is_playing() && !self.is_paused() {
            debug!("stop requested while idle, ignoring");
            return;
        }

        // Kill the monitor first so the end notice for this track is
        // suppressed, then clear flags before any network round-trip.
        self.abort_monitor();
        self.session.playing.store(false, Ordering::SeqCst);
        self.session.paused.store(false, Ordering::SeqCst);

        if let Some(target) = self.target.clone() {
            if let Err(err) = self.post_player(&target.base_url, "stop").await {
                warn!(error = %err, "gateway stop failed");
            }
        }
    }

    async fn pause(&mut self) {
        if !self.is_playing() {
            debug!("pause requested while not playing, ignoring");
            return;
        }
        self.session.paused.store(true, Ordering::SeqCst);
        self.session.playing.store(false, Ordering::SeqCst);
        if let Some(target) = self.target.clone() {
            if let Err(err) = self.post_player(&target.base_url, "pause").await {
                warn!(error = %err, "gateway pause failed");
            }
        }
    }

    async fn resume(&mut self) {
        if !self.is_paused() {
            debug!("resume requested while not paused, ignoring");
            return;
        }
        self.session.paused.store(false, Ordering::SeqCst);
        self.session.playing.store(true, Ordering::SeqCst);
        if let Some(target) = self.target.clone() {
            if let Err(err) = self.post_player(&target.base_url, "resume").await {
                warn!(error = %err, "gateway resume failed");
            }
        }
    }
}

impl Drop for GatewaySink {
    fn drop(&mut self) {
        self.abort_monitor();
    }
}

/// Poll the player status until the track ends or the gateway vanishes.
fn spawn_monitor(
    client: Client,
    base_url: String,
    request_timeout: Duration,
    session: Arc<SessionFlags>,
    done: mpsc::Sender<PlaybackEnd>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failures = 0u32;
        loop {
            tokio::time::sleep(Duration::from_secs(MONITOR_POLL_SECONDS)).await;

            match fetch_player_status(&client, &base_url, request_timeout).await {
                Ok(status) => {
                    failures = 0;
                    match status.state {
                        PlayerState::Stopped => {
                            session.playing.store(false, Ordering::SeqCst);
                            session.paused.store(false, Ordering::SeqCst);
                            let _ = done.send(PlaybackEnd { error: status.error }).await;
                            break;
                        }
                        PlayerState::Playing | PlayerState::Paused => {}
                        PlayerState::Unknown => {
                            debug!("gateway reported an unknown player state");
                        }
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, failures, "player status poll failed");
                    if failures >= MONITOR_FAILURE_LIMIT {
                        session.connected.store(false, Ordering::SeqCst);
                        session.playing.store(false, Ordering::SeqCst);
                        session.paused.store(false, Ordering::SeqCst);
                        let _ = done
                            .send(PlaybackEnd {
                                error: Some(format!("gateway unreachable: {}", err)),
                            })
                            .await;
                        break;
                    }
                }
            }
        }
    })
}

async fn fetch_player_status(
    client: &Client,
    base_url: &str,
    timeout: Duration,
) -> Result<PlayerStatusBody> {
    let url = endpoint(base_url, "api/player");
    let resp = client.get(&url).timeout(timeout).send().await?;
    if !resp.status().is_success() {
        return Err(SinkError::Rejected {
            operation: "status",
            status: resp.status().as_u16(),
        });
    }
    Ok(resp.json::<PlayerStatusBody>().await?)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// URL the gateway pulls a resolved track from.
fn media_url(media_base: &str, reciter: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}",
        media_base.trim_end_matches('/'),
        encode_segment(reciter),
        encode_segment(file_name)
    )
}

fn encode_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
