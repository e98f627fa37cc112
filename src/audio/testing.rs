//! Dobles de prueba para la sesión de voz y las notificaciones.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};

use crate::audio::{
    error::PlaybackError,
    queue::QueueItem,
    reply::{Notifier, Reply},
    session::{AudioSession, CompletionSender, TrackCompletion, TrackOutcome, VoiceGateway},
};

#[derive(Debug, Default)]
struct FakeTrack {
    playback_id: Option<u64>,
    paused: bool,
}

/// Sesión en memoria que emite finalizaciones por el canal real.
pub struct FakeSession {
    guild_id: GuildId,
    channel: Mutex<ChannelId>,
    track: Mutex<FakeTrack>,
    played: Mutex<Vec<(String, u64)>>,
    disconnected: Mutex<bool>,
    completions: CompletionSender,
}

impl FakeSession {
    fn new(guild_id: GuildId, channel_id: ChannelId, completions: CompletionSender) -> Self {
        Self {
            guild_id,
            channel: Mutex::new(channel_id),
            track: Mutex::new(FakeTrack::default()),
            played: Mutex::new(Vec::new()),
            disconnected: Mutex::new(false),
            completions,
        }
    }

    fn complete(&self, playback_id: u64, outcome: TrackOutcome) {
        let _ = self.completions.send(TrackCompletion {
            guild_id: self.guild_id,
            playback_id,
            outcome,
        });
    }

    /// La canción actual termina sola
    pub fn finish(&self) {
        self.end_current(TrackOutcome::Finished);
    }

    pub fn fail(&self) {
        self.end_current(TrackOutcome::Errored);
    }

    fn end_current(&self, outcome: TrackOutcome) {
        let ended = self.track.lock().playback_id.take();
        if let Some(playback_id) = ended {
            self.complete(playback_id, outcome);
        }
    }

    pub fn current_playback(&self) -> Option<u64> {
        self.track.lock().playback_id
    }

    /// Stream refs reproducidos, en orden
    pub fn played(&self) -> Vec<String> {
        self.played.lock().iter().map(|(stream, _)| stream.clone()).collect()
    }

    pub fn is_disconnected(&self) -> bool {
        *self.disconnected.lock()
    }
}

#[async_trait]
impl AudioSession for FakeSession {
    fn channel(&self) -> ChannelId {
        *self.channel.lock()
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<()> {
        *self.channel.lock() = channel_id;
        Ok(())
    }

    async fn play(&self, item: &QueueItem, playback_id: u64) -> Result<()> {
        if item.stream_ref.contains("broken") {
            anyhow::bail!("stream roto: {}", item.stream_ref);
        }

        // Igual que songbird: reemplazar la canción actual la finaliza
        self.end_current(TrackOutcome::Finished);

        *self.track.lock() = FakeTrack {
            playback_id: Some(playback_id),
            paused: false,
        };
        self.played.lock().push((item.stream_ref.clone(), playback_id));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.track.lock().paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.track.lock().paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.end_current(TrackOutcome::Finished);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.disconnected.lock() = true;
        self.end_current(TrackOutcome::Finished);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let track = self.track.lock();
        track.playback_id.is_some() && !track.paused
    }

    async fn is_paused(&self) -> bool {
        let track = self.track.lock();
        track.playback_id.is_some() && track.paused
    }
}

pub struct FakeGateway {
    completions: CompletionSender,
    connect_delay: Option<Duration>,
    join_timed_out: bool,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeGateway {
    pub fn new(completions: CompletionSender) -> Self {
        Self {
            completions,
            connect_delay: None,
            join_timed_out: false,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Discord nunca contesta el join: el gateway falla con su propio timeout
    pub fn with_join_timeout(mut self) -> Self {
        self.join_timed_out = true;
        self
    }

    pub fn connections(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().last().cloned()
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSession>, PlaybackError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.join_timed_out {
            return Err(PlaybackError::ConnectionTimeout(Duration::from_secs(10)));
        }

        let session = Arc::new(FakeSession::new(guild_id, channel_id, self.completions.clone()));
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChannelId, Reply)>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, reply)| reply.text.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel_id: ChannelId, reply: Reply) {
        self.sent.lock().push((channel_id, reply));
    }
}
