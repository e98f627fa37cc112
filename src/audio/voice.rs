//! Implementación de [`VoiceGateway`] / [`AudioSession`] sobre songbird.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError,
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::audio::{
    error::PlaybackError,
    queue::QueueItem,
    session::{AudioSession, CompletionSender, TrackCompletion, TrackOutcome, VoiceGateway},
};

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    completions: CompletionSender,
    volume: f32,
    /// El mismo `gateway_timeout` con el que se construyó el manager
    join_timeout: Duration,
}

impl SongbirdGateway {
    pub fn new(
        manager: Arc<Songbird>,
        completions: CompletionSender,
        volume: f32,
        join_timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            manager,
            http_client,
            completions,
            volume,
            join_timeout,
        })
    }
}

/// Un join sin respuesta de Discord cuenta como timeout de conexión
fn join_error(error: JoinError, guild_id: GuildId, join_timeout: Duration) -> PlaybackError {
    if matches!(error, JoinError::TimedOut) {
        warn!("⏱️ Discord no respondió al unirse al canal de voz en guild {}", guild_id);
        return PlaybackError::ConnectionTimeout(join_timeout);
    }

    error!("Error al obtener handler de voz: {:?}", error);
    PlaybackError::Unexpected(anyhow::anyhow!("Error al conectar al canal de voz: {}", error))
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSession>, PlaybackError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| join_error(e, guild_id, self.join_timeout))?;

        Ok(Arc::new(SongbirdSession {
            guild_id,
            manager: self.manager.clone(),
            call,
            channel: Mutex::new(channel_id),
            current: Mutex::new(None),
            http_client: self.http_client.clone(),
            completions: self.completions.clone(),
            volume: self.volume,
        }))
    }
}

/// Llamada de voz de una guild con la canción que está sonando.
pub struct SongbirdSession {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    channel: Mutex<ChannelId>,
    current: Mutex<Option<TrackHandle>>,
    http_client: reqwest::Client,
    completions: CompletionSender,
    volume: f32,
}

impl SongbirdSession {
    fn current_track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current_track()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl AudioSession for SongbirdSession {
    fn channel(&self) -> ChannelId {
        *self.channel.lock()
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<()> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al moverse al canal de voz: {}", e))?;
        *self.channel.lock() = channel_id;
        Ok(())
    }

    async fn play(&self, item: &QueueItem, playback_id: u64) -> Result<()> {
        // Un handle nuevo por reproducción: los anteriores no se reutilizan
        let input = Input::from(HttpRequest::new(self.http_client.clone(), item.stream_ref.clone()));

        let track = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        if let Err(e) = track.set_volume(self.volume) {
            warn!("No se pudo ajustar el volumen: {:?}", e);
        }

        for (event, outcome) in [
            (TrackEvent::End, TrackOutcome::Finished),
            (TrackEvent::Error, TrackOutcome::Errored),
        ] {
            track
                .add_event(
                    Event::Track(event),
                    TrackEndHandler {
                        guild_id: self.guild_id,
                        playback_id,
                        outcome,
                        completions: self.completions.clone(),
                    },
                )
                .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        }

        *self.current.lock() = Some(track);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if let Some(track) = self.current_track() {
            track.pause()?;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        if let Some(track) = self.current_track() {
            track.play()?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(track) = self.current_track() {
            track.stop()?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.current.lock().take();
        self.manager.remove(self.guild_id).await?;
        info!("👋 Llamada de voz cerrada en guild {}", self.guild_id);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }
}

/// Reenvía el fin de una canción al canal de finalizaciones
struct TrackEndHandler {
    guild_id: GuildId,
    playback_id: u64,
    outcome: TrackOutcome,
    completions: CompletionSender,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!(
            "Track #{} terminó en guild {} ({:?})",
            self.playback_id, self.guild_id, self.outcome
        );

        let completion = TrackCompletion {
            guild_id: self.guild_id,
            playback_id: self.playback_id,
            outcome: self.outcome,
        };
        if self.completions.send(completion).is_err() {
            error!("Canal de finalizaciones cerrado, no se puede avanzar la cola");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(10);

    #[test]
    fn test_join_timeout_is_a_connection_timeout() {
        let err = join_error(JoinError::TimedOut, GUILD, Duration::from_secs(30));
        assert!(matches!(err, PlaybackError::ConnectionTimeout(d) if d == Duration::from_secs(30)));
    }

    #[test]
    fn test_other_join_errors_are_unexpected() {
        let err = join_error(JoinError::NoCall, GUILD, Duration::from_secs(30));
        assert!(matches!(err, PlaybackError::Unexpected(_)));
    }
}
