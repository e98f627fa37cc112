//! Contratos de la conexión de voz que consume el controlador.
//!
//! El controlador nunca habla con songbird directamente: recibe un
//! [`VoiceGateway`] para conectarse y trabaja con [`AudioSession`]s. Cada
//! llamada a [`AudioSession::play`] produce exactamente un
//! [`TrackCompletion`] en el canal de finalizaciones, tanto si la canción
//! termina sola como si se detiene.

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::{error::PlaybackError, queue::QueueItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Terminó o fue detenida
    Finished,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackCompletion {
    pub guild_id: GuildId,
    pub playback_id: u64,
    pub outcome: TrackOutcome,
}

pub type CompletionSender = mpsc::UnboundedSender<TrackCompletion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<TrackCompletion>;

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Conexión de voz activa en una guild. Reproduce un stream a la vez.
#[async_trait]
pub trait AudioSession: Send + Sync {
    fn channel(&self) -> ChannelId;

    async fn move_to(&self, channel_id: ChannelId) -> Result<()>;

    /// Crea un handle nuevo desde `item.stream_ref` y lo reproduce,
    /// reemplazando lo que estuviera sonando.
    async fn play(&self, item: &QueueItem, playback_id: u64) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Debe disparar la finalización de la canción actual.
    async fn stop(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Si Discord no responde a tiempo devuelve [`PlaybackError::ConnectionTimeout`].
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSession>, PlaybackError>;
}
