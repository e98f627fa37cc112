use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        error::PlaybackError,
        queue::{LoopMode, QueueInfo, QueueItem},
        registry::{GuildSlot, PlaybackRegistry},
        reply::{Notifier, Reply},
        session::{AudioSession, CompletionReceiver, TrackCompletion, TrackOutcome, VoiceGateway},
    },
    config::Config,
    sources::{TrackQuery, TrackResolver},
};

#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub connect_timeout: Duration,
    pub resolve_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_queue_size: usize,
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            resolve_timeout: config.resolve_timeout(),
            idle_timeout: config.idle_timeout(),
            max_queue_size: config.max_queue_size,
        }
    }
}

/// Una petición de `/play` que ya pasó la verificación de canal de voz.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub requested_by: UserId,
    pub query: String,
}

/// Decide qué suena en cada guild.
///
/// Cada operación toma el lock de la guild durante toda su duración (incluida
/// la resolución y la conexión), así que dos comandos seguidos para la misma
/// guild nunca se intercalan. Guilds distintas avanzan en paralelo.
#[derive(Clone)]
pub struct PlaybackController {
    registry: Arc<PlaybackRegistry>,
    resolver: Arc<dyn TrackResolver>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn Notifier>,
    settings: PlayerSettings,
    playback_ids: Arc<AtomicU64>,
}

impl PlaybackController {
    pub fn new(
        settings: PlayerSettings,
        resolver: Arc<dyn TrackResolver>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry: Arc::new(PlaybackRegistry::new(settings.max_queue_size)),
            resolver,
            gateway,
            notifier,
            settings,
            playback_ids: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Resuelve la búsqueda y la reproduce o la agrega a la cola
    pub async fn request_play(&self, request: PlayRequest) -> Result<Reply, PlaybackError> {
        let query = TrackQuery::parse(&request.query)?;
        let slot = self.registry.guild(request.guild_id);
        let mut guild = slot.lock().await;

        let resolved = timeout(self.settings.resolve_timeout, self.resolver.resolve(&query))
            .await
            .map_err(|_| PlaybackError::resolution(query.as_str(), "tiempo de espera agotado"))??;
        let item = QueueItem::new(resolved.stream_ref, resolved.title, request.requested_by);

        let session = self
            .ensure_session(&mut guild, request.guild_id, request.voice_channel)
            .await?;
        guild.announce_channel = Some(request.text_channel);

        let title = item.title.clone();
        if Self::is_busy(&guild, session.as_ref()).await {
            let position = guild.queue.enqueue(item)?;
            return Ok(Reply::info(format!(
                "✅ **{}** agregado a la cola (posición {})",
                title, position
            )));
        }

        self.start_track(&mut guild, request.guild_id, session.as_ref(), item)
            .await?;
        Ok(Reply::info(format!("▶️ Reproduciendo: **{}**", title)))
    }

    /// Cambia el modo loop: off -> canción -> cola -> off
    pub async fn toggle_loop(&self, guild_id: GuildId) -> Reply {
        let slot = self.registry.guild(guild_id);
        let mode = slot.lock().await.queue.cycle_loop_mode();
        info!("🔁 Modo loop en guild {}: {}", guild_id, mode);

        Reply::info(match mode {
            LoopMode::Off => "🔁 **Modo de repetición desactivado**",
            LoopMode::Track => "🔂 **Repitiendo la canción actual**",
            LoopMode::Queue => "🔁 **Repitiendo toda la cola**",
        })
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<Reply, PlaybackError> {
        let slot = self.registry.guild(guild_id);
        let guild = slot.lock().await;
        let session = Self::session_of(&guild)?;

        if !session.is_playing().await {
            return Err(PlaybackError::precondition("No hay música reproduciéndose."));
        }

        session.pause().await?;
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(Reply::info("⏸️ Música pausada."))
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<Reply, PlaybackError> {
        let slot = self.registry.guild(guild_id);
        let guild = slot.lock().await;
        let session = Self::session_of(&guild)?;

        if !session.is_paused().await {
            return Err(PlaybackError::precondition("La música no está pausada."));
        }

        session.resume().await?;
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(Reply::info("▶️ Música reanudada."))
    }

    /// Detiene la canción actual; la finalización elige la siguiente
    pub async fn skip(&self, guild_id: GuildId) -> Result<Reply, PlaybackError> {
        let slot = self.registry.guild(guild_id);
        let mut guild = slot.lock().await;
        let session = Self::session_of(&guild)?;

        if guild.queue.now_playing().is_none() {
            return Err(PlaybackError::precondition("No hay música reproduciéndose."));
        }

        guild.skip_requested = true;
        if let Err(e) = session.stop().await {
            guild.skip_requested = false;
            return Err(e.into());
        }

        info!("⏭️ Canción saltada en guild {}", guild_id);
        Ok(Reply::info("⏭️ Canción saltada."))
    }

    /// Vacía la cola y detiene la canción actual
    pub async fn stop(&self, guild_id: GuildId) -> Result<Reply, PlaybackError> {
        let slot = self.registry.guild(guild_id);
        let mut guild = slot.lock().await;
        let session = Self::session_of(&guild)?;

        // Primero el estado: la finalización que dispara stop() no debe encontrar nada
        guild.queue.clear();
        guild.queue.set_now_playing(None);
        guild.skip_requested = false;
        session.stop().await?;

        info!("⏹️ Reproducción detenida en guild {}", guild_id);
        Ok(Reply::info("⏹️ Reproducción detenida y cola limpiada."))
    }

    pub async fn leave(&self, guild_id: GuildId) -> Result<Reply, PlaybackError> {
        let slot = self.registry.guild(guild_id);
        let mut guild = slot.lock().await;
        let session = guild
            .release_session()
            .ok_or_else(|| PlaybackError::precondition("No estoy en ningún canal de voz."))?;

        session.disconnect().await?;
        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(Reply::info("👋 ¡Adiós!"))
    }

    /// El bot fue sacado del canal de voz desde fuera
    pub async fn handle_disconnected(&self, guild_id: GuildId) {
        let Some(slot) = self.registry.get(guild_id) else {
            return;
        };

        let mut guild = slot.lock().await;
        if guild.release_session().is_some() {
            info!("🔌 Sesión de voz liberada en guild {}", guild_id);
        }
    }

    pub async fn queue_info(&self, guild_id: GuildId) -> Option<QueueInfo> {
        let slot = self.registry.get(guild_id)?;
        let info = slot.lock().await.queue.get_info();
        Some(info)
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<QueueItem> {
        let slot = self.registry.get(guild_id)?;
        let current = slot.lock().await.queue.now_playing().cloned();
        current
    }

    /// Consume el canal de finalizaciones. Debe haber exactamente una tarea corriendo esto.
    pub async fn run_completions(self, mut completions: CompletionReceiver) {
        info!("🎧 Escuchando finalizaciones de canciones");

        while let Some(completion) = completions.recv().await {
            let controller = self.clone();
            tokio::spawn(async move {
                controller.handle_completion(completion).await;
            });
        }

        warn!("Canal de finalizaciones cerrado");
    }

    /// Decide qué suena después de que terminó una canción
    pub async fn handle_completion(&self, completion: TrackCompletion) {
        let guild_id = completion.guild_id;
        let Some(slot) = self.registry.get(guild_id) else {
            debug!("Finalización para guild desconocida {}", guild_id);
            return;
        };

        let mut announcements = Vec::new();
        let announce_channel = {
            let mut guild = slot.lock().await;

            if guild.active_playback != Some(completion.playback_id) {
                debug!(
                    "Ignorando finalización obsoleta #{} en guild {}",
                    completion.playback_id, guild_id
                );
                return;
            }
            guild.active_playback = None;
            let skipped = std::mem::take(&mut guild.skip_requested);

            let Some(session) = guild.session.clone() else {
                guild.queue.set_now_playing(None);
                return;
            };

            if completion.outcome == TrackOutcome::Errored {
                warn!("❌ La canción terminó con error en guild {}", guild_id);
            }

            let replay = guild.queue.loop_mode() == LoopMode::Track
                && !skipped
                && completion.outcome == TrackOutcome::Finished;
            let current = guild.queue.now_playing().cloned();

            match current {
                // Loop de canción: handle nuevo, sin anunciar para no spamear
                Some(item) if replay => {
                    debug!("🔂 Repitiendo: {}", item.title);
                    if let Err(e) = self.start_track(&mut guild, guild_id, session.as_ref(), item).await {
                        error!("Error al repetir canción en guild {}: {:?}", guild_id, e);
                        announcements.push(e.to_reply());
                        guild.queue.set_now_playing(None);
                        self.advance(&mut guild, guild_id, session.as_ref(), &mut announcements)
                            .await;
                    }
                }
                _ => {
                    let finished = guild.queue.take_now_playing();
                    if guild.queue.loop_mode() == LoopMode::Queue {
                        if let Some(item) = finished {
                            debug!("🔁 Devolviendo al final de la cola: {}", item.title);
                            if let Err(e) = guild.queue.enqueue(item) {
                                warn!("No se pudo devolver la canción a la cola: {}", e);
                            }
                        }
                    }
                    self.advance(&mut guild, guild_id, session.as_ref(), &mut announcements)
                        .await;
                }
            }

            guild.announce_channel
        };

        if let Some(channel_id) = announce_channel {
            for reply in announcements {
                self.notifier.notify(channel_id, reply).await;
            }
        }
    }

    /// Reproduce la siguiente de la cola o, si no hay, arma el timer de inactividad
    async fn advance(
        &self,
        guild: &mut GuildSlot,
        guild_id: GuildId,
        session: &dyn AudioSession,
        announcements: &mut Vec<Reply>,
    ) {
        while let Some(next) = guild.queue.dequeue_next() {
            let title = next.title.clone();
            match self.start_track(guild, guild_id, session, next).await {
                Ok(()) => {
                    announcements.push(Reply::info(format!("▶️ Reproduciendo: **{}**", title)));
                    return;
                }
                Err(e) => {
                    error!("Error al reproducir '{}' en guild {}: {:?}", title, guild_id, e);
                    announcements.push(e.to_reply());
                }
            }
        }

        guild.queue.set_now_playing(None);
        self.arm_idle_timer(guild, guild_id);
    }

    async fn start_track(
        &self,
        guild: &mut GuildSlot,
        guild_id: GuildId,
        session: &dyn AudioSession,
        item: QueueItem,
    ) -> Result<(), PlaybackError> {
        guild.cancel_idle_timer();

        let playback_id = self.playback_ids.fetch_add(1, Ordering::Relaxed) + 1;
        session.play(&item, playback_id).await?;

        info!("🎵 Reproduciendo en guild {}: {}", guild_id, item.title);
        guild.active_playback = Some(playback_id);
        guild.queue.set_now_playing(Some(item));
        Ok(())
    }

    async fn ensure_session(
        &self,
        guild: &mut GuildSlot,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSession>, PlaybackError> {
        match guild.session.clone() {
            Some(session) if session.channel() == channel_id => Ok(session),
            Some(session) => {
                info!("🔀 Moviendo al canal {} en guild {}", channel_id, guild_id);
                session.move_to(channel_id).await?;
                Ok(session)
            }
            None => {
                let session = timeout(
                    self.settings.connect_timeout,
                    self.gateway.connect(guild_id, channel_id),
                )
                .await
                .map_err(|_| PlaybackError::ConnectionTimeout(self.settings.connect_timeout))??;

                info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
                guild.session = Some(session.clone());
                Ok(session)
            }
        }
    }

    fn arm_idle_timer(&self, guild: &mut GuildSlot, guild_id: GuildId) {
        let token = CancellationToken::new();
        guild.set_idle_timer(token.clone());

        let idle_timeout = self.settings.idle_timeout;
        info!(
            "⏳ Cola vacía en guild {}, desconectando en {}",
            guild_id,
            humantime::format_duration(idle_timeout)
        );

        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(idle_timeout) => controller.expire_idle(guild_id, &token).await,
            }
        });
    }

    async fn expire_idle(&self, guild_id: GuildId, token: &CancellationToken) {
        let Some(slot) = self.registry.get(guild_id) else {
            return;
        };

        let (session, announce_channel) = {
            let mut guild = slot.lock().await;
            // Otra canción empezó mientras esperábamos el lock
            if token.is_cancelled() {
                return;
            }
            guild.clear_idle_timer();

            let Some(session) = guild.session.clone() else {
                return;
            };
            if session.is_playing().await {
                return;
            }

            guild.release_session();
            (session, guild.announce_channel)
        };

        info!("🚪 Desconectando por inactividad en guild {}", guild_id);
        if let Err(e) = session.disconnect().await {
            warn!("Error al desconectar por inactividad: {:?}", e);
        }

        if let Some(channel_id) = announce_channel {
            self.notifier
                .notify(channel_id, Reply::info("👋 Me desconecté por inactividad."))
                .await;
        }
    }

    async fn is_busy(guild: &GuildSlot, session: &dyn AudioSession) -> bool {
        // Una finalización pendiente también cuenta: todavía va a elegir la siguiente
        guild.active_playback.is_some() || session.is_playing().await || session.is_paused().await
    }

    fn session_of(guild: &GuildSlot) -> Result<Arc<dyn AudioSession>, PlaybackError> {
        guild
            .session
            .clone()
            .ok_or_else(|| PlaybackError::precondition("No estoy conectado a ningún canal de voz."))
    }

    #[cfg(test)]
    async fn idle_timer_armed(&self, guild_id: GuildId) -> bool {
        match self.registry.get(guild_id) {
            Some(slot) => slot.lock().await.idle_timer_armed(),
            None => false,
        }
    }
}
