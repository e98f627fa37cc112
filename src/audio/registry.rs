use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::audio::{queue::GuildQueue, session::AudioSession};

/// Todo lo que el controlador sabe de una guild.
pub struct GuildSlot {
    pub queue: GuildQueue,
    pub session: Option<Arc<dyn AudioSession>>,
    /// Canal de texto donde se anuncian los cambios de canción
    pub announce_channel: Option<ChannelId>,
    /// Id de la reproducción cuya finalización todavía esperamos
    pub active_playback: Option<u64>,
    /// La próxima finalización viene de un skip: avanzar aunque haya loop de canción
    pub skip_requested: bool,
    idle_timer: Option<CancellationToken>,
}

impl GuildSlot {
    fn new(max_queue_size: usize) -> Self {
        Self {
            queue: GuildQueue::new(max_queue_size),
            session: None,
            announce_channel: None,
            active_playback: None,
            skip_requested: false,
            idle_timer: None,
        }
    }

    /// Reemplaza el timer de inactividad actual (si existe) por `token`.
    pub fn set_idle_timer(&mut self, token: CancellationToken) {
        self.cancel_idle_timer();
        self.idle_timer = Some(token);
    }

    pub fn cancel_idle_timer(&mut self) {
        if let Some(token) = self.idle_timer.take() {
            debug!("⏱️ Timer de inactividad cancelado");
            token.cancel();
        }
    }

    /// Olvida el timer que acaba de vencer sin cancelarlo.
    pub fn clear_idle_timer(&mut self) {
        self.idle_timer = None;
    }

    #[cfg(test)]
    pub fn idle_timer_armed(&self) -> bool {
        self.idle_timer.is_some()
    }

    /// Suelta la sesión y todo lo que dependía de ella. La cola y el modo loop se conservan.
    pub fn release_session(&mut self) -> Option<Arc<dyn AudioSession>> {
        self.cancel_idle_timer();
        self.active_playback = None;
        self.skip_requested = false;
        self.queue.set_now_playing(None);
        self.session.take()
    }
}

/// Mapa explícito guild -> estado, con un lock async por guild.
pub struct PlaybackRegistry {
    guilds: DashMap<GuildId, Arc<Mutex<GuildSlot>>>,
    max_queue_size: usize,
}

impl PlaybackRegistry {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            guilds: DashMap::new(),
            max_queue_size,
        }
    }

    /// Obtiene el estado de la guild, creándolo si es la primera vez
    pub fn guild(&self, guild_id: GuildId) -> Arc<Mutex<GuildSlot>> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Estado de reproducción creado para guild {}", guild_id);
                Arc::new(Mutex::new(GuildSlot::new(self.max_queue_size)))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildSlot>>> {
        self.guilds.get(&guild_id).map(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_is_created_once() {
        let registry = PlaybackRegistry::new(10);
        let guild_id = GuildId::new(1);

        assert!(registry.get(guild_id).is_none());
        let first = registry.guild(guild_id);
        let second = registry.guild(guild_id);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_replacing_idle_timer_cancels_previous() {
        let mut slot = GuildSlot::new(10);
        let first = CancellationToken::new();
        slot.set_idle_timer(first.clone());
        slot.set_idle_timer(CancellationToken::new());

        assert!(first.is_cancelled());
        assert!(slot.idle_timer_armed());

        slot.cancel_idle_timer();
        assert!(!slot.idle_timer_armed());
    }
}
