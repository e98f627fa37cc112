//! # Bot Module
//!
//! Capa de comandos: traduce eventos de Discord a operaciones del
//! [`PlaybackController`] y muestra el [`Reply`](crate::audio::reply::Reply)
//! que devuelven.
//!
//! - [`commands`]: definición y registro de los slash commands
//! - [`handlers`]: despacho de interacciones y verificación de canal de voz
//! - [`notifier`]: mensajes que no responden a un comando ("siguiente canción")

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{audio::player::PlaybackController, config::Config};

/// Main Discord bot handler.
///
/// Implements Serenity's [`EventHandler`]. All playback state lives in the
/// [`PlaybackController`]; this struct only routes events to it.
pub struct MusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Playback controller shared with the completion listener
    pub player: PlaybackController,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, player: PlaybackController) -> Self {
        Self { config, player }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands are registered per-guild when `GUILD_ID` is set (fast
    /// propagation, useful for development) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                // Verificar que el bot esté en la guild
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Detecta cuando el bot es sacado del canal de voz desde fuera
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.player.handle_disconnected(guild_id).await;
        }
    }
}
