use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::{
        error::PlaybackError,
        player::PlayRequest,
        reply::Reply,
    },
    bot::MusicBot,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, Reply::error("❌ Este comando solo funciona dentro de un servidor.")).await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let player = &bot.player;
    let result = match command.data.name.as_str() {
        "play" => return handle_play(ctx, &command, bot, guild_id).await,
        "queue" => return handle_queue(ctx, &command, bot, guild_id).await,
        "nowplaying" => return handle_nowplaying(ctx, &command, bot, guild_id).await,
        "pause" => player.pause(guild_id).await,
        "resume" => player.resume(guild_id).await,
        "skip" => player.skip(guild_id).await,
        "stop" => player.stop(guild_id).await,
        "leave" => player.leave(guild_id).await,
        "loop" => Ok(player.toggle_loop(guild_id).await),
        _ => Err(PlaybackError::precondition("❌ Comando no reconocido")),
    };

    respond(ctx, &command, into_reply(result)).await
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default();

    // Verificar que el usuario esté en un canal de voz
    let Some(voice_channel) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, Reply::error("❌ ¡Debes unirte a un canal de voz primero!")).await;
    };

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let result = bot
        .player
        .request_play(PlayRequest {
            guild_id,
            voice_channel,
            text_channel: command.channel_id,
            requested_by: command.user.id,
            query: query.to_string(),
        })
        .await;

    let reply = into_reply(result);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embeds::reply_embed(&reply)))
        .await?;

    Ok(())
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1)
        .max(1) as usize;

    let queue_info = bot.player.queue_info(guild_id).await.unwrap_or_else(|| {
        crate::audio::queue::GuildQueue::new(bot.config().max_queue_size).get_info()
    });
    let embed = embeds::create_queue_embed(&queue_info, page, bot.config().queue_page_size);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

async fn handle_nowplaying(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(current) = bot.player.now_playing(guild_id).await else {
        return respond(ctx, command, Reply::error("❌ No hay nada reproduciéndose actualmente")).await;
    };
    let loop_mode = bot
        .player
        .queue_info(guild_id)
        .await
        .map(|info| info.loop_mode)
        .unwrap_or_default();

    let embed = embeds::create_now_playing_embed(&current, loop_mode);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

/// Los errores se muestran al usuario; nunca salen de aquí
fn into_reply(result: Result<Reply, PlaybackError>) -> Reply {
    result.unwrap_or_else(|e| e.to_reply())
}

async fn respond(ctx: &Context, command: &CommandInteraction, reply: Reply) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::reply_embed(&reply))
                    .ephemeral(reply.is_error()),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
