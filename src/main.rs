use anyhow::Result;
use serenity::{
    http::Http,
    model::{gateway::GatewayIntents, id::ApplicationId},
    Client,
};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::audio::{
    player::{PlaybackController, PlayerSettings},
    session::completion_channel,
    voice::SongbirdGateway,
};
use crate::bot::{notifier::ChannelNotifier, MusicBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_tunes=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Tunes v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    let resolver = Arc::new(YtDlpResolver::new(&config.ytdlp_path, config.ytdlp_concurrency));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        let version = resolver.verify().await?;
        println!("OK (yt-dlp {})", version);
        return Ok(());
    }

    // Canal de fin de pista: songbird -> controlador
    let (completions_tx, completions_rx) = completion_channel();

    // songbird corta el join con su propio gateway_timeout: que sea el configurado
    let songbird = Songbird::serenity_from_config(
        songbird::Config::default().gateway_timeout(Some(config.connect_timeout())),
    );
    let gateway = Arc::new(SongbirdGateway::new(
        songbird.clone(),
        completions_tx,
        config.default_volume,
        config.connect_timeout(),
    )?);
    let notifier = Arc::new(ChannelNotifier::new(Arc::new(Http::new(&config.discord_token))));

    let player = PlaybackController::new(PlayerSettings::from(&config), resolver, gateway, notifier);
    tokio::spawn(player.clone().run_completions(completions_rx));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let token = config.discord_token.clone();
    let application_id = ApplicationId::new(config.application_id);
    let handler = MusicBot::new(Arc::new(config), player);

    // Construir cliente
    let mut client = Client::builder(&token, intents)
        .application_id(application_id)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
