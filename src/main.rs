use anyhow::{Context as _, Result};
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod session;
mod ui;

#[cfg(test)]
mod testing;

use crate::audio::player::AudioPlayer;
use crate::bot::OpenEchoBot;
use crate::config::Config;
use crate::session::BotState;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_echo=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Echo v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    config.validate()?;
    info!("⚙️ {}", config.summary());

    // Cliente HTTP propio para publicar comandos y notificar
    let http = Arc::new(Http::new(&config.discord_token));
    let application = http
        .get_current_application_info()
        .await
        .context("could not fetch application info, check DISCORD_TOKEN")?;
    http.set_application_id(application.id);
    info!("🔧 Application ID: {}", application.id);

    let songbird = Songbird::serenity();
    let player = AudioPlayer::new(songbird.clone(), http.clone(), &config);
    let state = Arc::new(BotState::new(Arc::new(config.clone()), Arc::new(player.clone())));
    info!("📝 {} comandos registrados", state.commands.len());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = OpenEchoBot::new(state, player, http);
    let mut client = Client::builder(&config.discord_token, intents)
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
