use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::commands::{
    CommandContext, CommandDescriptor, CommandHandler, OptionDescriptor, OptionKind,
};
use crate::{
    audio::{queue::QueueItem, reorder},
    error::BotError,
    ui::messages,
};

const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "flac", "ogg", "m4a"];
const DEFAULT_ARTIST: &str = "Unknown Artist";

/// Every command the bot serves.
pub fn all() -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(EchoCommand),
        Arc::new(MoveCommand),
        Arc::new(PauseCommand),
        Arc::new(PlayFileCommand),
    ]
}

/// Turns text-to-speech of the caller's chat messages on or off.
pub struct EchoCommand;

#[async_trait]
impl CommandHandler for EchoCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("echo", "Speak your chat messages in the voice channel").option(
            OptionDescriptor::new(OptionKind::String, "state", "Turn echo on or off")
                .required()
                .choice("On", "on")
                .choice("Off", "off"),
        )
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        if ctx.require_voice().await?.is_none() {
            return Ok(());
        }

        let enabled = match ctx.invocation.options.string("state") {
            Some("on") => true,
            Some("off") => false,
            other => anyhow::bail!("invalid echo state: {:?}", other),
        };

        let invocation = ctx.invocation;
        ctx.state
            .echo
            .set_echo(invocation.guild_id, invocation.user_id, enabled);
        info!(
            "🗣️ Echo {} para {} en guild {}",
            if enabled { "activado" } else { "desactivado" },
            invocation.user_name,
            invocation.guild_id
        );

        ctx.follow_up(&messages::echo_state(enabled)).await
    }
}

pub struct MoveCommand;

#[async_trait]
impl CommandHandler for MoveCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("move", "Move a song in the queue")
            .option(
                OptionDescriptor::new(OptionKind::Integer, "track", "The track number to move")
                    .required()
                    .min_int(1),
            )
            .option(
                OptionDescriptor::new(OptionKind::Integer, "position", "The position to move it to")
                    .required()
                    .min_int(1),
            )
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        if ctx.require_voice().await?.is_none() {
            return Ok(());
        }

        let options = &ctx.invocation.options;
        let from = options.integer("track").context("missing track option")?;
        let to = options.integer("position").context("missing position option")?;

        let guild_id = ctx.invocation.guild_id;
        match reorder::move_track(ctx.state.engine.as_ref(), guild_id, from, to).await {
            Ok(track) => ctx.follow_up(&messages::track_moved(&track)).await,
            Err(e) => {
                info!("Movimiento rechazado en guild {}: {}", guild_id, e);
                ctx.follow_up(e.user_message()).await
            }
        }
    }
}

/// Pauses the current track, or resumes it when already paused.
pub struct PauseCommand;

#[async_trait]
impl CommandHandler for PauseCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("pause", "Pause or resume the current song")
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        if ctx.require_voice().await?.is_none() {
            return Ok(());
        }

        let guild_id = ctx.invocation.guild_id;
        let engine = &ctx.state.engine;
        let Some(status) = engine
            .status(guild_id)
            .await
            .filter(|status| status.current.is_some())
        else {
            return ctx.follow_up(BotError::NoActiveSession.user_message()).await;
        };

        let toggled = if status.is_paused() {
            engine.resume(guild_id).await.map(|()| messages::RESUMED)
        } else {
            engine.pause(guild_id).await.map(|()| messages::PAUSED)
        };

        match toggled {
            Ok(reply) => ctx.follow_up(reply).await,
            Err(e) => {
                warn!("No se pudo alternar la pausa en guild {}: {}", guild_id, e);
                ctx.follow_up(messages::SOMETHING_WENT_WRONG).await
            }
        }
    }
}

/// Queues an uploaded audio file.
pub struct PlayFileCommand;

#[async_trait]
impl CommandHandler for PlayFileCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("playfile", "Play an uploaded audio file")
            .option(
                OptionDescriptor::new(OptionKind::Attachment, "file", "The audio file to play")
                    .required(),
            )
            .option(OptionDescriptor::new(
                OptionKind::String,
                "title",
                "Custom title for the track",
            ))
            .option(OptionDescriptor::new(
                OptionKind::String,
                "artist",
                "Custom artist name for the track",
            ))
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let Some(voice_channel) = ctx.require_voice().await? else {
            return Ok(());
        };

        let invocation = ctx.invocation;
        let file = invocation
            .options
            .attachment("file")
            .context("missing file option")?;

        if !is_supported_audio(&file.filename) {
            let error = BotError::UnsupportedFile(file.filename.clone());
            info!("Archivo rechazado: {}", error);
            return ctx.follow_up(error.user_message()).await;
        }

        let title = invocation
            .options
            .string("title")
            .unwrap_or(&file.filename)
            .to_string();
        let artist = invocation
            .options
            .string("artist")
            .unwrap_or(DEFAULT_ARTIST)
            .to_string();

        let item = QueueItem::new(&title, &file.url, invocation.user_id).with_artist(&artist);
        let options = ctx.state.play_options(
            invocation.channel_id,
            &invocation.user_name,
            invocation.user_id,
        );

        match ctx
            .state
            .engine
            .enqueue(invocation.guild_id, voice_channel, item, options)
            .await
        {
            Ok(_) => ctx.follow_up(&messages::track_loading(&title, &artist)).await,
            Err(e @ BotError::QueueFull(_)) => ctx.follow_up(e.user_message()).await,
            Err(e) => Err(e.into()),
        }
    }
}

fn is_supported_audio(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}
