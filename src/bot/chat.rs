//! Plain chat messages: the deploy trigger and spoken echo.

use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    http::Http,
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    deploy::Deployer,
    voice::{voice_guard, VoiceMembership},
};
use crate::{audio::SpeechRequest, session::BotState, ui::messages};

#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
}

impl From<&Message> for IncomingMessage {
    fn from(message: &Message) -> Self {
        Self {
            guild_id: message.guild_id,
            channel_id: message.channel_id,
            author_id: message.author.id,
            author_name: message.author.name.clone(),
            author_is_bot: message.author.bot,
            content: message.content.clone(),
        }
    }
}

/// Answers in the channel a message came from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, content: &str) -> Result<()>;
}

pub struct ChannelReplier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelReplier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Replier for ChannelReplier {
    async fn reply(&self, content: &str) -> Result<()> {
        self.channel_id.say(&self.http, content).await?;
        Ok(())
    }
}

pub struct ChatPorts<'a> {
    pub replier: &'a dyn Replier,
    pub membership: &'a dyn VoiceMembership,
    pub deployer: Deployer<'a>,
}

pub async fn handle_message(state: &BotState, message: &IncomingMessage, ports: &ChatPorts<'_>) {
    if message.author_is_bot {
        return;
    }
    let Some(guild_id) = message.guild_id else {
        return;
    };

    let deployed = ports
        .deployer
        .handle(&state.config, &state.commands, message, guild_id, ports.replier)
        .await;
    if deployed {
        return;
    }

    if !state.echo.is_echo_enabled(guild_id, message.author_id) {
        return;
    }

    let Some(voice_channel) = voice_guard(ports.membership, guild_id, message.author_id) else {
        if let Err(e) = ports.replier.reply(messages::TTS_NEEDS_VOICE).await {
            warn!("No se pudo responder a {}: {:?}", message.author_name, e);
        }
        return;
    };

    // Solo adjuntos o embeds: nada que leer
    if message.content.trim().is_empty() {
        debug!("Mensaje sin texto de {}, ignorado", message.author_name);
        return;
    }

    debug!("🗣️ Leyendo mensaje de {} en guild {}", message.author_name, guild_id);
    let request = SpeechRequest {
        guild_id,
        voice_channel,
        text: message.content.clone(),
        options: state.play_options(message.channel_id, &message.author_name, message.author_id),
    };
    state.interrupter.interrupt(request).await;
}
