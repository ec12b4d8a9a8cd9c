//! # Bot Module
//!
//! Gateway side of Open Echo: the serenity [`EventHandler`] and everything
//! it routes events into.
//!
//! - [`chat`] - plain messages: deploy trigger and spoken echo
//! - [`commands`] - command schema, registry and handler context
//! - [`deploy`] - guild-scoped command publication
//! - [`dispatch`] - defer, run, acknowledge
//! - [`events`] - voice presence changes and auto-leave timers
//! - [`handlers`] - the slash commands themselves
//! - [`voice`] - who sits in which voice channel
//!
//! The handler owns no domain state of its own. Echo flags, the command
//! registry and the interruption coordinator live in [`BotState`], which is
//! shared with the playback engine adapter built in `main`.

use serenity::{
    all::{
        ActivityData, Context, EventHandler, GuildId, Interaction, Message, OnlineStatus, Ready,
        VoiceState,
    },
    async_trait,
    http::Http,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod chat;
pub mod commands;
pub mod deploy;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod voice;

use crate::{audio::player::AudioPlayer, session::BotState, ui::messages};
use chat::{ChannelReplier, ChatPorts, IncomingMessage};
use commands::Invocation;
use deploy::{CommandPublisher, Deployer, HttpApplicationOwner, HttpPublisher};
use dispatch::InteractionResponder;
use events::{EmptyChannelTimers, PresenceChange};
use voice::VoiceMembership;

pub struct OpenEchoBot {
    state: Arc<BotState>,
    player: AudioPlayer,
    owner: HttpApplicationOwner,
    publisher: HttpPublisher,
    empty_timers: EmptyChannelTimers,
}

impl OpenEchoBot {
    pub fn new(state: Arc<BotState>, player: AudioPlayer, http: Arc<Http>) -> Self {
        Self {
            state,
            player,
            owner: HttpApplicationOwner::new(http.clone()),
            publisher: HttpPublisher::new(http),
            empty_timers: EmptyChannelTimers::new(),
        }
    }

    async fn publish_dev_commands(&self) {
        let Some(guild_id) = self.state.config.dev_guild_id else {
            return;
        };
        let guild_id = GuildId::new(guild_id);

        info!("🏠 Registrando comandos para guild de desarrollo: {}", guild_id);
        if let Err(e) = self
            .publisher
            .publish(guild_id, self.state.commands.descriptors())
            .await
        {
            error!("❌ Error registrando comandos de guild: {}", e);
        }
    }

    /// Starts or cancels the auto-leave timer of the bot's channel.
    async fn check_empty_channel(&self, ctx: &Context, guild_id: GuildId) {
        let Some(channel_id) = self.player.connected_channel(guild_id).await else {
            self.empty_timers.cancel(guild_id);
            return;
        };
        let Some(policy) = self
            .player
            .auto_leave_policy(guild_id)
            .filter(|policy| policy.on_empty)
        else {
            return;
        };

        let listeners = ctx.cache.listeners(guild_id, channel_id);
        let player = self.player.clone();
        let leave = async move {
            player.notify(guild_id, messages::CHANNEL_EMPTY).await;
            if let Err(e) = player.leave(guild_id).await {
                warn!("Error al salir del canal vacío en guild {}: {}", guild_id, e);
            }
        };
        let action = self
            .empty_timers
            .update(guild_id, listeners, policy.empty_cooldown, leave);
        debug!("Auto-salida en guild {}: {:?}", guild_id, action);
    }
}

#[async_trait]
impl EventHandler for OpenEchoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_presence(
            Some(ActivityData::listening("Music & Commands")),
            OnlineStatus::Online,
        );

        self.publish_dev_commands().await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let message = IncomingMessage::from(&msg);
        let replier = ChannelReplier::new(ctx.http.clone(), msg.channel_id);
        let ports = ChatPorts {
            replier: &replier,
            membership: &*ctx.cache,
            deployer: Deployer {
                owner: &self.owner,
                publisher: &self.publisher,
            },
        };

        chat::handle_message(&self.state, &message, &ports).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(invocation) = Invocation::from_interaction(&command) else {
            debug!("Comando /{} fuera de un servidor, ignorado", command.data.name);
            return;
        };

        let responder = InteractionResponder::new(ctx.http.clone(), &command);
        dispatch::dispatch(&self.state, &invocation, &responder, &*ctx.cache).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let change = events::classify(
            ctx.cache.current_user().id,
            new.user_id,
            new.guild_id,
            old.and_then(|state| state.channel_id),
            new.channel_id,
        );

        if let Some(change) = change {
            events::forget_departed(&self.state, change);
        }

        match change {
            Some(PresenceChange::UserLeft { guild_id, .. }) => {
                self.check_empty_channel(&ctx, guild_id).await;
            }
            Some(PresenceChange::BotDisconnected { guild_id }) => {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                self.empty_timers.cancel(guild_id);
                self.player
                    .notify(guild_id, messages::MANUALLY_DISCONNECTED)
                    .await;
                if let Err(e) = self.player.leave(guild_id).await {
                    error!("Error al limpiar la sesión en guild {}: {}", guild_id, e);
                }
            }
            Some(PresenceChange::Moved { guild_id }) => {
                self.check_empty_channel(&ctx, guild_id).await;
            }
            None => {}
        }
    }
}
