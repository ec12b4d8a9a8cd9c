//! Guild-scoped re-publication of the slash command set, triggered by a
//! chat message from an authorized user.

use async_trait::async_trait;
use serenity::{
    http::Http,
    model::id::{GuildId, UserId},
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::{
    chat::{IncomingMessage, Replier},
    commands::{CommandDescriptor, CommandRegistry},
};
use crate::{config::Config, error::BotError, ui::messages};

/// Pushes a command set to the chat platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Replaces every command published in `guild_id` with `commands`.
    async fn publish(
        &self,
        guild_id: GuildId,
        commands: Vec<CommandDescriptor>,
    ) -> Result<(), BotError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationOwner: Send + Sync {
    /// Owner reported by the platform, `None` when it cannot be looked up.
    async fn owner(&self) -> Option<UserId>;
}

pub struct Deployer<'a> {
    pub owner: &'a dyn ApplicationOwner,
    pub publisher: &'a dyn CommandPublisher,
}

impl Deployer<'_> {
    /// Publishes `registry` to the message's guild when the message is the
    /// deploy trigger sent by an authorized user. Returns `false`, having
    /// done nothing, otherwise.
    pub async fn handle(
        &self,
        config: &Config,
        registry: &CommandRegistry,
        message: &IncomingMessage,
        guild_id: GuildId,
        replier: &dyn Replier,
    ) -> bool {
        if message.content != config.deploy_trigger {
            return false;
        }
        if !self.authorizes(config, message.author_id).await {
            info!(
                "🚫 Despliegue ignorado: {} no está autorizado",
                message.author_name
            );
            return false;
        }

        info!(
            "📝 Desplegando {} comandos en guild {} por {}",
            registry.len(),
            guild_id,
            message.author_name
        );

        let reply = match self.publisher.publish(guild_id, registry.descriptors()).await {
            Ok(()) => {
                info!("✅ Comandos desplegados en guild {}", guild_id);
                messages::DEPLOY_SUCCEEDED
            }
            Err(e) => {
                error!("❌ Error desplegando comandos en guild {}: {}", guild_id, e);
                e.user_message()
            }
        };

        if let Err(e) = replier.reply(reply).await {
            warn!("No se pudo responder al despliegue: {:?}", e);
        }
        true
    }

    async fn authorizes(&self, config: &Config, user_id: UserId) -> bool {
        if config.deploy_allowed_users.contains(&user_id.get()) {
            return true;
        }
        self.owner.owner().await == Some(user_id)
    }
}

pub struct HttpPublisher {
    http: Arc<Http>,
}

impl HttpPublisher {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommandPublisher for HttpPublisher {
    async fn publish(
        &self,
        guild_id: GuildId,
        commands: Vec<CommandDescriptor>,
    ) -> Result<(), BotError> {
        let builders = commands.iter().map(CommandDescriptor::to_builder).collect();
        let published = guild_id
            .set_commands(&self.http, builders)
            .await
            .map_err(BotError::publication)?;
        info!("📝 {} comandos registrados en guild {}", published.len(), guild_id);
        Ok(())
    }
}

/// Looks the owner up once and keeps it; failed lookups are retried.
pub struct HttpApplicationOwner {
    http: Arc<Http>,
    owner: OnceCell<Option<UserId>>,
}

impl HttpApplicationOwner {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            owner: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ApplicationOwner for HttpApplicationOwner {
    async fn owner(&self) -> Option<UserId> {
        let lookup = self
            .owner
            .get_or_try_init(|| async {
                let info = self.http.get_current_application_info().await?;
                Ok::<_, serenity::Error>(info.owner.map(|user| user.id))
            })
            .await;

        match lookup {
            Ok(owner) => *owner,
            Err(e) => {
                warn!("No se pudo obtener el dueño de la aplicación: {:?}", e);
                None
            }
        }
    }
}
