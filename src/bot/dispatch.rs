//! Slash command dispatch.
//!
//! Every resolved invocation is deferred before its handler runs. A handler
//! that returns without replying gets a default acknowledgment; a handler
//! that fails or panics gets exactly one failure reply, sent as a follow-up
//! when the interaction was already acknowledged and as a private initial
//! reply when it was not.

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage,
    },
    http::Http,
    model::application::CommandInteraction,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    commands::{CommandContext, Invocation},
    voice::VoiceMembership,
};
use crate::{session::BotState, ui::messages};

/// Outbound half of an interaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    /// Acknowledges the interaction with a pending response.
    async fn defer(&self) -> Result<()>;

    /// Initial response. Only valid while the interaction is unacknowledged.
    async fn reply(&self, content: &str, ephemeral: bool) -> Result<()>;

    async fn follow_up(&self, content: &str) -> Result<()>;
}

/// Records which response forms have gone out through the wrapped responder.
struct TrackedResponder<'a> {
    inner: &'a dyn Responder,
    deferred: AtomicBool,
    responded: AtomicBool,
}

impl<'a> TrackedResponder<'a> {
    fn new(inner: &'a dyn Responder) -> Self {
        Self {
            inner,
            deferred: AtomicBool::new(false),
            responded: AtomicBool::new(false),
        }
    }

    fn acknowledged(&self) -> bool {
        self.deferred.load(Ordering::SeqCst) || self.responded.load(Ordering::SeqCst)
    }

    fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for TrackedResponder<'_> {
    async fn defer(&self) -> Result<()> {
        self.inner.defer().await?;
        self.deferred.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn reply(&self, content: &str, ephemeral: bool) -> Result<()> {
        self.inner.reply(content, ephemeral).await?;
        self.responded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn follow_up(&self, content: &str) -> Result<()> {
        self.inner.follow_up(content).await?;
        self.responded.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Runs the handler registered under `invocation.name`. Unknown names are
/// dropped without a reply.
pub async fn dispatch(
    state: &BotState,
    invocation: &Invocation,
    responder: &dyn Responder,
    membership: &dyn VoiceMembership,
) {
    let handler = match state.commands.resolve(&invocation.name) {
        Ok(handler) => handler,
        Err(e) => {
            debug!("Comando ignorado: {}", e);
            return;
        }
    };

    info!(
        "⚡ /{} de {} en guild {}",
        invocation.name, invocation.user_name, invocation.guild_id
    );

    let tracked = TrackedResponder::new(responder);
    let outcome = match tracked.defer().await {
        Ok(()) => {
            let ctx = CommandContext {
                invocation,
                responder: &tracked,
                membership,
                state,
            };
            AssertUnwindSafe(handler.execute(&ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow!("handler panicked: {}", panic_message(&*panic)))
                })
        }
        Err(e) => Err(e.context("could not defer the interaction")),
    };

    match outcome {
        Ok(()) if tracked.responded() => {}
        Ok(()) => {
            if let Err(e) = tracked.follow_up(messages::COMMAND_DONE).await {
                warn!("No se pudo confirmar /{}: {:?}", invocation.name, e);
            }
        }
        Err(e) => {
            error!("❌ Error ejecutando /{}: {:?}", invocation.name, e);
            report_failure(&tracked).await;
        }
    }
}

async fn report_failure(tracked: &TrackedResponder<'_>) {
    let sent = if tracked.acknowledged() {
        tracked.follow_up(messages::COMMAND_FAILED).await
    } else {
        tracked.reply(messages::COMMAND_FAILED, true).await
    };

    if let Err(e) = sent {
        warn!("No se pudo enviar el aviso de error: {:?}", e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// [`Responder`] over a live serenity command interaction.
pub struct InteractionResponder<'a> {
    http: Arc<Http>,
    command: &'a CommandInteraction,
}

impl<'a> InteractionResponder<'a> {
    pub fn new(http: Arc<Http>, command: &'a CommandInteraction) -> Self {
        Self { http, command }
    }
}

#[async_trait]
impl Responder for InteractionResponder<'_> {
    async fn defer(&self) -> Result<()> {
        self.command
            .create_response(
                &self.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await
            .context("defer")
    }

    async fn reply(&self, content: &str, ephemeral: bool) -> Result<()> {
        self.command
            .create_response(
                &self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(ephemeral),
                ),
            )
            .await
            .context("reply")
    }

    async fn follow_up(&self, content: &str) -> Result<()> {
        self.command
            .create_followup(
                &self.http,
                CreateInteractionResponseFollowup::new().content(content),
            )
            .await
            .context("follow-up")?;
        Ok(())
    }
}
