//! # Session Module
//!
//! Process-wide state shared by the chat and command paths.
//!
//! - [`echo`] - who gets their chat messages spoken, per guild
//! - [`interruption`] - pausing music around speech tracks
//!
//! [`BotState`] is built once at startup and passed by reference into the
//! dispatch gateway and the chat path. It lives until the process exits.

use serenity::model::id::{ChannelId, UserId};
use std::sync::Arc;

pub mod echo;
pub mod interruption;

use crate::{
    audio::{AutoLeavePolicy, PlayMetadata, PlayOptions, PlaybackEngine},
    bot::{commands::CommandRegistry, handlers},
    config::Config,
};
use echo::EchoRegistry;
use interruption::InterruptionCoordinator;

pub struct BotState {
    pub config: Arc<Config>,
    pub echo: EchoRegistry,
    pub engine: Arc<dyn PlaybackEngine>,
    pub interrupter: InterruptionCoordinator,
    pub commands: CommandRegistry,
}

impl BotState {
    pub fn new(config: Arc<Config>, engine: Arc<dyn PlaybackEngine>) -> Self {
        let mut commands = CommandRegistry::new();
        for handler in handlers::all() {
            commands.register(handler);
        }

        Self {
            config,
            echo: EchoRegistry::new(),
            interrupter: InterruptionCoordinator::new(engine.clone()),
            engine,
            commands,
        }
    }

    /// Options attached to every play request made on behalf of a user.
    pub fn play_options(
        &self,
        reply_channel: ChannelId,
        requested_by: impl Into<String>,
        requester_id: UserId,
    ) -> PlayOptions {
        PlayOptions {
            metadata: PlayMetadata {
                reply_channel,
                requested_by: requested_by.into(),
                requester_id,
            },
            auto_leave: AutoLeavePolicy {
                on_empty: self.config.leave_on_empty,
                empty_cooldown: self.config.leave_on_empty_cooldown,
                on_end: self.config.leave_on_end,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use std::time::Duration;

    #[tokio::test]
    async fn registers_every_command_and_applies_config_policy() {
        let config = Config {
            leave_on_empty: false,
            leave_on_empty_cooldown: Duration::from_secs(30),
            leave_on_end: true,
            ..Config::default()
        };
        let state = BotState::new(Arc::new(config), Arc::new(FakeEngine::idle()));

        let names: Vec<String> = state
            .commands
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["echo", "move", "pause", "playfile"]);

        let options = state.play_options(ChannelId::new(3), "ana", UserId::new(4));
        assert_eq!(options.metadata.requested_by, "ana");
        assert_eq!(
            options.auto_leave,
            AutoLeavePolicy {
                on_empty: false,
                empty_cooldown: Duration::from_secs(30),
                on_end: true,
            }
        );
    }
}
