//! Voice presence handling: who left, whether the bot was kicked, and the
//! empty-channel auto-leave timers.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::BotState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// A user is no longer in any voice channel of the guild.
    UserLeft { guild_id: GuildId, user_id: UserId },
    /// The bot was removed from its voice channel by someone else.
    BotDisconnected { guild_id: GuildId },
    /// Anything else; only the listener count may have changed.
    Moved { guild_id: GuildId },
}

/// Classifies a voice state update. `None` outside guilds.
pub fn classify(
    bot_id: UserId,
    user_id: UserId,
    guild_id: Option<GuildId>,
    old_channel: Option<ChannelId>,
    new_channel: Option<ChannelId>,
) -> Option<PresenceChange> {
    let guild_id = guild_id?;
    let change = match (user_id == bot_id, old_channel, new_channel) {
        (true, Some(_), None) => PresenceChange::BotDisconnected { guild_id },
        (false, _, None) => PresenceChange::UserLeft { guild_id, user_id },
        _ => PresenceChange::Moved { guild_id },
    };
    Some(change)
}

/// Drops the session state a presence change invalidates. Voice teardown
/// is left to the caller.
pub fn forget_departed(state: &BotState, change: PresenceChange) {
    if let PresenceChange::UserLeft { guild_id, user_id } = change {
        state.echo.clear_user(guild_id, user_id);
        debug!("Echo activo en {} guilds", state.echo.guild_count());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Scheduled,
    AlreadyPending,
    Cancelled,
    Unchanged,
}

/// One pending auto-leave per guild.
#[derive(Default)]
pub struct EmptyChannelTimers {
    timers: DashMap<GuildId, JoinHandle<()>>,
}

impl EmptyChannelTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `leave` after `cooldown` when the channel has no listeners
    /// and cancels the pending leave when someone is back.
    pub fn update<F>(
        &self,
        guild_id: GuildId,
        listeners: usize,
        cooldown: Duration,
        leave: F,
    ) -> TimerAction
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if listeners > 0 {
            return if self.cancel(guild_id) {
                info!("🔔 Alguien volvió, auto-salida cancelada en guild {}", guild_id);
                TimerAction::Cancelled
            } else {
                TimerAction::Unchanged
            };
        }

        let pending = self
            .timers
            .get(&guild_id)
            .is_some_and(|timer| !timer.is_finished());
        if pending {
            return TimerAction::AlreadyPending;
        }

        info!(
            "🚪 Canal vacío, saliendo en {} de guild {}",
            humantime::format_duration(cooldown),
            guild_id
        );
        let timer = tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            leave.await;
        });
        self.timers.insert(guild_id, timer);
        TimerAction::Scheduled
    }

    /// Aborts the guild's pending leave, if any.
    pub fn cancel(&self, guild_id: GuildId) -> bool {
        match self.timers.remove(&guild_id) {
            Some((_, timer)) if !timer.is_finished() => {
                timer.abort();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, testing::FakeEngine};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const BOT: UserId = UserId::new(100);
    const GUILD: GuildId = GuildId::new(1);

    fn leave(fired: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let fired = fired.clone();
        async move {
            fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn classifies_presence_changes() {
        let channel = Some(ChannelId::new(5));
        let user = UserId::new(7);

        assert_eq!(
            classify(BOT, user, Some(GUILD), channel, None),
            Some(PresenceChange::UserLeft { guild_id: GUILD, user_id: user })
        );
        assert_eq!(
            classify(BOT, BOT, Some(GUILD), channel, None),
            Some(PresenceChange::BotDisconnected { guild_id: GUILD })
        );
        assert_eq!(
            classify(BOT, BOT, Some(GUILD), None, channel),
            Some(PresenceChange::Moved { guild_id: GUILD })
        );
        assert_eq!(
            classify(BOT, user, Some(GUILD), None, channel),
            Some(PresenceChange::Moved { guild_id: GUILD })
        );
        assert_eq!(classify(BOT, user, None, channel, None), None);
    }

    #[test]
    fn leaving_voice_turns_echo_off() {
        let state = BotState::new(Arc::new(Config::default()), Arc::new(FakeEngine::idle()));
        let user = UserId::new(7);
        let other = UserId::new(8);
        state.echo.set_echo(GUILD, user, true);
        state.echo.set_echo(GuildId::new(2), user, true);

        let moved = classify(BOT, user, Some(GUILD), None, Some(ChannelId::new(5)));
        forget_departed(&state, moved.unwrap());
        assert!(state.echo.is_echo_enabled(GUILD, user));

        let left = classify(BOT, user, Some(GUILD), Some(ChannelId::new(5)), None);
        forget_departed(&state, left.unwrap());

        assert!(!state.echo.is_echo_enabled(GUILD, user));
        assert!(state.echo.is_echo_enabled(GuildId::new(2), user));
        assert!(!state.echo.is_echo_enabled(GUILD, other));
        assert_eq!(state.echo.guild_count(), 1);
    }

    #[tokio::test]
    async fn empty_channel_leaves_after_cooldown() {
        let timers = EmptyChannelTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let action = timers.update(GUILD, 0, Duration::from_millis(10), leave(&fired));
        assert_eq!(action, TimerAction::Scheduled);
        assert_eq!(
            timers.update(GUILD, 0, Duration::from_millis(10), leave(&fired)),
            TimerAction::AlreadyPending
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejoining_listener_cancels_pending_leave() {
        let timers = EmptyChannelTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.update(GUILD, 0, Duration::from_millis(30), leave(&fired));
        let action = timers.update(GUILD, 1, Duration::from_millis(30), leave(&fired));

        assert_eq!(action, TimerAction::Cancelled);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn finished_timer_can_be_rescheduled() {
        let timers = EmptyChannelTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.update(GUILD, 0, Duration::from_millis(1), leave(&fired));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(
            timers.update(GUILD, 0, Duration::from_millis(1), leave(&fired)),
            TimerAction::Scheduled
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
