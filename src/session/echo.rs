use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{GuildId, UserId};
use std::collections::HashMap;
use tracing::debug;

/// Which users have their chat messages spoken, per guild.
///
/// A guild entry exists only while at least one user under it is stored.
/// Disabling is stored as absence, so `set_echo(.., false)` on the last user
/// drops the guild entry as well.
#[derive(Debug, Default)]
pub struct EchoRegistry {
    guilds: DashMap<GuildId, HashMap<UserId, bool>>,
}

impl EchoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_echo(&self, guild_id: GuildId, user_id: UserId, enabled: bool) {
        if !enabled {
            self.clear_user(guild_id, user_id);
            return;
        }

        self.guilds
            .entry(guild_id)
            .or_default()
            .insert(user_id, true);
        debug!("🗣️ Echo activado para {} en guild {}", user_id, guild_id);
    }

    pub fn is_echo_enabled(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.guilds
            .get(&guild_id)
            .and_then(|users| users.get(&user_id).copied())
            .unwrap_or(false)
    }

    pub fn clear_user(&self, guild_id: GuildId, user_id: UserId) {
        if let Entry::Occupied(mut guild) = self.guilds.entry(guild_id) {
            if guild.get_mut().remove(&user_id).is_some() {
                debug!("🔇 Echo desactivado para {} en guild {}", user_id, guild_id);
            }
            if guild.get().is_empty() {
                guild.remove();
            }
        }
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }
}
