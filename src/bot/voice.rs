use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use tracing::debug;

/// Live view of who sits in which voice channel.
pub trait VoiceMembership: Send + Sync {
    /// Voice channel `user_id` currently occupies in `guild_id`.
    fn voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;

    /// Non-bot users connected to `channel_id`.
    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> usize;
}

/// Voice-membership guard run before any command or message that touches
/// a playback session. `Some` iff the user occupies a voice channel of the
/// guild right now.
pub fn voice_guard(
    membership: &dyn VoiceMembership,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    let channel = membership.voice_channel(guild_id, user_id);
    if channel.is_none() {
        debug!("{} no está en un canal de voz de guild {}", user_id, guild_id);
    }
    channel
}

impl VoiceMembership for Cache {
    fn voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.guild(guild_id)?;
        guild
            .voice_states
            .get(&user_id)
            .and_then(|voice_state| voice_state.channel_id)
    }

    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> usize {
        let Some(guild) = self.guild(guild_id) else {
            return 0;
        };
        guild
            .voice_states
            .values()
            .filter(|voice_state| voice_state.channel_id == Some(channel_id))
            .filter(|voice_state| {
                let is_bot = voice_state
                    .member
                    .as_ref()
                    .map(|member| member.user.bot)
                    .or_else(|| guild.members.get(&voice_state.user_id).map(|m| m.user.bot))
                    .unwrap_or(false);
                !is_bot
            })
            .count()
    }
}
