//! Chat-facing strings. Every reply the bot sends is built here so the
//! wording stays consistent between handlers and engine notifications.

use crate::audio::queue::QueueItem;

pub const NOT_IN_VOICE: &str = "❌ | You are not in a voice channel!";
pub const TTS_NEEDS_VOICE: &str = "❌ | You need to be in a voice channel to use TTS.";
pub const COMMAND_FAILED: &str = "❌ | An error occurred while executing the command!";
pub const COMMAND_DONE: &str = "✅ | Done!";
pub const DEPLOY_SUCCEEDED: &str = "✅ | Commands deployed successfully!";

pub const PAUSED: &str = "⏸ | Paused!";
pub const RESUMED: &str = "▶️ | Resumed!";
pub const SOMETHING_WENT_WRONG: &str = "❌ | Something went wrong!";

pub const QUEUE_FINISHED: &str = "✅ | Queue finished!";
pub const MANUALLY_DISCONNECTED: &str =
    "❌ | I was manually disconnected from the voice channel, clearing queue!";
pub const CHANNEL_EMPTY: &str = "❌ | Nobody is in the voice channel, leaving...";

pub fn echo_state(enabled: bool) -> String {
    let state = if enabled { "on" } else { "off" };
    format!("✅ | Echo is now **{state}** for your messages.")
}

pub fn track_moved(track: &QueueItem) -> String {
    format!("✅ | Moved **{track}**!")
}

pub fn track_added(track: &QueueItem) -> String {
    format!("🎶 | Song **{}** added to the queue!", track.title)
}

pub fn track_started(track: &QueueItem) -> String {
    format!("▶ | Started playing: **{}**!", track.title)
}

pub fn track_loading(title: &str, artist: &str) -> String {
    format!("⏱ | Loading your track: **{title}** by **{artist}**...")
}
