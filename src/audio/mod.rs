//! # Audio Module
//!
//! Playback side of Open Echo. Everything that touches songbird lives here,
//! behind the [`PlaybackEngine`] trait so the command handlers and the
//! interruption coordinator can run against a fake in tests.
//!
//! ## Architecture
//!
//! ### [`player`] - Audio Player
//! - Songbird-backed [`PlaybackEngine`]: voice connections, music tracks,
//!   speech tracks, channel notifications
//!
//! ### [`queue`] - Queue Management
//! - Per-guild FIFO of pending tracks plus the current one
//!
//! ### [`reorder`] - Queue Reorder
//! - Validated move of a queued track between 1-based positions
//!
//! ### [`speech`] - Speech Synthesis
//! - Builds the synthesis source for a chat message
//!
//! ## Sessions
//!
//! A guild has a *session* while it has a music queue. Speech tracks are
//! played on the same voice connection but outside the queue, so pausing the
//! music does not stop them.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::BotError;

pub mod player;
pub mod queue;
pub mod reorder;
pub mod speech;

use queue::QueueItem;

/// Routing data attached to a play request so notifications reach the
/// channel the request came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayMetadata {
    pub reply_channel: ChannelId,
    pub requested_by: String,
    pub requester_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoLeavePolicy {
    pub on_empty: bool,
    pub empty_cooldown: Duration,
    pub on_end: bool,
}

impl Default for AutoLeavePolicy {
    fn default() -> Self {
        Self {
            on_empty: true,
            empty_cooldown: Duration::from_secs(300),
            on_end: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayOptions {
    pub metadata: PlayMetadata,
    pub auto_leave: AutoLeavePolicy,
}

/// A chat message to be spoken in a guild's voice channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub guild_id: GuildId,
    pub voice_channel: ChannelId,
    pub text: String,
    pub options: PlayOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutcome {
    Finished,
    Failed(String),
}

/// Resolves once the speech track stops, whether it finished or errored.
pub type SpeechCompletion = oneshot::Receiver<SpeechOutcome>;

/// Snapshot of a guild's music session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub current: Option<QueueItem>,
    pub playing: bool,
    pub queued: usize,
}

impl SessionStatus {
    pub fn is_paused(&self) -> bool {
        self.current.is_some() && !self.playing
    }
}

/// Operations the bot needs from the audio backend.
///
/// `pause` and `resume` are idempotent: resuming a playing session, or
/// pausing a paused one, succeeds without effect.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// `None` when the guild has no session.
    async fn status(&self, guild_id: GuildId) -> Option<SessionStatus>;

    async fn pause(&self, guild_id: GuildId) -> Result<(), BotError>;

    async fn resume(&self, guild_id: GuildId) -> Result<(), BotError>;

    /// Starts a speech track immediately, outside the music queue.
    async fn play_speech(&self, request: SpeechRequest) -> Result<SpeechCompletion, BotError>;

    /// Adds a music track, starting playback when the session is idle.
    /// Returns the track's 1-based queue position, 0 when it started at once.
    async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        item: QueueItem,
        options: PlayOptions,
    ) -> Result<usize, BotError>;

    async fn remove_queued(&self, guild_id: GuildId, index: usize) -> Option<QueueItem>;

    async fn insert_queued(&self, guild_id: GuildId, item: QueueItem, index: usize);
}
