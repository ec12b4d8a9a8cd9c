//! Error taxonomy shared by the command handlers, the interruption
//! coordinator and the playback engine adapter.

use std::fmt::Display;
use thiserror::Error;

use crate::ui::messages;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// The invoking user is not connected to a voice channel in the guild.
    #[error("user is not in a voice channel")]
    NotInVoiceChannel,

    /// No playback session, or a session without a current track.
    #[error("no active playback session")]
    NoActiveSession,

    /// A 1-based queue position that falls past the queue depth.
    #[error("position {position} is beyond queue depth {depth}")]
    PositionOutOfRange { position: i64, depth: usize },

    /// The index passed validation but no track sat there when removed.
    #[error("no queued track at index {0}")]
    TrackNotFound(usize),

    #[error("queue is full (max {0} tracks)")]
    QueueFull(usize),

    #[error("unsupported file format: {0}")]
    UnsupportedFile(String),

    #[error("playback engine error: {0}")]
    Playback(String),

    #[error("command publication failed: {0}")]
    Publication(String),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),
}

impl BotError {
    pub fn playback(err: impl Display) -> Self {
        Self::Playback(err.to_string())
    }

    pub fn publication(err: impl Display) -> Self {
        Self::Publication(err.to_string())
    }

    /// Message shown in chat when this error is surfaced to a user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotInVoiceChannel => messages::NOT_IN_VOICE,
            Self::NoActiveSession => "❌ | No music is being played!",
            Self::PositionOutOfRange { .. } => "❌ | Track number greater than queue depth!",
            Self::TrackNotFound(_) => "❌ | Could not find the track to move!",
            Self::QueueFull(_) => "❌ | The queue is full!",
            Self::UnsupportedFile(_) => {
                "❌ | Unsupported file format! Please upload an audio file (MP3, WAV, FLAC, OGG, M4A)."
            }
            Self::Playback(_) => "❌ | Something went wrong!",
            Self::Publication(_) => "❌ | Failed to deploy commands! Check the logs for details.",
            Self::UnknownCommand(_) => "❌ | Unknown command.",
        }
    }
}
