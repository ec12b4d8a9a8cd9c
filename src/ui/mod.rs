//! # UI Module
//!
//! Text rendering for chat replies and playback notifications.

pub mod messages;
