//! Test doubles for the playback and voice-membership seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::audio::queue::QueueItem;
use crate::audio::{
    AutoLeavePolicy, PlayMetadata, PlayOptions, PlaybackEngine, SessionStatus, SpeechCompletion,
    SpeechOutcome, SpeechRequest,
};
use crate::bot::voice::VoiceMembership;
use crate::error::BotError;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Status,
    Pause,
    Resume,
    PlaySpeech(String),
    Enqueue(String),
    Remove(usize),
    Insert(String, usize),
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pub current: Option<QueueItem>,
    pub playing: bool,
    pub queue: Vec<QueueItem>,
}

/// In-memory engine that records every call it receives.
#[derive(Default)]
pub struct FakeEngine {
    pub session: Mutex<Option<FakeSession>>,
    pub calls: Mutex<Vec<EngineCall>>,
    pub completions: Mutex<Vec<oneshot::Sender<SpeechOutcome>>>,
    pub speech_requests: Mutex<Vec<SpeechRequest>>,
    pub fail_speech: Mutex<bool>,
    pub fail_pause: Mutex<bool>,
    pub fail_resume: Mutex<bool>,
}

impl FakeEngine {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn playing(titles: &[&str]) -> Self {
        let engine = Self::default();
        *engine.session.lock() = Some(FakeSession {
            current: Some(track("current")),
            playing: true,
            queue: titles.iter().map(|t| track(t)).collect(),
        });
        engine
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Calls other than status lookups.
    pub fn actions(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != EngineCall::Status)
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn queue_titles(&self) -> Vec<String> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.queue.iter().map(|t| t.title.clone()).collect())
            .unwrap_or_default()
    }

    /// Every speech request received, in order.
    pub fn speech_requests(&self) -> Vec<SpeechRequest> {
        self.speech_requests.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.session.lock().as_ref().is_some_and(|s| s.playing)
    }

    /// Fires the completion of the oldest in-flight speech track.
    pub fn finish_speech(&self, outcome: SpeechOutcome) {
        let sender = self.completions.lock().remove(0);
        let _ = sender.send(outcome);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackEngine for FakeEngine {
    async fn status(&self, _guild_id: GuildId) -> Option<SessionStatus> {
        self.record(EngineCall::Status);
        self.session.lock().as_ref().map(|s| SessionStatus {
            current: s.current.clone(),
            playing: s.playing,
            queued: s.queue.len(),
        })
    }

    async fn pause(&self, _guild_id: GuildId) -> Result<(), BotError> {
        self.record(EngineCall::Pause);
        if *self.fail_pause.lock() {
            return Err(BotError::playback("pause refused"));
        }
        if let Some(session) = self.session.lock().as_mut() {
            session.playing = false;
        }
        Ok(())
    }

    async fn resume(&self, _guild_id: GuildId) -> Result<(), BotError> {
        self.record(EngineCall::Resume);
        if *self.fail_resume.lock() {
            return Err(BotError::playback("resume refused"));
        }
        if let Some(session) = self.session.lock().as_mut() {
            if session.current.is_some() {
                session.playing = true;
            }
        }
        Ok(())
    }

    async fn play_speech(&self, request: SpeechRequest) -> Result<SpeechCompletion, BotError> {
        self.record(EngineCall::PlaySpeech(request.text.clone()));
        self.speech_requests.lock().push(request);
        if *self.fail_speech.lock() {
            return Err(BotError::playback("synthesis failed"));
        }
        let (tx, rx) = oneshot::channel();
        self.completions.lock().push(tx);
        Ok(rx)
    }

    async fn enqueue(
        &self,
        _guild_id: GuildId,
        _voice_channel: ChannelId,
        item: QueueItem,
        _options: PlayOptions,
    ) -> Result<usize, BotError> {
        self.record(EngineCall::Enqueue(item.title.clone()));
        let mut session = self.session.lock();
        let session = session.get_or_insert_with(FakeSession::default);
        if session.current.is_none() {
            session.current = Some(item);
            session.playing = true;
            Ok(0)
        } else {
            session.queue.push(item);
            Ok(session.queue.len())
        }
    }

    async fn remove_queued(&self, _guild_id: GuildId, index: usize) -> Option<QueueItem> {
        self.record(EngineCall::Remove(index));
        let mut session = self.session.lock();
        let queue = &mut session.as_mut()?.queue;
        (index < queue.len()).then(|| queue.remove(index))
    }

    async fn insert_queued(&self, _guild_id: GuildId, item: QueueItem, index: usize) {
        self.record(EngineCall::Insert(item.title.clone(), index));
        if let Some(session) = self.session.lock().as_mut() {
            let index = index.min(session.queue.len());
            session.queue.insert(index, item);
        }
    }
}

/// Voice membership backed by a fixed map.
#[derive(Default)]
pub struct StaticMembership(pub HashMap<(GuildId, UserId), ChannelId>);

impl StaticMembership {
    pub fn with(guild_id: GuildId, user_id: UserId, channel_id: ChannelId) -> Self {
        let mut map = HashMap::new();
        map.insert((guild_id, user_id), channel_id);
        Self(map)
    }
}

impl VoiceMembership for StaticMembership {
    fn voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.0.get(&(guild_id, user_id)).copied()
    }

    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> usize {
        self.0
            .iter()
            .filter(|((g, _), c)| *g == guild_id && **c == channel_id)
            .count()
    }
}

pub fn track(title: &str) -> QueueItem {
    QueueItem::new(title, format!("https://cdn.example/{title}.mp3"), UserId::new(1))
}

pub fn speech(guild: u64, text: &str) -> SpeechRequest {
    SpeechRequest {
        guild_id: GuildId::new(guild),
        voice_channel: ChannelId::new(50),
        text: text.to_string(),
        options: PlayOptions {
            metadata: PlayMetadata {
                reply_channel: ChannelId::new(60),
                requested_by: "tester".to_string(),
                requester_id: UserId::new(7),
            },
            auto_leave: AutoLeavePolicy {
                on_empty: true,
                empty_cooldown: Duration::from_secs(300),
                on_end: false,
            },
        },
    }
}
