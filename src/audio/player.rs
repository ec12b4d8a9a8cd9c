use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{MusicQueue, QueueItem},
        speech::SpeechSynthesizer,
        AutoLeavePolicy, PlayOptions, PlaybackEngine, SessionStatus, SpeechCompletion,
        SpeechOutcome, SpeechRequest,
    },
    config::Config,
    error::BotError,
    ui::messages,
};

/// Songbird-backed playback engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AudioPlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    manager: Arc<Songbird>,
    http: Arc<Http>,
    client: reqwest::Client,
    synthesizer: SpeechSynthesizer,
    default_volume: f32,
    max_queue_size: usize,
    queues: DashMap<GuildId, Arc<RwLock<MusicQueue>>>,
    current_tracks: DashMap<GuildId, TrackHandle>,
    options: DashMap<GuildId, PlayOptions>,
}

impl AudioPlayer {
    pub fn new(manager: Arc<Songbird>, http: Arc<Http>, config: &Config) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                manager,
                http,
                client: reqwest::Client::new(),
                synthesizer: SpeechSynthesizer::new(config.tts_language.clone(), config.tts_slow),
                default_volume: config.default_volume,
                max_queue_size: config.max_queue_size,
                queues: DashMap::new(),
                current_tracks: DashMap::new(),
                options: DashMap::new(),
            }),
        }
    }

    /// Reproduce la siguiente canción en la cola
    pub async fn play_next(&self, guild_id: GuildId) -> Result<(), BotError> {
        let Some(queue) = self.queue(guild_id) else {
            debug!("Sin sesión para guild {}", guild_id);
            return Ok(());
        };

        let next_track = queue.write().next_track();

        let Some(item) = next_track else {
            self.inner.current_tracks.remove(&guild_id);
            self.notify(guild_id, messages::QUEUE_FINISHED).await;

            let leave_on_end = self
                .auto_leave_policy(guild_id)
                .is_some_and(|policy| policy.on_end);
            if leave_on_end {
                self.leave(guild_id).await?;
            }
            return Ok(());
        };

        let call = self
            .inner
            .manager
            .get(guild_id)
            .ok_or_else(|| BotError::playback("no voice connection"))?;

        info!(
            "🎵 Reproduciendo: {} en guild {} (pedido por {} a las {})",
            item.title,
            guild_id,
            item.requested_by,
            item.added_at.format("%H:%M:%S")
        );
        let input = HttpRequest::new(self.inner.client.clone(), item.url.clone());
        let track_handle = call.lock().await.play_input(input.into());
        let _ = track_handle.set_volume(self.inner.default_volume);

        // End y Error avanzan la cola
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(
                    Event::Track(event),
                    TrackEndHandler {
                        player: self.clone(),
                        guild_id,
                        track: track_handle.clone(),
                    },
                )
                .map_err(BotError::playback)?;
        }

        self.inner.current_tracks.insert(guild_id, track_handle);
        self.notify(guild_id, &messages::track_started(&item)).await;

        Ok(())
    }

    /// Detiene la reproducción y cierra la sesión
    pub async fn stop(&self, guild_id: GuildId) {
        if let Some((_, track)) = self.inner.current_tracks.remove(&guild_id) {
            let _ = track.stop();
        }
        if let Some((_, queue)) = self.inner.queues.remove(&guild_id) {
            let mut queue = queue.write();
            if !queue.is_empty() {
                debug!("Descartando {} tracks en cola de guild {}", queue.len(), guild_id);
            }
            queue.clear();
        }
        info!("⏹️ Reproducción detenida en guild {}", guild_id);
    }

    /// Sale del canal de voz y descarta la sesión
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), BotError> {
        self.stop(guild_id).await;
        self.inner.options.remove(&guild_id);
        if self.inner.manager.get(guild_id).is_some() {
            self.inner
                .manager
                .remove(guild_id)
                .await
                .map_err(BotError::playback)?;
        }
        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Sends `content` to the channel the guild's last request came from.
    pub async fn notify(&self, guild_id: GuildId, content: &str) {
        let channel = self
            .inner
            .options
            .get(&guild_id)
            .map(|options| options.metadata.reply_channel);

        if let Some(channel) = channel {
            if let Err(e) = channel.say(&self.inner.http, content).await {
                warn!("No se pudo notificar en guild {}: {:?}", guild_id, e);
            }
        }
    }

    pub fn auto_leave_policy(&self, guild_id: GuildId) -> Option<AutoLeavePolicy> {
        self.inner
            .options
            .get(&guild_id)
            .map(|options| options.auto_leave)
    }

    /// Voice channel the bot is connected to in this guild.
    pub async fn connected_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.inner.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }

    async fn call_for(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<Call>>, BotError> {
        if let Some(call) = self.inner.manager.get(guild_id) {
            return Ok(call);
        }

        let call = self
            .inner
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al conectar al canal de voz: {:?}", e);
                BotError::playback(e)
            })?;
        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);
        Ok(call)
    }

    fn queue(&self, guild_id: GuildId) -> Option<Arc<RwLock<MusicQueue>>> {
        self.inner.queues.get(&guild_id).map(|q| q.clone())
    }

    fn current_handle(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.inner.current_tracks.get(&guild_id).map(|h| h.clone())
    }
}

#[async_trait]
impl PlaybackEngine for AudioPlayer {
    async fn status(&self, guild_id: GuildId) -> Option<SessionStatus> {
        let queue = self.queue(guild_id)?;
        let (current, queued) = {
            let q = queue.read();
            (q.current().cloned(), q.len())
        };

        let playing = match self.current_handle(guild_id) {
            Some(handle) => matches!(
                handle.get_info().await.map(|info| info.playing),
                Ok(PlayMode::Play)
            ),
            None => false,
        };

        Some(SessionStatus {
            current,
            playing,
            queued,
        })
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), BotError> {
        if let Some(track) = self.current_handle(guild_id) {
            track.pause().map_err(BotError::playback)?;
            info!("⏸️ Reproducción pausada en guild {}", guild_id);
        }
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), BotError> {
        if let Some(track) = self.current_handle(guild_id) {
            track.play().map_err(BotError::playback)?;
            info!("▶️ Reproducción reanudada en guild {}", guild_id);
        }
        Ok(())
    }

    async fn play_speech(&self, request: SpeechRequest) -> Result<SpeechCompletion, BotError> {
        let SpeechRequest {
            guild_id,
            voice_channel,
            text,
            options,
        } = request;

        let call = self.call_for(guild_id, voice_channel).await?;
        debug!(
            "🗣️ Voz de {} ({}) en guild {}",
            options.metadata.requested_by, options.metadata.requester_id, guild_id
        );
        self.inner.options.entry(guild_id).or_insert(options);

        let url = self
            .inner
            .synthesizer
            .source_url(&text)
            .map_err(BotError::playback)?;
        let input = HttpRequest::new(self.inner.client.clone(), url.to_string());
        let track_handle = call.lock().await.play_input(input.into());
        let _ = track_handle.set_volume(self.inner.default_volume);

        let (tx, rx) = oneshot::channel();
        let notifier = SpeechEndNotifier {
            tx: Arc::new(parking_lot::Mutex::new(Some(tx))),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(BotError::playback)?;
        }

        Ok(rx)
    }

    async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        item: QueueItem,
        options: PlayOptions,
    ) -> Result<usize, BotError> {
        self.call_for(guild_id, voice_channel).await?;
        self.inner.options.insert(guild_id, options);

        let queue = self
            .inner
            .queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(RwLock::new(MusicQueue::new(self.inner.max_queue_size))))
            .clone();

        let position = {
            let mut q = queue.write();
            q.add_track(item.clone())?;
            q.len()
        };

        if self.current_handle(guild_id).is_none() {
            self.play_next(guild_id).await?;
            return Ok(0);
        }

        self.notify(guild_id, &messages::track_added(&item)).await;
        Ok(position)
    }

    async fn remove_queued(&self, guild_id: GuildId, index: usize) -> Option<QueueItem> {
        let queue = self.queue(guild_id)?;
        let removed = queue.write().remove(index);
        removed
    }

    async fn insert_queued(&self, guild_id: GuildId, item: QueueItem, index: usize) {
        if let Some(queue) = self.queue(guild_id) {
            queue.write().insert(item, index);
        }
    }
}

/// Handler para cuando termina una canción
struct TrackEndHandler {
    player: AudioPlayer,
    guild_id: GuildId,
    track: TrackHandle,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        // Un track detenido por stop() ya no es el actual
        let is_current = self
            .player
            .current_handle(self.guild_id)
            .is_some_and(|handle| handle.uuid() == self.track.uuid());
        if !is_current {
            return None;
        }

        debug!("Track terminado, reproduciendo siguiente...");
        if let Err(e) = self.player.play_next(self.guild_id).await {
            error!("Error al reproducir siguiente track: {:?}", e);
        }

        None
    }
}

/// Fires the speech completion once, on the first of `End` or `Error`.
#[derive(Clone)]
struct SpeechEndNotifier {
    tx: Arc<parking_lot::Mutex<Option<oneshot::Sender<SpeechOutcome>>>>,
}

#[async_trait]
impl VoiceEventHandler for SpeechEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut outcome = SpeechOutcome::Finished;
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    outcome = SpeechOutcome::Failed(format!("{e:?}"));
                }
            }
        }

        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(outcome);
        }

        None
    }
}
