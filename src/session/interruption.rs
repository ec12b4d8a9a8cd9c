//! Speech interruption of music playback.
//!
//! Each guild gets one actor task that owns every pause, speak and resume
//! decision for that guild, so two chat messages never interleave their
//! engine calls. Overlapping speech requests are not merged: each one gets
//! its own completion, and each completion makes its own resume attempt.
//!
//! An actor runs while the coordinator holds its sender or one of its
//! speech tracks is still in flight, and stops after that.

use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio::{PlaybackEngine, SpeechOutcome, SpeechRequest};

const GUILD_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionState {
    /// No session, or a session that is not playing.
    Idle,
    MusicPlaying,
    /// At least one speech track is in flight.
    Interrupted,
    /// A speech track ended and the music is being resumed.
    Resuming,
}

#[derive(Debug)]
enum GuildCommand {
    Speak(SpeechRequest),
    SpeechEnded { token: u64, outcome: SpeechOutcome },
}

/// Routes speech requests to the per-guild actors, spawning them on demand.
pub struct InterruptionCoordinator {
    engine: Arc<dyn PlaybackEngine>,
    guilds: DashMap<GuildId, mpsc::Sender<GuildCommand>>,
}

impl InterruptionCoordinator {
    pub fn new(engine: Arc<dyn PlaybackEngine>) -> Self {
        Self {
            engine,
            guilds: DashMap::new(),
        }
    }

    /// Queues `request` on its guild's actor. Never fails towards the
    /// caller: engine errors are handled, and logged, by the actor.
    pub async fn interrupt(&self, request: SpeechRequest) {
        let guild_id = request.guild_id;
        let mut command = GuildCommand::Speak(request);

        // Un actor caído se reemplaza una vez
        for _ in 0..2 {
            let tx = self.sender(guild_id);
            match tx.send(command).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    warn!("Actor de guild {} caído, recreando", guild_id);
                    self.guilds.remove(&guild_id);
                    command = returned;
                }
            }
        }

        error!("No se pudo entregar la voz a guild {}", guild_id);
    }

    fn sender(&self, guild_id: GuildId) -> mpsc::Sender<GuildCommand> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                let (actor, tx) = GuildActor::new(guild_id, self.engine.clone());
                tokio::spawn(actor.run());
                tx
            })
            .clone()
    }
}

struct GuildActor {
    guild_id: GuildId,
    engine: Arc<dyn PlaybackEngine>,
    rx: mpsc::Receiver<GuildCommand>,
    tx: mpsc::WeakSender<GuildCommand>,
    in_flight: HashSet<u64>,
    next_token: u64,
    state: InterruptionState,
}

impl GuildActor {
    fn new(
        guild_id: GuildId,
        engine: Arc<dyn PlaybackEngine>,
    ) -> (Self, mpsc::Sender<GuildCommand>) {
        let (tx, rx) = mpsc::channel(GUILD_CHANNEL_CAPACITY);
        let actor = Self {
            guild_id,
            engine,
            rx,
            tx: tx.downgrade(),
            in_flight: HashSet::new(),
            next_token: 0,
            state: InterruptionState::Idle,
        };
        (actor, tx)
    }

    async fn run(mut self) {
        info!("Actor de interrupción iniciado para guild {}", self.guild_id);

        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
            debug!("Guild {} en estado {:?}", self.guild_id, self.state);
        }

        info!("Actor de interrupción terminado para guild {}", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) {
        match command {
            GuildCommand::Speak(request) => self.speak(request).await,
            GuildCommand::SpeechEnded { token, outcome } => {
                self.speech_ended(token, outcome).await
            }
        }
    }

    async fn speak(&mut self, request: SpeechRequest) {
        if let Some(status) = self.engine.status(self.guild_id).await {
            if status.playing {
                self.state = InterruptionState::MusicPlaying;
                match self.engine.pause(self.guild_id).await {
                    Ok(()) => info!("⏸️ Música pausada para voz en guild {}", self.guild_id),
                    // La voz sale igual
                    Err(e) => warn!("No se pudo pausar en guild {}: {}", self.guild_id, e),
                }
            }
        }

        let token = self.next_token;
        self.next_token += 1;

        match self.engine.play_speech(request).await {
            Ok(completion) => {
                let Some(tx) = self.tx.upgrade() else {
                    debug!("Coordinador cerrado, voz {} sin seguimiento", token);
                    return;
                };
                self.in_flight.insert(token);
                self.state = InterruptionState::Interrupted;

                tokio::spawn(async move {
                    let outcome = completion.await.unwrap_or_else(|_| {
                        SpeechOutcome::Failed("completion dropped by engine".to_string())
                    });
                    let _ = tx.send(GuildCommand::SpeechEnded { token, outcome }).await;
                });
            }
            Err(e) => {
                error!("Error durante la voz en guild {}: {}", self.guild_id, e);
                self.resume_if_paused().await;
            }
        }
    }

    async fn speech_ended(&mut self, token: u64, outcome: SpeechOutcome) {
        self.in_flight.remove(&token);
        match outcome {
            SpeechOutcome::Finished => debug!("Voz {} terminada en guild {}", token, self.guild_id),
            SpeechOutcome::Failed(reason) => {
                warn!("Voz {} falló en guild {}: {}", token, self.guild_id, reason)
            }
        }
        self.resume_if_paused().await;
    }

    /// Resumes the session when it exists and is not playing. Failures are
    /// logged and left alone; the music stays paused until someone acts.
    async fn resume_if_paused(&mut self) {
        self.state = InterruptionState::Resuming;

        let settled = match self.engine.status(self.guild_id).await {
            None => InterruptionState::Idle,
            Some(status) if status.playing => InterruptionState::MusicPlaying,
            Some(status) => match self.engine.resume(self.guild_id).await {
                Ok(()) if status.current.is_some() => {
                    info!("▶️ Música reanudada tras la voz en guild {}", self.guild_id);
                    InterruptionState::MusicPlaying
                }
                Ok(()) => InterruptionState::Idle,
                Err(e) => {
                    warn!("No se pudo reanudar en guild {}: {}", self.guild_id, e);
                    InterruptionState::Idle
                }
            },
        };

        self.state = if self.in_flight.is_empty() {
            settled
        } else {
            InterruptionState::Interrupted
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{speech, EngineCall, FakeEngine};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn actor(engine: &Arc<FakeEngine>) -> (GuildActor, mpsc::Sender<GuildCommand>) {
        let engine: Arc<dyn PlaybackEngine> = engine.clone();
        GuildActor::new(GuildId::new(1), engine)
    }

    async fn deliver_next(actor: &mut GuildActor) {
        let command = tokio::time::timeout(Duration::from_secs(1), actor.rx.recv())
            .await
            .expect("completion forwarded")
            .expect("channel open");
        actor.handle(command).await;
    }

    fn speak(text: &str) -> GuildCommand {
        GuildCommand::Speak(speech(1, text))
    }

    #[tokio::test]
    async fn pauses_before_speaking_and_resumes_after() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;

        assert_eq!(
            engine.actions(),
            vec![EngineCall::Pause, EngineCall::PlaySpeech("hello".to_string())]
        );
        assert_eq!(actor.state, InterruptionState::Interrupted);
        assert!(!engine.is_playing());

        engine.finish_speech(SpeechOutcome::Finished);
        deliver_next(&mut actor).await;

        assert_eq!(engine.count(&EngineCall::Resume), 1);
        assert!(engine.is_playing());
        assert_eq!(actor.state, InterruptionState::MusicPlaying);
        assert!(actor.in_flight.is_empty());
    }

    #[tokio::test]
    async fn failed_speech_track_still_resumes() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;
        engine.finish_speech(SpeechOutcome::Failed("decode error".to_string()));
        deliver_next(&mut actor).await;

        assert_eq!(engine.count(&EngineCall::Resume), 1);
        assert!(engine.is_playing());
    }

    #[tokio::test]
    async fn dropped_completion_counts_as_failure() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;
        engine.completions.lock().clear();
        deliver_next(&mut actor).await;

        assert_eq!(engine.count(&EngineCall::Resume), 1);
    }

    #[tokio::test]
    async fn synchronous_play_failure_resumes_immediately() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        *engine.fail_speech.lock() = true;
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;

        assert_eq!(
            engine.actions(),
            vec![
                EngineCall::Pause,
                EngineCall::PlaySpeech("hello".to_string()),
                EngineCall::Resume
            ]
        );
        assert!(engine.is_playing());
        assert!(actor.in_flight.is_empty());
    }

    #[tokio::test]
    async fn pause_failure_does_not_block_speech() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        *engine.fail_pause.lock() = true;
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;

        assert_eq!(engine.count(&EngineCall::PlaySpeech("hello".to_string())), 1);
    }

    #[tokio::test]
    async fn resume_failure_is_swallowed() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        *engine.fail_resume.lock() = true;
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;
        engine.finish_speech(SpeechOutcome::Finished);
        deliver_next(&mut actor).await;

        assert_eq!(engine.count(&EngineCall::Resume), 1);
        assert!(!engine.is_playing());
        assert_eq!(actor.state, InterruptionState::Idle);
    }

    #[tokio::test]
    async fn speaks_without_session_and_skips_pause() {
        let engine = Arc::new(FakeEngine::idle());
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("hello")).await;
        engine.finish_speech(SpeechOutcome::Finished);
        deliver_next(&mut actor).await;

        assert_eq!(engine.actions(), vec![EngineCall::PlaySpeech("hello".to_string())]);
        assert_eq!(actor.state, InterruptionState::Idle);
    }

    #[tokio::test]
    async fn overlapping_messages_each_drive_their_own_resume() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let (mut actor, _tx) = actor(&engine);

        actor.handle(speak("first")).await;
        actor.handle(speak("second")).await;

        // Segunda petición: la música ya está pausada, no se pausa de nuevo
        assert_eq!(engine.count(&EngineCall::Pause), 1);
        assert_eq!(actor.in_flight.len(), 2);

        engine.finish_speech(SpeechOutcome::Finished);
        deliver_next(&mut actor).await;
        assert_eq!(engine.count(&EngineCall::Resume), 1);
        assert_eq!(actor.state, InterruptionState::Interrupted);

        // Ya reanudada: el segundo intento no llama a resume
        engine.finish_speech(SpeechOutcome::Finished);
        deliver_next(&mut actor).await;
        assert_eq!(engine.count(&EngineCall::Resume), 1);
        assert_eq!(actor.state, InterruptionState::MusicPlaying);
    }

    #[tokio::test]
    async fn actor_stops_once_senders_and_speech_are_gone() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let (actor, tx) = actor(&engine);
        let running = tokio::spawn(actor.run());

        tx.send(speak("hello")).await.unwrap();
        drop(tx);

        let started = tokio::time::timeout(Duration::from_secs(1), async {
            while engine.completions.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(started.is_ok());

        // La voz en curso mantiene vivo al actor
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!running.is_finished());

        engine.finish_speech(SpeechOutcome::Finished);
        let stopped = tokio::time::timeout(Duration::from_secs(1), running).await;
        assert!(matches!(stopped, Ok(Ok(()))));
        assert_eq!(engine.count(&EngineCall::Resume), 1);
    }

    #[tokio::test]
    async fn coordinator_spawns_one_actor_per_guild() {
        let engine = Arc::new(FakeEngine::playing(&[]));
        let dyn_engine: Arc<dyn PlaybackEngine> = engine.clone();
        let coordinator = InterruptionCoordinator::new(dyn_engine);

        coordinator.interrupt(speech(1, "one")).await;
        coordinator.interrupt(speech(1, "two")).await;
        coordinator.interrupt(speech(2, "three")).await;

        assert_eq!(coordinator.guilds.len(), 2);

        let spoken = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let count = engine
                    .calls()
                    .iter()
                    .filter(|c| matches!(c, EngineCall::PlaySpeech(_)))
                    .count();
                if count == 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(spoken.is_ok());
    }
}
