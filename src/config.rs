use anyhow::{Context as _, Result};
use std::time::Duration;

/// Identities that may trigger a command deployment even when they do not
/// own the application.
const DEFAULT_DEPLOY_USERS: [u64; 2] = [269249777185718274, 755827989073231932];

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub dev_guild_id: Option<u64>, // Publica comandos al arrancar

    // Despliegue de comandos
    pub deploy_trigger: String,
    pub deploy_allowed_users: Vec<u64>,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Auto-salida
    pub leave_on_empty: bool,
    pub leave_on_empty_cooldown: Duration,
    pub leave_on_end: bool,

    // Texto a voz
    pub tts_language: String,
    pub tts_slow: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            dev_guild_id: std::env::var("DEV_GUILD_ID").ok().and_then(|s| s.parse().ok()),

            deploy_trigger: std::env::var("DEPLOY_TRIGGER")
                .unwrap_or_else(|_| "!deploy".to_string()),
            deploy_allowed_users: match std::env::var("DEPLOY_ALLOWED_USERS") {
                Ok(val) if !val.trim().is_empty() => parse_user_list(&val)?,
                _ => DEFAULT_DEPLOY_USERS.to_vec(),
            },

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            leave_on_empty: std::env::var("LEAVE_ON_EMPTY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            leave_on_empty_cooldown: humantime::parse_duration(
                &std::env::var("LEAVE_ON_EMPTY_COOLDOWN").unwrap_or_else(|_| "5m".to_string()),
            )
            .context("LEAVE_ON_EMPTY_COOLDOWN is not a valid duration")?,
            leave_on_end: std::env::var("LEAVE_ON_END")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            tts_language: std::env::var("TTS_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            tts_slow: std::env::var("TTS_SLOW")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token must not be empty
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size must be greater than 0
    /// - Deploy trigger must not be blank
    /// - TTS language must be a short alphabetic tag (`en`, `pt-BR`)
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.deploy_trigger.trim().is_empty() {
            anyhow::bail!("Deploy trigger must not be blank");
        }

        let valid_language = !self.tts_language.is_empty()
            && self.tts_language.len() <= 8
            && self
                .tts_language
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c == '-');
        if !valid_language {
            anyhow::bail!("TTS language must be a language tag, got: {:?}", self.tts_language);
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: dev guild {}\n  \
            Deploy: trigger {:?}, {} fallback identities\n  \
            Audio: {}% vol, {} queue\n  \
            Auto-leave: empty={} after {}, end={}\n  \
            TTS: lang={}, slow={}",
            self.dev_guild_id.map_or("none".to_string(), |id| id.to_string()),
            self.deploy_trigger,
            self.deploy_allowed_users.len(),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.leave_on_empty,
            humantime::format_duration(self.leave_on_empty_cooldown),
            self.leave_on_end,
            self.tts_language,
            self.tts_slow,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            dev_guild_id: None,

            deploy_trigger: "!deploy".to_string(),
            deploy_allowed_users: DEFAULT_DEPLOY_USERS.to_vec(),

            default_volume: 0.5,
            max_queue_size: 1000,

            leave_on_empty: true,
            leave_on_empty_cooldown: Duration::from_secs(300),
            leave_on_end: false,

            tts_language: "en".to_string(),
            tts_slow: false,
        }
    }
}

fn parse_user_list(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("invalid user id in DEPLOY_ALLOWED_USERS: {s}"))
        })
        .collect()
}
