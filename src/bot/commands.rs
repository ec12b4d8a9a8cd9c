use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{CommandInteraction, CommandOptionType, ResolvedValue},
        id::{ChannelId, GuildId, UserId},
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    dispatch::Responder,
    voice::{voice_guard, VoiceMembership},
};
use crate::{error::BotError, session::BotState};

// Esquema de comandos

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
    Attachment,
}

impl OptionKind {
    fn option_type(self) -> CommandOptionType {
        match self {
            Self::String => CommandOptionType::String,
            Self::Integer => CommandOptionType::Integer,
            Self::Attachment => CommandOptionType::Attachment,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub min_int: Option<i64>,
    /// `(display name, value)` pairs for string options.
    pub choices: Vec<(String, String)>,
}

impl OptionDescriptor {
    pub fn new(kind: OptionKind, name: &str, description: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: description.to_string(),
            required: false,
            min_int: None,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_int(mut self, min: i64) -> Self {
        self.min_int = Some(min);
        self
    }

    pub fn choice(mut self, name: &str, value: &str) -> Self {
        self.choices.push((name.to_string(), value.to_string()));
        self
    }

    fn to_builder(&self) -> CreateCommandOption {
        let mut option =
            CreateCommandOption::new(self.kind.option_type(), &self.name, &self.description)
                .required(self.required);
        if let Some(min) = self.min_int {
            option = option.min_int_value(min as u64);
        }
        for (name, value) in &self.choices {
            option = option.add_string_choice(name, value);
        }
        option
    }
}

/// Declarative shape of a slash command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub options: Vec<OptionDescriptor>,
}

impl CommandDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            description: description.to_string(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: OptionDescriptor) -> Self {
        self.options.push(option);
        self
    }

    pub fn to_builder(&self) -> CreateCommand {
        self.options.iter().fold(
            CreateCommand::new(&self.name).description(&self.description),
            |command, option| command.add_option(option.to_builder()),
        )
    }
}

// Valores recibidos

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Attachment(AttachmentRef),
}

/// Resolved option values of one invocation, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions(HashMap<String, OptionValue>);

impl CommandOptions {
    pub fn from_interaction(command: &CommandInteraction) -> Self {
        let mut values = HashMap::new();
        for option in command.data.options() {
            let value = match option.value {
                ResolvedValue::String(s) => OptionValue::String(s.to_string()),
                ResolvedValue::Integer(i) => OptionValue::Integer(i),
                ResolvedValue::Attachment(attachment) => OptionValue::Attachment(AttachmentRef {
                    filename: attachment.filename.clone(),
                    url: attachment.url.clone(),
                }),
                _ => {
                    debug!("Opción ignorada: {}", option.name);
                    continue;
                }
            };
            values.insert(option.name.to_string(), value);
        }
        Self(values)
    }

    pub fn with(mut self, name: &str, value: OptionValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn attachment(&self, name: &str) -> Option<&AttachmentRef> {
        match self.0.get(name)? {
            OptionValue::Attachment(a) => Some(a),
            _ => None,
        }
    }
}

// Contexto de ejecución

/// Who invoked which command where, stripped of the gateway types.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub user_name: String,
    pub options: CommandOptions,
}

impl Invocation {
    /// `None` for invocations outside a guild.
    pub fn from_interaction(command: &CommandInteraction) -> Option<Self> {
        Some(Self {
            name: command.data.name.clone(),
            guild_id: command.guild_id?,
            channel_id: command.channel_id,
            user_id: command.user.id,
            user_name: command.user.name.clone(),
            options: CommandOptions::from_interaction(command),
        })
    }
}

/// Everything a handler may touch. Stateless handlers ignore `state`.
pub struct CommandContext<'a> {
    pub invocation: &'a Invocation,
    pub responder: &'a dyn Responder,
    pub membership: &'a dyn VoiceMembership,
    pub state: &'a BotState,
}

impl CommandContext<'_> {
    /// Voice channel of the invoking user, or `None` after telling them
    /// they need to join one.
    pub async fn require_voice(&self) -> Result<Option<ChannelId>> {
        let channel = voice_guard(
            self.membership,
            self.invocation.guild_id,
            self.invocation.user_id,
        );
        if channel.is_none() {
            self.responder
                .follow_up(BotError::NotInVoiceChannel.user_message())
                .await?;
        }
        Ok(channel)
    }

    pub async fn follow_up(&self, content: &str) -> Result<()> {
        self.responder.follow_up(content).await
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()>;
}

/// Name-keyed handler table. Names are matched case-insensitively.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.descriptor().name.to_lowercase();
        self.handlers.insert(name, handler);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CommandHandler>, BotError> {
        self.handlers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| BotError::UnknownCommand(name.to_string()))
    }

    /// Descriptors of every registered command, sorted by name.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        let mut descriptors: Vec<_> = self.handlers.values().map(|h| h.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
