use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt};
use tracing::{debug, info};

use crate::error::BotError;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub title: String,
    pub artist: Option<String>,
    pub url: String,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            artist: None,
            url: url.into(),
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artist {
            Some(artist) => write!(f, "{} by {}", self.title, artist),
            None => f.write_str(&self.title),
        }
    }
}

/// Pending tracks for one guild plus the one currently on air.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
    current: Option<QueueItem>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            max_size,
        }
    }

    /// Agrega un track al final de la cola
    pub fn add_track(&mut self, item: QueueItem) -> Result<(), BotError> {
        if self.items.len() >= self.max_size {
            return Err(BotError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", item.title);
        self.items.push_back(item);

        Ok(())
    }

    /// Avanza al siguiente track (FIFO). The previous current item is dropped.
    pub fn next_track(&mut self) -> Option<QueueItem> {
        self.current = self.items.pop_front();
        match &self.current {
            Some(item) => info!("➡️ Siguiente en cola: {}", item.title),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }
        self.current.clone()
    }

    /// Removes the pending track at `index`, `None` when the slot is empty.
    pub fn remove(&mut self, index: usize) -> Option<QueueItem> {
        let removed = self.items.remove(index);
        if removed.is_some() {
            debug!("❌ Track eliminado en posición {}", index);
        }
        removed
    }

    /// Inserts at `index`, shifting later tracks back. Indexes past the end
    /// append.
    pub fn insert(&mut self, item: QueueItem, index: usize) {
        let index = index.min(self.items.len());
        debug!("📍 Track insertado en posición {}", index);
        self.items.insert(index, item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        info!("🗑️ Cola limpiada");
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.current.is_none()
    }

    #[cfg(test)]
    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }
}
