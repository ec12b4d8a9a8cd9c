use serenity::model::id::GuildId;
use tracing::{debug, info};

use super::{queue::QueueItem, PlaybackEngine};
use crate::error::BotError;

/// Moves the queued track at 1-based position `from` to 1-based position
/// `to` and returns it.
///
/// Both positions are checked against the queue depth *before* removal, and
/// a position equal to `depth + 1` is accepted. As a source it names an empty
/// slot and yields [`BotError::TrackNotFound`]; as a destination it appends.
/// The same happens when the queue advances between the check and the
/// removal.
pub async fn move_track(
    engine: &dyn PlaybackEngine,
    guild_id: GuildId,
    from: i64,
    to: i64,
) -> Result<QueueItem, BotError> {
    let status = engine
        .status(guild_id)
        .await
        .filter(|status| status.current.is_some())
        .ok_or(BotError::NoActiveSession)?;

    let depth = status.queued;
    let from_index = position_to_index(from, depth)?;
    let to_index = position_to_index(to, depth)?;

    let track = engine
        .remove_queued(guild_id, from_index)
        .await
        .ok_or(BotError::TrackNotFound(from_index))?;

    engine.insert_queued(guild_id, track.clone(), to_index).await;
    info!(
        "📍 Track {} movido de {} a {} en guild {}",
        track.title, from, to, guild_id
    );

    Ok(track)
}

fn position_to_index(position: i64, depth: usize) -> Result<usize, BotError> {
    let out_of_range = BotError::PositionOutOfRange { position, depth };
    if position < 1 {
        debug!("posición no positiva: {}", position);
        return Err(out_of_range);
    }
    let index = usize::try_from(position - 1).map_err(|_| out_of_range.clone())?;
    if index > depth {
        return Err(out_of_range);
    }
    Ok(index)
}
