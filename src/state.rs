use std::sync::Arc;

use dashmap::DashMap;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::TypeMapKey;
use tracing::{debug, info};

use crate::error::Result;
use crate::extract::Extractor;
use crate::models::{PlayOutcome, SkipOutcome};
use crate::sequencer::PlaybackSequencer;

/// Everything the commands share, stored in serenity's `TypeMap`.
pub struct BotState {
    pub sequencer: Arc<PlaybackSequencer>,
    pub extractor: Arc<dyn Extractor>,
    /// Text channel that last asked for music in each guild; "now playing"
    /// notices for chained tracks go there.
    pub announce: DashMap<GuildId, ChannelId>,
}

impl TypeMapKey for BotState {
    type Value = Arc<BotState>;
}

impl BotState {
    pub fn new(sequencer: Arc<PlaybackSequencer>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            sequencer,
            extractor,
            announce: DashMap::new(),
        }
    }

    pub async fn get(ctx: &Context) -> Option<Arc<BotState>> {
        ctx.data.read().await.get::<BotState>().cloned()
    }

    pub fn announce_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.announce.get(&guild_id).map(|c| *c.value())
    }

    /// Resolves `query` and hands the track to the sequencer. A failed
    /// resolve returns before the session is touched.
    pub async fn request(&self, guild_id: GuildId, query: &str) -> Result<PlayOutcome> {
        let track = self.extractor.resolve(query).await?;
        info!(%guild_id, title = track.title(), "play requested");
        self.sequencer.enqueue_and_start(guild_id, track).await
    }

    /// Skips the current track. An idle session that still has tracks
    /// waiting (its last start was refused) gets its head started instead.
    pub async fn skip(&self, guild_id: GuildId) -> Result<SkipOutcome> {
        if self.sequencer.skip(guild_id).await? {
            return Ok(SkipOutcome::Skipped);
        }

        match self.sequencer.start_if_idle(guild_id).await? {
            Some(track) => {
                debug!(%guild_id, title = track.title(), "skip resumed waiting track");
                Ok(SkipOutcome::Resumed(track))
            }
            None => Ok(SkipOutcome::NothingPlaying),
        }
    }
}
