use std::sync::Arc;

use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::gateway::ActivityData;
use serenity::http::Http;
use serenity::model::{gateway::Ready, voice::VoiceState};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::commands::check_msg;
use crate::state::BotState;
use crate::voice::Completion;

pub struct Handler {
    prefix: String,
}

impl Handler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// "Listening to !help", pointing users at the command list.
    fn presence(&self) -> ActivityData {
        ActivityData::listening(format!("{}help", self.prefix))
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        ctx.set_activity(Some(self.presence()));
        info!("Bot connected as {}", ready.user.name);
    }

    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let me = ctx.cache.current_user().id;
        if new.user_id != me || new.channel_id.is_some() {
            return;
        }

        // we were disconnected from voice, by a moderator or by `stop`
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(state) = BotState::get(&ctx).await else {
            return;
        };

        if state.sequencer.forget(guild_id) {
            info!(%guild_id, "left voice, session dropped");
        }
        state.announce.remove(&guild_id);
    }
}

/// Feeds track-end reports from the voice driver into the sequencer and
/// announces whatever it chains next. Runs until every sender is dropped.
pub async fn pump_completions(
    mut completions: UnboundedReceiver<Completion>,
    state: Arc<BotState>,
    http: Arc<Http>,
) {
    while let Some(Completion { guild_id, ticket }) = completions.recv().await {
        debug!(%guild_id, ?ticket, "completion received");

        let outcome = state.sequencer.on_complete(guild_id, ticket).await;
        let Some(channel_id) = state.announce_channel(guild_id) else {
            continue;
        };

        match outcome {
            Ok(Some(track)) => {
                check_msg(
                    channel_id
                        .say(&http, format!("Now playing: {}", track.title()))
                        .await,
                );
            }
            Ok(None) => {}
            Err(why) => {
                warn!(%guild_id, "could not chain next track: {}", why);
                check_msg(channel_id.say(&http, why.to_string()).await);
            }
        }
    }

    debug!("completion channel closed");
}
