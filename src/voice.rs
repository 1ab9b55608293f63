use std::sync::Arc;

use reqwest::Client as HttpClient;
use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::{
    input::YoutubeDl,
    tracks::PlayMode,
    Event,
    EventContext,
    EventHandler as VoiceEventHandler,
    Songbird,
    TrackEvent,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::{PlayerError, Result};
use crate::models::Track;

/// Identifies one start of one track, so late end reports can be told apart
/// from the one we are waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayTicket(pub u64);

/// Sent by the voice driver when a track stops for any reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub guild_id: GuildId,
    pub ticket: PlayTicket,
}

/// Streams tracks into a guild's voice call.
///
/// Implementations must eventually emit a [`Completion`] for every ticket
/// they accepted, including after [`VoiceTransport::stop`].
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn play(&self, guild_id: GuildId, track: &Track, ticket: PlayTicket) -> Result<()>;

    async fn stop(&self, guild_id: GuildId) -> Result<()>;
}

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: HttpClient,
    completions: UnboundedSender<Completion>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, completions: UnboundedSender<Completion>) -> Self {
        Self {
            manager,
            http: HttpClient::new(),
            completions,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn play(&self, guild_id: GuildId, track: &Track, ticket: PlayTicket) -> Result<()> {
        let handler_lock = self.manager.get(guild_id).ok_or(PlayerError::NotConnected)?;
        let mut handler = handler_lock.lock().await;

        let source = YoutubeDl::new(self.http.clone(), track.source().to_string());
        let handle = handler.play_only_input(source.into());

        let notifier = TrackEndNotifier {
            completion: Completion { guild_id, ticket },
            completions: self.completions.clone(),
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|why| PlayerError::Transport(why.to_string()))?;
        }

        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<()> {
        let handler_lock = self.manager.get(guild_id).ok_or(PlayerError::NotConnected)?;
        handler_lock.lock().await.stop();
        Ok(())
    }
}

#[derive(Clone)]
struct TrackEndNotifier {
    completion: Completion,
    completions: UnboundedSender<Completion>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                if let PlayMode::Errored(why) = &state.playing {
                    warn!(guild_id = %self.completion.guild_id, "track errored: {:?}", why);
                }
            }
        }

        if self.completions.send(self.completion).is_err() {
            debug!("completion receiver gone, dropping {:?}", self.completion);
        }

        // one report per track start
        Some(Event::Cancel)
    }
}
