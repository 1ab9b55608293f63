//! In-memory stand-ins for the voice driver and yt-dlp.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serenity::async_trait;
use serenity::model::id::GuildId;

use crate::error::{PlayerError, Result};
use crate::extract::Extractor;
use crate::models::Track;
use crate::voice::{PlayTicket, VoiceTransport};

pub fn track(name: &str) -> Track {
    Track::resolved(name, format!("https://example.com/{}", name))
}

#[derive(Default)]
pub struct FakeTransport {
    pub plays: Mutex<Vec<(GuildId, String, PlayTicket)>>,
    pub stops: AtomicUsize,
    pub refuse: AtomicBool,
}

impl FakeTransport {
    pub fn played(&self) -> Vec<String> {
        self.plays.lock().unwrap().iter().map(|(_, t, _)| t.clone()).collect()
    }

    pub fn last_ticket(&self) -> PlayTicket {
        self.plays.lock().unwrap().last().unwrap().2
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn play(&self, guild_id: GuildId, track: &Track, ticket: PlayTicket) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PlayerError::NotConnected);
        }
        self.plays
            .lock()
            .unwrap()
            .push((guild_id, track.title().to_string(), ticket));
        Ok(())
    }

    async fn stop(&self, _guild_id: GuildId) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolves every query to a track titled after it, except queries that
/// start with `fail`.
#[derive(Default)]
pub struct FakeExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn resolve(&self, query: &str) -> Result<Track> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.starts_with("fail") {
            return Err(PlayerError::ExtractionFailure(query.to_string()));
        }
        Ok(track(query))
    }
}
