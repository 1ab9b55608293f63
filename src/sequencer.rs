//! Per-guild playback state machine.
//!
//! Every guild gets its own [`Session`] behind its own lock. A session is
//! either idle or playing exactly one track; when the voice transport reports
//! that the track ended, [`PlaybackSequencer::on_complete`] moves on to the
//! head of the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{PlayOutcome, QueueSnapshot, SessionStatus, Track};
use crate::queue::QueueStore;
use crate::voice::{PlayTicket, VoiceTransport};

#[derive(Debug)]
struct NowPlaying {
    track: Track,
    ticket: PlayTicket,
}

#[derive(Debug)]
pub struct Session {
    queue: QueueStore,
    current: Option<NowPlaying>,
}

impl Session {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            queue: QueueStore::new(capacity),
            current: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.current {
            Some(_) => SessionStatus::Playing,
            None => SessionStatus::Idle,
        }
    }
}

pub struct PlaybackSequencer {
    transport: Arc<dyn VoiceTransport>,
    sessions: DashMap<GuildId, Arc<Mutex<Session>>>,
    next_ticket: AtomicU64,
    capacity: Option<usize>,
}

impl PlaybackSequencer {
    pub fn new(transport: Arc<dyn VoiceTransport>, capacity: Option<usize>) -> Self {
        Self {
            transport,
            sessions: DashMap::new(),
            next_ticket: AtomicU64::new(1),
            capacity,
        }
    }

    // The map guard must be dropped before anyone awaits the session lock.
    fn session(&self, guild_id: GuildId) -> Arc<Mutex<Session>> {
        let capacity = self.capacity;
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(capacity))))
            .value()
            .clone()
    }

    fn existing(&self, guild_id: GuildId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    /// Adds a track to the guild's queue and returns its 1-based position.
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> Result<usize> {
        let session = self.session(guild_id);
        let mut session = session.lock().await;
        let position = session.queue.enqueue(track)?;
        debug!(%guild_id, position, "track enqueued");
        Ok(position)
    }

    /// Enqueues and, if the session is idle, starts the head in the same
    /// critical section, so the reported position is the one the track ends
    /// up with.
    pub async fn enqueue_and_start(&self, guild_id: GuildId, track: Track) -> Result<PlayOutcome> {
        let session = self.session(guild_id);
        let mut session = session.lock().await;

        let title = track.title().to_string();
        let position = session.queue.enqueue(track)?;

        match self.advance(guild_id, &mut session).await? {
            Some(started) if position == 1 => Ok(PlayOutcome::Started(started)),
            Some(started) => {
                debug!(%guild_id, title = started.title(), "resumed waiting track");
                Ok(PlayOutcome::Queued {
                    title,
                    position: position - 1,
                })
            }
            None => Ok(PlayOutcome::Queued { title, position }),
        }
    }

    /// Starts the head of the queue if nothing is playing. Returns the track
    /// that was started, if any.
    pub async fn start_if_idle(&self, guild_id: GuildId) -> Result<Option<Track>> {
        let Some(session) = self.existing(guild_id) else {
            return Ok(None);
        };
        let mut session = session.lock().await;
        self.advance(guild_id, &mut session).await
    }

    async fn advance(&self, guild_id: GuildId, session: &mut Session) -> Result<Option<Track>> {
        if session.current.is_some() {
            return Ok(None);
        }

        let Some(track) = session.queue.dequeue_next() else {
            debug!(%guild_id, "queue drained, session idle");
            return Ok(None);
        };

        let ticket = PlayTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));

        if let Err(why) = self.transport.play(guild_id, &track, ticket).await {
            warn!(%guild_id, title = track.title(), "transport refused track: {}", why);
            session.queue.requeue_front(track);
            return Err(why);
        }

        info!(%guild_id, ?ticket, title = track.title(), "now playing");
        session.current = Some(NowPlaying {
            track: track.clone(),
            ticket,
        });
        Ok(Some(track))
    }

    /// Called once the transport reports that the track started with `ticket`
    /// has ended, either normally or with an error.
    pub async fn on_complete(
        &self,
        guild_id: GuildId,
        ticket: PlayTicket,
    ) -> Result<Option<Track>> {
        let Some(session) = self.existing(guild_id) else {
            debug!(%guild_id, ?ticket, "completion for unknown session");
            return Ok(None);
        };
        let mut session = session.lock().await;

        match &session.current {
            Some(now) if now.ticket == ticket => {
                debug!(%guild_id, title = now.track.title(), "track finished");
            }
            _ => {
                debug!(%guild_id, ?ticket, "stale completion ignored");
                return Ok(None);
            }
        }

        session.current = None;
        self.advance(guild_id, &mut session).await
    }

    /// Stops the current track. The transport's completion report chains the
    /// next one. Returns false when nothing was playing.
    pub async fn skip(&self, guild_id: GuildId) -> Result<bool> {
        let Some(session) = self.existing(guild_id) else {
            return Ok(false);
        };
        let session = session.lock().await;
        debug!(%guild_id, status = %session.status(), "skip requested");

        if session.current.is_none() {
            return Ok(false);
        }

        self.transport.stop(guild_id).await?;
        Ok(true)
    }

    /// Empties the queue without touching the current track.
    pub async fn clear(&self, guild_id: GuildId) -> usize {
        match self.existing(guild_id) {
            Some(session) => session.lock().await.queue.clear(),
            None => 0,
        }
    }

    /// Clears everything, stops the transport and forgets the session.
    pub async fn stop(&self, guild_id: GuildId) -> Result<bool> {
        let Some((_, session)) = self.sessions.remove(&guild_id) else {
            return Ok(false);
        };
        let mut session = session.lock().await;

        let dropped = session.queue.clear();
        let was_playing = session.current.take().is_some();
        info!(%guild_id, dropped, was_playing, "session stopped");

        if was_playing {
            self.transport.stop(guild_id).await?;
        }
        Ok(true)
    }

    /// Drops the session without talking to the transport, for when the
    /// voice connection is already gone.
    pub fn forget(&self, guild_id: GuildId) -> bool {
        self.sessions.remove(&guild_id).is_some()
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let Some(session) = self.existing(guild_id) else {
            return QueueSnapshot::default();
        };
        let session = session.lock().await;

        QueueSnapshot {
            now_playing: session.current.as_ref().map(|n| n.track.title().to_string()),
            upcoming: session.queue.snapshot(),
        }
    }

    pub async fn status(&self, guild_id: GuildId) -> SessionStatus {
        match self.existing(guild_id) {
            Some(session) => session.lock().await.status(),
            None => SessionStatus::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use crate::testing::{track, FakeTransport};

    fn setup() -> (Arc<FakeTransport>, PlaybackSequencer) {
        let transport = Arc::new(FakeTransport::default());
        let sequencer = PlaybackSequencer::new(transport.clone(), None);
        (transport, sequencer)
    }

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    #[tokio::test]
    async fn start_if_idle_plays_head() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.enqueue(guild(), track("b")).await.unwrap();

        let started = sequencer.start_if_idle(guild()).await.unwrap();

        assert_eq!(started.unwrap().title(), "a");
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Playing);
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["b"]);
        assert_eq!(transport.played(), vec!["a"]);
    }

    #[tokio::test]
    async fn start_if_idle_while_playing_does_nothing() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.start_if_idle(guild()).await.unwrap();
        sequencer.enqueue(guild(), track("b")).await.unwrap();

        assert!(sequencer.start_if_idle(guild()).await.unwrap().is_none());
        assert_eq!(transport.played(), vec!["a"]);
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["b"]);
    }

    #[tokio::test]
    async fn start_if_idle_on_empty_queue_stays_idle() {
        let (_, sequencer) = setup();
        assert!(sequencer.start_if_idle(guild()).await.unwrap().is_none());
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn completions_drain_to_idle() {
        let (transport, sequencer) = setup();
        for name in ["a", "b", "c"] {
            sequencer.enqueue(guild(), track(name)).await.unwrap();
        }
        sequencer.start_if_idle(guild()).await.unwrap();

        while sequencer.status(guild()).await == SessionStatus::Playing {
            sequencer.on_complete(guild(), transport.last_ticket()).await.unwrap();
        }

        assert_eq!(transport.played(), vec!["a", "b", "c"]);
        assert!(sequencer.snapshot(guild()).await.is_empty());
    }

    #[tokio::test]
    async fn skip_when_idle_is_noop() {
        let (transport, sequencer) = setup();
        assert!(!sequencer.skip(guild()).await.unwrap());

        sequencer.enqueue(guild(), track("a")).await.unwrap();
        assert!(!sequencer.skip(guild()).await.unwrap());

        assert_eq!(transport.stop_count(), 0);
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["a"]);
    }

    #[tokio::test]
    async fn clear_keeps_current_track() {
        let (_, sequencer) = setup();
        for name in ["a", "b", "c"] {
            sequencer.enqueue(guild(), track(name)).await.unwrap();
        }
        sequencer.start_if_idle(guild()).await.unwrap();

        assert_eq!(sequencer.clear(guild()).await, 2);

        let snapshot = sequencer.snapshot(guild()).await;
        assert_eq!(snapshot.now_playing.as_deref(), Some("a"));
        assert!(snapshot.upcoming.is_empty());
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Playing);
    }

    #[tokio::test]
    async fn clear_while_idle() {
        let (_, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();

        assert_eq!(sequencer.clear(guild()).await, 1);
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn play_skip_complete_scenario() {
        let (transport, sequencer) = setup();
        for name in ["A", "B", "C"] {
            sequencer.enqueue(guild(), track(name)).await.unwrap();
        }

        let started = sequencer.start_if_idle(guild()).await.unwrap().unwrap();
        assert_eq!(started.title(), "A");
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["B", "C"]);

        let next = sequencer.on_complete(guild(), transport.last_ticket()).await.unwrap();
        assert_eq!(next.unwrap().title(), "B");
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["C"]);

        // skip only stops the transport; its end report does the chaining
        assert!(sequencer.skip(guild()).await.unwrap());
        assert_eq!(transport.stop_count(), 1);
        let next = sequencer.on_complete(guild(), transport.last_ticket()).await.unwrap();
        assert_eq!(next.unwrap().title(), "C");
        assert!(sequencer.snapshot(guild()).await.upcoming.is_empty());

        let next = sequencer.on_complete(guild(), transport.last_ticket()).await.unwrap();
        assert!(next.is_none());
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn stale_completion_is_ignored() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.enqueue(guild(), track("b")).await.unwrap();
        sequencer.start_if_idle(guild()).await.unwrap();
        let first = transport.last_ticket();

        sequencer.on_complete(guild(), first).await.unwrap();
        // a duplicate end/error report for the first track
        assert!(sequencer.on_complete(guild(), first).await.unwrap().is_none());

        assert_eq!(sequencer.snapshot(guild()).await.now_playing.as_deref(), Some("b"));
        assert_eq!(transport.played(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn refused_track_is_requeued() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        transport.set_refuse(true);

        let result = sequencer.start_if_idle(guild()).await;

        assert_eq!(result, Err(PlayerError::NotConnected));
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Idle);
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["a"]);

        transport.set_refuse(false);
        let started = sequencer.start_if_idle(guild()).await.unwrap();
        assert_eq!(started.unwrap().title(), "a");
    }

    #[tokio::test]
    async fn stop_forgets_session() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.enqueue(guild(), track("b")).await.unwrap();
        sequencer.start_if_idle(guild()).await.unwrap();
        let ticket = transport.last_ticket();

        assert!(sequencer.stop(guild()).await.unwrap());
        assert_eq!(transport.stop_count(), 1);
        assert!(sequencer.snapshot(guild()).await.is_empty());

        // the end report for the stopped track arrives afterwards
        assert!(sequencer.on_complete(guild(), ticket).await.unwrap().is_none());
        assert_eq!(transport.played(), vec!["a"]);
        assert!(!sequencer.stop(guild()).await.unwrap());
    }

    #[tokio::test]
    async fn guilds_are_isolated() {
        let (transport, sequencer) = setup();
        let other = GuildId::new(2);

        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.enqueue(other, track("x")).await.unwrap();
        sequencer.enqueue(other, track("y")).await.unwrap();
        sequencer.start_if_idle(guild()).await.unwrap();

        assert_eq!(sequencer.status(other).await, SessionStatus::Idle);
        assert_eq!(sequencer.clear(guild()).await, 0);
        assert_eq!(sequencer.snapshot(other).await.upcoming, vec!["x", "y"]);

        sequencer.start_if_idle(other).await.unwrap();
        let plays = transport.plays.lock().unwrap().clone();
        assert_eq!(plays[0].0, guild());
        assert_eq!(plays[1].0, other);
        assert_ne!(plays[0].2, plays[1].2);
    }

    #[tokio::test]
    async fn capacity_applies_per_session() {
        let transport = Arc::new(FakeTransport::default());
        let sequencer = PlaybackSequencer::new(transport, Some(1));

        sequencer.enqueue(guild(), track("a")).await.unwrap();
        assert_eq!(
            sequencer.enqueue(guild(), track("b")).await,
            Err(PlayerError::QueueFull(1))
        );
        sequencer.enqueue(GuildId::new(2), track("c")).await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_and_start_on_idle_starts_track() {
        let (transport, sequencer) = setup();

        let outcome = sequencer.enqueue_and_start(guild(), track("a")).await.unwrap();

        assert_eq!(outcome, PlayOutcome::Started(track("a")));
        assert_eq!(transport.played(), vec!["a"]);
    }

    #[tokio::test]
    async fn enqueue_and_start_reports_position_behind_current() {
        let (_, sequencer) = setup();
        sequencer.enqueue_and_start(guild(), track("a")).await.unwrap();

        let outcome = sequencer.enqueue_and_start(guild(), track("b")).await.unwrap();
        assert_eq!(
            outcome,
            PlayOutcome::Queued {
                title: "b".to_string(),
                position: 1
            }
        );
    }

    #[tokio::test]
    async fn concurrent_plays_on_idle_guild_report_consistent_positions() {
        let (transport, sequencer) = setup();
        let sequencer = Arc::new(sequencer);

        let first = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.enqueue_and_start(guild(), track("a")).await }
        });
        let second = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.enqueue_and_start(guild(), track("b")).await }
        });

        let mut outcomes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        outcomes.sort_by_key(|o| matches!(o, PlayOutcome::Queued { .. }));

        let PlayOutcome::Started(started) = &outcomes[0] else {
            panic!("one request must start playback: {:?}", outcomes);
        };
        let PlayOutcome::Queued { title, position } = &outcomes[1] else {
            panic!("the other request must be queued: {:?}", outcomes);
        };
        assert_ne!(started.title(), title);
        assert_eq!(*position, 1);
        assert_eq!(transport.played().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_and_start_resumes_refused_head() {
        let (transport, sequencer) = setup();
        transport.set_refuse(true);
        assert_eq!(
            sequencer.enqueue_and_start(guild(), track("a")).await,
            Err(PlayerError::NotConnected)
        );
        assert_eq!(sequencer.snapshot(guild()).await.upcoming, vec!["a"]);

        transport.set_refuse(false);
        let outcome = sequencer.enqueue_and_start(guild(), track("b")).await.unwrap();

        assert_eq!(
            outcome,
            PlayOutcome::Queued {
                title: "b".to_string(),
                position: 1
            }
        );
        assert_eq!(transport.played(), vec!["a"]);
    }

    #[tokio::test]
    async fn forget_drops_without_transport() {
        let (transport, sequencer) = setup();
        sequencer.enqueue(guild(), track("a")).await.unwrap();
        sequencer.start_if_idle(guild()).await.unwrap();

        assert!(sequencer.forget(guild()));
        assert!(!sequencer.forget(guild()));
        assert_eq!(transport.stop_count(), 0);
        assert_eq!(sequencer.status(guild()).await, SessionStatus::Idle);
    }
}
