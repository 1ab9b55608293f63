use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Resolved,
    Failed,
}

/// A playable unit: what we show to users and what we hand to the voice
/// driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    source: String,
    state: TrackState,
}

impl Track {
    pub fn resolved(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            state: TrackState::Resolved,
        }
    }

    pub fn failed(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            title: query.clone(),
            source: query,
            state: TrackState::Failed,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Locator understood by the voice transport (a page URL for yt-dlp).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_playable(&self) -> bool {
        self.state() == TrackState::Resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Playing,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Playing => write!(f, "playing"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub now_playing: Option<String>,
    pub upcoming: Vec<String>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.now_playing.is_none() && self.upcoming.is_empty()
    }

    /// Text for the `queue` command. Only the first `limit` upcoming titles
    /// are listed so the reply stays under Discord's message size.
    pub fn render(&self, limit: usize) -> String {
        let mut out = String::new();

        if let Some(title) = &self.now_playing {
            out.push_str(&format!("Now playing: {}\n", title));
        }

        if self.upcoming.is_empty() {
            out.push_str("Nothing else queued.");
            return out;
        }

        out.push_str("Current queue:");
        for (position, title) in self.upcoming.iter().take(limit).enumerate() {
            out.push_str(&format!("\n{}. {}", position + 1, title));
        }

        let hidden = self.upcoming.len().saturating_sub(limit);
        if hidden > 0 {
            out.push_str(&format!("\n...and {} more", hidden));
        }

        out
    }
}

/// What a `play` request did with its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(Track),
    Queued { title: String, position: usize },
}

/// Outcome of a `skip` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped,
    /// Nothing was playing but tracks were waiting; the head was started.
    Resumed(Track),
    NothingPlaying,
}

/// The subset of `yt-dlp --dump-single-json` output we care about.
#[derive(Debug, Default, Deserialize)]
pub struct YtDlpInfo {
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    pub original_url: Option<String>,
    pub url: Option<String>,
    pub entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpInfo {
    /// Playlists and searches only contribute their first entry.
    pub fn into_track(self, query: &str) -> Option<Track> {
        let mut info = self;
        if let Some(entries) = info.entries.take() {
            info = entries.into_iter().next()?;
        }

        let source = info.webpage_url.or(info.original_url).or(info.url)?;
        let title = info.title.unwrap_or_else(|| query.to_string());

        Some(Track::resolved(title, source))
    }
}
