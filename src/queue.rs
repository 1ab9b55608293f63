use std::collections::VecDeque;

use crate::error::{PlayerError, Result};
use crate::models::Track;

/// FIFO of tracks waiting to be played in one session.
#[derive(Debug, Default)]
pub struct QueueStore {
    tracks: VecDeque<Track>,
    capacity: Option<usize>,
}

impl QueueStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            tracks: VecDeque::new(),
            capacity,
        }
    }

    /// Appends `track` and returns its 1-based position.
    pub fn enqueue(&mut self, track: Track) -> Result<usize> {
        if !track.is_playable() {
            return Err(PlayerError::ExtractionFailure(track.title().to_string()));
        }

        if let Some(limit) = self.capacity {
            if self.tracks.len() >= limit {
                return Err(PlayerError::QueueFull(limit));
            }
        }

        self.tracks.push_back(track);
        Ok(self.tracks.len())
    }

    pub fn dequeue_next(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Puts a track back at the head, bypassing the capacity check.
    pub fn requeue_front(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.tracks.len();
        self.tracks.clear();
        removed
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.title().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
