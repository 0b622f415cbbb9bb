//! Shared test utilities for the podcastr test suite.
//!
//! Provides raw record builders, an in-memory [`EpisodeSource`] that counts
//! the requests it answers, and a manually advanced clock for regeneration
//! tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = StubSource::new(raw_listing(12));
//! let page = HomePage::build(&source, &HomeConfig::default(), Locale::PtBr).await?;
//! assert_eq!(source.listing_calls(), 1);
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::api::{EpisodeSource, FetchError};
use crate::cache::Clock;
use crate::episode::{RawDuration, RawEpisode, RawFile};

// =========================================================================
// Raw records
// =========================================================================

/// A well-formed raw record with the given id, timestamp, and duration.
pub fn raw_episode(id: &str, published_at: &str, duration: RawDuration) -> RawEpisode {
    RawEpisode {
        id: id.to_string(),
        title: format!("Episode {id}"),
        members: "Diego Fernandes, Richard Lopes".to_string(),
        published_at: published_at.to_string(),
        thumbnail: format!("https://cdn.example.com/{id}.jpg"),
        description: format!("<p>Notes for <strong>{id}</strong></p>"),
        file: RawFile {
            url: format!("https://cdn.example.com/{id}.m4a"),
            duration,
        },
    }
}

/// `n` records, newest first: `episode-1` is published on the latest day.
pub fn raw_listing(n: usize) -> Vec<RawEpisode> {
    (1..=n)
        .map(|i| {
            let day = 28 - (i % 28);
            let month = 12 - (i / 28) % 12;
            raw_episode(
                &format!("episode-{i}"),
                &format!("2021-{month:02}-{day:02} 19:00:00"),
                RawDuration::Seconds((600 * i) as f64),
            )
        })
        .collect()
}

// =========================================================================
// In-memory episode source
// =========================================================================

/// [`EpisodeSource`] over a fixed list of records.
pub struct StubSource {
    episodes: Mutex<Vec<RawEpisode>>,
    fail: bool,
    limits: Mutex<Vec<usize>>,
    listing_calls: AtomicUsize,
    episode_calls: AtomicUsize,
}

impl StubSource {
    pub fn new(episodes: Vec<RawEpisode>) -> Self {
        Self {
            episodes: Mutex::new(episodes),
            fail: false,
            limits: Mutex::new(Vec::new()),
            listing_calls: AtomicUsize::new(0),
            episode_calls: AtomicUsize::new(0),
        }
    }

    /// A source whose every request fails like an unreachable API.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Replace the records served from now on.
    pub fn replace(&self, episodes: Vec<RawEpisode>) {
        *self.episodes.lock().unwrap() = episodes;
    }

    pub fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn episode_calls(&self) -> usize {
        self.episode_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> FetchError {
        FetchError::InvalidBaseUrl("stub://unavailable".to_string())
    }
}

impl EpisodeSource for StubSource {
    async fn latest(&self, limit: usize) -> Result<Vec<RawEpisode>, FetchError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        if self.fail {
            return Err(Self::unavailable());
        }
        let episodes = self.episodes.lock().unwrap();
        Ok(episodes.iter().take(limit).cloned().collect())
    }

    async fn episode(&self, id: &str) -> Result<RawEpisode, FetchError> {
        self.episode_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::unavailable());
        }
        self.episodes
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { id: id.to_string() })
    }
}

// =========================================================================
// Clock
// =========================================================================

/// A [`Clock`] that only moves when told to.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
