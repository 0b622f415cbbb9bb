//! Page builders: fetch, normalize, and shape episodes for each page.
//!
//! - [`HomePage`]: the newest episodes, split into a short "latest" strip and
//!   the remaining list. Both sections play from one combined list so that
//!   pressing play on any row queues everything after it.
//! - [`EpisodePage`]: a single episode looked up by identifier.
//!
//! Builders never return partial results: one record that fails to normalize
//! fails the whole page.

use crate::api::{EpisodeSource, FetchError};
use crate::config::HomeConfig;
use crate::episode::{Episode, Locale, NormalizeError, RawEpisode, normalize};
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("episode {id:?}: {source}")]
    Normalize {
        id: String,
        #[source]
        source: NormalizeError,
    },
}

impl PageError {
    /// Whether the page failed because the requested episode doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PageError::Fetch(FetchError::NotFound { .. }))
    }
}

fn normalize_record(raw: RawEpisode, locale: Locale) -> Result<Episode, PageError> {
    let id = raw.id.clone();
    normalize(raw, locale).map_err(|source| PageError::Normalize { id, source })
}

/// Which list a home page row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Latest,
    All,
}

/// Home page view: `latest` followed by `all`, newest first.
#[derive(Debug, Clone)]
pub struct HomePage {
    episodes: Vec<Episode>,
    latest_len: usize,
}

impl HomePage {
    /// Fetch up to `config.limit` episodes and split off the first
    /// `config.latest_count` as the latest strip.
    pub async fn build<S: EpisodeSource>(
        source: &S,
        config: &HomeConfig,
        locale: Locale,
    ) -> Result<Self, PageError> {
        let raw = source.latest(config.limit).await?;
        let episodes = raw
            .into_iter()
            .take(config.limit)
            .map(|r| normalize_record(r, locale))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("home page: {} episodes", episodes.len());
        Ok(Self::from_episodes(episodes, config.latest_count))
    }

    /// Split already-normalized episodes. `latest_count` larger than the
    /// list just puts everything in the latest strip.
    pub fn from_episodes(episodes: Vec<Episode>, latest_count: usize) -> Self {
        let latest_len = latest_count.min(episodes.len());
        Self {
            episodes,
            latest_len,
        }
    }

    pub fn latest(&self) -> &[Episode] {
        &self.episodes[..self.latest_len]
    }

    pub fn all(&self) -> &[Episode] {
        &self.episodes[self.latest_len..]
    }

    /// The play queue: latest followed by all.
    pub fn combined(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn section(&self, section: Section) -> &[Episode] {
        match section {
            Section::Latest => self.latest(),
            Section::All => self.all(),
        }
    }

    /// Position in [`combined`](Self::combined) of `row` within `section`.
    pub fn play_index(&self, section: Section, row: usize) -> usize {
        match section {
            Section::Latest => row,
            Section::All => self.latest_len + row,
        }
    }

    /// Rows of a section paired with their play index.
    pub fn rows(&self, section: Section) -> impl Iterator<Item = (usize, &Episode)> {
        self.section(section)
            .iter()
            .enumerate()
            .map(move |(row, episode)| (self.play_index(section, row), episode))
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

/// Episode detail view.
#[derive(Debug, Clone)]
pub struct EpisodePage {
    pub episode: Episode,
}

impl EpisodePage {
    pub async fn build<S: EpisodeSource>(
        source: &S,
        id: &str,
        locale: Locale,
    ) -> Result<Self, PageError> {
        let raw = source.episode(id).await?;
        let episode = normalize_record(raw, locale)?;
        Ok(Self { episode })
    }
}
