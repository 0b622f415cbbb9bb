//! Player state: what is queued and which entry is playing.
//!
//! The player is a plain value owned by whoever drives playback. It is
//! updated through two operations:
//!
//! - [`Player::set_current`]: play one episode on its own;
//! - [`Player::set_list`]: queue a list and start at an index.
//!
//! A home page row plays with `set_list(page.combined(), index)` where
//! `index` is the row's [`play_index`](crate::pages::HomePage::play_index),
//! so the next/previous buttons walk the whole page in order.
//!
//! This is the library-side contract for playback. Pages play in the
//! browser through `static/player.js`, which implements the same operations
//! over the embedded playlist; the renderer's `data-play-index` values are
//! the `index` arguments given here. Nothing in the crate drives audio.

use crate::episode::Episode;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlayerError {
    #[error("start index {index} is outside a list of {len} episodes")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Player {
    queue: Vec<Episode>,
    current: Option<usize>,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&mut self, episode: Episode) {
        self.queue = vec![episode];
        self.current = Some(0);
    }

    /// Replace the queue and start at `index`. On error the player is unchanged.
    pub fn set_list(&mut self, episodes: Vec<Episode>, index: usize) -> Result<(), PlayerError> {
        if index >= episodes.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: episodes.len(),
            });
        }
        self.queue = episodes;
        self.current = Some(index);
        Ok(())
    }

    pub fn current(&self) -> Option<&Episode> {
        self.current.and_then(|i| self.queue.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn queue(&self) -> &[Episode] {
        &self.queue
    }

    pub fn has_next(&self) -> bool {
        self.current.is_some_and(|i| i + 1 < self.queue.len())
    }

    pub fn has_previous(&self) -> bool {
        self.current.is_some_and(|i| i > 0)
    }

    /// Move to the next episode. Stays put at the end of the queue.
    pub fn next(&mut self) -> Option<&Episode> {
        if self.has_next() {
            self.current = self.current.map(|i| i + 1);
            self.current()
        } else {
            None
        }
    }

    /// Move to the previous episode. Stays put at the start of the queue.
    pub fn previous(&mut self) -> Option<&Episode> {
        if self.has_previous() {
            self.current = self.current.map(|i| i - 1);
            self.current()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
    }
}
