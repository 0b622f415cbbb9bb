//! # Podcastr
//!
//! Listing and player pages for a podcast. Episodes come from a REST API
//! (json-server style), get shaped into render-ready view models, and are
//! rendered to HTML either ahead of time or on demand.
//!
//! # Architecture: Fetch, Normalize, Render
//!
//! ```text
//! 1. Fetch       API        →  RawEpisode       (api)
//! 2. Normalize   RawEpisode →  Episode          (episode)
//! 3. Assemble    Episode    →  HomePage / EpisodePage   (pages)
//! 4. Render      page model →  HTML             (generate)
//! ```
//!
//! The same pipeline backs both ways of publishing:
//!
//! - **Static build** (`podcastr build`, `podcastr episode <id>`): write the
//!   pages into an output directory.
//! - **On-demand serving** (`podcastr serve`): build each page on first
//!   request, then keep it for a fixed time before rebuilding it in the
//!   background ([`cache`], [`server`]).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`api`] | Episodes API client behind the [`api::EpisodeSource`] trait |
//! | [`episode`] | Raw records, the `Episode` view model, date and duration formatting |
//! | [`pages`] | Home and episode page models: the latest/all split and play indices |
//! | [`generate`] | Maud HTML rendering, ETags, writing static pages |
//! | [`cache`] | TTL regeneration with one build per page at a time |
//! | [`server`] | axum routes serving pages through the cache |
//! | [`player`] | Play queue state: current episode, next, previous |
//! | [`config`] | `podcastr.toml` loading, layering, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Descriptions Are Trusted HTML
//!
//! Episode descriptions arrive as HTML from a first-party API and are
//! rendered as-is. Everything else is escaped by maud. The only way raw
//! markup reaches a page is through [`episode::TrustedHtml`], so the trust
//! boundary is visible in the types.
//!
//! ## One Play Queue Per Page
//!
//! The home page plays from a single list: the latest strip followed by the
//! table. A row's play index is its position in that list, so "next" after
//! the last latest episode continues into the table.

pub mod api;
pub mod cache;
pub mod config;
pub mod episode;
pub mod generate;
pub mod output;
pub mod pages;
pub mod player;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
