//! HTML page generation.
//!
//! Renders the home and episode pages from their view models and writes them
//! to disk for static builds. The server reuses the same renderers through
//! [`build_home_page`] and [`build_episode_page`].
//!
//! ## Generated Pages
//!
//! - **Home** (`/index.html`): the latest strip, then a table with the rest
//! - **Episode** (`/episodes/{id}/index.html`): header, play button, and the
//!   episode's description
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html
//! └── episodes/
//!     ├── a-importancia-da-contribuicao-em-open-source/
//!     │   └── index.html
//!     └── ...
//! ```
//!
//! ## Playback
//!
//! Every page embeds its play queue as JSON
//! (`<script type="application/json" id="playlist">`). Play buttons carry a
//! `data-play-index` into that queue; on the home page that is the row's
//! position in latest-then-all order, so the latest strip and the table share
//! one queue. `static/player.js` drives an `<audio>` element from it.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/). Everything interpolated is escaped
//! except episode descriptions, which are [`TrustedHtml`](crate::episode::TrustedHtml).

use crate::api::EpisodeSource;
use crate::config::SiteConfig;
use crate::episode::{Episode, Locale};
use crate::pages::{EpisodePage, HomePage, PageError, Section};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("episode id {0:?} can't be used as a page path")]
    InvalidEpisodeId(String),
}

impl GenerateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GenerateError::Page(err) if err.is_not_found())
    }
}

const CSS: &str = include_str!("../static/style.css");
const JS: &str = include_str!("../static/player.js");

/// A finished HTML document plus its entity tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub html: String,
    /// Quoted SHA-256 of `html`, ready for an `ETag` header.
    pub etag: String,
}

impl RenderedPage {
    pub fn new(markup: Markup) -> Self {
        let html = markup.into_string();
        let etag = format!("\"{:x}\"", Sha256::digest(html.as_bytes()));
        Self { html, etag }
    }
}

// ============================================================================
// Labels
// ============================================================================

struct Labels {
    tagline: &'static str,
    home_title: &'static str,
    latest_heading: &'static str,
    all_heading: &'static str,
    col_podcast: &'static str,
    col_members: &'static str,
    col_date: &'static str,
    col_duration: &'static str,
    play: &'static str,
    back: &'static str,
    idle: &'static str,
    previous: &'static str,
    next: &'static str,
}

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::PtBr => &Labels {
            tagline: "O melhor para você ouvir, sempre",
            home_title: "Home",
            latest_heading: "Últimos lançamentos",
            all_heading: "Todos episódios",
            col_podcast: "Podcast",
            col_members: "Integrantes",
            col_date: "Data",
            col_duration: "Duração",
            play: "Tocar episódio",
            back: "Voltar",
            idle: "Selecione um podcast para ouvir",
            previous: "Tocar anterior",
            next: "Tocar próximo",
        },
        Locale::EnUs => &Labels {
            tagline: "The best for you to listen to, always",
            home_title: "Home",
            latest_heading: "Latest releases",
            all_heading: "All episodes",
            col_podcast: "Podcast",
            col_members: "Members",
            col_date: "Date",
            col_duration: "Duration",
            play: "Play episode",
            back: "Back",
            idle: "Pick an episode to listen to",
            previous: "Play previous",
            next: "Play next",
        },
    }
}

// ============================================================================
// Building pages (fetch + render)
// ============================================================================

/// Fetch, normalize, and render the home page.
pub async fn build_home_page<S: EpisodeSource>(
    source: &S,
    config: &SiteConfig,
) -> Result<RenderedPage, GenerateError> {
    let page = HomePage::build(source, &config.home, config.site.locale).await?;
    render_home(&page, config).map(RenderedPage::new)
}

/// Fetch, normalize, and render one episode page.
pub async fn build_episode_page<S: EpisodeSource>(
    source: &S,
    config: &SiteConfig,
    id: &str,
) -> Result<RenderedPage, GenerateError> {
    let page = EpisodePage::build(source, id, config.site.locale).await?;
    render_episode(&page, config).map(RenderedPage::new)
}

// ============================================================================
// Writing pages
// ============================================================================

/// Write `index.html` into `output_dir`. Returns the path written, relative
/// to `output_dir`.
pub fn write_home(
    page: &HomePage,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<PathBuf, GenerateError> {
    let html = render_home(page, config)?;
    let relative = PathBuf::from("index.html");
    fs::create_dir_all(output_dir)?;
    fs::write(output_dir.join(&relative), html.into_string())?;
    Ok(relative)
}

/// Write `episodes/{id}/index.html` into `output_dir`. Returns the path
/// written, relative to `output_dir`.
pub fn write_episode(
    page: &EpisodePage,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<PathBuf, GenerateError> {
    let id = page.episode.id();
    if !is_safe_path_segment(id) {
        return Err(GenerateError::InvalidEpisodeId(id.to_string()));
    }
    let html = render_episode(page, config)?;
    let dir = Path::new("episodes").join(id);
    fs::create_dir_all(output_dir.join(&dir))?;
    let relative = dir.join("index.html");
    fs::write(output_dir.join(&relative), html.into_string())?;
    Ok(relative)
}

/// Write the page of every episode listed on the home page, rendered from the
/// listing's own records. Returns the paths written in play order, relative
/// to `output_dir`.
pub fn write_episodes(
    page: &HomePage,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, GenerateError> {
    page.combined()
        .iter()
        .map(|episode| {
            let detail = EpisodePage {
                episode: episode.clone(),
            };
            write_episode(&detail, config, output_dir)
        })
        .collect()
}

fn is_safe_path_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

/// Site-relative URL of an episode page.
pub fn episode_href(id: &str) -> String {
    format!("/episodes/{}", urlencoding::encode(id))
}

/// Serialize a play queue for embedding in a `<script>` element.
fn playlist_json(episodes: &[Episode]) -> Result<String, serde_json::Error> {
    // No raw '<' may reach the HTML parser inside a script element.
    Ok(serde_json::to_string(episodes)?.replace('<', "\\u003c"))
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document: header, page content, player bar.
fn base_document(
    title: &str,
    config: &SiteConfig,
    playlist: &[Episode],
    content: Markup,
) -> Result<Markup, GenerateError> {
    let labels = labels(config.site.locale);
    let playlist = playlist_json(playlist)?;
    Ok(html! {
        (DOCTYPE)
        html lang=(config.site.locale.tag()) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " | " (config.site.title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.wrapper {
                    main {
                        (site_header(&config.site.title, labels))
                        (content)
                    }
                    (player_bar(labels))
                }
                script id="playlist" type="application/json" { (PreEscaped(playlist)) }
                script { (PreEscaped(JS)) }
            }
        }
    })
}

fn site_header(site_title: &str, labels: &Labels) -> Markup {
    html! {
        header.site-header {
            a.logo href="/" { (site_title) }
            p { (labels.tagline) }
        }
    }
}

fn player_bar(labels: &Labels) -> Markup {
    html! {
        aside.player {
            div.now-playing {
                strong id="now-playing-title" { (labels.idle) }
                span id="now-playing-members" {}
            }
            audio id="player-audio" controls preload="none" {}
            div.player-buttons {
                button id="player-previous" type="button" disabled aria-label=(labels.previous) { "⏮" }
                button id="player-next" type="button" disabled aria-label=(labels.next) { "⏭" }
            }
        }
    }
}

fn play_button(index: usize, labels: &Labels) -> Markup {
    html! {
        button.play-button type="button" data-play-index=(index) aria-label=(labels.play) { "▶" }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders the home page.
pub fn render_home(page: &HomePage, config: &SiteConfig) -> Result<Markup, GenerateError> {
    let labels = labels(config.site.locale);

    let content = html! {
        div.homepage {
            section.latest-episodes {
                h2 { (labels.latest_heading) }
                ul {
                    @for (index, episode) in page.rows(Section::Latest) {
                        li {
                            img src=(episode.thumbnail()) alt=(episode.title()) width="192" height="192" loading="lazy";
                            div.episode-details {
                                a href=(episode_href(episode.id())) { (episode.title()) }
                                p { (episode.members()) }
                                span { (episode.published_at()) }
                                span { (episode.duration_as_string()) }
                            }
                            (play_button(index, labels))
                        }
                    }
                }
            }
            @if !page.all().is_empty() {
                section.all-episodes {
                    h2 { (labels.all_heading) }
                    table {
                        thead {
                            tr {
                                th {}
                                th { (labels.col_podcast) }
                                th { (labels.col_members) }
                                th { (labels.col_date) }
                                th { (labels.col_duration) }
                                th {}
                            }
                        }
                        tbody {
                            @for (index, episode) in page.rows(Section::All) {
                                tr {
                                    td.thumb {
                                        img src=(episode.thumbnail()) alt=(episode.title()) width="120" height="120" loading="lazy";
                                    }
                                    td {
                                        a href=(episode_href(episode.id())) { (episode.title()) }
                                    }
                                    td { (episode.members()) }
                                    td.date { (episode.published_at()) }
                                    td { (episode.duration_as_string()) }
                                    td { (play_button(index, labels)) }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base_document(labels.home_title, config, page.combined(), content)
}

/// Renders an episode detail page.
pub fn render_episode(page: &EpisodePage, config: &SiteConfig) -> Result<Markup, GenerateError> {
    let labels = labels(config.site.locale);
    let episode = &page.episode;

    let content = html! {
        div.episode {
            div.thumbnail-container {
                a.back-button href="/" aria-label=(labels.back) { "←" }
                img src=(episode.thumbnail()) alt=(episode.title()) width="700" height="160";
                (play_button(0, labels))
            }
            header {
                h1 { (episode.title()) }
                span { (episode.members()) }
                span { (episode.published_at()) }
                span { (episode.duration_as_string()) }
            }
            div.description {
                (episode.description())
            }
        }
    };

    base_document(episode.title(), config, std::slice::from_ref(episode), content)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{RawDuration, normalize};
    use crate::player::Player;
    use crate::test_helpers::{StubSource, raw_episode, raw_listing};
    use tempfile::TempDir;

    fn home_page(n: usize) -> HomePage {
        let episodes = raw_listing(n)
            .into_iter()
            .map(|r| normalize(r, Locale::PtBr).unwrap())
            .collect();
        HomePage::from_episodes(episodes, 2)
    }

    fn episode_page(id: &str) -> EpisodePage {
        let raw = raw_episode(id, "2021-01-22 19:00:00", RawDuration::Seconds(5400.0));
        EpisodePage {
            episode: normalize(raw, Locale::PtBr).unwrap(),
        }
    }

    /// Values of every `data-play-index` attribute, in document order.
    fn play_indices(html: &str) -> Vec<usize> {
        html.split("data-play-index=\"")
            .skip(1)
            .map(|rest| rest.split('"').next().unwrap().parse().unwrap())
            .collect()
    }

    // =========================================================================
    // Home
    // =========================================================================

    #[test]
    fn home_play_indices_follow_combined_order() {
        let page = home_page(12);
        let html = render_home(&page, &SiteConfig::default())
            .unwrap()
            .into_string();
        assert_eq!(play_indices(&html), (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn play_buttons_queue_their_own_row() {
        let page = home_page(12);
        let html = render_home(&page, &SiteConfig::default())
            .unwrap()
            .into_string();

        for index in play_indices(&html) {
            let mut player = Player::new();
            player.set_list(page.combined().to_vec(), index).unwrap();

            // The nearest episode link before a button belongs to its row.
            let button = html.find(&format!("data-play-index=\"{index}\"")).unwrap();
            let link = &html[..button];
            let start = link.rfind("href=\"/episodes/").unwrap() + "href=\"".len();
            let href = &link[start..start + link[start..].find('"').unwrap()];
            assert_eq!(href, episode_href(player.current().unwrap().id()));
        }
    }

    #[test]
    fn home_sections_and_title() {
        let html = render_home(&home_page(5), &SiteConfig::default())
            .unwrap()
            .into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Home | Podcastr</title>"));
        assert!(html.contains("Últimos lançamentos"));
        assert!(html.contains("Todos episódios"));
        assert!(html.contains(r#"href="/episodes/episode-3""#));
        assert!(html.contains(r#"lang="pt-BR""#));
    }

    #[test]
    fn home_without_rest_omits_table() {
        let html = render_home(&home_page(1), &SiteConfig::default())
            .unwrap()
            .into_string();
        assert!(!html.contains("<table>"));
        assert_eq!(play_indices(&html), vec![0]);
    }

    #[test]
    fn home_embeds_combined_playlist() {
        let page = home_page(3);
        let html = render_home(&page, &SiteConfig::default())
            .unwrap()
            .into_string();
        let start = html.find(r#"<script id="playlist" type="application/json">"#).unwrap();
        let body = &html[start..];
        let json = &body[body.find('>').unwrap() + 1..body.find("</script>").unwrap()];
        let list: serde_json::Value = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["episode-1", "episode-2", "episode-3"]);
        assert_eq!(list[0]["durationAsString"], "00:10:00");
    }

    #[test]
    fn english_labels() {
        let mut config = SiteConfig::default();
        config.site.locale = Locale::EnUs;
        let html = render_home(&home_page(3), &config).unwrap().into_string();
        assert!(html.contains("Latest releases"));
        assert!(html.contains(r#"lang="en-US""#));
    }

    #[test]
    fn titles_are_escaped() {
        let mut raw = raw_episode("xss", "2021-01-22", RawDuration::Seconds(1.0));
        raw.title = "<script>alert('xss')</script>".into();
        let page = HomePage::from_episodes(vec![normalize(raw, Locale::PtBr).unwrap()], 2);
        let html = render_home(&page, &SiteConfig::default())
            .unwrap()
            .into_string();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn playlist_json_cannot_close_script() {
        let mut raw = raw_episode("ep", "2021-01-22", RawDuration::Seconds(1.0));
        raw.description = "<p>bye</script><script>alert(1)</script></p>".into();
        let episode = normalize(raw, Locale::PtBr).unwrap();
        let json = playlist_json(std::slice::from_ref(&episode)).unwrap();
        assert!(!json.contains('<'));
        let back: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back[0]["description"],
            "<p>bye</script><script>alert(1)</script></p>"
        );
    }

    // =========================================================================
    // Episode
    // =========================================================================

    #[test]
    fn episode_page_renders_description_unescaped() {
        let page = episode_page("opensource");
        let html = render_episode(&page, &SiteConfig::default())
            .unwrap()
            .into_string();
        assert!(html.contains("<p>Notes for <strong>opensource</strong></p>"));
        assert!(html.contains("<title>Episode opensource | Podcastr</title>"));
        assert!(html.contains("01:30:00"));
        assert!(html.contains("22 jan 21"));
        assert_eq!(play_indices(&html), vec![0]);
    }

    #[test]
    fn episode_href_encodes_id() {
        assert_eq!(episode_href("a b"), "/episodes/a%20b");
        assert_eq!(episode_href("faladev-30"), "/episodes/faladev-30");
    }

    // =========================================================================
    // RenderedPage
    // =========================================================================

    #[test]
    fn etag_tracks_content() {
        let a = RenderedPage::new(html! { p { "a" } });
        let b = RenderedPage::new(html! { p { "a" } });
        let c = RenderedPage::new(html! { p { "b" } });
        assert_eq!(a.etag, b.etag);
        assert_ne!(a.etag, c.etag);
        assert!(a.etag.starts_with('"') && a.etag.ends_with('"'));
        assert_eq!(a.etag.len(), 66);
    }

    // =========================================================================
    // Writing
    // =========================================================================

    #[test]
    fn write_home_creates_index() {
        let tmp = TempDir::new().unwrap();
        let written = write_home(&home_page(4), &SiteConfig::default(), tmp.path()).unwrap();
        assert_eq!(written, PathBuf::from("index.html"));
        let html = fs::read_to_string(tmp.path().join("index.html")).unwrap();
        assert!(html.contains("episode-4"));
    }

    #[test]
    fn write_episode_nests_under_episodes() {
        let tmp = TempDir::new().unwrap();
        let written =
            write_episode(&episode_page("faladev-30"), &SiteConfig::default(), tmp.path()).unwrap();
        assert_eq!(written, Path::new("episodes/faladev-30/index.html"));
        assert!(tmp.path().join(&written).is_file());
    }

    #[test]
    fn write_episodes_covers_every_home_link() {
        let tmp = TempDir::new().unwrap();
        let page = home_page(12);
        let config = SiteConfig::default();
        write_home(&page, &config, tmp.path()).unwrap();
        let written = write_episodes(&page, &config, tmp.path()).unwrap();

        assert_eq!(written.len(), 12);
        assert_eq!(written[0], Path::new("episodes/episode-1/index.html"));
        for episode in page.combined() {
            let href = episode_href(episode.id());
            let file = tmp.path().join(href.trim_start_matches('/')).join("index.html");
            assert!(file.is_file(), "{href} has no page");
        }
    }

    #[test]
    fn write_episode_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        for id in ["..", "a/b", "a\\b", "."] {
            let err = write_episode(&episode_page(id), &SiteConfig::default(), tmp.path())
                .unwrap_err();
            assert!(matches!(err, GenerateError::InvalidEpisodeId(_)), "{id}");
        }
    }

    // =========================================================================
    // Building
    // =========================================================================

    #[tokio::test]
    async fn build_episode_page_reports_not_found() {
        let source = StubSource::new(raw_listing(2));
        let err = build_episode_page(&source, &SiteConfig::default(), "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn build_home_page_renders() {
        let source = StubSource::new(raw_listing(12));
        let page = build_home_page(&source, &SiteConfig::default())
            .await
            .unwrap();
        assert_eq!(play_indices(&page.html).len(), 12);
    }
}
