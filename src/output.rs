//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output leads with what an episode *is*: its positional index and title.
//! Ids, paths, and timings follow as indented context lines, so `check` reads
//! like a listing of the show and `build` still says where each file went.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Latest
//! 001 A importância da contribuição em Open Source
//!     Id: a-importancia-da-contribuicao-em-open-source
//!     Diego e Richard · 8 jan 21 · 01:15:48
//! 002 Como programar no seu primeiro ano
//!     ...
//!
//! All episodes
//! 003 ...
//!
//! Fetched 12 episodes (2 latest, 10 more)
//! ```
//!
//! ## Build
//!
//! ```text
//! Home → index.html
//!     001 A importância da contribuição em Open Source → episodes/a-importancia-.../index.html
//!
//! Generated home page and 12 episode pages
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::config::SiteConfig;
use crate::episode::Episode;
use crate::pages::{EpisodePage, HomePage, Section};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `members · date · duration`, the second line of every episode entry.
fn episode_facts(episode: &Episode) -> String {
    format!(
        "{} · {} · {}",
        episode.members(),
        episode.published_at(),
        episode.duration_as_string()
    )
}

/// Human form of a revalidation interval: `8h`, `1h 30m`, `45s`.
pub fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if s > 0 || parts.is_empty() {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}

// ============================================================================
// check
// ============================================================================

/// Format the home listing as fetched and normalized, without writing anything.
pub fn format_check_output(page: &HomePage) -> Vec<String> {
    let mut lines = Vec::new();

    for (section, heading) in [(Section::Latest, "Latest"), (Section::All, "All episodes")] {
        if page.section(section).is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(heading.to_string());
        for (index, episode) in page.rows(section) {
            lines.push(format!("{} {}", format_index(index + 1), episode.title()));
            lines.push(format!("{}Id: {}", indent(1), episode.id()));
            lines.push(format!("{}{}", indent(1), episode_facts(episode)));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Fetched {} episodes ({} latest, {} more)",
        page.len(),
        page.latest().len(),
        page.all().len()
    ));
    lines
}

pub fn print_check_output(page: &HomePage) {
    for line in format_check_output(page) {
        println!("{}", line);
    }
}

// ============================================================================
// build / episode
// ============================================================================

/// Format the result of a static build: the home page, then one line per
/// episode page in play order.
pub fn format_build_output(page: &HomePage, home: &Path, episodes: &[PathBuf]) -> Vec<String> {
    let mut lines = vec![format!("Home → {}", home.display())];
    for ((index, episode), written) in page
        .rows(Section::Latest)
        .chain(page.rows(Section::All))
        .zip(episodes)
    {
        lines.push(format!(
            "{}{} {} → {}",
            indent(1),
            format_index(index + 1),
            episode.title(),
            written.display()
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Generated home page and {} episode pages",
        episodes.len()
    ));
    lines
}

pub fn print_build_output(page: &HomePage, home: &Path, episodes: &[PathBuf]) {
    for line in format_build_output(page, home, episodes) {
        println!("{}", line);
    }
}

/// Format the result of writing one episode page.
pub fn format_episode_output(page: &EpisodePage, written: &Path) -> Vec<String> {
    let episode = &page.episode;
    let mut lines = vec![
        format!("{} → {}", episode.title(), written.display()),
        format!("{}{}", indent(1), episode_facts(episode)),
    ];
    let plain = strip_html_tags(episode.description().as_str());
    let preview = truncate_desc(plain.trim(), 60);
    if !preview.is_empty() {
        lines.push(format!("{}{}", indent(1), preview));
    }
    lines
}

pub fn print_episode_output(page: &EpisodePage, written: &Path) {
    for line in format_episode_output(page, written) {
        println!("{}", line);
    }
}

// ============================================================================
// serve
// ============================================================================

/// Format the startup banner for `serve`.
pub fn format_serve_banner(config: &SiteConfig) -> Vec<String> {
    vec![
        format!("Serving {} on http://{}", config.site.title, config.server.bind),
        format!("{}API: {}", indent(1), config.api.base_url),
        format!(
            "{}Home: revalidate every {}",
            indent(1),
            format_ttl(config.home.revalidate())
        ),
        format!(
            "{}Episodes: revalidate every {}",
            indent(1),
            format_ttl(config.episodes.revalidate())
        ),
    ]
}

pub fn print_serve_banner(config: &SiteConfig) {
    for line in format_serve_banner(config) {
        println!("{}", line);
    }
}
