//! Episode records: the raw API shape and the render-ready view model.
//!
//! The episodes API (a json-server instance) returns records like:
//!
//! ```json
//! {
//!   "id": "a-importancia-da-contribuicao-em-open-source",
//!   "title": "Faladev #30 | A importância da contribuição em Open Source",
//!   "members": "Diego Fernandes, João Pedro, Diego Haz e Bruno Lemos",
//!   "published_at": "2021-01-22 19:00:00",
//!   "thumbnail": "https://example.com/opensource.jpg",
//!   "description": "<p>Nesse episódio do Faladev, ...</p>",
//!   "file": { "url": "https://example.com/opensource.m4a", "type": "audio/x-m4a", "duration": 3981 }
//! }
//! ```
//!
//! [`normalize`] turns one of those into an [`Episode`]: the date becomes a
//! short localized string (`22 jan 21`), the duration is coerced to whole
//! seconds and formatted as `HH:MM:SS`, and the file object is flattened.
//!
//! ## Invariants
//!
//! - `duration_as_string` is always `duration_to_string(duration)`. The view
//!   model has no setters and no constructor besides [`normalize`].
//! - A record that can't be normalized is an error, never a defaulted episode.
//!
//! ## Trust boundary
//!
//! Descriptions are HTML written by the podcast's own editors and are rendered
//! unescaped. They travel as [`TrustedHtml`] so the only path from the API to
//! raw page markup is visible in the types.

use chrono::{Datelike, NaiveDate, NaiveTime};
use maud::{Markup, PreEscaped, Render};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("invalid publication timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}

// ============================================================================
// Raw API records
// ============================================================================

/// An episode exactly as the API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEpisode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub members: String,
    /// ISO-8601 timestamp, e.g. `2021-01-22 19:00:00`
    pub published_at: String,
    pub thumbnail: String,
    /// HTML
    pub description: String,
    pub file: RawFile,
}

/// The playable media attached to an episode.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    pub url: String,
    pub duration: RawDuration,
}

/// Duration in seconds. The API is not consistent about sending it as a
/// number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Seconds(f64),
    Text(String),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

// ============================================================================
// View model
// ============================================================================

/// HTML from a trusted first-party source, inserted into pages unescaped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrustedHtml(String);

impl TrustedHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Render for TrustedHtml {
    fn render(&self) -> Markup {
        PreEscaped(self.0.clone())
    }
}

/// Render-ready episode.
///
/// Serializes with the field names the page scripts read
/// (`publishedAt`, `durationAsString`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    id: String,
    title: String,
    members: String,
    published_at: String,
    thumbnail: String,
    description: TrustedHtml,
    duration: u64,
    duration_as_string: String,
    url: String,
}

impl Episode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn members(&self) -> &str {
        &self.members
    }

    /// Short localized date, e.g. `22 jan 21`.
    pub fn published_at(&self) -> &str {
        &self.published_at
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn description(&self) -> &TrustedHtml {
        &self.description
    }

    /// Whole seconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// `HH:MM:SS`
    pub fn duration_as_string(&self) -> &str {
        &self.duration_as_string
    }

    /// Playable media URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Locale for publication dates and page labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    /// BCP 47 tag, used for the page's `lang` attribute.
    pub fn tag(self) -> &'static str {
        match self {
            Locale::PtBr => "pt-BR",
            Locale::EnUs => "en-US",
        }
    }

    fn month_abbreviations(self) -> &'static [&'static str; 12] {
        match self {
            Locale::PtBr => &[
                "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
            ],
            Locale::EnUs => &[
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ],
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Build the view model for one raw record.
pub fn normalize(raw: RawEpisode, locale: Locale) -> Result<Episode, NormalizeError> {
    let date = parse_published_at(&raw.published_at)?;
    let duration = coerce_duration(&raw.file.duration)?;

    Ok(Episode {
        id: raw.id,
        title: raw.title,
        members: raw.members,
        published_at: format_short_date(date, locale),
        thumbnail: raw.thumbnail,
        description: TrustedHtml(raw.description),
        duration,
        duration_as_string: duration_to_string(duration),
        url: raw.file.url,
    })
}

/// Format seconds as `HH:MM:SS`.
///
/// Each segment is zero-padded to two digits; hours grow past two digits
/// for durations of 100 hours or more.
pub fn duration_to_string(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = seconds % 3600 / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parse an ISO-8601 timestamp down to the calendar date it names.
///
/// Accepts a bare date, or a date followed by `T` or a space and a time of
/// `HH`, `HH:MM` or `HH:MM:SS[.fff]`, optionally ending in `Z` or an offset
/// (`+HH`, `+HHMM`, `+HH:MM`). Offset-aware timestamps keep their own
/// offset's date.
pub fn parse_published_at(value: &str) -> Result<NaiveDate, NormalizeError> {
    let invalid = || NormalizeError::InvalidTimestamp(value.to_string());
    let trimmed = value.trim();
    let (date, time) = match trimmed.split_at_checked(10) {
        Some((date, "")) => (date, None),
        Some((date, rest)) if rest.starts_with(['T', 't', ' ']) => (date, Some(&rest[1..])),
        _ => return Err(invalid()),
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
    match time {
        Some(time) if !is_time_of_day(strip_offset(time)) => Err(invalid()),
        _ => Ok(date),
    }
}

fn strip_offset(time: &str) -> &str {
    if let Some(local) = time.strip_suffix(['Z', 'z']) {
        return local;
    }
    match time.rfind(['+', '-']) {
        Some(pos) if is_offset(&time[pos + 1..]) => &time[..pos],
        _ => time,
    }
}

fn is_offset(offset: &str) -> bool {
    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    match offset.split_once(':') {
        Some((hours, minutes)) => digits(hours, 2) && digits(minutes, 2),
        None => digits(offset, 2) || digits(offset, 4),
    }
}

fn is_time_of_day(time: &str) -> bool {
    if time.len() == 2 {
        return time.bytes().all(|b| b.is_ascii_digit()) && time.parse::<u32>().is_ok_and(|h| h < 24);
    }
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .any(|pattern| NaiveTime::parse_from_str(time, pattern).is_ok())
}

/// `d MMM yy`: day without padding, abbreviated month, two-digit year.
pub fn format_short_date(date: NaiveDate, locale: Locale) -> String {
    let month = locale.month_abbreviations()[date.month0() as usize];
    format!("{} {} {:02}", date.day(), month, date.year().rem_euclid(100))
}

fn coerce_duration(raw: &RawDuration) -> Result<u64, NormalizeError> {
    let invalid = || NormalizeError::InvalidDuration(raw_duration_text(raw));
    let seconds = match raw {
        RawDuration::Seconds(n) => *n,
        RawDuration::Text(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<u64>() {
                return Ok(n);
            }
            s.parse::<f64>().map_err(|_| invalid())?
        }
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    Ok(seconds.trunc() as u64)
}

fn raw_duration_text(raw: &RawDuration) -> String {
    match raw {
        RawDuration::Seconds(n) => n.to_string(),
        RawDuration::Text(s) => s.clone(),
    }
}
