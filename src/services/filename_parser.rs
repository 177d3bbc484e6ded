//! Filename parser for Telegram-style video drops
//!
//! Turns names like:
//! - "Show.Name.S01E02.[720p].mkv"
//! - "Fate Stay Night UBW - 22 [720p] [Dual] @Anime_Maniaac.mkv"
//! - "Movie Title 2023 (WEB) [H_1"
//!
//! into a display title, then decides whether that title is an episode or a
//! movie. Title rules are evaluated in table order and the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file_utils::{strip_video_extension, UNTITLED};
use crate::error::{OrganizerError, Result};

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").unwrap());
static OPEN_BRACKET_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*$").unwrap());
static OPEN_PAREN_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*$").unwrap());
static HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)S(\d+)\s*(?:-\s*)?E?(\d+)").unwrap());
static TRAILING_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)[\s\-]+(\d{1,3})$").unwrap());
static YEAR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?\b(?:19|20)\d{2}\b)").unwrap());

/// Markers that make a cleaned title an episode
static TV_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)S\d+\s*E\d+",    // S01E01
        r"(?i)S\d+\s*-\s*\d+", // S01 - 01
        r"(?i)S\d+\s+\d+",     // S1 01
        r"(?i)\bEP?\s*\d+\b",  // EP01 / E01
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Episode extractors, tried in order: with a season marker, then bare episode
static EPISODE_EXTRACTORS: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)^(.*?)[\s._-]*S(\d+)[\s._-]*E?(\d+)").unwrap(),
            true,
        ),
        (
            Regex::new(r"(?i)^(.*?)[\s._-]*\bEP?\s*(\d+)\b").unwrap(),
            false,
        ),
    ]
});

/// Which title rule produced a cleaned title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleRuleKind {
    SeasonEpisode,
    AnimeEpisode,
    YearMovie,
    Fallback,
}

/// One entry of the prioritized title rule table
pub struct TitleRule {
    pub kind: TitleRuleKind,
    pub apply: fn(&str) -> Option<String>,
}

/// Title rules in priority order. The fallback is applied after the table.
pub const TITLE_RULES: [TitleRule; 3] = [
    TitleRule {
        kind: TitleRuleKind::SeasonEpisode,
        apply: season_episode_rule,
    },
    TitleRule {
        kind: TitleRuleKind::AnimeEpisode,
        apply: anime_episode_rule,
    },
    TitleRule {
        kind: TitleRuleKind::YearMovie,
        apply: year_movie_rule,
    },
];

/// A cleaned display title and the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTitle {
    pub title: String,
    pub rule: TitleRuleKind,
}

/// Media category of a cleaned title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Tv,
    Movie,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Tv => "tv",
            MediaCategory::Movie => "movie",
        }
    }
}

/// Show, season and episode extracted from an episode title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
}

/// Everything the organizer needs to place a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub display_title: String,
    pub category: MediaCategory,
    /// Present only when `category` is [`MediaCategory::Tv`]
    pub episode: Option<EpisodeInfo>,
}

/// Clean a raw file name or stem into a display title
///
/// Total: never fails and never returns an empty string.
pub fn clean_title(raw: &str) -> String {
    clean_title_with_rule(raw).title
}

/// Clean a raw file name or stem, reporting which rule matched
pub fn clean_title_with_rule(raw: &str) -> CleanedTitle {
    let stem = strip_video_extension(raw);
    let normalized = normalize_stem(stem);

    for rule in &TITLE_RULES {
        if let Some(title) = (rule.apply)(&normalized) {
            return CleanedTitle {
                title,
                rule: rule.kind,
            };
        }
    }

    let title = if !normalized.is_empty() {
        normalized
    } else if !stem.trim().is_empty() {
        stem.trim().to_string()
    } else {
        UNTITLED.to_string()
    };

    CleanedTitle {
        title,
        rule: TitleRuleKind::Fallback,
    }
}

/// Steps 1-3 of cleaning: drop tags and handles, normalize separators
pub fn normalize_stem(stem: &str) -> String {
    let stripped = BRACKETED.replace_all(stem, "");
    let stripped = OPEN_BRACKET_TAIL.replace(&stripped, "");
    let stripped = OPEN_PAREN_TAIL.replace(&stripped, "");
    let stripped = HANDLE.replace_all(&stripped, "");
    let spaced = SEPARATORS.replace_all(&stripped, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Trim whitespace and dangling hyphens left between a title and its marker
fn trim_title(title: &str) -> &str {
    title.trim_matches(|c: char| c.is_whitespace() || c == '-')
}

fn join_title(title: &str, marker: &str) -> String {
    let title = trim_title(title);
    if title.is_empty() {
        marker.to_string()
    } else {
        format!("{} {}", title, marker)
    }
}

fn season_episode_rule(stem: &str) -> Option<String> {
    let caps = SEASON_EPISODE.captures(stem)?;
    let marker = format!("S{}E{}", &caps[2], &caps[3]);
    Some(join_title(&caps[1], &marker))
}

fn anime_episode_rule(stem: &str) -> Option<String> {
    let caps = TRAILING_EPISODE.captures(stem)?;
    Some(join_title(&caps[1], &format!("E{}", &caps[2])))
}

fn year_movie_rule(stem: &str) -> Option<String> {
    let caps = YEAR_PREFIX.captures(stem)?;
    Some(caps[1].trim().to_string())
}

/// Decide whether a cleaned title is an episode or a movie
pub fn detect_media_type(title: &str) -> MediaCategory {
    if TV_MARKERS.iter().any(|re| re.is_match(title)) {
        MediaCategory::Tv
    } else {
        MediaCategory::Movie
    }
}

/// Extract show name, season and episode from an episode title
///
/// Season defaults to 1 when the title only carries an episode number. A title
/// that yields no show name is an error, never a movie.
pub fn parse_tv_title(title: &str) -> Result<EpisodeInfo> {
    for (re, has_season) in EPISODE_EXTRACTORS.iter() {
        let Some(caps) = re.captures(title) else {
            continue;
        };

        let show_name = trim_title(&caps[1]).to_string();
        let (season, episode) = if *has_season {
            (caps[2].parse::<u32>().ok(), caps[3].parse::<u32>().ok())
        } else {
            (Some(1), caps[2].parse::<u32>().ok())
        };

        return match (show_name.is_empty(), season, episode) {
            (false, Some(season), Some(episode)) => Ok(EpisodeInfo {
                show_name,
                season,
                episode,
            }),
            _ => Err(OrganizerError::UnparseableEpisode {
                title: title.to_string(),
            }),
        };
    }

    Err(OrganizerError::UnparseableEpisode {
        title: title.to_string(),
    })
}

/// Clean, classify and (for episodes) extract in one step
pub fn parse_title(file_name: &str) -> Result<ParsedTitle> {
    let cleaned = clean_title_with_rule(file_name);
    let category = detect_media_type(&cleaned.title);
    let episode = match category {
        MediaCategory::Tv => Some(parse_tv_title(&cleaned.title)?),
        MediaCategory::Movie => None,
    };

    debug!(
        file_name = file_name,
        title = %cleaned.title,
        rule = ?cleaned.rule,
        category = category.as_str(),
        episode = ?episode,
        "Parsed filename"
    );

    Ok(ParsedTitle {
        display_title: cleaned.title,
        category,
        episode,
    })
}
