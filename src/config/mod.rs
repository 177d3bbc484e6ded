//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::OrganizerError;
use crate::jobs::StabilitySettings;
use crate::services::logging::LogFormat;
use crate::services::organizer::{Branch, Routing, RoutingMode};
use crate::services::watcher::WatcherSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory Telegram downloads land in
    pub watch_dir: PathBuf,

    /// Root of the organized library
    pub destination_root: PathBuf,

    /// Pause between directory listings
    pub scan_interval: Duration,

    /// Pause between size samples of one file
    pub stability_delay: Duration,

    /// Consecutive equal non-zero samples before a file is ready
    pub stability_checks: u32,

    /// How long an idle worker waits on its queue before re-checking shutdown
    pub queue_wait: Duration,

    pub stability_workers: usize,
    pub processor_workers: usize,

    /// Branch for episodes in static routing (anime_video or web_series)
    pub tv_branch: Branch,

    /// Branch for movies in static routing (anime_movie or movie)
    pub movie_branch: Branch,

    pub routing_mode: RoutingMode,

    /// TMDb API key; only used in classified routing
    pub tmdb_api_key: Option<String>,

    pub classifier_timeout: Duration,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tv_branch = parse_with(&var, "TV_BRANCH", Branch::AnimeVideo, Branch::from_str)?;
        let movie_branch = parse_with(&var, "MOVIE_BRANCH", Branch::AnimeMovie, Branch::from_str)?;

        let config = Self {
            watch_dir: var("WATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),

            destination_root: var("DESTINATION_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./library")),

            scan_interval: Duration::from_secs(parse_number(&var, "SCAN_INTERVAL_SECS", 5)?),

            stability_delay: Duration::from_secs(parse_number(&var, "STABILITY_DELAY_SECS", 2)?),

            stability_checks: parse_number(&var, "STABILITY_CHECKS", 3)?,

            queue_wait: Duration::from_millis(parse_number(&var, "QUEUE_WAIT_MS", 2000)?),

            stability_workers: parse_number(&var, "STABILITY_WORKERS", 1)?,

            processor_workers: parse_number(&var, "PROCESSOR_WORKERS", 1)?,

            tv_branch,
            movie_branch,

            routing_mode: parse_with(
                &var,
                "ROUTING_MODE",
                RoutingMode::Static,
                RoutingMode::from_str,
            )?,

            tmdb_api_key: var("TMDB_API_KEY"),

            classifier_timeout: Duration::from_secs(parse_number(
                &var,
                "CLASSIFIER_TIMEOUT_SECS",
                10,
            )?),

            log_format: parse_with(&var, "LOG_FORMAT", LogFormat::Json, LogFormat::from_str)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), OrganizerError> {
        let invalid = |msg: &str| Err(OrganizerError::Config(msg.to_string()));

        if self.scan_interval.is_zero() {
            return invalid("SCAN_INTERVAL_SECS must be greater than zero");
        }
        if self.stability_checks == 0 {
            return invalid("STABILITY_CHECKS must be greater than zero");
        }
        if self.stability_workers == 0 || self.processor_workers == 0 {
            return invalid("worker counts must be greater than zero");
        }
        if self.queue_wait.is_zero() {
            return invalid("QUEUE_WAIT_MS must be greater than zero");
        }
        if !self.tv_branch.holds_episodes() {
            return invalid("TV_BRANCH must be anime_video or web_series");
        }
        if self.movie_branch.holds_episodes() {
            return invalid("MOVIE_BRANCH must be anime_movie or movie");
        }
        Ok(())
    }

    pub fn routing(&self) -> Routing {
        Routing {
            mode: self.routing_mode,
            tv_branch: self.tv_branch,
            movie_branch: self.movie_branch,
        }
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            watch_dir: self.watch_dir.clone(),
            destination_root: self.destination_root.clone(),
            scan_interval: self.scan_interval,
            stability: StabilitySettings {
                delay: self.stability_delay,
                required_checks: self.stability_checks,
            },
            queue_wait: self.queue_wait,
            stability_workers: self.stability_workers,
            processor_workers: self.processor_workers,
            routing: self.routing(),
            tmdb_api_key: self.tmdb_api_key.clone(),
            classifier_timeout: self.classifier_timeout,
        }
    }
}

fn parse_number<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_with<T, F>(var: &F, key: &str, default: T, parse: fn(&str) -> Option<T>) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse(&raw).with_context(|| format!("Invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.watch_dir, PathBuf::from("./downloads"));
        assert_eq!(config.destination_root, PathBuf::from("./library"));
        assert_eq!(config.scan_interval, Duration::from_secs(5));
        assert_eq!(config.stability_delay, Duration::from_secs(2));
        assert_eq!(config.stability_checks, 3);
        assert_eq!(config.queue_wait, Duration::from_millis(2000));
        assert_eq!(config.tv_branch, Branch::AnimeVideo);
        assert_eq!(config.movie_branch, Branch::AnimeMovie);
        assert_eq!(config.routing_mode, RoutingMode::Static);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.tmdb_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WATCH_DIR", "/tg"),
            ("STABILITY_CHECKS", "5"),
            ("TV_BRANCH", "web_series"),
            ("MOVIE_BRANCH", "movie"),
            ("ROUTING_MODE", "classified"),
            ("TMDB_API_KEY", "abc"),
            ("LOG_FORMAT", "pretty"),
            ("PROCESSOR_WORKERS", "4"),
        ])
        .unwrap();

        assert_eq!(config.watch_dir, PathBuf::from("/tg"));
        assert_eq!(config.stability_checks, 5);
        assert_eq!(config.processor_workers, 4);
        assert_eq!(config.routing().tv_branch, Branch::WebSeries);
        assert_eq!(config.routing().mode, RoutingMode::Classified);
        assert_eq!(config.tmdb_api_key.as_deref(), Some("abc"));
        assert_eq!(config.watcher_settings().stability.required_checks, 5);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("TMDB_API_KEY", "  "), ("SCAN_INTERVAL_SECS", "")]).unwrap();
        assert!(config.tmdb_api_key.is_none());
        assert_eq!(config.scan_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(load(&[("STABILITY_CHECKS", "0")]).is_err());
        assert!(load(&[("STABILITY_WORKERS", "0")]).is_err());
        assert!(load(&[("SCAN_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[("SCAN_INTERVAL_SECS", "soon")]).is_err());
        assert!(load(&[("TV_BRANCH", "movie")]).is_err());
        assert!(load(&[("MOVIE_BRANCH", "web_series")]).is_err());
        assert!(load(&[("ROUTING_MODE", "magic")]).is_err());
    }
}
