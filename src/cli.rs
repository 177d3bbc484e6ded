//! Minimal CLI parsing for config overrides.

use std::env;
use std::path::PathBuf;

use crate::config::Config;
use crate::services::logging::LogFormat;

pub const USAGE: &str = "\
Usage: telegram-media-organizer [OPTIONS]

Options:
  --watch-dir <DIR>          Directory to watch (env WATCH_DIR)
  --destination <DIR>        Library root (env DESTINATION_ROOT)
  --log-format <json|pretty> Log output format (env LOG_FORMAT)
  -h, --help                 Print this help
";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub watch_dir: Option<PathBuf>,
    pub destination_root: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub show_help: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };

            match flag.as_str() {
                "-h" | "--help" => options.show_help = true,
                "--watch-dir" => {
                    if let Some(value) = inline.or_else(|| args.next()) {
                        options.watch_dir = Some(PathBuf::from(value));
                    }
                }
                "--destination" => {
                    if let Some(value) = inline.or_else(|| args.next()) {
                        options.destination_root = Some(PathBuf::from(value));
                    }
                }
                "--log-format" => {
                    if let Some(value) = inline.or_else(|| args.next()) {
                        options.log_format = LogFormat::from_str(&value);
                    }
                }
                _ => {}
            }
        }
        options
    }

    /// Command-line values win over the environment
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.watch_dir {
            config.watch_dir = dir.clone();
        }
        if let Some(dir) = &self.destination_root {
            config.destination_root = dir.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}
