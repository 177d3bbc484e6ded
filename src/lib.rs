//! Telegram media organizer
//!
//! Watches a download directory, waits for each file to stop growing, works
//! out what it is from its name and moves it into a library tree.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;

pub use config::Config;
pub use error::{OrganizerError, Result};
