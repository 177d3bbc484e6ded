//! Shared file utility functions
//!
//! Video detection, extension handling and path-component sanitisation used by
//! the stability gate, the title cleaner and the organizer.

use std::path::Path;

/// Video file extensions (lowercase, with the leading dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".webm", ".flv", ".wmv", ".mpeg", ".mpg", ".ts",
];

/// Placeholder used when a title sanitises down to nothing
pub const UNTITLED: &str = "Untitled";

/// Check whether a file name carries one of the recognised video extensions
///
/// # Example
/// ```
/// use telegram_media_organizer::services::file_utils::has_video_extension;
/// assert!(has_video_extension("Movie.MKV"));
/// assert!(!has_video_extension("notes.txt"));
/// ```
pub fn has_video_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Check whether a path looks like a video: extension first, MIME guess second.
///
/// Does not touch the filesystem; callers confirm the path is a regular file.
pub fn looks_like_video(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if has_video_extension(&name) {
        return true;
    }

    mime_guess::from_path(path)
        .iter()
        .any(|mime| mime.type_() == mime_guess::mime::VIDEO)
}

/// Check whether a path on disk is a regular file that looks like a video
pub async fn is_video_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => looks_like_video(path),
        _ => false,
    }
}

/// Strip a trailing recognised video extension, leaving anything else alone.
///
/// `Path::file_stem` is not used because scene names are full of dots:
/// `Movie.Title.2023` must keep its year.
pub fn strip_video_extension(name: &str) -> &str {
    for ext in VIDEO_EXTENSIONS {
        if name.len() <= ext.len() {
            continue;
        }
        let cut = name.len() - ext.len();
        if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(ext) {
            return &name[..cut];
        }
    }
    name
}

/// Extension of a path including the leading dot, as it appears on disk
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Sanitize a string for use as a single path component
///
/// Uses `sanitize_filename`, which drops separators, reserved names and
/// characters the host OS rejects. Falls back to [`UNTITLED`] when nothing
/// usable is left.
pub fn sanitize_component(name: &str) -> String {
    let sanitized = sanitize_filename::sanitize(name.trim());
    let trimmed = sanitized.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format bytes into a human-readable string
///
/// # Example
/// ```
/// use telegram_media_organizer::services::file_utils::format_bytes;
/// assert_eq!(format_bytes(1024), "1.0 KB");
/// assert_eq!(format_bytes(1073741824), "1.0 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
