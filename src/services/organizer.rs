//! Library organizer
//!
//! Decides where a stable video belongs and moves it there:
//! - Episodes go to `<root>/<branch>/<show>/Season <N>/<title><ext>`
//! - Movies go to `<root>/<branch>/<title>/<title><ext>`
//! - Existing files are never overwritten; `_1`, `_2`, ... is appended instead
//!
//! Branches are fixed per category in static routing. Classified routing asks
//! the optional network classifiers which branch a title belongs to.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::classifiers::{AnimeClassifier, MovieClassifier};
use super::file_utils::{dotted_extension, sanitize_component};
use super::filename_parser::{self, EpisodeInfo, MediaCategory, ParsedTitle};
use crate::error::{OrganizerError, Result};

/// Root branches of the destination tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    AnimeVideo,
    AnimeMovie,
    Movie,
    WebSeries,
}

impl Branch {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "anime_video" => Some(Branch::AnimeVideo),
            "anime_movie" => Some(Branch::AnimeMovie),
            "movie" => Some(Branch::Movie),
            "web_series" => Some(Branch::WebSeries),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::AnimeVideo => "anime_video",
            Branch::AnimeMovie => "anime_movie",
            Branch::Movie => "movie",
            Branch::WebSeries => "web_series",
        }
    }

    /// Directory of this branch relative to the destination root
    pub fn relative_dir(&self) -> PathBuf {
        match self {
            Branch::AnimeVideo => Path::new("anime").join("video"),
            Branch::AnimeMovie => Path::new("anime").join("movie"),
            Branch::Movie => PathBuf::from("movie"),
            Branch::WebSeries => PathBuf::from("web_series"),
        }
    }

    /// Whether this branch holds per-season episode folders
    pub fn holds_episodes(&self) -> bool {
        matches!(self, Branch::AnimeVideo | Branch::WebSeries)
    }
}

/// How a parsed title picks its branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Fixed branch per category, no network calls
    Static,
    /// Ask the anime/movie classifiers
    Classified,
}

impl RoutingMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Some(RoutingMode::Static),
            "classified" => Some(RoutingMode::Classified),
            _ => None,
        }
    }
}

/// Routing policy for the organizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub mode: RoutingMode,
    pub tv_branch: Branch,
    pub movie_branch: Branch,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Static,
            tv_branch: Branch::AnimeVideo,
            movie_branch: Branch::AnimeMovie,
        }
    }
}

/// Pure mapping from a parsed title to a destination path
#[derive(Debug, Clone)]
pub struct DestinationLayout {
    root: PathBuf,
}

impl DestinationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn branch_dir(&self, branch: Branch) -> PathBuf {
        self.root.join(branch.relative_dir())
    }

    /// `<branch>/<show>/Season <N>/<title><ext>`
    pub fn episode_path(
        &self,
        branch: Branch,
        info: &EpisodeInfo,
        title: &str,
        extension: &str,
    ) -> PathBuf {
        self.branch_dir(branch)
            .join(sanitize_component(&info.show_name))
            .join(format!("Season {}", info.season))
            .join(format!("{}{}", sanitize_component(title), extension))
    }

    /// `<branch>[/<group>]/<title>/<title><ext>`
    pub fn movie_path(
        &self,
        branch: Branch,
        group: Option<&str>,
        title: &str,
        extension: &str,
    ) -> PathBuf {
        let title = sanitize_component(title);
        let mut dir = self.branch_dir(branch);
        if let Some(group) = group {
            dir = dir.join(group);
        }
        dir.join(&title).join(format!("{}{}", title, extension))
    }
}

/// Result of organizing a single file
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub title: String,
    pub category: MediaCategory,
    pub branch: Branch,
}

/// Classifies stable files and moves them into the destination tree
pub struct Organizer {
    layout: DestinationLayout,
    routing: Routing,
    anime_classifier: Option<Arc<dyn AnimeClassifier>>,
    movie_classifier: Option<Arc<dyn MovieClassifier>>,
    /// Serializes picking a free name and moving into it across workers
    move_lock: Mutex<()>,
}

impl Organizer {
    pub fn new(layout: DestinationLayout, routing: Routing) -> Self {
        Self {
            layout,
            routing,
            anime_classifier: None,
            movie_classifier: None,
            move_lock: Mutex::new(()),
        }
    }

    pub fn with_anime_classifier(mut self, classifier: Arc<dyn AnimeClassifier>) -> Self {
        self.anime_classifier = Some(classifier);
        self
    }

    pub fn with_movie_classifier(mut self, classifier: Arc<dyn MovieClassifier>) -> Self {
        self.movie_classifier = Some(classifier);
        self
    }

    /// Decide branch and destination path for a parsed title
    pub async fn plan(&self, source: &Path, parsed: &ParsedTitle) -> Result<(Branch, PathBuf)> {
        let extension = dotted_extension(source);

        match (&parsed.episode, parsed.category) {
            (Some(info), MediaCategory::Tv) => {
                let branch = self.tv_branch(&info.show_name).await;
                let path =
                    self.layout
                        .episode_path(branch, info, &parsed.display_title, &extension);
                Ok((branch, path))
            }
            (None, MediaCategory::Movie) => {
                let (branch, group) = self.movie_branch(&parsed.display_title).await;
                let path = self.layout.movie_path(
                    branch,
                    group.as_deref(),
                    &parsed.display_title,
                    &extension,
                );
                Ok((branch, path))
            }
            _ => Err(OrganizerError::UnparseableEpisode {
                title: parsed.display_title.clone(),
            }),
        }
    }

    async fn tv_branch(&self, show_name: &str) -> Branch {
        match (self.routing.mode, &self.anime_classifier) {
            (RoutingMode::Classified, Some(classifier)) => {
                if classifier.is_anime(show_name).await {
                    Branch::AnimeVideo
                } else {
                    Branch::WebSeries
                }
            }
            _ => self.routing.tv_branch,
        }
    }

    async fn movie_branch(&self, title: &str) -> (Branch, Option<String>) {
        if self.routing.mode == RoutingMode::Static {
            return (self.routing.movie_branch, None);
        }

        if let Some(classifier) = &self.anime_classifier
            && classifier.is_anime(title).await
        {
            return (Branch::AnimeMovie, None);
        }

        let group = match &self.movie_classifier {
            Some(classifier) => classifier
                .classify_movie(title)
                .await
                .folder_name()
                .map(str::to_string),
            None => None,
        };
        (Branch::Movie, group)
    }

    /// Parse, plan and move one file
    pub async fn organize(&self, source: &Path) -> Result<OrganizeResult> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // MIME-accepted videos carry extensions the parser does not strip
        let extension = dotted_extension(source);
        let stem = file_name
            .strip_suffix(extension.as_str())
            .filter(|_| !extension.is_empty())
            .unwrap_or(file_name.as_str());

        let parsed = filename_parser::parse_title(stem)?;
        let (branch, planned) = self.plan(source, &parsed).await?;
        let destination = {
            let _guard = self.move_lock.lock().await;
            safe_move(source, &planned).await?
        };

        Ok(OrganizeResult {
            source: source.to_path_buf(),
            destination,
            title: parsed.display_title,
            category: parsed.category,
            branch,
        })
    }
}

/// First path derived from `planned` that does not exist yet
///
/// Tries `name.ext`, then `name_1.ext`, `name_2.ext`, ...
pub async fn free_destination(planned: &Path) -> Result<PathBuf> {
    if !path_exists(planned).await? {
        return Ok(planned.to_path_buf());
    }

    let stem = planned
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = dotted_extension(planned);

    let mut counter: u32 = 1;
    loop {
        let candidate = planned.with_file_name(format!("{}_{}{}", stem, counter, extension));
        if !path_exists(&candidate).await? {
            debug!(
                planned = %planned.display(),
                chosen = %candidate.display(),
                "Destination taken, using suffixed name"
            );
            return Ok(candidate);
        }
        counter += 1;
    }
}

async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| OrganizerError::io(path, e))
}

/// Move `source` to `planned` (or a suffixed sibling), never overwriting.
///
/// Renames when possible and falls back to copy-then-delete. On failure the
/// source is left where it was and no partial destination remains.
/// Concurrent callers must serialize, as [Organizer::organize] does, or two
/// of them can pick the same free name.
pub async fn safe_move(source: &Path, planned: &Path) -> Result<PathBuf> {
    if let Some(parent) = planned.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OrganizerError::io(parent, e))?;
    }

    let destination = free_destination(planned).await?;

    match tokio::fs::rename(source, &destination).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(OrganizerError::Move {
                from: source.to_path_buf(),
                to: destination,
                source: e,
            });
        }
        Err(e) => {
            // Cross-filesystem: copy then delete
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                error = %e,
                "Rename failed, falling back to copy"
            );
            copy_then_delete(source, &destination).await?;
        }
    }

    info!(
        source = %source.display(),
        destination = %destination.display(),
        "Moved file"
    );
    Ok(destination)
}

pub(crate) async fn copy_then_delete(source: &Path, destination: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::copy(source, destination).await {
        discard_partial(destination).await;
        return Err(OrganizerError::Move {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = tokio::fs::remove_file(source).await {
        discard_partial(destination).await;
        return Err(OrganizerError::CopyRollback {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove partial copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifiers::MovieOrigin;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FixedAnime(bool);

    #[async_trait]
    impl AnimeClassifier for FixedAnime {
        async fn is_anime(&self, _title: &str) -> bool {
            self.0
        }
    }

    struct FixedOrigin(MovieOrigin);

    #[async_trait]
    impl MovieClassifier for FixedOrigin {
        async fn classify_movie(&self, _title: &str) -> MovieOrigin {
            self.0
        }
    }

    fn episode(show: &str, season: u32, episode: u32) -> EpisodeInfo {
        EpisodeInfo {
            show_name: show.to_string(),
            season,
            episode,
        }
    }

    #[test]
    fn test_branch_dirs() {
        let layout = DestinationLayout::new("/lib");
        assert_eq!(layout.branch_dir(Branch::AnimeVideo), PathBuf::from("/lib/anime/video"));
        assert_eq!(layout.branch_dir(Branch::AnimeMovie), PathBuf::from("/lib/anime/movie"));
        assert_eq!(layout.branch_dir(Branch::Movie), PathBuf::from("/lib/movie"));
        assert_eq!(layout.branch_dir(Branch::WebSeries), PathBuf::from("/lib/web_series"));
    }

    #[test]
    fn test_branch_from_str() {
        assert_eq!(Branch::from_str("web_series"), Some(Branch::WebSeries));
        assert_eq!(Branch::from_str(" Anime_Movie "), Some(Branch::AnimeMovie));
        assert_eq!(Branch::from_str("music"), None);
        assert!(Branch::WebSeries.holds_episodes());
        assert!(!Branch::Movie.holds_episodes());
    }

    #[test]
    fn test_episode_path() {
        let layout = DestinationLayout::new("/lib");
        let path = layout.episode_path(
            Branch::AnimeVideo,
            &episode("Monster", 1, 2),
            "Monster S1E02",
            ".mkv",
        );
        assert_eq!(
            path,
            PathBuf::from("/lib/anime/video/Monster/Season 1/Monster S1E02.mkv")
        );
    }

    #[test]
    fn test_movie_path() {
        let layout = DestinationLayout::new("/lib");
        let path = layout.movie_path(Branch::AnimeMovie, None, "Your Name 2016", ".mp4");
        assert_eq!(
            path,
            PathBuf::from("/lib/anime/movie/Your Name 2016/Your Name 2016.mp4")
        );

        let path = layout.movie_path(Branch::Movie, Some("hollywood"), "Heat 1995", ".mkv");
        assert_eq!(path, PathBuf::from("/lib/movie/hollywood/Heat 1995/Heat 1995.mkv"));
    }

    #[tokio::test]
    async fn test_static_plan() {
        let organizer = Organizer::new(DestinationLayout::new("/lib"), Routing::default());

        let parsed = filename_parser::parse_title("Show.Name.S01E02.[720p].mkv").unwrap();
        let (branch, path) = organizer.plan(Path::new("/dl/x.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::AnimeVideo);
        assert_eq!(
            path,
            PathBuf::from("/lib/anime/video/Show Name/Season 1/Show Name S01E02.mkv")
        );

        let parsed = filename_parser::parse_title("Movie Title 2023.mkv").unwrap();
        let (branch, path) = organizer.plan(Path::new("/dl/x.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::AnimeMovie);
        assert_eq!(
            path,
            PathBuf::from("/lib/anime/movie/Movie Title 2023/Movie Title 2023.mkv")
        );
    }

    #[tokio::test]
    async fn test_static_plan_uses_configured_branches() {
        let routing = Routing {
            mode: RoutingMode::Static,
            tv_branch: Branch::WebSeries,
            movie_branch: Branch::Movie,
        };
        let organizer = Organizer::new(DestinationLayout::new("/lib"), routing)
            .with_anime_classifier(Arc::new(FixedAnime(true)));

        let parsed = filename_parser::parse_title("Series - 22.mkv").unwrap();
        let (branch, path) = organizer.plan(Path::new("/dl/a.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::WebSeries);
        assert_eq!(path, PathBuf::from("/lib/web_series/Series/Season 1/Series E22.mkv"));
    }

    #[tokio::test]
    async fn test_classified_plan() {
        let routing = Routing {
            mode: RoutingMode::Classified,
            ..Routing::default()
        };

        let not_anime = Organizer::new(DestinationLayout::new("/lib"), routing)
            .with_anime_classifier(Arc::new(FixedAnime(false)))
            .with_movie_classifier(Arc::new(FixedOrigin(MovieOrigin::Bollywood)));

        let parsed = filename_parser::parse_title("Gadar 2 2023.mkv").unwrap();
        let (branch, path) = not_anime.plan(Path::new("/dl/g.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::Movie);
        assert_eq!(path, PathBuf::from("/lib/movie/bollywood/Gadar 2 2023/Gadar 2 2023.mkv"));

        let parsed = filename_parser::parse_title("Dark.S01E01.mkv").unwrap();
        let (branch, _) = not_anime.plan(Path::new("/dl/d.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::WebSeries);

        let anime = Organizer::new(DestinationLayout::new("/lib"), routing)
            .with_anime_classifier(Arc::new(FixedAnime(true)))
            .with_movie_classifier(Arc::new(FixedOrigin(MovieOrigin::Unknown)));
        let parsed = filename_parser::parse_title("Akira 1988.mkv").unwrap();
        let (branch, _) = anime.plan(Path::new("/dl/a.mkv"), &parsed).await.unwrap();
        assert_eq!(branch, Branch::AnimeMovie);
    }

    #[tokio::test]
    async fn test_safe_move_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.mkv");
        let second = dir.path().join("b.mkv");
        tokio::fs::write(&first, b"first").await.unwrap();
        tokio::fs::write(&second, b"second").await.unwrap();

        let planned = dir.path().join("out").join("Title 2020.mkv");
        let moved_first = safe_move(&first, &planned).await.unwrap();
        let moved_second = safe_move(&second, &planned).await.unwrap();

        assert_eq!(moved_first, planned);
        assert_eq!(moved_second, dir.path().join("out").join("Title 2020_1.mkv"));
        assert_eq!(tokio::fs::read(&moved_first).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&moved_second).await.unwrap(), b"second");
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn test_free_destination_counts_up() {
        let dir = tempfile::tempdir().unwrap();
        let planned = dir.path().join("Show E01.mkv");
        tokio::fs::write(&planned, b"x").await.unwrap();
        tokio::fs::write(dir.path().join("Show E01_1.mkv"), b"x").await.unwrap();

        let free = free_destination(&planned).await.unwrap();
        assert_eq!(free, dir.path().join("Show E01_2.mkv"));
    }

    #[tokio::test]
    async fn test_safe_move_missing_source_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let planned = dir.path().join("out").join("x.mkv");

        let result = safe_move(&dir.path().join("gone.mkv"), &planned).await;
        assert_matches!(result, Err(OrganizerError::Move { .. }));
        assert!(!planned.exists());
    }

    #[tokio::test]
    async fn test_copy_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.mkv");
        let destination = dir.path().join("dst.mkv");
        tokio::fs::write(&source, b"payload").await.unwrap();

        copy_then_delete(&source, &destination).await.unwrap();
        assert!(!source.exists());
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_copy_failure_keeps_source_and_cleans_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.mkv");
        tokio::fs::write(&source, b"payload").await.unwrap();
        // Destination parent does not exist, so the copy fails
        let destination = dir.path().join("missing").join("dst.mkv");

        let result = copy_then_delete(&source, &destination).await;
        assert_matches!(result, Err(OrganizerError::Move { .. }));
        assert!(source.exists());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_organize_moves_episode() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Monster S1 - 02 [720p] [Dual] @Anime_Maniaac.mkv");
        tokio::fs::write(&source, b"video").await.unwrap();

        let library = dir.path().join("library");
        let organizer = Organizer::new(DestinationLayout::new(&library), Routing::default());
        let result = organizer.organize(&source).await.unwrap();

        assert_eq!(result.category, MediaCategory::Tv);
        assert_eq!(result.title, "Monster S1E02");
        assert_eq!(
            result.destination,
            library.join("anime/video/Monster/Season 1/Monster S1E02.mkv")
        );
        assert!(result.destination.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_organize_mime_only_extension_is_not_part_of_title() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Series - 22 [Dual] @Chan.m4v");
        tokio::fs::write(&source, b"video").await.unwrap();

        let library = dir.path().join("library");
        let organizer = Organizer::new(DestinationLayout::new(&library), Routing::default());
        let result = organizer.organize(&source).await.unwrap();

        assert_eq!(result.title, "Series E22");
        assert_eq!(result.category, MediaCategory::Tv);
        assert_eq!(
            result.destination,
            library.join("anime/video/Series/Season 1/Series E22.m4v")
        );
        assert!(result.destination.exists());
    }

    #[tokio::test]
    async fn test_organize_unparseable_episode_stays_put() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("S01E02.mkv");
        tokio::fs::write(&source, b"video").await.unwrap();

        let organizer = Organizer::new(
            DestinationLayout::new(dir.path().join("library")),
            Routing::default(),
        );
        let result = organizer.organize(&source).await;

        assert_matches!(result, Err(OrganizerError::UnparseableEpisode { .. }));
        assert!(source.exists());
    }
}
