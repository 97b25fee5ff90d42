//! Music folder scanning
//!
//! Walks the music folder for audio files and reads their tags with
//! `lofty`. Files without readable tags fall back to the folder layout
//! `Artist/Album/track.ext` and the file stem as title.

use crate::error::{LocalFilesError, Result};
use lofty::config::ParseOptions;
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// File extensions treated as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "mp4", "aac", "wav", "aiff", "aif", "wv", "ape",
    "mpc",
];

/// One audio file below the music folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedTrack {
    /// Path relative to the music folder with `/` separators
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl ScannedTrack {
    /// Key grouping this track's album, `None` without album information.
    pub fn album_key(&self) -> Option<String> {
        self.album
            .as_deref()
            .map(|album| album_key(self.artist.as_deref(), album))
    }
}

pub fn album_key(artist: Option<&str>, album: &str) -> String {
    match artist {
        Some(artist) => format!("{}/{}", artist, album),
        None => album.to_string(),
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Track id of `path`, if it lies below `root`.
pub fn track_id(root: &Path, path: &Path) -> Option<String> {
    let path = normalize(path);
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Every audio file below `root`, sorted by id. `skip` is not descended into.
///
/// Blocking; run it on the blocking pool.
pub fn scan_folder(root: &Path, skip: Option<&Path>) -> Result<Vec<ScannedTrack>> {
    if !root.is_dir() {
        return Err(LocalFilesError::FolderUnavailable {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    collect_audio_files(root, skip, &mut files)?;
    files.sort();

    let tracks: Vec<ScannedTrack> = files
        .iter()
        .filter_map(|path| read_track(root, path))
        .collect();

    debug!(root = %root.display(), tracks = tracks.len(), "Scanned music folder");
    Ok(tracks)
}

fn collect_audio_files(dir: &Path, skip: Option<&Path>, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if skip == Some(path.as_path()) {
                continue;
            }
            collect_audio_files(&path, skip, files)?;
        } else if is_audio_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Read one track. Blocking.
pub fn read_track(root: &Path, path: &Path) -> Option<ScannedTrack> {
    let id = track_id(root, path)?;
    let tags = read_tags(path);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();

    // Artist/Album/track.ext
    let parents: Vec<&str> = id.split('/').rev().skip(1).collect();
    let folder_album = parents.first().map(|s| s.to_string());
    let folder_artist = parents.get(1).map(|s| s.to_string());

    let (title, artist, album) = match tags {
        Some(tags) => (
            tags.title.unwrap_or(stem),
            tags.artist.or(folder_artist),
            tags.album.or(folder_album),
        ),
        None => (stem, folder_artist, folder_album),
    };

    Some(ScannedTrack {
        id,
        title,
        artist,
        album,
    })
}

struct Tags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

fn read_tags(path: &Path) -> Option<Tags> {
    let tagged_file = match probe(path) {
        Ok(file) => file,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "No readable tags");
            return None;
        }
    };

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;
    let text = |value: Option<Cow<'_, str>>| {
        value
            .map(|s| normalize_text(&s))
            .filter(|s| !s.is_empty())
    };

    Some(Tags {
        title: text(tag.title()),
        artist: text(tag.artist()),
        album: text(tag.album()),
    })
}

fn probe(path: &Path) -> lofty::error::Result<TaggedFile> {
    Probe::open(path)?
        .options(ParseOptions::new())
        .guess_file_type()?
        .read()
}

/// Collapse whitespace and drop control characters.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
