use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IngestError, Result};

/// Coarse kind of a file, inferred from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Pdf,
    Data,
    Office,
    Image,
    Audio,
    Video,
    Web,
    Other,
}

impl MediaKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "txt" | "md" | "rtf" => MediaKind::Text,
            "pdf" => MediaKind::Pdf,
            "json" | "jsonl" | "csv" | "tsv" | "xml" => MediaKind::Data,
            "docx" | "doc" | "pptx" | "ppt" | "xlsx" | "xls" => MediaKind::Office,
            "png" | "jpg" | "jpeg" | "gif" => MediaKind::Image,
            "mp3" | "wav" | "m4a" => MediaKind::Audio,
            "mp4" | "avi" | "mov" => MediaKind::Video,
            "html" | "htm" => MediaKind::Web,
            _ => MediaKind::Other,
        }
    }
}

/// A file queued for ingestion. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub absolute_path: PathBuf,
    /// Path relative to the discovery root, `/`-separated
    pub relative_path: String,
    /// Final path component; the duplicate key and upload title
    pub file_name: String,
    /// Lowercase extension without the dot
    pub extension: String,
    pub media_kind: MediaKind,
    pub size: u64,
}

impl FileTask {
    /// Directory containing the file
    pub fn source_folder(&self) -> String {
        self.absolute_path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Discover the files under `root` whose extension is in `extensions`.
///
/// Only regular files are returned, sorted by relative path. Symlinks and
/// entries that cannot be read are skipped with a warning. A missing root, or a
/// root that is not a directory, is an error; an empty folder is not.
///
/// # Arguments
///
/// * `root` - Folder to walk
/// * `extensions` - Accepted lowercase extensions, without the dot
/// * `recursive` - Descend into sub-directories (false = top level only)
pub fn discover_files(root: &Path, extensions: &BTreeSet<String>, recursive: bool) -> Result<Vec<FileTask>> {
    if !root.exists() {
        return Err(IngestError::Discovery(format!("Folder not found: {}", root.display())));
    }
    if !root.is_dir() {
        return Err(IngestError::Discovery(format!(
            "Path is not a directory: {}",
            root.display()
        )));
    }

    let mut walker = WalkDir::new(root).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            log::warn!("Skipping symlink: {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !extensions.contains(&extension) {
            log::debug!("Unsupported extension, skipping: {}", path.display());
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                log::warn!("Skipping {}: cannot read metadata: {}", path.display(), e);
                continue;
            }
        };

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| IngestError::Discovery(
                format!("Failed to compute relative path for: {}", path.display())
            ))?
            .to_string_lossy()
            .replace('\\', "/");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.clone());

        files.push(FileTask {
            absolute_path: path.to_path_buf(),
            relative_path,
            file_name,
            media_kind: MediaKind::from_extension(&extension),
            extension,
            size,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}
