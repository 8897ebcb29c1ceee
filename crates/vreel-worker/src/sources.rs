//! Input discovery: source clips and the narration script.

use std::path::{Path, PathBuf};

use rand::seq::{IndexedRandom, SliceRandom};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Clip container extensions accepted from the clip directory.
pub const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

async fn list_files(dir: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Find source clips in `dir`, sorted by path.
///
/// A missing directory counts as an empty one, and a path that is not a
/// directory yields no clips.
pub async fn discover_clips(dir: &Path) -> WorkerResult<Vec<PathBuf>> {
    match fs::metadata(dir).await {
        Ok(m) if !m.is_dir() => return Err(WorkerError::NoClips(dir.to_path_buf())),
        _ => {}
    }

    let clips = match list_files(dir, CLIP_EXTENSIONS).await {
        Ok(clips) => clips,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if clips.is_empty() {
        return Err(WorkerError::NoClips(dir.to_path_buf()));
    }

    info!(dir = %dir.display(), count = clips.len(), "Discovered source clips");
    Ok(clips)
}

/// Shuffle clips in place.
pub fn shuffle_clips(clips: &mut [PathBuf]) {
    clips.shuffle(&mut rand::rng());
}

/// Repeat the clip list `repeat` times, then keep at most `max_inputs`.
///
/// Gives the concat graph enough finite footage to cover the narration
/// without looping inputs.
pub fn expand_clip_list(clips: &[PathBuf], repeat: usize, max_inputs: usize) -> Vec<PathBuf> {
    clips
        .iter()
        .cycle()
        .take(clips.len() * repeat.max(1))
        .take(max_inputs)
        .cloned()
        .collect()
}

/// Narration script lines plus where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Trimmed, non-empty lines in file order
    pub lines: Vec<String>,
    /// File stem, used as the default hook caption
    pub hook: Option<String>,
    pub source: PathBuf,
}

/// Load the script from a file, or from a random `.txt` file in a directory.
pub async fn load_script(path: &Path) -> WorkerResult<Script> {
    let metadata = match fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WorkerError::NoScript(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let file = if metadata.is_dir() {
        let candidates = list_files(path, &["txt"]).await?;
        pick_script(&candidates).ok_or_else(|| WorkerError::NoScript(path.to_path_buf()))?
    } else {
        path.to_path_buf()
    };

    let raw = fs::read_to_string(&file).await?;
    let lines = script_lines(&raw);
    if lines.is_empty() {
        return Err(WorkerError::NoScript(file));
    }

    let hook = file
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    debug!(path = %file.display(), lines = lines.len(), "Loaded script");
    Ok(Script {
        lines,
        hook,
        source: file,
    })
}

fn pick_script(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.choose(&mut rand::rng()).cloned()
}

/// Trimmed non-empty lines, with any byte-order mark removed.
pub fn script_lines(raw: &str) -> Vec<String> {
    raw.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
