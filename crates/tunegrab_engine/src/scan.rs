use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use engine_logging::{engine_debug, engine_warn};
use tunegrab_core::ItemDescriptor;

use crate::filename::{disambiguated_stem, sanitize_title};

/// Extension of converted files. Only files with exactly this extension count
/// as already downloaded.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Returns the ids of `entries` whose audio file is already in `dir`.
///
/// Titles match case-insensitively against the file stem. A missing or
/// unreadable directory yields an empty set.
pub fn find_existing(entries: &[ItemDescriptor], dir: &Path) -> HashSet<String> {
    let stems = match audio_stems(dir) {
        Ok(stems) => stems,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            engine_debug!("Output dir {:?} does not exist yet", dir);
            return HashSet::new();
        }
        Err(err) => {
            engine_warn!("Failed to list {:?}: {}", dir, err);
            return HashSet::new();
        }
    };

    entries
        .iter()
        .filter(|entry| {
            let sanitized = sanitize_title(&entry.title);
            [
                entry.title.clone(),
                sanitized.clone(),
                disambiguated_stem(&sanitized, &entry.id),
            ]
            .iter()
            .any(|candidate| stems.contains(&candidate.to_lowercase()))
        })
        .map(|entry| entry.id.clone())
        .collect()
}

fn audio_stems(dir: &Path) -> io::Result<HashSet<String>> {
    let mut stems = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(AUDIO_EXTENSION));
        if !is_audio {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(stem.to_lowercase());
        }
    }
    Ok(stems)
}
