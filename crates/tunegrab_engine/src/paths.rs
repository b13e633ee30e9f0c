use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = ".yt_mp3_settings.json";
const DOWNLOADS_FOLDER: &str = "YouTube Downloads";

/// Where the program runs from.
///
/// A bundled install ships ffmpeg next to the executable and keeps its
/// settings there too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLayout {
    Standalone,
    Bundled { dir: PathBuf },
}

impl BundleLayout {
    pub fn detect() -> Self {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .map(Self::from_dir)
            .unwrap_or(BundleLayout::Standalone)
    }

    /// Treats `dir` as a bundle when it contains an ffmpeg executable.
    pub fn from_dir(dir: PathBuf) -> Self {
        if ffmpeg_in(&dir) {
            BundleLayout::Bundled { dir }
        } else {
            BundleLayout::Standalone
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_output_dir() -> PathBuf {
    home_dir().join("Music").join(DOWNLOADS_FOLDER)
}

pub fn settings_path(layout: &BundleLayout) -> PathBuf {
    match layout {
        BundleLayout::Standalone => home_dir().join(SETTINGS_FILENAME),
        BundleLayout::Bundled { dir } => dir.join(SETTINGS_FILENAME),
    }
}

/// Directory to hand to `--ffmpeg-location`, if the bundle carries ffmpeg.
pub fn ffmpeg_location(layout: &BundleLayout) -> Option<PathBuf> {
    match layout {
        BundleLayout::Bundled { dir } if ffmpeg_in(dir) => Some(dir.clone()),
        _ => None,
    }
}

fn ffmpeg_in(dir: &Path) -> bool {
    ["ffmpeg", "ffmpeg.exe"]
        .iter()
        .any(|name| dir.join(name).is_file())
}
