//! Tunegrab engine: batch orchestration, the yt-dlp adapter and filesystem glue.
mod adapter;
mod engine;
mod extract;
mod filename;
mod observer;
mod paths;
mod persist;
mod scan;
mod settings;
mod types;
mod ytdlp;

pub use adapter::{ConversionAdapter, ProgressSink};
pub use engine::{DownloadEngine, EngineConfig, EngineError};
pub use extract::{extract_entries, parse_extraction, try_extract_entries, ExtractionError};
pub use filename::{assign_stems, sanitize_title};
pub use observer::{CallbackObserver, ChannelObserver, EngineObserver};
pub use paths::{default_output_dir, ffmpeg_location, settings_path, BundleLayout};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use scan::{find_existing, AUDIO_EXTENSION};
pub use settings::{Settings, SettingsError, SettingsStore};
pub use types::{
    AdapterEvent, ConversionError, ConversionOutput, ConversionRequest, EngineEvent, FailureKind,
};
pub use ytdlp::{parse_progress_line, YtDlpAdapter, YtDlpSettings};

pub use tokio_util::sync::CancellationToken;
