use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use engine_logging::LogDestination;
use log::LevelFilter;
use tunegrab_engine::EngineConfig;

/// Download a YouTube video or playlist as MP3 files.
#[derive(Debug, Parser)]
#[command(name = "tunegrab", version, about)]
pub struct Args {
    /// Video or playlist URL.
    pub url: String,

    /// Output directory; defaults to the last one used.
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Number of concurrent downloads.
    #[arg(short, long, default_value_t = EngineConfig::DEFAULT_MAX_WORKERS)]
    pub workers: usize,

    /// Path to the yt-dlp executable.
    #[arg(long, default_value = "yt-dlp")]
    pub ytdlp: PathBuf,

    #[arg(long, value_enum, default_value_t = LogArg::File)]
    pub log: LogArg,

    /// Download items even when a matching file already exists.
    #[arg(long)]
    pub no_skip: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogArg {
    Terminal,
    File,
    Both,
}

impl From<LogArg> for LogDestination {
    fn from(arg: LogArg) -> Self {
        match arg {
            LogArg::Terminal => LogDestination::Terminal,
            LogArg::File => LogDestination::File,
            LogArg::Both => LogDestination::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["tunegrab", "https://youtu.be/x"]).unwrap();
        assert_eq!(args.url, "https://youtu.be/x");
        assert_eq!(args.outdir, None);
        assert_eq!(args.workers, EngineConfig::DEFAULT_MAX_WORKERS);
        assert_eq!(args.ytdlp, PathBuf::from("yt-dlp"));
        assert_eq!(args.log, LogArg::File);
        assert!(!args.no_skip);
        assert_eq!(args.log_level(), LevelFilter::Info);
    }

    #[test]
    fn all_flags() {
        let args = Args::try_parse_from([
            "tunegrab",
            "https://youtu.be/x",
            "--outdir",
            "/music",
            "--workers",
            "2",
            "--ytdlp",
            "/opt/yt-dlp",
            "--log",
            "both",
            "--no-skip",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.outdir, Some(PathBuf::from("/music")));
        assert_eq!(args.workers, 2);
        assert_eq!(args.ytdlp, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(LogDestination::from(args.log), LogDestination::Both);
        assert!(args.no_skip);
        assert_eq!(args.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn url_is_required() {
        assert!(Args::try_parse_from(["tunegrab"]).is_err());
    }
}
