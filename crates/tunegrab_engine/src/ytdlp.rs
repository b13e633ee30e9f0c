use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::adapter::{ConversionAdapter, ProgressSink};
use crate::scan::AUDIO_EXTENSION;
use crate::{AdapterEvent, ConversionError, ConversionOutput, ConversionRequest, FailureKind};

const PROGRESS_PREFIX: &str = "[progress]";

#[derive(Debug, Clone)]
pub struct YtDlpSettings {
    pub ytdlp_path: PathBuf,
    /// Directory holding the ffmpeg executable; `None` leaves lookup to yt-dlp.
    pub ffmpeg_location: Option<PathBuf>,
    pub audio_format: String,
    pub audio_quality: String,
    pub thumbnail_format: String,
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: u32,
    pub socket_timeout: Duration,
    /// Subprocess runs per request; only network failures are retried.
    pub max_attempts: u32,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            audio_format: AUDIO_EXTENSION.to_string(),
            audio_quality: "320".to_string(),
            thumbnail_format: "jpg".to_string(),
            retries: 5,
            fragment_retries: 5,
            extractor_retries: 3,
            socket_timeout: Duration::from_secs(30),
            max_attempts: 2,
        }
    }
}

/// Converts items by running the `yt-dlp` executable (which drives ffmpeg).
#[derive(Debug, Clone, Default)]
pub struct YtDlpAdapter {
    settings: YtDlpSettings,
}

impl YtDlpAdapter {
    pub fn new(settings: YtDlpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &YtDlpSettings {
        &self.settings
    }

    pub fn build_args(&self, request: &ConversionRequest) -> Vec<OsString> {
        let s = &self.settings;
        // yt-dlp treats `%` in the template as a field marker.
        let template = request
            .outdir
            .join(format!("{}.%(ext)s", request.stem.replace('%', "%%")));

        let mut args: Vec<OsString> = Vec::new();
        let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));

        push(&["--newline", "--no-playlist", "--no-simulate", "--no-colors"]);
        push(&["-f", "bestaudio/best"]);
        push(&["-x", "--audio-format", &s.audio_format]);
        push(&["--audio-quality", &s.audio_quality]);
        push(&["--write-thumbnail", "--convert-thumbnails", &s.thumbnail_format]);
        push(&["--embed-thumbnail", "--add-metadata"]);
        push(&["--retries", &s.retries.to_string()]);
        push(&["--fragment-retries", &s.fragment_retries.to_string()]);
        push(&["--extractor-retries", &s.extractor_retries.to_string()]);
        push(&["--socket-timeout", &s.socket_timeout.as_secs().to_string()]);
        push(&[
            "--progress-template",
            "download:[progress] %(progress.status)s %(progress.downloaded_bytes)s \
             %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
        ]);

        if let Some(location) = &s.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.clone().into_os_string());
        }

        args.push("-o".into());
        args.push(template.into_os_string());
        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    async fn run_once(
        &self,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConversionError> {
        if cancel.is_cancelled() {
            return Err(ConversionError::interrupted());
        }

        let mut child = Command::new(&self.settings.ytdlp_path)
            .args(self.build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| spawn_error(&self.settings.ytdlp_path, err))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConversionError::new(FailureKind::Unexpected, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConversionError::new(FailureKind::Unexpected, "stderr not captured"))?;
        let stderr_task = tokio::spawn(async move {
            let mut raw = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut raw).await;
            String::from_utf8_lossy(&raw).into_owned()
        });

        // yt-dlp echoes titles in the console encoding, which need not be UTF-8.
        let mut stdout = BufReader::new(stdout);
        let mut raw = Vec::new();
        let mut fetch_finished = false;
        loop {
            raw.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => None,
                read = stdout.read_until(b'\n', &mut raw) => Some(read),
            };
            let Some(read) = read else {
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(ConversionError::interrupted());
            };
            match read {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end();
                    match parse_progress_line(line) {
                        Some(AdapterEvent::FetchFinished) if fetch_finished => {}
                        Some(event) => {
                            if event == AdapterEvent::FetchFinished {
                                fetch_finished = true;
                            }
                            sink.emit(event);
                        }
                        None => engine_debug!("yt-dlp: {}", line),
                    }
                }
                Err(err) => {
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(ConversionError::new(FailureKind::Io, err.to_string()));
                }
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(ConversionError::interrupted());
        };
        let status = status.map_err(|err| ConversionError::new(FailureKind::Io, err.to_string()))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(classify_failure(&stderr_text, status));
        }

        let path = request
            .outdir
            .join(format!("{}.{}", request.stem, self.settings.audio_format));
        Ok(ConversionOutput {
            path: path.exists().then_some(path),
        })
    }
}

#[async_trait::async_trait]
impl ConversionAdapter for YtDlpAdapter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConversionError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.run_once(request, sink, cancel).await {
                Err(err)
                    if err.kind == FailureKind::Network
                        && attempt < max_attempts
                        && !cancel.is_cancelled() =>
                {
                    engine_warn!(
                        "yt-dlp attempt {}/{} for {} failed: {}",
                        attempt,
                        max_attempts,
                        request.item_id,
                        err
                    );
                    attempt += 1;
                    sink.emit(AdapterEvent::Retrying { attempt });
                }
                other => return other,
            }
        }
    }
}

/// Parses a line printed through our `--progress-template`.
///
/// Unknown numeric fields are printed by yt-dlp as `NA`.
pub fn parse_progress_line(line: &str) -> Option<AdapterEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split_whitespace();
    let status = fields.next()?;
    let downloaded = fields.next().and_then(parse_bytes);
    let total = fields.next().and_then(parse_bytes);
    let estimate = fields.next().and_then(parse_bytes);

    match status {
        "finished" => Some(AdapterEvent::FetchFinished),
        "downloading" => Some(AdapterEvent::Downloading {
            downloaded: downloaded.unwrap_or(0),
            total: total.or(estimate),
        }),
        _ => None,
    }
}

fn parse_bytes(field: &str) -> Option<u64> {
    let value: f64 = field.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

fn spawn_error(program: &std::path::Path, err: io::Error) -> ConversionError {
    if err.kind() == io::ErrorKind::NotFound {
        ConversionError::new(
            FailureKind::ToolMissing,
            format!("{} not found", program.display()),
        )
    } else {
        ConversionError::new(FailureKind::Io, err.to_string())
    }
}

fn classify_failure(stderr: &str, status: ExitStatus) -> ConversionError {
    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"));

    let lower = message.to_lowercase();
    let kind = if ["timed out", "unable to download", "connection", "http error 5", "network"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        FailureKind::Network
    } else if ["ffmpeg", "ffprobe", "postprocessing", "conversion failed"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        FailureKind::Transcode
    } else {
        FailureKind::Unexpected
    };
    ConversionError::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn parses_downloading_line_with_estimate_fallback() {
        assert_eq!(
            parse_progress_line("[progress] downloading 512 NA 2048.0"),
            Some(AdapterEvent::Downloading {
                downloaded: 512,
                total: Some(2048)
            })
        );
        assert_eq!(
            parse_progress_line("[progress] downloading 10 NA NA"),
            Some(AdapterEvent::Downloading {
                downloaded: 10,
                total: None
            })
        );
    }

    #[test]
    fn finished_line_marks_fetch_done() {
        assert_eq!(
            parse_progress_line("[progress] finished 2048 2048 NA"),
            Some(AdapterEvent::FetchFinished)
        );
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        assert_eq!(parse_progress_line("[ExtractAudio] Destination: a.mp3"), None);
        assert_eq!(parse_progress_line("[progress] error 1 2 3"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn classify_picks_last_error_line() {
        let stderr = "WARNING: slow\nERROR: [youtube] abc: Unable to download webpage: timed out\n";
        let err = classify_failure(stderr, exit_status(1));
        assert_eq!(err.kind, FailureKind::Network);
        assert_eq!(err.message, "[youtube] abc: Unable to download webpage: timed out");
    }

    #[cfg(unix)]
    #[test]
    fn classify_detects_transcode_and_unknown() {
        let err = classify_failure("ERROR: Postprocessing: ffprobe not found\n", exit_status(1));
        assert_eq!(err.kind, FailureKind::Transcode);

        let err = classify_failure("", exit_status(2));
        assert_eq!(err.kind, FailureKind::Unexpected);
        assert!(err.message.contains("exit"));
    }
}
