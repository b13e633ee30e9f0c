use std::process::{Command, Stdio};

use engine_logging::{engine_info, engine_warn};
use serde::Deserialize;
use thiserror::Error;
use tunegrab_core::ItemDescriptor;

use crate::ytdlp::YtDlpSettings;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unreadable yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    entries: Option<Vec<Option<RawInfo>>>,
}

/// Resolves a video or playlist URL into item descriptors.
///
/// Never fails: any problem is logged and yields an empty list.
pub fn extract_entries(url: &str, settings: &YtDlpSettings) -> Vec<ItemDescriptor> {
    match try_extract_entries(url, settings) {
        Ok(entries) => {
            engine_info!("Extracted {} entries from {}", entries.len(), url);
            entries
        }
        Err(err) => {
            engine_warn!("Extraction failed for {}: {}", url, err);
            Vec::new()
        }
    }
}

pub fn try_extract_entries(
    url: &str,
    settings: &YtDlpSettings,
) -> Result<Vec<ItemDescriptor>, ExtractionError> {
    let output = Command::new(&settings.ytdlp_path)
        .args(["--flat-playlist", "-J", "--no-warnings"])
        .arg("--extractor-retries")
        .arg(settings.extractor_retries.to_string())
        .arg("--socket-timeout")
        .arg(settings.socket_timeout.as_secs().to_string())
        .arg("--")
        .arg(url)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(ExtractionError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_extraction(&String::from_utf8_lossy(&output.stdout))
}

/// Maps `yt-dlp -J` output (a playlist or a single video) to descriptors.
///
/// Entries without an id are dropped; a missing title falls back to the id and
/// a missing url to the canonical watch page.
pub fn parse_extraction(json: &str) -> Result<Vec<ItemDescriptor>, ExtractionError> {
    let info: RawInfo = serde_json::from_str(json)?;

    let items = match info.entries {
        Some(entries) => entries.into_iter().flatten().filter_map(to_descriptor).collect(),
        None => to_descriptor(RawInfo {
            id: info.id,
            title: info.title,
            url: info.webpage_url.or(info.url),
            webpage_url: None,
            entries: None,
        })
        .into_iter()
        .collect(),
    };
    Ok(items)
}

fn to_descriptor(raw: RawInfo) -> Option<ItemDescriptor> {
    let id = raw.id.filter(|id| !id.is_empty())?;
    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| id.clone());
    let url = raw
        .url
        .or(raw.webpage_url)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
    Some(ItemDescriptor { url, title, id })
}
