// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media metadata extraction.
//!
//! Probing is advisory. The upload itself never depends on it, so every
//! failure, including ffprobe not being installed, degrades to "no metadata"
//! instead of an error.

use crate::{
    media::{extension_for_mime, MediaKind, MediaTools},
    tool::{Scratch, ToolCommand},
};

use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Technical metadata of a video.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VideoMetadata {
    /// Duration in seconds, `None` if the container does not say.
    pub duration: Option<f64>,
    pub codec: Option<String>,

    /// Container is ready for progressive playback.
    pub has_streaming_flag: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Technical metadata of a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

/// Technical metadata of an audio file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AudioMetadata {
    pub duration: Option<f64>,
    pub codec: Option<String>,
}

/// Metadata of any supported media kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaMetadata {
    Video(VideoMetadata),
    Image(ImageMetadata),
    Audio(AudioMetadata),
}

impl MediaMetadata {
    pub fn as_video(&self) -> Option<&VideoMetadata> {
        match self {
            Self::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageMetadata> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Read-only media inspector backed by ffprobe.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    tools: MediaTools,
}

impl MediaProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Inspect buffer of target MIME type.
    ///
    /// Returns `None` for non-media, when ffprobe is unavailable, or when
    /// inspection fails in any way.
    #[instrument(skip(self, buffer), level = "debug")]
    pub async fn probe(&self, buffer: &[u8], mime: &str) -> Option<MediaMetadata> {
        let kind = MediaKind::from_mime(mime);
        if kind == MediaKind::Other {
            return None;
        }

        let report = match self.run_ffprobe(buffer, mime).await {
            Ok(report) => report,
            Err(err) => {
                warn!("cannot probe {mime}: {err}");
                return None;
            }
        };

        let metadata = report.into_metadata(kind, buffer, mime);
        debug!("probed {mime}: {metadata:?}");
        metadata
    }

    async fn run_ffprobe(&self, buffer: &[u8], mime: &str) -> anyhow::Result<FfprobeReport> {
        // INVARIANT: Scratch directory is removed on every return path.
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("probe.{}", extension_for_mime(mime)), buffer)
            .await?;

        let command = ToolCommand::new(&self.tools.paths.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input);
        let output = self.tools.runner.run_checked(&command).await?;

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfprobeReport {
    fn stream(&self, codec_type: &str) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some(codec_type))
    }

    fn duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|format| format.duration.as_deref())
            .and_then(parse_duration)
    }

    fn into_metadata(self, kind: MediaKind, buffer: &[u8], mime: &str) -> Option<MediaMetadata> {
        match kind {
            MediaKind::Video => {
                let stream = self.stream("video")?;
                Some(MediaMetadata::Video(VideoMetadata {
                    duration: self.duration(),
                    codec: stream.codec_name.clone(),
                    has_streaming_flag: has_streaming_flag(buffer, mime),
                    width: stream.width,
                    height: stream.height,
                }))
            }
            MediaKind::Image => {
                let stream = self.stream("video")?;
                Some(MediaMetadata::Image(ImageMetadata {
                    width: stream.width?,
                    height: stream.height?,
                }))
            }
            MediaKind::Audio => {
                let stream = self.stream("audio")?;
                Some(MediaMetadata::Audio(AudioMetadata {
                    duration: self
                        .duration()
                        .or_else(|| stream.duration.as_deref().and_then(parse_duration)),
                    codec: stream.codec_name.clone(),
                }))
            }
            MediaKind::Other => None,
        }
    }
}

// ffprobe reports "N/A" for unknown durations.
fn parse_duration(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|duration| duration.is_finite() && *duration > 0.0)
}

/// Check if container is optimized for progressive playback.
///
/// Only ISO-BMFF containers (MP4, MOV, M4V) carry this property. It holds
/// when the `moov` box comes before the `mdat` box. Every other container
/// reports `true`, there is nothing to fix.
pub fn has_streaming_flag(buffer: &[u8], mime: &str) -> bool {
    match mime {
        "video/mp4" | "video/quicktime" | "video/x-m4v" | "video/3gpp" => has_fast_start(buffer),
        _ => true,
    }
}

/// Scan top-level ISO-BMFF boxes for `moov` ahead of `mdat`.
pub fn has_fast_start(buffer: &[u8]) -> bool {
    let mut offset = 0usize;
    while let Some(size) = read_u32(buffer, offset) {
        let Some(kind) = buffer.get(offset + 4..offset + 8) else {
            return false;
        };

        match kind {
            b"moov" => return true,
            b"mdat" => return false,
            _ => {}
        }

        let size = match size {
            // Box runs to end of file.
            0 => return false,
            // 64-bit large size follows the type.
            1 => match read_u64(buffer, offset + 8) {
                Some(size) => usize::try_from(size).unwrap_or(usize::MAX),
                None => return false,
            },
            size => size as usize,
        };

        if size < 8 {
            return false;
        }
        offset = offset.saturating_add(size);
    }

    false
}

fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    buffer
        .get(offset..offset.checked_add(4)?)?
        .try_into()
        .ok()
        .map(u32::from_be_bytes)
}

fn read_u64(buffer: &[u8], offset: usize) -> Option<u64> {
    buffer
        .get(offset..offset.checked_add(8)?)?
        .try_into()
        .ok()
        .map(u64::from_be_bytes)
}
