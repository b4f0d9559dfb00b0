// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Compatibility issue detection.
//!
//! Issues are plain data. Each one names the [`MediaFix`] that resolves it,
//! and the pipeline decides whether to apply it. Detection itself never
//! touches the buffer beyond probing it.
//!
//! # Rules
//!
//! Videos are checked for a missing duration first. A missing duration is
//! fixed by a remux, which also rewrites the container index, so the
//! streaming flag is only checked when the duration is present. Codecs that
//! browsers cannot play are checked independently of both.
//!
//! Images are checked purely by MIME type, so legacy formats are caught even
//! when ffprobe is unavailable.

use crate::{
    config::{Encoder, OutputFormat},
    media::{
        image::ImageTransform,
        probe::{MediaMetadata, MediaProbe},
        video::{EncodeSettings, VideoTransform},
        MediaKind, MediaTools, Result, Transformed,
    },
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, instrument};

/// Video codecs most browsers refuse to play.
pub const INCOMPATIBLE_CODECS: &[&str] = &[
    "hevc",
    "h265",
    "av1",
    "prores",
    "dnxhd",
    "mpeg2video",
    "wmv2",
    "wmv3",
];

/// Check if codec is in the browser incompatible list.
pub fn is_incompatible_codec(codec: &str) -> bool {
    INCOMPATIBLE_CODECS
        .iter()
        .any(|incompatible| incompatible.eq_ignore_ascii_case(codec))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Error => fmt.write_str("error"),
            Self::Warning => fmt.write_str("warning"),
        }
    }
}

/// Operation that resolves an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFix {
    /// Rewrite container and timestamps without re-encoding.
    Remux,

    /// Move the container index up front without re-encoding.
    AddStreamingFlag,

    /// Re-encode to software H.264 at default quality.
    Reencode,

    /// Convert still image to another format.
    ConvertImage(OutputFormat),
}

impl MediaFix {
    /// Apply fix to buffer.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if the underlying tool fails.
    /// - Return [`MediaError::Unsupported`] if conversion target is invalid.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    /// [`MediaError::Unsupported`]: crate::media::MediaError::Unsupported
    pub async fn apply(&self, tools: &MediaTools, buffer: &[u8], mime: &str) -> Result<Transformed> {
        match self {
            Self::Remux => VideoTransform::new(tools.clone()).remux(buffer, mime).await,
            Self::AddStreamingFlag => {
                VideoTransform::new(tools.clone())
                    .add_streaming_flag(buffer, mime)
                    .await
            }
            Self::Reencode => {
                VideoTransform::new(tools.clone())
                    .encode(buffer, mime, &EncodeSettings::default(), Encoder::Cpu)
                    .await
            }
            Self::ConvertImage(format) => {
                ImageTransform::new(tools.clone())
                    .convert(buffer, mime, *format, Default::default(), None)
                    .await
            }
        }
    }
}

impl Display for MediaFix {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Remux => fmt.write_str("remux container"),
            Self::AddStreamingFlag => fmt.write_str("enable fast start"),
            Self::Reencode => fmt.write_str("re-encode to h264"),
            Self::ConvertImage(format) => write!(fmt, "convert to {format}"),
        }
    }
}

/// Compatibility problem found in a piece of media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaIssue {
    pub id: &'static str,
    pub description: String,
    pub severity: Severity,
    pub fix: MediaFix,
}

impl MediaIssue {
    fn new(
        id: &'static str,
        description: impl Into<String>,
        severity: Severity,
        fix: MediaFix,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            severity,
            fix,
        }
    }
}

/// Detect issues from already probed metadata.
pub fn detect_issues(metadata: Option<&MediaMetadata>, mime: &str) -> Vec<MediaIssue> {
    match MediaKind::from_mime(mime) {
        MediaKind::Video => metadata
            .and_then(MediaMetadata::as_video)
            .map(|video| {
                let mut issues = Vec::new();
                if video.duration.is_none() {
                    issues.push(MediaIssue::new(
                        "missing-duration",
                        "video has no duration metadata, players cannot seek",
                        Severity::Error,
                        MediaFix::Remux,
                    ));
                } else if !video.has_streaming_flag {
                    issues.push(MediaIssue::new(
                        "missing-streaming-flag",
                        "video index is at the end, playback waits for the full download",
                        Severity::Warning,
                        MediaFix::AddStreamingFlag,
                    ));
                }

                if let Some(codec) = video.codec.as_deref().filter(|c| is_incompatible_codec(c)) {
                    issues.push(MediaIssue::new(
                        "incompatible-codec",
                        format!("{codec} does not play in most browsers"),
                        Severity::Warning,
                        MediaFix::Reencode,
                    ));
                }

                issues
            })
            .unwrap_or_default(),
        MediaKind::Image => match mime {
            "image/heic" | "image/heif" => vec![MediaIssue::new(
                "heic-compat",
                "HEIC images do not display outside Apple devices",
                Severity::Error,
                MediaFix::ConvertImage(OutputFormat::Jpeg),
            )],
            "image/avif" => vec![MediaIssue::new(
                "avif-compat",
                "AVIF is not supported by older browsers",
                Severity::Warning,
                MediaFix::ConvertImage(OutputFormat::Webp),
            )],
            "image/bmp" | "image/x-ms-bmp" => vec![MediaIssue::new(
                "bmp-compat",
                "BMP is uncompressed and poorly supported",
                Severity::Warning,
                MediaFix::ConvertImage(OutputFormat::Png),
            )],
            _ => Vec::new(),
        },
        MediaKind::Audio | MediaKind::Other => Vec::new(),
    }
}

/// Probe-then-detect compatibility checker.
#[derive(Debug, Clone)]
pub struct IssueDetector {
    probe: MediaProbe,
}

impl IssueDetector {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            probe: MediaProbe::new(tools),
        }
    }

    /// Detect issues in buffer, probing it first.
    ///
    /// Returns the probed metadata alongside the issues, so callers need not
    /// probe the same buffer twice.
    #[instrument(skip(self, buffer), level = "debug")]
    pub async fn detect(
        &self,
        buffer: &[u8],
        mime: &str,
    ) -> (Option<MediaMetadata>, Vec<MediaIssue>) {
        let metadata = match MediaKind::from_mime(mime) {
            MediaKind::Video => self.probe.probe(buffer, mime).await,
            _ => None,
        };
        let issues = detect_issues(metadata.as_ref(), mime);
        debug!("found {} issues in {mime}", issues.len());

        (metadata, issues)
    }
}
