// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media inspection and transformation.
//!
//! Every component in here works on whole in-memory buffers. A buffer goes
//! in, a new buffer (plus the MIME type it now has) comes out. Internally
//! each operation writes its input into a private [`Scratch`] directory,
//! runs the relevant external tool against it, and reads the result back.
//!
//! # Components
//!
//! - [`probe`]: read-only metadata extraction.
//! - [`issues`]: compatibility issue detection and their fixes.
//! - [`image`]: still image conversion.
//! - [`video`]: video encoding, remuxing, and GIF generation.
//! - [`quality`]: sample based quality probing for target file sizes.
//!
//! [`Scratch`]: crate::tool::Scratch

pub mod image;
pub mod issues;
pub mod probe;
pub mod quality;
pub mod video;

use crate::{
    config::ToolPaths,
    tool::{MediaToolRunner, ToolError},
};

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

/// Coarse category of a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    /// Categorize MIME type by its top-level type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }

    /// Kind has something to look at, i.e., image or video.
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

/// Shared handle to external media tools.
#[derive(Clone)]
pub struct MediaTools {
    pub(crate) runner: Arc<dyn MediaToolRunner>,
    pub(crate) paths: ToolPaths,
}

impl MediaTools {
    /// Construct new media tool handle.
    pub fn new(runner: Arc<dyn MediaToolRunner>, paths: ToolPaths) -> Self {
        Self { runner, paths }
    }

    pub fn runner(&self) -> &dyn MediaToolRunner {
        self.runner.as_ref()
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }
}

impl Debug for MediaTools {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("MediaTools")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// Result of a transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub data: Vec<u8>,
    pub mime: String,
}

impl Transformed {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
        }
    }
}

/// File extension for a MIME type.
///
/// Common media types are mapped explicitly, everything else goes through
/// the `mime_guess` table. Falls back to "bin".
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" => "flac",
        "audio/mp4" => "m4a",
        "text/plain" => "txt",
        "application/pdf" => "pdf",
        "application/octet-stream" => "bin",
        _ => mime_guess::get_mime_extensions_str(mime)
            .and_then(|extensions| extensions.first().copied())
            .unwrap_or("bin"),
    }
}

/// Media error types.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// External tool invocation failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Operation cannot be applied to this kind of media.
    #[error("cannot {operation} {mime}")]
    Unsupported {
        operation: &'static str,
        mime: String,
    },

    /// Quality probe needs a known duration.
    #[error("cannot probe quality without knowing the video duration")]
    UnknownDuration,
}

/// Friendly result alias :3
pub type Result<T, E = MediaError> = std::result::Result<T, E>;
