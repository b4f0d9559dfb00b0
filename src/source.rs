// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Input acquisition.
//!
//! Input comes from exactly one of three places, checked in this order:
//!
//! 1. A file path given on the command line.
//! 2. Standard input, if something is piped or redirected into it.
//! 3. The system clipboard.
//!
//! Whatever the origin, the input is read fully into memory. The MIME type
//! is taken from the content itself first, so a mislabeled extension or a
//! nameless stdin stream still gets processed correctly.

use crate::{
    clipboard::{Clipboard, ClipboardError},
    media::{MediaKind, Transformed},
};

use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Where input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    File(PathBuf),
    Stdin,
    Clipboard,
}

impl SourceDescriptor {
    /// Pick source from optional path argument and the state of stdin.
    pub fn detect(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(path),
            None if stdin_is_piped() => Self::Stdin,
            None => Self::Clipboard,
        }
    }
}

/// Check if stdin carries piped or redirected data.
///
/// An interactive terminal is never treated as input. Otherwise stdin must
/// be a pipe, a socket, or a regular file. A closed or null stdin does not
/// count.
pub fn stdin_is_piped() -> bool {
    if std::io::stdin().is_terminal() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        std::fs::metadata("/dev/stdin")
            .map(|meta| {
                let kind = meta.file_type();
                kind.is_fifo() || kind.is_socket() || kind.is_file()
            })
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Fully read input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub data: Vec<u8>,

    /// Original filename, if the source had one.
    pub filename: Option<String>,
    pub mime: String,
}

impl UploadSource {
    /// Read whole input of target source.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::Read`] if file cannot be read.
    /// - Return [`SourceError::Stdin`] if stdin cannot be read.
    /// - Return [`SourceError::Clipboard`] if clipboard cannot be read.
    /// - Return [`SourceError::Empty`] if input holds no bytes.
    #[instrument(skip(clipboard), level = "debug")]
    pub async fn read(descriptor: &SourceDescriptor, clipboard: &Clipboard) -> Result<Self> {
        let source = match descriptor {
            SourceDescriptor::File(path) => {
                let data = tokio::fs::read(path).await.map_err(|err| SourceError::Read {
                    source: err,
                    path: path.clone(),
                })?;
                Self::from_file(path, data)
            }
            SourceDescriptor::Stdin => {
                let mut data = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut data)
                    .await
                    .map_err(SourceError::Stdin)?;
                let mime = sniff_mime(&data).to_string();
                Self {
                    data,
                    filename: None,
                    mime,
                }
            }
            SourceDescriptor::Clipboard => {
                let content = clipboard.read().await?;
                Self {
                    data: content.data,
                    filename: None,
                    mime: content.mime,
                }
            }
        };

        if source.data.is_empty() {
            return Err(SourceError::Empty);
        }
        debug!(
            "read {} bytes of {} from {descriptor:?}",
            source.data.len(),
            source.mime
        );

        Ok(source)
    }

    /// Build source from file contents.
    ///
    /// Content sniffing wins over the extension, the extension only decides
    /// when the content is not recognized.
    pub fn from_file(path: &Path, data: Vec<u8>) -> Self {
        let mime = match sniff_mime(&data) {
            "application/octet-stream" | "text/plain" => mime_guess::from_path(path)
                .first_raw()
                .unwrap_or_else(|| sniff_mime(&data)),
            sniffed => sniffed,
        }
        .to_string();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        Self {
            data,
            filename,
            mime,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }

    /// Replace buffer with result of a transformation.
    pub fn supersede(&mut self, transformed: Transformed) {
        self.data = transformed.data;
        self.mime = transformed.mime;
    }
}

/// Identify MIME type from leading magic bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    let brand = data.get(8..12);
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', ..] if data.len() > 14 => "image/bmp",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => {
            if data.windows(4).take(64).any(|window| window == b"webm") {
                "video/webm"
            } else {
                "video/x-matroska"
            }
        }
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => match brand {
            Some(b"heic" | b"heix" | b"heim" | b"heis") => "image/heic",
            Some(b"mif1" | b"msf1" | b"heif") => "image/heif",
            Some(b"avif" | b"avis") => "image/avif",
            Some(b"qt  ") => "video/quicktime",
            _ => "video/mp4",
        },
        _ if std::str::from_utf8(data).is_ok() => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to read standard input")]
    Stdin(#[source] std::io::Error),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error("input is empty, nothing to share")]
    Empty,
}

/// Friendly result alias :3
pub type Result<T, E = SourceError> = std::result::Result<T, E>;
