// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! System clipboard access.
//!
//! There is no portable clipboard API worth depending on, so the clipboard
//! is reached through whatever command-line helper the platform ships:
//!
//! | Backend    | Read                 | Write       |
//! |------------|----------------------|-------------|
//! | Wayland    | `wl-paste`           | `wl-copy`   |
//! | X11        | `xclip`              | `xclip`     |
//! | macOS      | `pngpaste`, `pbpaste`| `pbcopy`    |
//! | PowerShell | `powershell.exe`     | `clip.exe`  |
//!
//! Reading always prefers image content over text, since screenshots are
//! the usual reason to share straight from the clipboard.

use crate::tool::{MediaToolRunner, ToolCommand, ToolError};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};
use tracing::{debug, instrument};

/// Image MIME types in order of preference.
const PREFERRED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

const POWERSHELL_IMAGE_SCRIPT: &str = "Add-Type -AssemblyName System.Windows.Forms; \
    $img = [System.Windows.Forms.Clipboard]::GetImage(); \
    if ($img) { $ms = New-Object System.IO.MemoryStream; \
    $img.Save($ms, [System.Drawing.Imaging.ImageFormat]::Png); \
    [Convert]::ToBase64String($ms.ToArray()) }";

/// Clipboard helper family available on this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardBackend {
    Wayland,
    X11,
    MacOs,
    PowerShell,
}

impl ClipboardBackend {
    /// Detect backend from platform and session environment.
    pub fn detect() -> Self {
        Self::detect_with(|var| std::env::var_os(var).is_some())
    }

    pub(crate) fn detect_with(is_set: impl Fn(&str) -> bool) -> Self {
        if cfg!(windows) || is_set("WSL_DISTRO_NAME") {
            Self::PowerShell
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if is_set("WAYLAND_DISPLAY") {
            Self::Wayland
        } else {
            Self::X11
        }
    }
}

/// Content read off the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardContent {
    pub data: Vec<u8>,
    pub mime: String,
}

/// Clipboard handle.
#[derive(Clone)]
pub struct Clipboard {
    runner: Arc<dyn MediaToolRunner>,
    backend: ClipboardBackend,
}

impl Clipboard {
    /// Construct new clipboard handle for target backend.
    pub fn new(runner: Arc<dyn MediaToolRunner>, backend: ClipboardBackend) -> Self {
        Self { runner, backend }
    }

    pub fn backend(&self) -> ClipboardBackend {
        self.backend
    }

    /// Read clipboard content, preferring images over text.
    ///
    /// # Errors
    ///
    /// - Return [`ClipboardError::Tool`] if clipboard helper fails.
    /// - Return [`ClipboardError::Empty`] if clipboard holds nothing usable.
    /// - Return [`ClipboardError::Decode`] if PowerShell image data is garbled.
    #[instrument(skip(self), level = "debug")]
    pub async fn read(&self) -> Result<ClipboardContent> {
        let content = match self.backend {
            ClipboardBackend::Wayland => {
                let offered = self
                    .list_types(ToolCommand::new("wl-paste").arg("--list-types"))
                    .await?;
                let mime = pick_type(&offered).ok_or(ClipboardError::Empty)?;
                let target = if mime == "text/plain" { "text/plain;charset=utf-8" } else { mime };
                let target = if offered.iter().any(|t| t == target) { target } else { mime };
                let output = self
                    .runner
                    .run_checked(&ToolCommand::new("wl-paste").args(["--no-newline", "--type", target]))
                    .await?;
                ClipboardContent {
                    data: output.stdout,
                    mime: mime.to_string(),
                }
            }
            ClipboardBackend::X11 => {
                let offered = self
                    .list_types(
                        ToolCommand::new("xclip").args(["-selection", "clipboard", "-t", "TARGETS", "-o"]),
                    )
                    .await?;
                let mime = pick_type(&offered).ok_or(ClipboardError::Empty)?;
                let target = if mime == "text/plain" { "UTF8_STRING" } else { mime };
                let output = self
                    .runner
                    .run_checked(
                        &ToolCommand::new("xclip").args(["-selection", "clipboard", "-t", target, "-o"]),
                    )
                    .await?;
                ClipboardContent {
                    data: output.stdout,
                    mime: mime.to_string(),
                }
            }
            ClipboardBackend::MacOs => {
                // pngpaste exits non-zero when the clipboard holds no image.
                let image = self.runner.run(&ToolCommand::new("pngpaste").arg("-")).await;
                match image {
                    Ok(output) if output.success() && !output.stdout.is_empty() => {
                        ClipboardContent {
                            data: output.stdout,
                            mime: "image/png".into(),
                        }
                    }
                    _ => {
                        let output = self.runner.run_checked(&ToolCommand::new("pbpaste")).await?;
                        ClipboardContent {
                            data: output.stdout,
                            mime: "text/plain".into(),
                        }
                    }
                }
            }
            ClipboardBackend::PowerShell => {
                let image = self
                    .runner
                    .run_checked(&powershell(POWERSHELL_IMAGE_SCRIPT))
                    .await?;
                let encoded = image.stdout_lossy();
                let encoded = encoded.trim();
                if encoded.is_empty() {
                    let output = self
                        .runner
                        .run_checked(&powershell("Get-Clipboard -Raw"))
                        .await?;
                    ClipboardContent {
                        data: output.stdout,
                        mime: "text/plain".into(),
                    }
                } else {
                    ClipboardContent {
                        data: STANDARD.decode(encoded)?,
                        mime: "image/png".into(),
                    }
                }
            }
        };

        if content.data.is_empty() {
            return Err(ClipboardError::Empty);
        }
        debug!("read {} bytes of {} from clipboard", content.data.len(), content.mime);

        Ok(content)
    }

    /// Replace clipboard content with text.
    ///
    /// # Errors
    ///
    /// - Return [`ClipboardError::Tool`] if clipboard helper fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn write_text(&self, text: &str) -> Result<()> {
        let command = match self.backend {
            ClipboardBackend::Wayland => ToolCommand::new("wl-copy"),
            ClipboardBackend::X11 => ToolCommand::new("xclip").args(["-selection", "clipboard"]),
            ClipboardBackend::MacOs => ToolCommand::new("pbcopy"),
            ClipboardBackend::PowerShell => ToolCommand::new("clip.exe"),
        };
        self.runner
            .run_checked(&command.stdin(text).discard_output())
            .await?;

        Ok(())
    }

    async fn list_types(&self, command: ToolCommand) -> Result<Vec<String>> {
        let output = self.runner.run_checked(&command).await?;
        Ok(output
            .stdout_lossy()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

impl Debug for Clipboard {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Clipboard")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

fn powershell(script: &str) -> ToolCommand {
    ToolCommand::new("powershell.exe").args(["-NoProfile", "-NonInteractive", "-Command", script])
}

/// Pick most useful type out of what the clipboard offers.
///
/// Text targets are normalized to "text/plain".
fn pick_type(offered: &[String]) -> Option<&str> {
    if let Some(preferred) = PREFERRED_IMAGE_TYPES
        .iter()
        .find(|preferred| offered.iter().any(|t| t == *preferred))
    {
        return Some(*preferred);
    }

    if let Some(image) = offered.iter().find(|t| t.starts_with("image/")) {
        return Some(image.as_str());
    }

    offered
        .iter()
        .any(|t| t.starts_with("text/plain") || t == "UTF8_STRING" || t == "STRING")
        .then_some("text/plain")
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("clipboard is empty")]
    Empty,

    #[error("clipboard image is not valid base64")]
    Decode(#[from] base64::DecodeError),
}

/// Friendly result alias :3
pub type Result<T, E = ClipboardError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failed, ok, FakeRunner};
    use pretty_assertions::assert_eq;

    fn clipboard_with(runner: FakeRunner, backend: ClipboardBackend) -> (Clipboard, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        (Clipboard::new(runner.clone(), backend), runner)
    }

    #[test]
    fn backend_detection() {
        if cfg!(any(windows, target_os = "macos")) {
            return;
        }

        assert_eq!(ClipboardBackend::detect_with(|var| var == "WAYLAND_DISPLAY"), ClipboardBackend::Wayland);
        assert_eq!(ClipboardBackend::detect_with(|var| var == "WSL_DISTRO_NAME"), ClipboardBackend::PowerShell);
        assert_eq!(ClipboardBackend::detect_with(|_| false), ClipboardBackend::X11);
    }

    #[test]
    fn pick_type_prefers_images() {
        let offered = |types: &[&str]| types.iter().map(|t| t.to_string()).collect::<Vec<_>>();

        assert_eq!(pick_type(&offered(&["text/plain", "image/jpeg", "image/png"])), Some("image/png"));
        assert_eq!(pick_type(&offered(&["TARGETS", "image/bmp"])), Some("image/bmp"));
        assert_eq!(pick_type(&offered(&["UTF8_STRING", "TARGETS"])), Some("text/plain"));
        assert_eq!(pick_type(&offered(&["TARGETS"])), None);
    }

    #[tokio::test]
    async fn wayland_reads_image_over_text() -> anyhow::Result<()> {
        let (clipboard, runner) = clipboard_with(
            FakeRunner::new(|command| {
                if command.has_arg("--list-types") {
                    Ok(ok("text/plain;charset=utf-8\nimage/png\n"))
                } else {
                    Ok(ok(b"\x89PNG".to_vec()))
                }
            }),
            ClipboardBackend::Wayland,
        );

        let content = clipboard.read().await?;
        assert_eq!(content, ClipboardContent { data: b"\x89PNG".to_vec(), mime: "image/png".into() });
        assert_eq!(runner.calls()[1].arg_after("--type"), Some(std::ffi::OsStr::new("image/png")));

        Ok(())
    }

    #[tokio::test]
    async fn macos_falls_back_to_text() -> anyhow::Result<()> {
        let (clipboard, _) = clipboard_with(
            FakeRunner::new(|command| match command.program().to_str() {
                Some("pngpaste") => Ok(failed("no image data found on the clipboard")),
                _ => Ok(ok("hello")),
            }),
            ClipboardBackend::MacOs,
        );

        let content = clipboard.read().await?;
        assert_eq!(content.mime, "text/plain");
        assert_eq!(content.data, b"hello".to_vec());

        Ok(())
    }

    #[tokio::test]
    async fn powershell_decodes_base64_image() -> anyhow::Result<()> {
        let (clipboard, runner) = clipboard_with(
            FakeRunner::new(|_| Ok(ok("iVBORw==\r\n"))),
            ClipboardBackend::PowerShell,
        );

        let content = clipboard.read().await?;
        assert_eq!(content.mime, "image/png");
        assert_eq!(content.data, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(runner.calls().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn empty_clipboard_is_an_error() {
        let (clipboard, _) = clipboard_with(FakeRunner::new(|_| Ok(ok(""))), ClipboardBackend::X11);
        assert!(matches!(clipboard.read().await, Err(ClipboardError::Empty)));
    }

    #[tokio::test]
    async fn write_text_pipes_through_stdin() -> anyhow::Result<()> {
        let (clipboard, runner) = clipboard_with(FakeRunner::new(|_| Ok(ok(""))), ClipboardBackend::Wayland);

        clipboard.write_text("https://share.example.com/2025/01/a.png").await?;
        let calls = runner.calls();
        assert_eq!(calls[0].program(), "wl-copy");
        assert_eq!(calls[0].get_stdin(), Some(&b"https://share.example.com/2025/01/a.png"[..]));
        assert!(calls[0].discards_output());

        Ok(())
    }
}
