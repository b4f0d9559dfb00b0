// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External tool invocation.
//!
//! Share never decodes or encodes media in-process. Every probe, conversion,
//! encode, and clipboard access is delegated to an external binary (ffprobe,
//! ffmpeg, ImageMagick, wl-copy, etc.). The [`MediaToolRunner`] trait is the
//! only boundary between the pipeline and those binaries, so that everything
//! above it can be exercised with a scripted runner in tests, or swapped for
//! an in-process codec library later.
//!
//! # Scratch Files
//!
//! Most tools want to read from and write to real files. A [`Scratch`]
//! directory holds the temporaries of exactly one operation. It is uniquely
//! named and removed when dropped, so cleanup happens on every exit path,
//! including early returns through `?`.

use async_trait::async_trait;
use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

/// Command line for an external tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    stdin: Option<Vec<u8>>,
    discard_output: bool,
}

impl ToolCommand {
    /// Construct new command for target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            discard_output: false,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed bytes to the standard input of the program.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Send stdout and stderr of the program to the null device.
    ///
    /// Needed for programs that fork a daemon inheriting their output, e.g.,
    /// `wl-copy` and `xclip`, since captured pipes would stay open after the
    /// program itself exits.
    pub fn discard_output(mut self) -> Self {
        self.discard_output = true;
        self
    }

    pub fn discards_output(&self) -> bool {
        self.discard_output
    }

    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// Check if any argument equals target string.
    pub fn has_arg(&self, needle: impl AsRef<OsStr>) -> bool {
        self.args.iter().any(|arg| arg.as_os_str() == needle.as_ref())
    }

    /// Value following a flag, e.g., the codec after "-c:v".
    pub fn arg_after(&self, flag: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|arg| arg.as_os_str() == flag.as_ref())
            .and_then(|idx| self.args.get(idx + 1))
            .map(OsString::as_os_str)
    }

    /// Last argument, which is the output path for every media tool we call.
    pub fn last_arg(&self) -> Option<&OsStr> {
        self.args.last().map(OsString::as_os_str)
    }
}

impl Display for ToolCommand {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(fmt, " {arg:?}")?;
            } else {
                write!(fmt, " {arg}")?;
            }
        }

        Ok(())
    }
}

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn non-zero exit into [`ToolError::Failed`].
    pub fn check(self, command: &ToolCommand) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        // INVARIANT: Keep only the tail of stderr, ffmpeg prints a banner first.
        let stderr = self.stderr_lossy();
        let tail = stderr
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");

        Err(ToolError::Failed {
            program: command.program().to_string_lossy().into_owned(),
            exit_code: self.exit_code,
            stderr: tail,
        })
    }
}

/// Boundary to external media tools.
#[async_trait]
pub trait MediaToolRunner: Send + Sync {
    /// Run command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit code is __not__ an error at this level. Callers decide
    /// through [`ToolOutput::check`].
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::NotFound`] if program cannot be located.
    /// - Return [`ToolError::Spawn`] if program cannot be started.
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;

    /// Run command and fail on non-zero exit.
    async fn run_checked(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.run(command).await?.check(command)
    }
}

/// Tool runner that spawns real subprocesses through tokio.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        debug!("run {command}");
        let started = Instant::now();

        let output_pipe = || {
            if command.discards_output() {
                Stdio::null()
            } else {
                Stdio::piped()
            }
        };
        let spawn_error = |err: std::io::Error| ToolError::Spawn {
            program: command.program().to_string_lossy().into_owned(),
            source: err,
        };

        let mut child = Command::new(command.program())
            .args(command.get_args())
            .stdin(if command.get_stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(output_pipe())
            .stderr(output_pipe())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    ToolError::NotFound(command.program().to_string_lossy().into_owned())
                }
                _ => spawn_error(err),
            })?;

        if let (Some(input), Some(mut stdin)) = (command.get_stdin(), child.stdin.take()) {
            stdin.write_all(input).await.map_err(spawn_error)?;
            // INVARIANT: Close stdin so the program sees EOF.
            drop(stdin);
        }

        // INVARIANT: Only wait for pipe EOF when output is captured, a forked
        //   daemon holding discarded output must not block us.
        let output = if command.discards_output() {
            let status = child.wait().await.map_err(spawn_error)?;
            ToolOutput {
                exit_code: status.code(),
                ..ToolOutput::default()
            }
        } else {
            let output = child.wait_with_output().await.map_err(spawn_error)?;
            ToolOutput {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.status.code(),
            }
        };

        debug!(
            "{} exited with {:?} after {:.2?}",
            command.program().to_string_lossy(),
            output.exit_code,
            started.elapsed()
        );

        Ok(output)
    }
}

/// Uniquely named scratch directory for one operation.
///
/// Removed with everything inside it when dropped.
#[derive(Debug)]
pub struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    /// Create new scratch directory under the system temporary directory.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Scratch`] if directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("share-")
            .tempdir()
            .map_err(ToolError::Scratch)?;
        Ok(Self { dir })
    }

    /// Path to a file inside the scratch directory.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write buffer to named file inside the scratch directory.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Scratch`] if file cannot be written.
    pub async fn write(&self, name: impl AsRef<Path>, data: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        tokio::fs::write(&path, data)
            .await
            .map_err(ToolError::Scratch)?;
        Ok(path)
    }

    /// Read named file back from the scratch directory.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::MissingOutput`] if the tool never produced it.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        tokio::fs::read(path.as_ref())
            .await
            .map_err(|_| ToolError::MissingOutput(path.as_ref().to_path_buf()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Program could not be located on PATH.
    #[error("{0} not found, is it installed?")]
    NotFound(String),

    /// Program could not be started or waited on.
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program exited unsuccessfully.
    #[error("{program} exited with {exit_code:?}: {stderr}")]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Scratch file could not be created, written, or read.
    #[error("scratch file operation failed")]
    Scratch(#[source] std::io::Error),

    /// Program exited successfully but produced no output file.
    #[error("expected output at {0:?} was not produced")]
    MissingOutput(PathBuf),
}

/// Friendly result alias :3
pub type Result<T, E = ToolError> = std::result::Result<T, E>;
