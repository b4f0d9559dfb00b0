// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use share::{
    clipboard::{Clipboard, ClipboardBackend},
    config::{
        Credentials, Encoder, FrameRate, ImageQuality, InquirePrompter, OutputFormat, Prompter,
        Resolution, SettingsFile, ShareOptions,
    },
    media::MediaTools,
    path::default_config_path,
    pipeline::{Pipeline, PipelineError, PipelineResult},
    source::{SourceDescriptor, UploadSource},
    tool::{MediaToolRunner, ProcessRunner},
    ui::{PlainUi, TerminalUi, Ui},
    upload::Uploader,
};

use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use std::{io::IsTerminal, path::PathBuf, process::exit, sync::Arc};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Share media and files through object storage.
///
/// Reads PATH, or piped standard input, or the clipboard when neither is
/// given. Fixes web compatibility problems, transcodes, uploads, and copies
/// the public URL to the clipboard.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// File to share.
    #[arg(value_name = "path")]
    pub path: Option<PathBuf>,

    /// Target container or image format.
    #[arg(short, long, value_enum, value_name = "format")]
    pub format: Option<OutputFormat>,

    /// Output resolution.
    #[arg(short, long, value_enum, value_name = "resolution")]
    pub resolution: Option<Resolution>,

    /// Output frame rate of videos.
    #[arg(long, value_enum, value_name = "fps")]
    pub fps: Option<FrameRate>,

    /// Video encoder.
    #[arg(short, long, value_enum, value_name = "encoder")]
    pub encoder: Option<Encoder>,

    /// Explicit video quality value, lower is better.
    #[arg(long, value_name = "n", value_parser = clap::value_parser!(u8).range(0..=63))]
    pub crf: Option<u8>,

    /// Probe quality levels to pick a target file size.
    #[arg(long, conflicts_with_all = ["no_probe", "crf"])]
    pub probe: bool,

    /// Never probe quality levels.
    #[arg(long)]
    pub no_probe: bool,

    /// Pick quality that keeps video below size in megabytes.
    #[arg(long, value_name = "MB", conflicts_with_all = ["no_probe", "crf"])]
    pub target_size: Option<u64>,

    /// Drop audio track of videos.
    #[arg(long, conflicts_with = "keep_audio")]
    pub remove_audio: bool,

    /// Keep audio track of videos.
    #[arg(long)]
    pub keep_audio: bool,

    /// Image quality tier.
    #[arg(short, long, value_enum, value_name = "quality")]
    pub quality: Option<ImageQuality>,

    /// Frame rate of generated GIFs.
    #[arg(long, value_name = "n")]
    pub gif_fps: Option<u32>,

    /// Width in pixels of generated GIFs.
    #[arg(long, value_name = "px")]
    pub gif_width: Option<u32>,

    /// Replace filename with a random id.
    #[arg(long, conflicts_with = "name")]
    pub random_filename: bool,

    /// Lowercase filename and replace special characters with dashes.
    #[arg(long)]
    pub normalize_filename: bool,

    /// Explicit output filename.
    #[arg(short, long, value_name = "filename")]
    pub name: Option<String>,

    /// Fix web compatibility issues before processing.
    #[arg(long, conflicts_with = "no_auto_fix")]
    pub auto_fix: bool,

    /// Upload detected issues as is.
    #[arg(long)]
    pub no_auto_fix: bool,

    /// Process but do not upload, print what would be uploaded.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not copy URL to the clipboard.
    #[arg(long)]
    pub no_clipboard: bool,

    /// Never prompt, take defaults for anything not given.
    #[arg(short, long)]
    pub yes: bool,

    /// Path to settings file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log every external tool invocation and its timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn options(&self) -> ShareOptions {
        ShareOptions {
            format: self.format,
            resolution: self.resolution,
            fps: self.fps,
            remove_audio: flag_pair(self.remove_audio, self.keep_audio),
            encoder: self.encoder,
            crf: self.crf,
            probe: flag_pair(self.probe, self.no_probe),
            target_size_mb: self.target_size,
            quality: self.quality,
            gif_fps: self.gif_fps,
            gif_width: self.gif_width,
            random_filename: self.random_filename.then_some(true),
            normalize_filename: self.normalize_filename.then_some(true),
            name: self.name.clone(),
            auto_fix: flag_pair(self.auto_fix, self.no_auto_fix),
            dry_run: Some(self.dry_run),
            clipboard: self.no_clipboard.then_some(false),
        }
    }

    async fn run(self) -> Result<()> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        let settings = SettingsFile::load(&config_path)?;

        // INVARIANT: Missing credentials fail before any work begins.
        let uploader = if self.dry_run {
            None
        } else {
            Some(Uploader::s3(Credentials::get()?, &settings.upload))
        };

        let runner: Arc<dyn MediaToolRunner> = Arc::new(ProcessRunner::new());
        let tools = MediaTools::new(runner.clone(), settings.tools.clone());
        let clipboard = Clipboard::new(runner, ClipboardBackend::detect());

        // INVARIANT: Prompts follow sniffed content, never the file extension.
        let descriptor = SourceDescriptor::detect(self.path.clone());
        let source = UploadSource::read(&descriptor, &clipboard).await?;
        let interactive =
            !self.yes && std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
        let prompter = InquirePrompter;
        let prompter = interactive.then_some(&prompter as &dyn Prompter);
        let config = self.options().resolve(
            descriptor,
            &settings.defaults,
            Some(source.kind()),
            prompter,
        )?;

        let ui: Box<dyn Ui> = if std::io::stderr().is_terminal() {
            Box::new(TerminalUi::new()?)
        } else {
            Box::new(PlainUi)
        };

        let pipeline = Pipeline::new(tools, clipboard, uploader, ui.as_ref());
        match pipeline.run_with_source(&config, source).await {
            Ok(result) => report(&result),
            Err(PipelineError::Clipboard { url, source }) => {
                warn!("failed to copy URL to clipboard: {source}");
                println!("{url}");
            }
            Err(error) => return Err(error.into()),
        }

        Ok(())
    }
}

/// Merge a `--flag`/`--no-flag` pair, clap already rejects both at once.
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn report(result: &PipelineResult) {
    if result.dry_run {
        println!("filename: {}", result.filename);
        println!("mime type: {}", result.mime_type);
        println!("size: {} bytes", result.processed_size);
    } else if let Some(url) = &result.url {
        println!("{url}");
    }
}

/// Exit status for a command line clap rejected. Usage errors exit 1.
fn usage_exit_code(error: &clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            exit(usage_exit_code(&error));
        }
    };
    let verbose = cli.verbose;

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info,share=debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        if verbose {
            error!("{error:?}");
        } else {
            error!("{error:#}");
        }
        exit(1);
    }

    exit(0)
}
