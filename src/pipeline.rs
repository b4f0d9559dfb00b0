// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Share pipeline orchestration.
//!
//! One run moves through a fixed sequence of stages:
//!
//! ```text
//! ReadingSource -> DetectingIssues -> ApplyingFixes -> Processing
//!     -> GeneratingFilename -> Uploading -> CopyingClipboard -> Done
//! ```
//!
//! Applying fixes is skipped when auto-fix is off or nothing was found. A dry
//! run stops right after the filename is generated. No stage is entered
//! twice, and any failure aborts the whole run. The pipeline owns the only
//! mutable state of a run, which is the current buffer and its MIME type.

use crate::{
    clipboard::{Clipboard, ClipboardError},
    config::{OutputFormat, ShareConfig},
    filename::generate_filename,
    media::{
        image::{ImageSettings, ImageTransform},
        issues::IssueDetector,
        probe::{MediaMetadata, MediaProbe},
        quality::{select_crf_for_target, size_targets, QualityProbe},
        video::{EncodeSettings, VideoTransform},
        MediaError, MediaKind, MediaTools, Transformed,
    },
    source::{SourceError, UploadSource},
    ui::Ui,
    upload::{UploadError, Uploader},
};

use chrono::Utc;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadingSource,
    DetectingIssues,
    ApplyingFixes,
    Processing,
    GeneratingFilename,
    Uploading,
    CopyingClipboard,
    Done,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::ReadingSource => "reading input",
            Self::DetectingIssues => "checking compatibility",
            Self::ApplyingFixes => "applying fixes",
            Self::Processing => "processing",
            Self::GeneratingFilename => "naming",
            Self::Uploading => "uploading",
            Self::CopyingClipboard => "copying url",
            Self::Done => "done",
        };
        fmt.write_str(label)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Public URL, `None` for a dry run.
    pub url: Option<String>,

    /// Object key, `None` for a dry run.
    pub key: Option<String>,
    pub filename: String,
    pub original_size: u64,
    pub processed_size: u64,
    pub processing_time: Duration,
    pub mime_type: String,
    pub dry_run: bool,
}

/// Share pipeline over one input.
pub struct Pipeline<'ui> {
    tools: MediaTools,
    clipboard: Clipboard,
    uploader: Option<Uploader>,
    ui: &'ui dyn Ui,
}

impl<'ui> Pipeline<'ui> {
    /// Construct new pipeline.
    ///
    /// The uploader may be left out for dry runs.
    pub fn new(
        tools: MediaTools,
        clipboard: Clipboard,
        uploader: Option<Uploader>,
        ui: &'ui dyn Ui,
    ) -> Self {
        Self {
            tools,
            clipboard,
            uploader,
            ui,
        }
    }

    /// Run every stage for target configuration.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Source`] if input cannot be read.
    /// - Return [`PipelineError::Media`] if a fix or transformation fails.
    /// - Return [`PipelineError::Upload`] if upload fails or times out.
    /// - Return [`PipelineError::MissingUploader`] if no uploader was given
    ///   for a real run.
    /// - Return [`PipelineError::Clipboard`] if URL cannot be copied.
    pub async fn run(&self, config: &ShareConfig) -> Result<PipelineResult> {
        let result = self.run_stages(config, None).await;
        self.ui.finish();
        result
    }

    /// Run every stage over input that was already read.
    ///
    /// Lets callers inspect the sniffed MIME type before resolving options.
    /// The source descriptor of the configuration is not read again.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run`], apart from source failures.
    pub async fn run_with_source(
        &self,
        config: &ShareConfig,
        source: UploadSource,
    ) -> Result<PipelineResult> {
        let result = self.run_stages(config, Some(source)).await;
        self.ui.finish();
        result
    }

    #[instrument(skip(self, config, source), level = "debug")]
    async fn run_stages(
        &self,
        config: &ShareConfig,
        source: Option<UploadSource>,
    ) -> Result<PipelineResult> {
        let started = Instant::now();

        self.ui.stage(Stage::ReadingSource);
        let mut source = match source {
            Some(source) => source,
            None => UploadSource::read(&config.source, &self.clipboard).await?,
        };
        let original_size = source.data.len() as u64;

        self.ui.stage(Stage::DetectingIssues);
        let detector = IssueDetector::new(self.tools.clone());
        let (mut metadata, issues) = detector.detect(&source.data, &source.mime).await;
        for issue in &issues {
            self.ui.warn(&format!(
                "{} [{}]: {}",
                issue.severity, issue.id, issue.description
            ));
        }

        if !issues.is_empty() {
            if config.auto_fix {
                self.ui.stage(Stage::ApplyingFixes);
                for issue in &issues {
                    self.ui.info(&format!("{}: {}", issue.id, issue.fix));
                    let fixed = issue
                        .fix
                        .apply(&self.tools, &source.data, &source.mime)
                        .await?;
                    source.supersede(fixed);
                }

                // INVARIANT: Fixes rewrite the container, earlier metadata is stale.
                if source.kind() == MediaKind::Video {
                    metadata = MediaProbe::new(self.tools.clone())
                        .probe(&source.data, &source.mime)
                        .await;
                }
            } else {
                self.ui.info("auto-fix is off, uploading as is");
            }
        }

        self.ui.stage(Stage::Processing);
        let processed = self.process(config, &source, metadata.as_ref()).await?;
        source.supersede(processed);
        let processed_size = source.data.len() as u64;

        self.ui.stage(Stage::GeneratingFilename);
        let filename = generate_filename(
            source.filename.as_deref(),
            &source.mime,
            &config.filename,
            Utc::now(),
        );
        debug!("output filename is {filename}");

        let mut result = PipelineResult {
            url: None,
            key: None,
            filename,
            original_size,
            processed_size,
            processing_time: started.elapsed(),
            mime_type: source.mime.clone(),
            dry_run: config.dry_run,
        };
        self.ui.info(&format!(
            "{} -> {} bytes ({}) in {:.2?}",
            result.original_size, result.processed_size, result.mime_type, result.processing_time
        ));

        if config.dry_run {
            self.ui.stage(Stage::Done);
            return Ok(result);
        }

        self.ui.stage(Stage::Uploading);
        let uploader = self.uploader.as_ref().ok_or(PipelineError::MissingUploader)?;
        let ui = self.ui;
        let uploaded = uploader
            .upload(&source.data, &result.filename, &source.mime, &|loaded, total| {
                ui.progress(loaded, total)
            })
            .await?;

        if config.copy_to_clipboard {
            self.ui.stage(Stage::CopyingClipboard);
            self.clipboard
                .write_text(&uploaded.url)
                .await
                .map_err(|err| PipelineError::Clipboard {
                    url: uploaded.url.clone(),
                    source: err,
                })?;
        }

        self.ui.stage(Stage::Done);
        result.url = Some(uploaded.url);
        result.key = Some(uploaded.key);
        result.processing_time = started.elapsed();

        Ok(result)
    }

    async fn process(
        &self,
        config: &ShareConfig,
        source: &UploadSource,
        metadata: Option<&MediaMetadata>,
    ) -> Result<Transformed> {
        let transformed = match source.kind() {
            MediaKind::Video if config.format == OutputFormat::Gif => {
                VideoTransform::new(self.tools.clone())
                    .convert_to_gif(&source.data, &source.mime, config.gif)
                    .await?
            }
            MediaKind::Video => {
                let format = if config.format.is_image() {
                    self.ui.warn(&format!(
                        "{} is not a video format, keeping container",
                        config.format
                    ));
                    OutputFormat::Original
                } else {
                    config.format
                };

                let mut settings = EncodeSettings {
                    format,
                    resolution: config.resolution,
                    fps: config.fps,
                    remove_audio: config.remove_audio,
                    crf: config.crf,
                };
                if config.probe {
                    if let Some(crf) = self.probe_crf(config, source, metadata, &settings).await? {
                        settings.crf = crf;
                    }
                }

                VideoTransform::new(self.tools.clone())
                    .process_video(
                        &source.data,
                        &source.mime,
                        metadata,
                        &settings,
                        config.encoder,
                    )
                    .await?
            }
            MediaKind::Image => {
                let settings = ImageSettings {
                    format: config.format,
                    resolution: config.resolution,
                    quality: config.quality,
                };
                ImageTransform::new(self.tools.clone())
                    .process_image(&source.data, &source.mime, &settings)
                    .await?
            }
            MediaKind::Audio | MediaKind::Other => {
                Transformed::new(source.data.clone(), source.mime.clone())
            }
        };

        Ok(transformed)
    }

    /// Pick CRF through quality probing, `None` keeps the configured one.
    async fn probe_crf(
        &self,
        config: &ShareConfig,
        source: &UploadSource,
        metadata: Option<&MediaMetadata>,
        settings: &EncodeSettings,
    ) -> Result<Option<u8>> {
        let duration = metadata
            .and_then(MediaMetadata::as_video)
            .and_then(|video| video.duration);
        let Some(duration) = duration else {
            self.ui
                .warn("video duration is unknown, skipping quality probe");
            return Ok(None);
        };

        self.ui.info("probing quality levels");
        let results = QualityProbe::new(self.tools.clone())
            .probe(&source.data, &source.mime, duration, settings)
            .await?;
        if results.is_empty() {
            self.ui.warn("every quality probe failed, keeping configured crf");
            return Ok(None);
        }

        let target = match config.target_size {
            Some(target) => Some(target),
            None => self.ui.choose_target_size(&size_targets(&results)),
        };
        let Some(target) = target else {
            return Ok(None);
        };

        let crf = select_crf_for_target(&results, target);
        if let Some(crf) = crf {
            info!("crf {crf} best fits a target of {target} bytes");
        }

        Ok(crf)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("no uploader configured")]
    MissingUploader,

    /// Upload succeeded but the URL could not be copied.
    #[error("uploaded to {url}, but failed to copy it to the clipboard")]
    Clipboard {
        url: String,
        #[source]
        source: ClipboardError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
