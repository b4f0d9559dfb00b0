// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Still image conversion through ImageMagick.

use crate::{
    config::{ImageQuality, OutputFormat, Resolution},
    media::{
        extension_for_mime,
        probe::{MediaMetadata, MediaProbe},
        MediaTools, Result, Transformed,
    },
    tool::{Scratch, ToolCommand},
};

use tracing::{debug, info, instrument, warn};

/// Resize request understood by the conversion tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleSpec {
    /// Shrink to fit inside a box, never enlarge.
    Fit { width: u32, height: u32 },

    /// Scale both sides by a percentage, always applied.
    Percent(u32),
}

impl ScaleSpec {
    /// Resize needed to honor a resolution preset.
    ///
    /// Named presets only ever shrink. When the source dimensions are known
    /// and already fit, no resize is needed at all. Percentage presets
    /// always scale.
    pub fn for_resolution(resolution: Resolution, dimensions: Option<(u32, u32)>) -> Option<Self> {
        if let Some(percent) = resolution.percent() {
            return Some(Self::Percent(percent));
        }

        let (long, short) = resolution.bounds()?;
        match dimensions {
            Some((width, height)) => {
                let (fit_width, fit_height) = fit_dimensions(resolution, width, height);
                if (fit_width, fit_height) == (width, height) {
                    None
                } else {
                    Some(Self::Fit {
                        width: fit_width,
                        height: fit_height,
                    })
                }
            }
            None => Some(Self::Fit {
                width: long,
                height: short,
            }),
        }
    }

    /// ImageMagick geometry string.
    pub fn geometry(&self) -> String {
        match self {
            Self::Fit { width, height } => format!("{width}x{height}>"),
            Self::Percent(percent) => format!("{percent}%"),
        }
    }
}

/// Final dimensions after applying a resolution preset.
///
/// Named presets bound the long and short side of the image, keeping aspect
/// ratio, and never upscale. Percentage presets always scale.
pub fn fit_dimensions(resolution: Resolution, width: u32, height: u32) -> (u32, u32) {
    if let Some(percent) = resolution.percent() {
        let scale = |side: u32| ((u64::from(side) * u64::from(percent)) / 100).max(1) as u32;
        return (scale(width), scale(height));
    }

    let Some((long, short)) = resolution.bounds() else {
        return (width, height);
    };

    let (src_long, src_short) = (width.max(height), width.min(height));
    if src_long == 0 || src_short == 0 {
        return (width, height);
    }

    let ratio = f64::min(
        f64::from(long) / f64::from(src_long),
        f64::from(short) / f64::from(src_short),
    );
    if ratio >= 1.0 {
        return (width, height);
    }

    let scale = |side: u32| ((f64::from(side) * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Settings that drive [`ImageTransform::process_image`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub quality: ImageQuality,
}

/// Image conversion operations.
#[derive(Debug, Clone)]
pub struct ImageTransform {
    tools: MediaTools,
    probe: MediaProbe,
}

impl ImageTransform {
    pub fn new(tools: MediaTools) -> Self {
        let probe = MediaProbe::new(tools.clone());
        Self { tools, probe }
    }

    /// Convert image to target format.
    ///
    /// Applies optional resize, then quality tier compression, then format
    /// conversion. [`OutputFormat::Original`] keeps the source format.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Unsupported`] if target is not an image
    ///   format.
    /// - Return [`MediaError::Tool`] if conversion fails.
    ///
    /// [`MediaError::Unsupported`]: crate::media::MediaError::Unsupported
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    #[instrument(skip(self, buffer), level = "debug")]
    pub async fn convert(
        &self,
        buffer: &[u8],
        mime: &str,
        target: OutputFormat,
        quality: ImageQuality,
        scale: Option<ScaleSpec>,
    ) -> Result<Transformed> {
        let (target_mime, target_ext) = match target {
            OutputFormat::Original => (mime, extension_for_mime(mime)),
            format if format.is_image() => match (format.mime(), format.extension()) {
                (Some(mime), Some(ext)) => (mime, ext),
                _ => return Err(unsupported_target(mime)),
            },
            _ => return Err(unsupported_target(mime)),
        };

        // INVARIANT: Scratch directory is removed on every return path.
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("input.{}", extension_for_mime(mime)), buffer)
            .await?;
        let output = scratch.path(format!("output.{target_ext}"));

        let mut command = ToolCommand::new(&self.tools.paths.magick)
            .arg(input)
            .arg("-auto-orient");
        if let Some(scale) = scale {
            command = command.args(["-resize".to_string(), scale.geometry()]);
        }
        let command = command
            .args(["-quality".to_string(), quality.value().to_string()])
            .arg(&output);

        self.tools.runner.run_checked(&command).await?;
        let data = scratch.read(&output).await?;
        debug!("converted {mime} to {target_mime}: {} -> {} bytes", buffer.len(), data.len());

        Ok(Transformed::new(data, target_mime))
    }

    /// Apply configured image processing.
    ///
    /// Returns the original buffer untouched when neither format nor
    /// resolution change and the quality tier is the default.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if conversion fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn process_image(
        &self,
        buffer: &[u8],
        mime: &str,
        settings: &ImageSettings,
    ) -> Result<Transformed> {
        let mut format = settings.format;
        if format.is_video() {
            warn!("{format} is not an image format, keeping {mime}");
            format = OutputFormat::Original;
        }

        let same_format = format == OutputFormat::Original || format.mime() == Some(mime);
        if same_format
            && settings.resolution == Resolution::Original
            && settings.quality == ImageQuality::default()
        {
            debug!("image needs no processing");
            return Ok(Transformed::new(buffer.to_vec(), mime));
        }

        let scale = match settings.resolution {
            Resolution::Original => None,
            resolution if resolution.percent().is_some() => {
                ScaleSpec::for_resolution(resolution, None)
            }
            resolution => {
                let dimensions = self
                    .probe
                    .probe(buffer, mime)
                    .await
                    .as_ref()
                    .and_then(MediaMetadata::as_image)
                    .map(|image| (image.width, image.height));
                ScaleSpec::for_resolution(resolution, dimensions)
            }
        };

        info!(
            "convert image to {format} at {} quality",
            settings.quality
        );
        self.convert(buffer, mime, format, settings.quality, scale)
            .await
    }
}

fn unsupported_target(mime: &str) -> crate::media::MediaError {
    crate::media::MediaError::Unsupported {
        operation: "convert to a non-image format",
        mime: mime.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ToolPaths,
        media::MediaError,
        testing::{ok, write_output, FakeRunner},
    };
    use clap::ValueEnum;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::{ffi::OsStr, sync::Arc};

    fn transform_with(runner: FakeRunner) -> (ImageTransform, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        let tools = MediaTools::new(runner.clone(), ToolPaths::default());
        (ImageTransform::new(tools), runner)
    }

    #[test_case(Resolution::P1080, 1280, 720, (1280, 720); "full hd never upscales hd")]
    #[test_case(Resolution::P720, 3840, 2160, (1280, 720); "hd shrinks uhd")]
    #[test_case(Resolution::P720, 1080, 1920, (720, 1280); "hd keeps portrait orientation")]
    #[test_case(Resolution::P480, 200, 100, (200, 100); "sd leaves small images alone")]
    #[test_case(Resolution::Half, 200, 100, (100, 50); "half always scales")]
    #[test_case(Resolution::Quarter, 100, 2, (25, 1); "quarter never reaches zero")]
    #[test_case(Resolution::Original, 123, 45, (123, 45); "original")]
    #[test]
    fn fit_dimensions_by_preset(resolution: Resolution, width: u32, height: u32, expect: (u32, u32)) {
        pretty_assertions::assert_eq!(fit_dimensions(resolution, width, height), expect);
    }

    #[tokio::test]
    async fn named_presets_never_upscale_for_any_quality_tier() -> anyhow::Result<()> {
        for quality in ImageQuality::value_variants() {
            let (transform, runner) = transform_with(FakeRunner::new(|command| {
                if command.program() == "ffprobe" {
                    return Ok(ok(
                        r#"{"streams":[{"codec_type":"video","width":1280,"height":720}]}"#,
                    ));
                }
                Ok(write_output(command, b"jpeg"))
            }));

            for (resolution, expect) in [(Resolution::P1080, None), (Resolution::Half, Some("50%"))] {
                let settings = ImageSettings {
                    format: OutputFormat::Jpeg,
                    resolution,
                    quality: *quality,
                };
                transform.process_image(b"png", "image/png", &settings).await?;

                let calls = runner.calls_to("magick");
                let last = calls.last().map(|call| call.arg_after("-resize").map(OsStr::to_owned));
                assert_eq!(last, Some(expect.map(Into::into)), "{quality} at {resolution}");
            }
        }

        Ok(())
    }

    #[test]
    fn scale_geometry_never_enlarges_named_presets() {
        assert_eq!(
            ScaleSpec::for_resolution(Resolution::P1080, None).map(|s| s.geometry()),
            Some("1920x1080>".to_string())
        );
        assert_eq!(ScaleSpec::Percent(25).geometry(), "25%");
    }

    #[tokio::test]
    async fn convert_builds_magick_command() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"jpeg bytes"));

        let result = transform
            .convert(
                b"heic bytes",
                "image/heic",
                OutputFormat::Jpeg,
                ImageQuality::High,
                Some(ScaleSpec::Percent(50)),
            )
            .await?;
        assert_eq!(result, Transformed::new(b"jpeg bytes".to_vec(), "image/jpeg"));

        let calls = runner.calls_to("magick");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arg_after("-resize"), Some(OsStr::new("50%")));
        assert_eq!(calls[0].arg_after("-quality"), Some(OsStr::new("95")));
        let output = calls[0].last_arg().map(|arg| arg.to_string_lossy().into_owned());
        assert!(output.is_some_and(|path| path.ends_with("output.jpg")));

        Ok(())
    }

    #[tokio::test]
    async fn convert_rejects_video_targets() {
        let (transform, runner) = transform_with(FakeRunner::writing(b""));
        let result = transform
            .convert(b"png", "image/png", OutputFormat::Mp4, ImageQuality::High, None)
            .await;
        assert!(matches!(result, Err(MediaError::Unsupported { .. })));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn process_image_short_circuits_defaults() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"changed"));

        let result = transform
            .process_image(b"original", "image/png", &ImageSettings::default())
            .await?;
        assert_eq!(result, Transformed::new(b"original".to_vec(), "image/png"));

        let settings = ImageSettings {
            format: OutputFormat::Png,
            ..Default::default()
        };
        let result = transform.process_image(b"original", "image/png", &settings).await?;
        assert_eq!(result.data, b"original".to_vec());
        assert!(runner.calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn process_image_skips_resize_when_source_already_fits() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::new(|command| {
            if command.program() == "ffprobe" {
                return Ok(ok(
                    r#"{"streams":[{"codec_type":"video","width":1280,"height":720}]}"#,
                ));
            }
            Ok(write_output(command, b"webp"))
        }));
        let settings = ImageSettings {
            format: OutputFormat::Webp,
            resolution: Resolution::P1080,
            quality: ImageQuality::Small,
        };

        let result = transform.process_image(b"png", "image/png", &settings).await?;
        assert_eq!(result.mime, "image/webp");

        let calls = runner.calls_to("magick");
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].has_arg("-resize"));
        assert_eq!(calls[0].arg_after("-quality"), Some(OsStr::new("70")));

        Ok(())
    }
}
