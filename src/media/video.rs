// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Video encoding through ffmpeg.
//!
//! # Encoder Fallback
//!
//! Accelerated encoders (hardware H.264, AV1) are not available everywhere,
//! and even when they are, driver quirks make them fail on inputs the
//! software encoder handles fine. Any failure of an accelerated encoder is
//! retried exactly once with the software encoder before the error is
//! propagated. This is the only retry in the whole pipeline.

use crate::{
    config::{Encoder, FrameRate, GifSettings, OutputFormat, Resolution, ToolPaths, DEFAULT_CRF},
    media::{
        extension_for_mime,
        issues::is_incompatible_codec,
        probe::{MediaMetadata, VideoMetadata},
        MediaTools, Result, Transformed,
    },
    tool::{Scratch, ToolCommand},
};

use std::{future::Future, path::Path};
use tracing::{debug, info, instrument, warn};

/// Settings for a full video encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub fps: FrameRate,
    pub remove_audio: bool,
    pub crf: u8,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Original,
            resolution: Resolution::Original,
            fps: FrameRate::Original,
            remove_audio: false,
            crf: DEFAULT_CRF,
        }
    }
}

impl EncodeSettings {
    /// Nothing differs from "leave it as it is".
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }

    /// Output is a WebM container.
    pub fn is_webm(&self) -> bool {
        self.format == OutputFormat::Webm
    }

    /// Encoder that actually runs, WebM is always encoded in software.
    pub fn effective_encoder(&self, encoder: Encoder) -> Encoder {
        if self.is_webm() {
            Encoder::Cpu
        } else {
            encoder
        }
    }

    pub fn container_mime(&self) -> &'static str {
        if self.is_webm() {
            "video/webm"
        } else {
            "video/mp4"
        }
    }

    pub fn container_extension(&self) -> &'static str {
        if self.is_webm() {
            "webm"
        } else {
            "mp4"
        }
    }
}

/// Scale filter for target resolution.
///
/// Codecs require even dimensions, so a rounding scale is applied even at
/// original resolution. Named presets bound the long and the short side of
/// the frame, whatever its orientation, and never upscale, same as
/// [`fit_dimensions`] does for images.
///
/// [`fit_dimensions`]: crate::media::image::fit_dimensions
pub fn scale_filter(resolution: Resolution) -> String {
    match (resolution.bounds(), resolution.percent()) {
        (Some((long, short)), _) => format!(
            "scale='min(iw,if(gte(iw,ih),{long},{short}))':'min(ih,if(gte(iw,ih),{short},{long}))'\
             :force_original_aspect_ratio=decrease:force_divisible_by=2"
        ),
        (None, Some(percent)) => {
            let factor = f64::from(percent) / 100.0;
            format!("scale=trunc(iw*{factor}/2)*2:trunc(ih*{factor}/2)*2")
        }
        (None, None) => "scale=trunc(iw/2)*2:trunc(ih/2)*2".into(),
    }
}

/// Build ffmpeg command for one encode attempt.
pub fn build_encode_command(
    paths: &ToolPaths,
    input: &Path,
    output: &Path,
    settings: &EncodeSettings,
    encoder: Encoder,
) -> ToolCommand {
    let mut command = ToolCommand::new(&paths.ffmpeg)
        .args(["-hide_banner", "-y", "-i"])
        .arg(input);

    let crf = settings.crf.to_string();
    command = if settings.is_webm() {
        command.args(["-c:v", "libvpx-vp9", "-crf", crf.as_str(), "-b:v", "0", "-row-mt", "1"])
    } else {
        match encoder {
            Encoder::Cpu => {
                command.args(["-c:v", "libx264", "-preset", "medium", "-crf", crf.as_str()])
            }
            Encoder::Av1 => {
                command.args(["-c:v", "libsvtav1", "-preset", "8", "-crf", crf.as_str()])
            }
            Encoder::Hardware => {
                // INVARIANT: Hardware QP runs one above CRF for similar quality.
                let qp = settings.crf.saturating_add(1).to_string();
                command
                    .args(["-c:v", paths.hardware_codec.as_str()])
                    .args(["-qp", qp.as_str()])
            }
        }
    };
    command = command.args(["-pix_fmt", "yuv420p"]);

    if let Some(fps) = settings.fps.value() {
        command = command.args(["-r".to_string(), fps.to_string()]);
    }
    command = command.args(["-vf".to_string(), scale_filter(settings.resolution)]);

    command = match (settings.remove_audio, settings.is_webm()) {
        (true, _) => command.arg("-an"),
        (false, true) => command.args(["-c:a", "libopus", "-b:a", "128k"]),
        (false, false) => command.args(["-c:a", "aac", "-b:a", "160k"]),
    };

    if !settings.is_webm() {
        command = command.args(["-movflags", "+faststart"]);
    }

    command.arg(output)
}

/// Run `attempt` with target encoder, falling back to software once.
///
/// Pass the effective encoder, see [`EncodeSettings::effective_encoder`],
/// so a software encode is never attempted twice.
pub(crate) async fn with_software_fallback<T, F, Fut>(encoder: Encoder, attempt: F) -> Result<T>
where
    F: Fn(Encoder) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt(encoder).await {
        Ok(value) => Ok(value),
        Err(err) if encoder != Encoder::Cpu => {
            warn!("{encoder} encoder failed, retrying with cpu: {err}");
            attempt(Encoder::Cpu).await
        }
        Err(err) => Err(err),
    }
}

/// Video transformation operations.
#[derive(Debug, Clone)]
pub struct VideoTransform {
    tools: MediaTools,
}

impl VideoTransform {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Encode file on disk with exactly the requested encoder.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if ffmpeg fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn encode_file_with_encoder(
        &self,
        input: &Path,
        output: &Path,
        settings: &EncodeSettings,
        encoder: Encoder,
    ) -> Result<()> {
        let command = build_encode_command(&self.tools.paths, input, output, settings, encoder);
        self.tools.runner.run_checked(&command).await?;
        Ok(())
    }

    /// Encode file on disk, falling back to software encoding once.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if the final attempt fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn encode_file(
        &self,
        input: &Path,
        output: &Path,
        settings: &EncodeSettings,
        encoder: Encoder,
    ) -> Result<()> {
        with_software_fallback(settings.effective_encoder(encoder), move |encoder| {
            self.encode_file_with_encoder(input, output, settings, encoder)
        })
        .await
    }

    /// Encode buffer with exactly the requested encoder.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if ffmpeg fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    #[instrument(skip(self, buffer, settings), level = "debug")]
    pub async fn encode_with_encoder(
        &self,
        buffer: &[u8],
        mime: &str,
        settings: &EncodeSettings,
        encoder: Encoder,
    ) -> Result<Transformed> {
        // INVARIANT: Scratch directory is removed on every return path.
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("input.{}", extension_for_mime(mime)), buffer)
            .await?;
        let output = scratch.path(format!("output.{}", settings.container_extension()));

        self.encode_file_with_encoder(&input, &output, settings, encoder)
            .await?;
        let data = scratch.read(&output).await?;

        Ok(Transformed::new(data, settings.container_mime()))
    }

    /// Encode buffer, falling back to software encoding once.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if the final attempt fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn encode(
        &self,
        buffer: &[u8],
        mime: &str,
        settings: &EncodeSettings,
        encoder: Encoder,
    ) -> Result<Transformed> {
        with_software_fallback(settings.effective_encoder(encoder), move |encoder| {
            self.encode_with_encoder(buffer, mime, settings, encoder)
        })
        .await
    }

    /// Apply configured video processing.
    ///
    /// Skips encoding entirely when every setting is unchanged and the
    /// probed metadata shows a streaming-ready container with a duration
    /// and a browser compatible codec. Such a video is passed through as is
    /// when browsers play its container (MP4, QuickTime, WebM), and rewrapped
    /// into MP4 without re-encoding otherwise, e.g., for Matroska or AVI.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if encoding fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn process_video(
        &self,
        buffer: &[u8],
        mime: &str,
        metadata: Option<&MediaMetadata>,
        settings: &EncodeSettings,
        encoder: Encoder,
    ) -> Result<Transformed> {
        let ready = metadata
            .and_then(MediaMetadata::as_video)
            .is_some_and(is_ready_for_web);

        if settings.is_unchanged() && ready {
            return match mime {
                "video/webm" | "video/mp4" | "video/quicktime" => {
                    debug!("video needs no processing");
                    let mime = if mime == "video/webm" { mime } else { "video/mp4" };
                    Ok(Transformed::new(buffer.to_vec(), mime))
                }
                _ => {
                    info!("rewrap {mime} as mp4 without re-encoding");
                    self.add_streaming_flag(buffer, mime).await
                }
            };
        }

        info!(
            "encode video as {} at crf {} with {encoder} encoder",
            settings.container_extension(),
            settings.crf
        );
        self.encode(buffer, mime, settings, encoder).await
    }

    /// Rewrite container without re-encoding.
    ///
    /// Regenerates timestamps, which restores missing duration metadata,
    /// and moves the index up front.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if ffmpeg fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn remux(&self, buffer: &[u8], mime: &str) -> Result<Transformed> {
        self.copy_streams(buffer, mime, &["-fflags", "+genpts"]).await
    }

    /// Move the MP4 index ahead of the media data without re-encoding.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if ffmpeg fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn add_streaming_flag(&self, buffer: &[u8], mime: &str) -> Result<Transformed> {
        self.copy_streams(buffer, mime, &[]).await
    }

    async fn copy_streams(
        &self,
        buffer: &[u8],
        mime: &str,
        input_flags: &[&str],
    ) -> Result<Transformed> {
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("input.{}", extension_for_mime(mime)), buffer)
            .await?;
        let output = scratch.path("output.mp4");

        let command = ToolCommand::new(&self.tools.paths.ffmpeg)
            .args(["-hide_banner", "-y"])
            .args(input_flags.iter().copied())
            .arg("-i")
            .arg(input)
            .args(["-map", "0", "-c", "copy", "-movflags", "+faststart"])
            .arg(&output);
        self.tools.runner.run_checked(&command).await?;

        Ok(Transformed::new(scratch.read(&output).await?, "video/mp4"))
    }

    /// Convert video to an animated GIF.
    ///
    /// Uses two passes. The first builds an optimized palette from the
    /// filtered frames, the second maps every frame onto that palette.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if either pass fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    #[instrument(skip(self, buffer), level = "debug")]
    pub async fn convert_to_gif(
        &self,
        buffer: &[u8],
        mime: &str,
        gif: GifSettings,
    ) -> Result<Transformed> {
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("input.{}", extension_for_mime(mime)), buffer)
            .await?;
        let palette = scratch.path("palette.png");
        let output = scratch.path("output.gif");
        let filters = format!("fps={},scale={}:-1:flags=lanczos", gif.fps, gif.width);

        let palette_pass = ToolCommand::new(&self.tools.paths.ffmpeg)
            .args(["-hide_banner", "-y", "-i"])
            .arg(&input)
            .args(["-vf".to_string(), format!("{filters},palettegen=stats_mode=diff")])
            .arg(&palette);
        self.tools.runner.run_checked(&palette_pass).await?;

        let render_pass = ToolCommand::new(&self.tools.paths.ffmpeg)
            .args(["-hide_banner", "-y", "-i"])
            .arg(&input)
            .arg("-i")
            .arg(&palette)
            .args([
                "-lavfi".to_string(),
                format!("{filters} [x]; [x][1:v] paletteuse=dither=sierra2_4a"),
            ])
            .arg(&output);
        self.tools.runner.run_checked(&render_pass).await?;

        Ok(Transformed::new(scratch.read(&output).await?, "image/gif"))
    }

    /// Cut a sample out of a video file, re-encoded to a neutral baseline.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Tool`] if ffmpeg fails.
    ///
    /// [`MediaError::Tool`]: crate::media::MediaError::Tool
    pub async fn extract_sample(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        let command = ToolCommand::new(&self.tools.paths.ffmpeg)
            .args(["-hide_banner", "-y", "-ss"])
            .arg(format!("{start:.3}"))
            .arg("-i")
            .arg(input)
            .args(["-t".to_string(), format!("{duration:.3}")])
            .args(["-c:v", "libx264", "-preset", "ultrafast", "-crf", "16"])
            .args(["-pix_fmt", "yuv420p", "-c:a", "aac", "-b:a", "192k"])
            .arg(output);
        self.tools.runner.run_checked(&command).await?;

        Ok(())
    }
}

/// Video already plays everywhere without touching it.
pub fn is_ready_for_web(metadata: &VideoMetadata) -> bool {
    metadata.has_streaming_flag
        && metadata.duration.is_some()
        && !metadata
            .codec
            .as_deref()
            .is_some_and(is_incompatible_codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        media::MediaError,
        testing::{failed, write_output, FakeRunner},
    };
    use pretty_assertions::assert_eq;
    use std::{ffi::OsStr, path::PathBuf, sync::Arc};

    fn transform_with(runner: FakeRunner) -> (VideoTransform, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        let tools = MediaTools::new(runner.clone(), ToolPaths::default());
        (VideoTransform::new(tools), runner)
    }

    fn video_codec(command: &ToolCommand) -> Option<String> {
        command
            .arg_after("-c:v")
            .map(|codec| codec.to_string_lossy().into_owned())
    }

    fn ready_metadata() -> MediaMetadata {
        MediaMetadata::Video(VideoMetadata {
            duration: Some(10.0),
            codec: Some("h264".into()),
            has_streaming_flag: true,
            width: Some(1280),
            height: Some(720),
        })
    }

    #[test]
    fn encode_command_for_mp4_cpu() {
        let settings = EncodeSettings {
            fps: FrameRate::Fps30,
            ..Default::default()
        };
        let command = build_encode_command(
            &ToolPaths::default(),
            &PathBuf::from("in.mov"),
            &PathBuf::from("out.mp4"),
            &settings,
            Encoder::Cpu,
        );

        assert_eq!(video_codec(&command).as_deref(), Some("libx264"));
        assert_eq!(command.arg_after("-crf"), Some(OsStr::new("23")));
        assert_eq!(command.arg_after("-r"), Some(OsStr::new("30")));
        assert_eq!(
            command.arg_after("-vf"),
            Some(OsStr::new("scale=trunc(iw/2)*2:trunc(ih/2)*2"))
        );
        assert_eq!(command.arg_after("-c:a"), Some(OsStr::new("aac")));
        assert_eq!(command.arg_after("-movflags"), Some(OsStr::new("+faststart")));
    }

    #[test]
    fn encode_command_for_webm_ignores_encoder_and_faststart() {
        let settings = EncodeSettings {
            format: OutputFormat::Webm,
            remove_audio: true,
            resolution: Resolution::P720,
            ..Default::default()
        };
        let command = build_encode_command(
            &ToolPaths::default(),
            &PathBuf::from("in.mp4"),
            &PathBuf::from("out.webm"),
            &settings,
            Encoder::Hardware,
        );

        assert_eq!(video_codec(&command).as_deref(), Some("libvpx-vp9"));
        assert!(command.has_arg("-an"));
        assert!(!command.has_arg("-movflags"));
        assert_eq!(
            command.arg_after("-vf"),
            Some(OsStr::new(
                "scale='min(iw,if(gte(iw,ih),1280,720))':'min(ih,if(gte(iw,ih),720,1280))'\
                 :force_original_aspect_ratio=decrease:force_divisible_by=2"
            ))
        );
    }

    #[test]
    fn hardware_encoder_offsets_quality_by_one() {
        let settings = EncodeSettings {
            crf: 28,
            ..Default::default()
        };
        let paths = ToolPaths {
            hardware_codec: "h264_nvenc".into(),
            ..ToolPaths::default()
        };
        let command = build_encode_command(
            &paths,
            &PathBuf::from("in.mp4"),
            &PathBuf::from("out.mp4"),
            &settings,
            Encoder::Hardware,
        );

        assert_eq!(video_codec(&command).as_deref(), Some("h264_nvenc"));
        assert_eq!(command.arg_after("-qp"), Some(OsStr::new("29")));
        assert!(!command.has_arg("-crf"));
    }

    #[test]
    fn named_scale_filter_bounds_short_side_in_any_orientation() {
        let filter = scale_filter(Resolution::P1080);
        assert!(filter.starts_with("scale='min(iw,if(gte(iw,ih),1920,1080))'"));
        assert!(filter.contains(":'min(ih,if(gte(iw,ih),1080,1920))'"));
        assert!(filter.ends_with(":force_original_aspect_ratio=decrease:force_divisible_by=2"));
    }

    #[test]
    fn percentage_scale_filter_keeps_even_dimensions() {
        assert_eq!(
            scale_filter(Resolution::Half),
            "scale=trunc(iw*0.5/2)*2:trunc(ih*0.5/2)*2"
        );
    }

    #[tokio::test]
    async fn hardware_failure_falls_back_to_cpu_exactly_once() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::new(|command| {
            if command.has_arg("libx264") {
                Ok(write_output(command, b"software encoded"))
            } else {
                Ok(failed("No capable devices found"))
            }
        }));

        let result = transform
            .encode(b"raw", "video/quicktime", &EncodeSettings::default(), Encoder::Hardware)
            .await?;
        assert_eq!(result, Transformed::new(b"software encoded".to_vec(), "video/mp4"));

        let codecs = runner.calls().iter().filter_map(video_codec).collect::<Vec<_>>();
        let hardware = ToolPaths::default().hardware_codec;
        assert_eq!(codecs, vec![hardware, "libx264".to_string()]);

        Ok(())
    }

    #[tokio::test]
    async fn cpu_failure_is_not_retried() {
        let (transform, runner) = transform_with(FakeRunner::new(|_| Ok(failed("boom"))));

        let result = transform
            .encode(b"raw", "video/mp4", &EncodeSettings::default(), Encoder::Cpu)
            .await;
        assert!(matches!(result, Err(MediaError::Tool(_))));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn webm_failure_is_not_retried() {
        let settings = EncodeSettings {
            format: OutputFormat::Webm,
            ..Default::default()
        };

        for encoder in [Encoder::Hardware, Encoder::Av1] {
            let (transform, runner) = transform_with(FakeRunner::new(|_| Ok(failed("boom"))));

            let result = transform.encode(b"raw", "video/mp4", &settings, encoder).await;
            assert!(matches!(result, Err(MediaError::Tool(_))));

            let codecs = runner.calls().iter().filter_map(video_codec).collect::<Vec<_>>();
            assert_eq!(codecs, vec!["libvpx-vp9".to_string()]);
        }
    }

    #[tokio::test]
    async fn software_fallback_failure_propagates() {
        let (transform, runner) = transform_with(FakeRunner::new(|_| Ok(failed("boom"))));

        let result = transform
            .encode(b"raw", "video/mp4", &EncodeSettings::default(), Encoder::Av1)
            .await;
        assert!(result.is_err());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn process_video_passes_ready_video_through() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"encoded"));
        let buffer = b"byte for byte".to_vec();

        let result = transform
            .process_video(
                &buffer,
                "video/quicktime",
                Some(&ready_metadata()),
                &EncodeSettings::default(),
                Encoder::Cpu,
            )
            .await?;
        assert_eq!(result, Transformed::new(buffer, "video/mp4"));
        assert!(runner.calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn process_video_keeps_ready_webm() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"encoded"));

        let result = transform
            .process_video(
                b"webm bytes",
                "video/webm",
                Some(&ready_metadata()),
                &EncodeSettings::default(),
                Encoder::Cpu,
            )
            .await?;
        assert_eq!(result, Transformed::new(b"webm bytes".to_vec(), "video/webm"));
        assert!(runner.calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn process_video_rewraps_other_containers() -> anyhow::Result<()> {
        for mime in ["video/x-matroska", "video/x-msvideo"] {
            let (transform, runner) = transform_with(FakeRunner::writing(b"rewrapped"));

            let result = transform
                .process_video(
                    b"container bytes",
                    mime,
                    Some(&ready_metadata()),
                    &EncodeSettings::default(),
                    Encoder::Cpu,
                )
                .await?;
            assert_eq!(result, Transformed::new(b"rewrapped".to_vec(), "video/mp4"));

            let calls = runner.calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].arg_after("-c"), Some(OsStr::new("copy")));
            assert!(video_codec(&calls[0]).is_none());
        }

        Ok(())
    }

    #[tokio::test]
    async fn process_video_encodes_when_not_ready() -> anyhow::Result<()> {
        let hevc = MediaMetadata::Video(VideoMetadata {
            codec: Some("hevc".into()),
            ..ready_metadata().as_video().cloned().unwrap_or_default()
        });
        let cases = [
            (Some(ready_metadata()), EncodeSettings { crf: 30, ..Default::default() }),
            (Some(hevc), EncodeSettings::default()),
            (None, EncodeSettings::default()),
        ];

        for (metadata, settings) in cases {
            let (transform, runner) = transform_with(FakeRunner::writing(b"encoded"));
            let result = transform
                .process_video(b"raw", "video/mp4", metadata.as_ref(), &settings, Encoder::Cpu)
                .await?;
            assert_eq!(result.data, b"encoded".to_vec());
            assert_eq!(runner.calls().len(), 1);
        }

        Ok(())
    }

    #[tokio::test]
    async fn gif_conversion_runs_palette_then_render() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"GIF89a"));

        let result = transform
            .convert_to_gif(b"raw", "video/mp4", GifSettings { fps: 10, width: 320 })
            .await?;
        assert_eq!(result, Transformed::new(b"GIF89a".to_vec(), "image/gif"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        let palette_filter = calls[0].arg_after("-vf").map(|f| f.to_string_lossy().into_owned());
        assert_eq!(
            palette_filter.as_deref(),
            Some("fps=10,scale=320:-1:flags=lanczos,palettegen=stats_mode=diff")
        );
        assert!(calls[1].has_arg("-lavfi"));
        assert_eq!(calls[1].get_args().iter().filter(|arg| *arg == "-i").count(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn remux_regenerates_timestamps_without_reencoding() -> anyhow::Result<()> {
        let (transform, runner) = transform_with(FakeRunner::writing(b"remuxed"));

        let result = transform.remux(b"raw", "video/mp4").await?;
        assert_eq!(result.mime, "video/mp4");

        let calls = runner.calls();
        assert_eq!(calls[0].arg_after("-fflags"), Some(OsStr::new("+genpts")));
        assert_eq!(calls[0].arg_after("-c"), Some(OsStr::new("copy")));

        Ok(())
    }
}
