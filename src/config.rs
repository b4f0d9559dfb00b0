// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout and resolution.
//!
//! Configuration reaches the pipeline from three places: command-line flags,
//! interactive prompts, and an optional settings file. Flags and settings
//! file defaults are both captured as [`ShareOptions`], a record where every
//! field is optional. Resolution fills every remaining hole, producing a
//! [`ShareConfig`] where nothing is left to chance.
//!
//! # Precedence
//!
//! 1. Explicit command-line flag.
//! 2. Answer to an interactive prompt.
//! 3. Value from the `[defaults]` section of the settings file.
//! 4. Built-in default.
//!
//! A prompt is never shown for a field that was given on the command line,
//! so an interactive answer can never overwrite an explicit flag. Settings
//! file defaults also serve as the pre-selected answer of each prompt.
//!
//! # Settings File Layout
//!
//! ```toml
//! [upload]
//! public_url = "https://share.example.com"
//! timeout_secs = 300
//! region = "auto"
//!
//! [tools]
//! ffmpeg = "ffmpeg"
//! ffprobe = "ffprobe"
//! magick = "magick"
//! hardware_codec = "h264_nvenc"
//!
//! [defaults]
//! format = "original"
//! quality = "balanced"
//! auto_fix = true
//! ```

use crate::{media::MediaKind, source::SourceDescriptor};

use clap::ValueEnum;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display, Error as FmtError, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
    time::Duration,
};
use tracing::debug;

/// Quality value used when nothing else asks for one.
pub const DEFAULT_CRF: u8 = 23;

/// Default frame rate of generated GIFs.
pub const DEFAULT_GIF_FPS: u32 = 15;

/// Default width in pixels of generated GIFs.
pub const DEFAULT_GIF_WIDTH: u32 = 480;

/// Default upload-wide timeout.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Target container or image format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Keep whatever format the source has.
    #[default]
    Original,
    Png,
    Jpeg,
    Webp,
    Mp4,
    Webm,
    Gif,
}

impl OutputFormat {
    /// MIME type produced by this format.
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Webp => Some("image/webp"),
            Self::Mp4 => Some("video/mp4"),
            Self::Webm => Some("video/webm"),
            Self::Gif => Some("image/gif"),
        }
    }

    /// File extension produced by this format.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Png => Some("png"),
            Self::Jpeg => Some("jpg"),
            Self::Webp => Some("webp"),
            Self::Mp4 => Some("mp4"),
            Self::Webm => Some("webm"),
            Self::Gif => Some("gif"),
        }
    }

    /// Format matching a MIME type, if it is one we can produce.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "video/mp4" => Some(Self::Mp4),
            "video/webm" => Some(Self::Webm),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Format is a still image target.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Webp | Self::Gif)
    }

    /// Format is a video container target.
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Webm)
    }
}

/// Output resolution preset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
pub enum Resolution {
    #[default]
    #[serde(rename = "original")]
    Original,

    #[value(name = "1080p")]
    #[serde(rename = "1080p")]
    P1080,

    #[value(name = "720p")]
    #[serde(rename = "720p")]
    P720,

    #[value(name = "480p")]
    #[serde(rename = "480p")]
    P480,

    #[value(name = "50%")]
    #[serde(rename = "50%")]
    Half,

    #[value(name = "25%")]
    #[serde(rename = "25%")]
    Quarter,
}

impl Resolution {
    /// Bounding box `(long side, short side)` of a named preset.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        match self {
            Self::P1080 => Some((1920, 1080)),
            Self::P720 => Some((1280, 720)),
            Self::P480 => Some((854, 480)),
            _ => None,
        }
    }

    /// Scale percentage of a percentage preset.
    pub fn percent(&self) -> Option<u32> {
        match self {
            Self::Half => Some(50),
            Self::Quarter => Some(25),
            _ => None,
        }
    }
}

/// Output frame rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
pub enum FrameRate {
    #[default]
    #[serde(rename = "original")]
    Original,

    #[value(name = "60")]
    #[serde(rename = "60")]
    Fps60,

    #[value(name = "30")]
    #[serde(rename = "30")]
    Fps30,

    #[value(name = "24")]
    #[serde(rename = "24")]
    Fps24,

    #[value(name = "15")]
    #[serde(rename = "15")]
    Fps15,
}

impl FrameRate {
    pub fn value(&self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Fps60 => Some(60),
            Self::Fps30 => Some(30),
            Self::Fps24 => Some(24),
            Self::Fps15 => Some(15),
        }
    }
}

/// Video encoder family.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    /// Software H.264.
    #[default]
    Cpu,

    /// Hardware accelerated H.264.
    #[value(aliases = ["hw", "hardware-accelerated"])]
    Hardware,

    /// Software AV1.
    Av1,
}

/// Image compression tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    High,
    #[default]
    Balanced,
    Small,
}

impl ImageQuality {
    /// Compression setting on a 0 to 100 scale.
    pub fn value(&self) -> u8 {
        match self {
            Self::High => 95,
            Self::Balanced => 85,
            Self::Small => 70,
        }
    }
}

macro_rules! display_value_enum {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl Display for $kind {
                fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
                    match self.to_possible_value() {
                        Some(value) => fmt.write_str(value.get_name()),
                        None => Err(FmtError),
                    }
                }
            }
        )+
    };
}

display_value_enum!(OutputFormat, Resolution, FrameRate, Encoder, ImageQuality);

/// GIF generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifSettings {
    pub fps: u32,
    pub width: u32,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_GIF_FPS,
            width: DEFAULT_GIF_WIDTH,
        }
    }
}

/// How the output filename is chosen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilenamePolicy {
    /// Replace the name entirely with a random id.
    pub random: bool,

    /// Lowercase and slugify the name.
    pub normalize: bool,

    /// Explicit name supplied by the caller.
    pub name: Option<String>,
}

/// Partially filled configuration.
///
/// Command-line flags and settings file defaults are both collected into
/// this shape. Call [`ShareOptions::resolve`] to obtain a [`ShareConfig`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareOptions {
    pub format: Option<OutputFormat>,
    pub resolution: Option<Resolution>,
    pub fps: Option<FrameRate>,
    pub remove_audio: Option<bool>,
    pub encoder: Option<Encoder>,
    pub crf: Option<u8>,
    pub probe: Option<bool>,
    pub target_size_mb: Option<u64>,
    pub quality: Option<ImageQuality>,
    pub gif_fps: Option<u32>,
    pub gif_width: Option<u32>,
    pub random_filename: Option<bool>,
    pub normalize_filename: Option<bool>,
    pub name: Option<String>,
    pub auto_fix: Option<bool>,
    pub dry_run: Option<bool>,
    pub clipboard: Option<bool>,
}

/// Fully resolved configuration consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareConfig {
    pub source: SourceDescriptor,
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub fps: FrameRate,
    pub remove_audio: bool,
    pub encoder: Encoder,
    pub crf: u8,
    pub probe: bool,

    /// Size to aim for when probing, `None` means ask the UI.
    pub target_size: Option<u64>,
    pub quality: ImageQuality,
    pub gif: GifSettings,
    pub filename: FilenamePolicy,
    pub auto_fix: bool,
    pub dry_run: bool,
    pub copy_to_clipboard: bool,
}

impl ShareConfig {
    /// Configuration with every built-in default for target source.
    pub fn new(source: SourceDescriptor) -> Self {
        Self {
            source,
            format: OutputFormat::default(),
            resolution: Resolution::default(),
            fps: FrameRate::default(),
            remove_audio: false,
            encoder: Encoder::default(),
            crf: DEFAULT_CRF,
            probe: false,
            target_size: None,
            quality: ImageQuality::default(),
            gif: GifSettings::default(),
            filename: FilenamePolicy::default(),
            auto_fix: true,
            dry_run: false,
            copy_to_clipboard: true,
        }
    }
}

/// Interactive question asker.
pub trait Prompter {
    /// Pick one entry from a listing of options.
    fn select(&self, message: &str, options: &[String], default: usize) -> Result<usize>;

    /// Ask a yes or no question.
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

/// Prompter backed by inquire.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select(&self, message: &str, options: &[String], default: usize) -> Result<usize> {
        let choice = inquire::Select::new(message, options.to_vec())
            .with_starting_cursor(default)
            .raw_prompt()?;
        Ok(choice.index)
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        Ok(inquire::Confirm::new(message)
            .with_default(default)
            .prompt()?)
    }
}

impl ShareOptions {
    /// Resolve options into a complete configuration.
    ///
    /// Fields left empty are asked through `prompter` when one is given and
    /// the question makes sense for the media `kind` we expect. Anything
    /// still empty afterwards is taken from `defaults`, then from built-in
    /// defaults.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Conflict`] for contradicting options.
    /// - Return [`ConfigError::Prompt`] if an interactive prompt fails.
    pub fn resolve(
        self,
        source: SourceDescriptor,
        defaults: &ShareOptions,
        kind: Option<MediaKind>,
        prompter: Option<&dyn Prompter>,
    ) -> Result<ShareConfig> {
        self.check_conflicts()?;

        let builtin = ShareConfig::new(source);
        let prompter = prompter.filter(|_| kind.is_some_and(|kind| kind.is_visual()));
        let is_video = kind == Some(MediaKind::Video);

        let format = match (self.format, prompter) {
            (Some(format), _) => format,
            (None, Some(prompter)) => {
                let choices: &[OutputFormat] = if is_video {
                    &[
                        OutputFormat::Original,
                        OutputFormat::Mp4,
                        OutputFormat::Webm,
                        OutputFormat::Gif,
                    ]
                } else {
                    &[
                        OutputFormat::Original,
                        OutputFormat::Png,
                        OutputFormat::Jpeg,
                        OutputFormat::Webp,
                    ]
                };
                prompt_choice(
                    prompter,
                    "Output format",
                    choices,
                    defaults.format.unwrap_or(builtin.format),
                )?
            }
            (None, None) => defaults.format.unwrap_or(builtin.format),
        };
        let is_gif = format == OutputFormat::Gif;

        let resolution = match (self.resolution, prompter) {
            (Some(resolution), _) => resolution,
            (None, Some(prompter)) if !is_gif => prompt_choice(
                prompter,
                "Resolution",
                Resolution::value_variants(),
                defaults.resolution.unwrap_or(builtin.resolution),
            )?,
            _ => defaults.resolution.unwrap_or(builtin.resolution),
        };

        let fps = match (self.fps, prompter) {
            (Some(fps), _) => fps,
            (None, Some(prompter)) if is_video && !is_gif => prompt_choice(
                prompter,
                "Frame rate",
                FrameRate::value_variants(),
                defaults.fps.unwrap_or(builtin.fps),
            )?,
            _ => defaults.fps.unwrap_or(builtin.fps),
        };

        let remove_audio = match (self.remove_audio, prompter) {
            (Some(remove_audio), _) => remove_audio,
            (None, Some(prompter)) if is_video && !is_gif => prompter.confirm(
                "Remove audio?",
                defaults.remove_audio.unwrap_or(builtin.remove_audio),
            )?,
            _ => defaults.remove_audio.unwrap_or(builtin.remove_audio),
        };

        let encoder = self
            .encoder
            .or(defaults.encoder)
            .unwrap_or(builtin.encoder);

        // INVARIANT: Explicit quality value always bypasses quality probing.
        let (crf, probe) = match (self.crf, self.probe, prompter) {
            (Some(crf), _, _) => (crf, false),
            (None, Some(probe), _) => (defaults.crf.unwrap_or(builtin.crf), probe),
            (None, None, Some(prompter)) if is_video && !is_gif && self.target_size_mb.is_none() => {
                let probe = prompter.confirm(
                    "Probe quality levels to pick a target file size?",
                    defaults.probe.unwrap_or(builtin.probe),
                )?;
                (defaults.crf.unwrap_or(builtin.crf), probe)
            }
            (None, None, _) => {
                let probe = self.target_size_mb.is_some()
                    || defaults.probe.unwrap_or(builtin.probe);
                (defaults.crf.unwrap_or(builtin.crf), probe)
            }
        };

        let quality = match (self.quality, prompter) {
            (Some(quality), _) => quality,
            (None, Some(prompter)) if !is_video => prompt_choice(
                prompter,
                "Image quality",
                ImageQuality::value_variants(),
                defaults.quality.unwrap_or(builtin.quality),
            )?,
            _ => defaults.quality.unwrap_or(builtin.quality),
        };

        let gif = GifSettings {
            fps: self
                .gif_fps
                .or(defaults.gif_fps)
                .unwrap_or(builtin.gif.fps),
            width: self
                .gif_width
                .or(defaults.gif_width)
                .unwrap_or(builtin.gif.width),
        };

        let filename = FilenamePolicy {
            random: self
                .random_filename
                .or(defaults.random_filename)
                .unwrap_or(builtin.filename.random),
            normalize: self
                .normalize_filename
                .or(defaults.normalize_filename)
                .unwrap_or(builtin.filename.normalize),
            name: self.name,
        };

        let target_size = self
            .target_size_mb
            .or(defaults.target_size_mb)
            .map(|mb| {
                mb.checked_mul(MEGABYTE).ok_or_else(|| {
                    ConfigError::Conflict(format!("target size of {mb} MB is too large"))
                })
            })
            .transpose()?;

        let config = ShareConfig {
            source: builtin.source,
            format,
            resolution,
            fps,
            remove_audio,
            encoder,
            crf,
            probe,
            target_size,
            quality,
            gif,
            filename,
            auto_fix: self
                .auto_fix
                .or(defaults.auto_fix)
                .unwrap_or(builtin.auto_fix),
            dry_run: self.dry_run.unwrap_or(builtin.dry_run),
            copy_to_clipboard: self
                .clipboard
                .or(defaults.clipboard)
                .unwrap_or(builtin.copy_to_clipboard),
        };
        debug!("resolved configuration: {config:?}");

        Ok(config)
    }

    fn check_conflicts(&self) -> Result<()> {
        if self.crf.is_some() && self.probe == Some(true) {
            return Err(ConfigError::Conflict(
                "--crf sets quality directly, it cannot be combined with --probe".into(),
            ));
        }

        if self.crf.is_some() && self.target_size_mb.is_some() {
            return Err(ConfigError::Conflict(
                "--crf sets quality directly, it cannot be combined with --target-size".into(),
            ));
        }

        if self.probe == Some(false) && self.target_size_mb.is_some() {
            return Err(ConfigError::Conflict(
                "--target-size needs quality probing, it cannot be combined with --no-probe"
                    .into(),
            ));
        }

        if self.random_filename == Some(true) && self.name.is_some() {
            return Err(ConfigError::Conflict(
                "--random-filename cannot be combined with --name".into(),
            ));
        }

        if self.crf.is_some_and(|crf| crf > 63) {
            return Err(ConfigError::Conflict("--crf must be within 0..=63".into()));
        }

        Ok(())
    }
}

/// Bytes in one megabyte as used by size targets.
pub const MEGABYTE: u64 = 1024 * 1024;

fn prompt_choice<T>(prompter: &dyn Prompter, message: &str, choices: &[T], default: T) -> Result<T>
where
    T: Copy + PartialEq + Display,
{
    let options = choices.iter().map(ToString::to_string).collect::<Vec<_>>();
    let start = choices.iter().position(|choice| *choice == default).unwrap_or(0);
    let index = prompter.select(message, &options, start)?;
    choices
        .get(index)
        .copied()
        .ok_or_else(|| ConfigError::Conflict(format!("invalid answer to {message:?}")))
}

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    /// Upload behavior.
    pub upload: UploadSettings,

    /// External tool locations.
    pub tools: ToolPaths,

    /// Defaults for any option not given on the command line.
    pub defaults: ShareOptions,
}

impl SettingsFile {
    /// Load settings file at target path.
    ///
    /// A missing file is not an error, built-in defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(data) => {
                debug!("load settings from {}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings file at {}", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.display().to_string(),
            }),
        }
    }
}

impl FromStr for SettingsFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: SettingsFile = toml::de::from_str(data)?;

        // INVARIANT: Perform shell expansion on every tool path.
        let tools = &mut settings.tools;
        for path in [&mut tools.ffmpeg, &mut tools.ffprobe, &mut tools.magick] {
            *path = shellexpand::full(path.as_str())?.into_owned();
        }

        Ok(settings)
    }
}

impl Display for SettingsFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Upload settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSettings {
    /// Base of returned public URLs.
    pub public_url: Option<String>,

    /// Upload-wide timeout in seconds.
    pub timeout_secs: u64,

    /// Region reported to the object store.
    pub region: String,
}

impl UploadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            public_url: None,
            timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            region: "auto".into(),
        }
    }
}

/// Names or paths of external media tools.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub magick: String,

    /// Hardware accelerated H.264 codec known to ffmpeg.
    pub hardware_codec: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        let hardware_codec = if cfg!(target_os = "macos") {
            "h264_videotoolbox"
        } else {
            "h264_nvenc"
        };

        Self {
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
            magick: "magick".into(),
            hardware_codec: hardware_codec.into(),
        }
    }
}

/// Environment variables holding object store credentials.
pub const ENDPOINT_VAR: &str = "SHARE_S3_ENDPOINT";
pub const ACCESS_KEY_ID_VAR: &str = "SHARE_S3_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "SHARE_S3_SECRET_ACCESS_KEY";
pub const BUCKET_VAR: &str = "SHARE_S3_BUCKET";
pub const PUBLIC_URL_VAR: &str = "SHARE_PUBLIC_URL";

static CREDENTIALS: OnceCell<Credentials> = OnceCell::new();

/// Object store credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub public_url: Option<String>,
}

impl Credentials {
    /// Process-wide credentials, read from the environment on first access.
    ///
    /// Never refreshed afterwards.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingCredential`] if a required variable
    ///   is absent or empty.
    pub fn get() -> Result<&'static Credentials> {
        CREDENTIALS.get_or_try_init(Self::from_env)
    }

    /// Read credentials from the environment.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingCredential`] if a required variable
    ///   is absent or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingCredential`] if a required variable
    ///   is absent or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        Ok(Self {
            endpoint: require(ENDPOINT_VAR)?,
            access_key_id: require(ACCESS_KEY_ID_VAR)?,
            secret_access_key: require(SECRET_ACCESS_KEY_VAR)?,
            bucket: require(BUCKET_VAR)?,
            public_url: lookup(PUBLIC_URL_VAR).filter(|value| !value.trim().is_empty()),
        })
    }

    /// Base of public URLs.
    ///
    /// Environment beats settings file, which beats `{endpoint}/{bucket}`.
    pub fn public_base(&self, settings: &UploadSettings) -> String {
        self.public_url
            .clone()
            .or_else(|| settings.public_url.clone())
            .unwrap_or_else(|| format!("{}/{}", self.endpoint.trim_end_matches('/'), self.bucket))
            .trim_end_matches('/')
            .to_string()
    }
}

impl Debug for Credentials {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("public_url", &self.public_url)
            .finish()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize settings file.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings file.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings file.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Settings file exists but cannot be read.
    #[error("failed to read settings file {path}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Required credential is not set.
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// Options contradict each other.
    #[error("invalid options: {0}")]
    Conflict(String),

    /// Interactive prompt failed or was cancelled.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
