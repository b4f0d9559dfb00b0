// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sample based quality probing.
//!
//! Encoding a long video several times just to see how large it turns out is
//! too slow. Instead a short sample is cut from the middle of the video and
//! encoded once per candidate CRF. Output sizes and encode times are then
//! scaled linearly by `full_duration / sample_duration` to estimate the full
//! encode.
//!
//! # Target Sizes
//!
//! With estimates in hand, the user can pick a size from a fixed ladder
//! instead of a CRF. Only rungs that the probed CRF range can plausibly hit
//! are offered. Picking a rung selects the highest quality candidate that
//! still fits under it.

use crate::{
    config::{Encoder, MEGABYTE},
    media::{
        extension_for_mime,
        video::{with_software_fallback, EncodeSettings, VideoTransform},
        MediaError, MediaTools, Result,
    },
    tool::{Scratch, ToolError},
};

use futures::future::join_all;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// CRF values probed, from highest to lowest quality.
pub const CANDIDATE_CRFS: [u8; 8] = [18, 21, 24, 27, 30, 33, 36, 40];

/// Size tiers offered as targets, in megabytes.
pub const SIZE_LADDER_MB: [u64; 12] = [1, 2, 3, 5, 8, 10, 15, 20, 30, 50, 75, 100];

/// Longest sample taken from a video, in seconds.
pub const MAX_SAMPLE_SECS: f64 = 8.0;

/// Start and length of the sample window, centered in the video.
///
/// The sample is at most [`MAX_SAMPLE_SECS`] long and never more than a
/// third of the full duration.
pub fn sample_window(full_duration: f64) -> (f64, f64) {
    let duration = MAX_SAMPLE_SECS.min(full_duration / 3.0);
    let start = ((full_duration - duration) / 2.0).max(0.0);
    (start, duration)
}

/// Measured sample encode at one CRF, with full-length estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityProbeResult {
    pub crf: u8,
    pub sample_size: u64,
    pub sample_duration: f64,
    pub encode_time: Duration,
    pub estimated_full_size: u64,
    pub estimated_full_time: Duration,
}

impl QualityProbeResult {
    /// Scale sample measurements up to the full duration.
    pub fn extrapolate(
        crf: u8,
        sample_size: u64,
        sample_duration: f64,
        encode_time: Duration,
        full_duration: f64,
    ) -> Self {
        let ratio = if sample_duration > 0.0 {
            full_duration / sample_duration
        } else {
            1.0
        };

        Self {
            crf,
            sample_size,
            sample_duration,
            encode_time,
            estimated_full_size: (sample_size as f64 * ratio).round() as u64,
            estimated_full_time: encode_time.mul_f64(ratio),
        }
    }
}

/// Target size choice presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTarget {
    pub bytes: u64,
    pub crf: u8,
}

impl SizeTarget {
    /// Megabytes, rounded down.
    pub fn megabytes(&self) -> u64 {
        self.bytes / MEGABYTE
    }
}

/// Ladder rungs the probed range can plausibly hit, in bytes.
///
/// Keeps rungs between 90% of the smallest and 110% of the largest
/// estimated full size.
pub fn generate_size_targets(results: &[QualityProbeResult]) -> Vec<u64> {
    let sizes = results.iter().map(|result| result.estimated_full_size);
    let (Some(min), Some(max)) = (sizes.clone().min(), sizes.max()) else {
        return Vec::new();
    };

    let lower = min as f64 * 0.9;
    let upper = max as f64 * 1.1;
    SIZE_LADDER_MB
        .iter()
        .map(|mb| mb * MEGABYTE)
        .filter(|bytes| (lower..=upper).contains(&(*bytes as f64)))
        .collect()
}

/// Pick CRF for target size.
///
/// Chooses the lowest CRF whose estimate fits under target. If nothing fits,
/// the highest CRF is the closest achievable result. Returns `None` only for
/// an empty result set.
pub fn select_crf_for_target(results: &[QualityProbeResult], target: u64) -> Option<u8> {
    results
        .iter()
        .filter(|result| result.estimated_full_size <= target)
        .map(|result| result.crf)
        .min()
        .or_else(|| results.iter().map(|result| result.crf).max())
}

/// Pair every plausible target with the CRF that would be used for it.
pub fn size_targets(results: &[QualityProbeResult]) -> Vec<SizeTarget> {
    generate_size_targets(results)
        .into_iter()
        .filter_map(|bytes| {
            select_crf_for_target(results, bytes).map(|crf| SizeTarget { bytes, crf })
        })
        .collect()
}

/// Runs sample encodes across the candidate CRF list.
#[derive(Debug, Clone)]
pub struct QualityProbe {
    video: VideoTransform,
}

impl QualityProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            video: VideoTransform::new(tools),
        }
    }

    /// Probe candidate CRFs against a sample of the video.
    ///
    /// Candidates encode concurrently with the hardware encoder, each falling
    /// back to software on its own. Candidates that still fail are dropped.
    /// Results are sorted by ascending CRF.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::UnknownDuration`] if duration is not positive.
    /// - Return [`MediaError::Tool`] if the sample cannot be extracted.
    #[instrument(skip(self, buffer, settings), level = "debug")]
    pub async fn probe(
        &self,
        buffer: &[u8],
        mime: &str,
        full_duration: f64,
        settings: &EncodeSettings,
    ) -> Result<Vec<QualityProbeResult>> {
        if !(full_duration.is_finite() && full_duration > 0.0) {
            return Err(MediaError::UnknownDuration);
        }

        // INVARIANT: Scratch directory outlives every candidate encode.
        let scratch = Scratch::new()?;
        let input = scratch
            .write(format!("input.{}", extension_for_mime(mime)), buffer)
            .await?;
        let sample = scratch.path("sample.mp4");
        let (start, sample_duration) = sample_window(full_duration);
        self.video
            .extract_sample(&input, &sample, start, sample_duration)
            .await?;

        info!(
            "probe {} quality levels on a {sample_duration:.1}s sample",
            CANDIDATE_CRFS.len()
        );
        let candidates = CANDIDATE_CRFS.iter().map(|crf| {
            let output = scratch.path(format!("probe-{crf}.{}", settings.container_extension()));
            let settings = EncodeSettings {
                crf: *crf,
                ..*settings
            };
            self.probe_candidate(&sample, output, settings, sample_duration, full_duration)
        });

        let mut results = join_all(candidates)
            .await
            .into_iter()
            .zip(CANDIDATE_CRFS)
            .filter_map(|(result, crf)| match result {
                Ok(result) => Some(result),
                Err(err) => {
                    warn!("quality probe at crf {crf} failed: {err}");
                    None
                }
            })
            .collect::<Vec<_>>();
        results.sort_by_key(|result| result.crf);

        Ok(results)
    }

    async fn probe_candidate(
        &self,
        sample: &Path,
        output: PathBuf,
        settings: EncodeSettings,
        sample_duration: f64,
        full_duration: f64,
    ) -> Result<QualityProbeResult> {
        let started = Instant::now();
        with_software_fallback(settings.effective_encoder(Encoder::Hardware), |encoder| {
            self.video
                .encode_file_with_encoder(sample, &output, &settings, encoder)
        })
        .await?;
        let encode_time = started.elapsed();

        let sample_size = tokio::fs::metadata(&output)
            .await
            .map(|meta| meta.len())
            .map_err(|_| ToolError::MissingOutput(output.clone()))?;
        debug!(
            "crf {} sample is {sample_size} bytes after {encode_time:.2?}",
            settings.crf
        );

        Ok(QualityProbeResult::extrapolate(
            settings.crf,
            sample_size,
            sample_duration,
            encode_time,
            full_duration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ToolPaths,
        testing::{failed, write_output, FakeRunner},
        tool::ToolCommand,
    };
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::sync::Arc;

    /// Results where size halves every step, as real encoders roughly do.
    fn fixture(full_size_at_18: u64) -> Vec<QualityProbeResult> {
        CANDIDATE_CRFS
            .iter()
            .enumerate()
            .map(|(step, crf)| QualityProbeResult {
                crf: *crf,
                sample_size: 0,
                sample_duration: 8.0,
                encode_time: Duration::from_millis(500),
                estimated_full_size: full_size_at_18 >> step,
                estimated_full_time: Duration::from_secs(10),
            })
            .collect()
    }

    fn assert_monotonic(results: &[QualityProbeResult]) {
        for pair in results.windows(2) {
            assert!(pair[0].crf < pair[1].crf);
            assert!(pair[0].estimated_full_size >= pair[1].estimated_full_size);
        }
    }

    fn crf_of(command: &ToolCommand) -> Option<u8> {
        command
            .arg_after("-crf")
            .or_else(|| command.arg_after("-qp"))
            .and_then(|value| value.to_str())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn sample_window_is_centered_and_bounded() {
        assert_eq!(sample_window(60.0), (26.0, 8.0));
        assert_eq!(sample_window(9.0), (3.0, 3.0));
    }

    #[test]
    fn extrapolation_scales_linearly() {
        let result = QualityProbeResult::extrapolate(
            24,
            1_000,
            8.0,
            Duration::from_secs(2),
            80.0,
        );
        assert_eq!(result.estimated_full_size, 10_000);
        assert_eq!(result.estimated_full_time, Duration::from_secs(20));
    }

    #[test]
    fn size_targets_stay_within_probed_range() {
        let results = fixture(200 * MEGABYTE);
        assert_monotonic(&results);

        // Range is 1.5625 MB to 200 MB, so 1 MB is out and 2 MB onward is in.
        let targets = generate_size_targets(&results);
        assert_eq!(targets.first(), Some(&(2 * MEGABYTE)));
        assert_eq!(targets.last(), Some(&(100 * MEGABYTE)));
        assert_eq!(targets.len(), SIZE_LADDER_MB.len() - 1);
        assert!(generate_size_targets(&[]).is_empty());
    }

    #[test]
    fn select_highest_quality_that_fits() {
        let results = fixture(80 * MEGABYTE);
        assert_monotonic(&results);

        assert_eq!(select_crf_for_target(&results, 100 * MEGABYTE), Some(18));
        assert_eq!(select_crf_for_target(&results, 40 * MEGABYTE), Some(21));
        assert_eq!(select_crf_for_target(&results, 39 * MEGABYTE), Some(24));
    }

    #[test]
    fn select_falls_back_to_smallest_candidate() {
        let results = fixture(80 * MEGABYTE);
        assert_eq!(select_crf_for_target(&results, 1), Some(40));
        assert_eq!(select_crf_for_target(&[], MEGABYTE), None);
    }

    /// Sample encodes of `sample_duration` seconds extrapolated to a full
    /// video, where each CRF step shrinks the sample by `shrink_percent`.
    fn extrapolated(
        sample_at_18: u64,
        shrink_percent: u64,
        sample_duration: f64,
        full_duration: f64,
    ) -> Vec<QualityProbeResult> {
        let mut size = sample_at_18;
        CANDIDATE_CRFS
            .iter()
            .map(|crf| {
                let result = QualityProbeResult::extrapolate(
                    *crf,
                    size,
                    sample_duration,
                    Duration::from_millis(400),
                    full_duration,
                );
                size = size * (100 - shrink_percent) / 100;
                result
            })
            .collect()
    }

    #[test_case(extrapolated(4 * MEGABYTE, 40, 8.0, 120.0); "two minute recording")]
    #[test_case(extrapolated(900 * 1024, 25, 8.0, 45.0); "short clip")]
    #[test_case(extrapolated(12 * MEGABYTE, 50, 8.0, 1800.0); "long lecture")]
    #[test_case(extrapolated(400 * 1024, 10, 2.0, 6.0); "tiny sample")]
    #[test_case(fixture(50 * MEGABYTE); "halving sizes")]
    #[test]
    fn filtering_is_idempotent(results: Vec<QualityProbeResult>) {
        let targets = generate_size_targets(&results);
        assert!(!targets.is_empty());

        let min = results.iter().map(|result| result.estimated_full_size).min();
        let max = results.iter().map(|result| result.estimated_full_size).max();
        let (Some(min), Some(max)) = (min, max) else {
            panic!("fixture has no results");
        };
        let refiltered = targets
            .iter()
            .copied()
            .filter(|bytes| *bytes as f64 >= min as f64 * 0.9 && *bytes as f64 <= max as f64 * 1.1)
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(refiltered, targets);

        let again = size_targets(&results);
        pretty_assertions::assert_eq!(again.iter().map(|target| target.bytes).collect::<Vec<_>>(), targets);
        for target in again {
            pretty_assertions::assert_eq!(select_crf_for_target(&results, target.bytes), Some(target.crf));
        }
    }

    #[tokio::test]
    async fn probe_encodes_every_candidate_once() -> anyhow::Result<()> {
        let runner = Arc::new(FakeRunner::new(|command| {
            // Higher CRF writes smaller output.
            let size = crf_of(command).map_or(4096, |crf| 4096 / usize::from(crf));
            Ok(write_output(command, &vec![0u8; size]))
        }));
        let probe = QualityProbe::new(MediaTools::new(runner.clone(), ToolPaths::default()));

        let results = probe
            .probe(b"video", "video/mp4", 80.0, &EncodeSettings::default())
            .await?;
        let crfs = results.iter().map(|result| result.crf).collect::<Vec<_>>();
        assert_eq!(crfs, CANDIDATE_CRFS.to_vec());
        assert_monotonic(&results);

        // One extraction plus one hardware encode per candidate.
        assert_eq!(runner.calls().len(), 1 + CANDIDATE_CRFS.len());
        assert!(results.iter().all(|result| result.sample_duration == 8.0));

        Ok(())
    }

    #[tokio::test]
    async fn probe_drops_candidates_that_fail_twice() -> anyhow::Result<()> {
        let runner = Arc::new(FakeRunner::new(|command| match crf_of(command) {
            Some(crf) if crf >= 30 => Ok(failed("encoder exploded")),
            _ => Ok(write_output(command, b"sample")),
        }));
        let probe = QualityProbe::new(MediaTools::new(runner, ToolPaths::default()));

        let results = probe
            .probe(b"video", "video/mp4", 30.0, &EncodeSettings::default())
            .await?;
        let crfs = results.iter().map(|result| result.crf).collect::<Vec<_>>();
        assert_eq!(crfs, vec![18, 21, 24, 27]);

        Ok(())
    }

    #[tokio::test]
    async fn probe_requires_duration() {
        let runner = Arc::new(FakeRunner::writing(b""));
        let probe = QualityProbe::new(MediaTools::new(runner, ToolPaths::default()));

        let result = probe
            .probe(b"video", "video/mp4", 0.0, &EncodeSettings::default())
            .await;
        assert!(matches!(result, Err(MediaError::UnknownDuration)));
    }
}
