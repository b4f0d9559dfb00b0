// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User facing progress reporting.
//!
//! The pipeline never writes to the terminal itself. It reports stages,
//! progress, and notices through [`Ui`], and asks it to make the one choice
//! that needs data only available mid-run, i.e., picking a target size after
//! quality probing.

use crate::{media::quality::SizeTarget, pipeline::Stage, upload::reports_partial_progress};

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use inquire::Select;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tracing::{debug, info, warn};

/// Progress and interaction surface of the pipeline.
pub trait Ui: Send + Sync {
    /// Pipeline entered a new stage.
    fn stage(&self, stage: Stage);

    /// Bytes transferred so far out of total.
    fn progress(&self, loaded: u64, total: u64);

    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    /// Let user pick a target size, `None` keeps the configured quality.
    fn choose_target_size(&self, targets: &[SizeTarget]) -> Option<u64>;

    /// Pipeline is done, successfully or not.
    fn finish(&self);
}

/// Interactive terminal UI drawn on standard error.
pub struct TerminalUi {
    bar: ProgressBar,
    spinner: ProgressStyle,
    transfer: ProgressStyle,
    transferring: AtomicBool,
}

impl TerminalUi {
    /// Construct new terminal UI.
    ///
    /// # Errors
    ///
    /// - Return [`UiError::Template`] if progress bar template is invalid.
    pub fn new() -> Result<Self> {
        let spinner = ProgressStyle::with_template("{spinner:.green} {elapsed_precise:.green}  {msg}")?;
        let transfer = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<12}  [{wide_bar:.yellow/blue}] {bytes}/{total_bytes}",
        )?
        .progress_chars("-Cco.");

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        Ok(Self {
            bar,
            spinner,
            transfer,
            transferring: AtomicBool::new(false),
        })
    }
}

impl Ui for TerminalUi {
    fn stage(&self, stage: Stage) {
        if self.transferring.swap(false, Ordering::Relaxed) {
            self.bar.set_style(self.spinner.clone());
        }
        self.bar.set_message(stage.to_string());
    }

    fn progress(&self, loaded: u64, total: u64) {
        // INVARIANT: A single request has no progress in between, so no bar.
        if !reports_partial_progress(total) {
            self.bar
                .set_message(format!("uploading {} in one request", HumanBytes(total)));
            return;
        }

        if !self.transferring.swap(true, Ordering::Relaxed) {
            self.bar.set_style(self.transfer.clone());
        }
        self.bar.set_length(total);
        self.bar.set_position(loaded);
    }

    fn info(&self, message: &str) {
        self.bar.suspend(|| info!("{message}"));
    }

    fn warn(&self, message: &str) {
        self.bar.suspend(|| warn!("{message}"));
    }

    fn choose_target_size(&self, targets: &[SizeTarget]) -> Option<u64> {
        if targets.is_empty() {
            return None;
        }

        let mut options = targets
            .iter()
            .map(|target| format!("~{} MB (crf {})", target.megabytes(), target.crf))
            .collect::<Vec<_>>();
        options.push("keep configured quality".into());

        self.bar.suspend(|| -> Option<u64> {
            let choice = Select::new("target size", options).raw_prompt().ok()?;
            targets.get(choice.index).map(|target| target.bytes)
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Non-interactive UI that only logs.
#[derive(Debug, Default)]
pub struct PlainUi;

impl Ui for PlainUi {
    fn stage(&self, stage: Stage) {
        debug!("{stage}");
    }

    fn progress(&self, loaded: u64, total: u64) {
        debug!("uploaded {loaded}/{total} bytes");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn choose_target_size(&self, _: &[SizeTarget]) -> Option<u64> {
        None
    }

    fn finish(&self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error(transparent)]
    Template(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = UiError> = std::result::Result<T, E>;
