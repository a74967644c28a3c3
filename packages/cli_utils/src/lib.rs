#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the nitrogen map CLI.
//!
//! [`PipelineBars`] puts two `indicatif` bars behind the ingest
//! [`ProgressCallback`] trait: one line for the pipeline steps and one
//! for the management PDFs being read. [`init_logger`] routes `log`
//! output through `indicatif-log-bridge` so log lines are printed above
//! the bars instead of tearing them.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use nitrogen_map_ingest::ProgressCallback;

pub use indicatif::MultiProgress;

/// Log level used when `RUST_LOG` is not set, so step summaries show up
/// without any configuration.
const DEFAULT_LEVEL: log::LevelFilter = log::LevelFilter::Info;

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once `set_total()` provides the document count.
    counted_style: Option<ProgressStyle>,
}

impl IndicatifProgress {
    /// Spinner until the number of PDFs is known, then a bar counting
    /// documents with the current file name as message.
    fn documents(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(style(
            "{spinner:.cyan} {prefix}: {msg}",
            ProgressStyle::default_spinner,
        ));
        bar.set_prefix("Documents");
        bar.set_message("looking for management PDFs");

        let counted_style = style(
            "  {prefix} {wide_bar:.cyan/dim} {pos}/{len} PDFs {msg}",
            ProgressStyle::default_bar,
        )
        .progress_chars("##-");

        Self {
            bar,
            counted_style: Some(counted_style),
        }
    }

    /// Fixed-length bar over the pipeline steps; the message names the
    /// running step.
    fn steps(multi: &MultiProgress, step_count: u64) -> Self {
        let bar = multi.add(ProgressBar::new(step_count));
        bar.set_style(
            style(
                "{prefix:.bold} [{pos}/{len}] {wide_bar:.green/dim} {msg} ({elapsed})",
                ProgressStyle::default_bar,
            )
            .progress_chars("##-"),
        );
        bar.set_prefix("Pipeline");

        Self {
            bar,
            counted_style: None,
        }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        if let Some(style) = &self.counted_style {
            self.bar.set_style(style.clone());
        }
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// The two progress lines shown during a pipeline run.
pub struct PipelineBars {
    /// Advances once per pipeline step.
    pub steps: Arc<dyn ProgressCallback>,
    /// Advances once per management PDF.
    pub documents: Arc<dyn ProgressCallback>,
}

impl PipelineBars {
    /// Adds both bars to `multi`, steps first.
    #[must_use]
    pub fn new(multi: &MultiProgress, step_count: u64) -> Self {
        Self {
            steps: Arc::new(IndicatifProgress::steps(multi, step_count)),
            documents: Arc::new(IndicatifProgress::documents(multi)),
        }
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Logs at info level unless `RUST_LOG` says otherwise. Returns the
/// [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(DEFAULT_LEVEL)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set, e.g. by another test

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn documents_bar_counts_pdfs_once_total_is_known() {
        let documents = IndicatifProgress::documents(&hidden());
        assert_eq!(documents.bar.length(), None);

        documents.set_total(3);
        documents.set_message("schlag_1.pdf".to_string());
        documents.inc(1);

        assert_eq!(documents.bar.length(), Some(3));
        assert_eq!(documents.bar.position(), 1);
        assert_eq!(documents.bar.message(), "schlag_1.pdf");

        documents.finish("Extracted 2 nitrogen records from 3 documents".to_string());
        assert!(documents.bar.is_finished());
    }

    #[test]
    fn steps_bar_starts_with_fixed_length() {
        let steps = IndicatifProgress::steps(&hidden(), 5);
        assert_eq!(steps.bar.length(), Some(5));
        assert_eq!(steps.bar.prefix(), "Pipeline");

        steps.set_total(5);
        steps.inc(2);
        assert_eq!(steps.bar.position(), 2);
    }
}
