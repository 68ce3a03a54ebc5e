//! Async analysis.
//!
//! [`AnalysisFuture`] runs the blocking pipeline with
//! `tokio::task::spawn_blocking`, so decoding and hashing never occupy a
//! runtime worker.
//!
//! # Example
//!
//! ```no_run
//! use vidguard::{AnalysisConfig, VidGuardError};
//!
//! # async fn example() -> Result<(), VidGuardError> {
//! let report = vidguard::analyze_async("input.mp4", AnalysisConfig::new()).await?;
//! println!("{} altered frames", report.altered_frames.len());
//! # Ok(())
//! # }
//! ```

use std::{
    future::Future,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::JoinHandle;

use crate::{
    analysis::Analyzer, configuration::AnalysisConfig, error::VidGuardError,
    report::IntegrityReport,
};

/// A report being produced on a blocking thread.
///
/// Dropping the future does not stop the run; cancel it through the
/// configured [`CancellationToken`](crate::CancellationToken). A worker that
/// panics or is aborted resolves to [`VidGuardError::Cancelled`].
pub struct AnalysisFuture {
    handle: JoinHandle<Result<IntegrityReport, VidGuardError>>,
}

impl Future for AnalysisFuture {
    type Output = Result<IntegrityReport, VidGuardError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(VidGuardError::Cancelled)))
    }
}

pub(crate) fn spawn_analysis(mut analyzer: Analyzer, path: PathBuf) -> AnalysisFuture {
    let handle = tokio::task::spawn_blocking(move || analyzer.analyze(&path));
    AnalysisFuture { handle }
}

/// Analyse `path` with `config` and the FFmpeg decoder on a blocking thread.
///
/// Must be called from within a Tokio runtime.
pub fn analyze_async<P: Into<PathBuf>>(path: P, config: AnalysisConfig) -> AnalysisFuture {
    spawn_analysis(Analyzer::new(config), path.into())
}
