//! Parallel batch analysis.
//!
//! Each file gets its own [`Analyzer`] copy, and therefore its own decoder,
//! file handles and detector. Nothing is shared between runs except the
//! read-only frame source and configuration.

use std::path::Path;

use ::rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::{analysis::Analyzer, error::VidGuardError, report::IntegrityReport};

/// Analyse `paths` across the rayon thread pool, keeping input order.
pub(crate) fn analyze_parallel<P>(
    analyzer: &Analyzer,
    paths: &[P],
) -> Vec<Result<IntegrityReport, VidGuardError>>
where
    P: AsRef<Path> + Sync,
{
    log::debug!("Analysing {} files in parallel", paths.len());

    let mut results = Vec::with_capacity(paths.len());
    paths
        .par_iter()
        .map(|path| analyzer.fresh().analyze(path))
        .collect_into_vec(&mut results);
    results
}
