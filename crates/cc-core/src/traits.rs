//! Collaborator traits for club merging
//!
//! The merge scan only needs three narrow services: a relative transition
//! path for a set of units, a log-t regression over such a path, and an
//! optional re-absorption of divergent units. Defining them here keeps the
//! merge logic in `cc-inference` independent of any concrete estimator, so
//! tests can drive it with scripted t-statistics.

use nalgebra::DMatrix;

use crate::types::{ClubCollection, ClubModel, HacMethod, Panel};
use crate::Result;

/// Relative transition paths for a subset of panel units.
pub trait TransitionComputer: Send + Sync {
    /// Transition matrix for `rows × cols` of `panel`.
    ///
    /// Each entry is the unit's value divided by the cross-sectional mean of
    /// the supplied rows at that period, so the result depends on the full
    /// row set.
    fn transition_path(&self, panel: &Panel, rows: &[usize], cols: &[usize])
    -> Result<DMatrix<f64>>;
}

/// Log-t regression over a transition path.
pub trait RegressionEstimator: Send + Sync {
    /// Fit the regression after discarding the first `time_trim` fraction of periods.
    fn estimate(&self, h: &DMatrix<f64>, time_trim: f64, method: HacMethod) -> Result<ClubModel>;
}

/// Re-absorption of divergent units into existing clubs.
pub trait DivergentMerger: Send + Sync {
    /// Return a new collection in which divergent units passing the `estar`
    /// test have been moved into clubs.
    fn merge_divergent(
        &self,
        clubs: &ClubCollection,
        time_trim: f64,
        estar: f64,
    ) -> Result<ClubCollection>;
}
