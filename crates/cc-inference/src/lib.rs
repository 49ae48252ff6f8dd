//! # cc-inference
//!
//! Convergence tests and club merging for the Phillips–Sul clustering
//! framework.
//!
//! This crate provides:
//! - relative transition paths and their cross-sectional dispersion;
//! - the log-t regression with Quadratic-Spectral HAC standard errors;
//! - sequential merging of adjacent clubs (PS and vLT rules);
//! - greedy re-absorption of divergent units.
//!
//! ## Architecture
//!
//! [`ClubMerger`] is written against the collaborator traits in `cc-core`
//! and never against the concrete estimators defined here, so each piece can
//! be swapped (or scripted in tests) independently.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Divergent-unit re-absorption.
pub mod divergent;
/// Quadratic-Spectral HAC covariance and bandwidth selection.
pub mod hac;
/// Log-t convergence regression.
pub mod logt;
/// Sequential club merging.
pub mod merge;
/// Relative transition paths.
pub mod transition;

use cc_core::{ClubModel, CollectionMeta, RegressionEstimator, Result, TransitionComputer};

pub use divergent::DivergentAbsorber;
pub use logt::LogTRegression;
pub use merge::{
    ClubMerger, DEFAULT_THRESHOLD, MergeConfig, MergeDecision, MergeMethod, Verdict, decide,
    merge_clubs,
};
pub use transition::{RelativeTransition, cross_sectional_dispersion};

/// Fit the log-t model of `units` on the collection's data columns.
pub fn club_model<T, R>(
    transition: &T,
    estimator: &R,
    meta: &CollectionMeta,
    units: &[usize],
    time_trim: f64,
) -> Result<ClubModel>
where
    T: TransitionComputer + ?Sized,
    R: RegressionEstimator + ?Sized,
{
    let h = transition.transition_path(&meta.panel, units, &meta.data_cols)?;
    estimator.estimate(&h, time_trim, meta.hac_method)
}
