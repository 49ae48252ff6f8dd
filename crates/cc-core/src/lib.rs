//! # cc-core
//!
//! Shared data model for convergence-club analysis.
//!
//! This crate provides:
//! - the [`Error`] type and [`Result`] alias used across the workspace;
//! - the panel and club data model ([`Panel`], [`Club`], [`ClubCollection`]);
//! - the collaborator traits the merge logic is written against
//!   ([`TransitionComputer`], [`RegressionEstimator`], [`DivergentMerger`]).
//!
//! Numerical work lives in `cc-inference`; nothing here depends on it.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error type and result alias.
pub mod error;
/// Collaborator traits: transition paths, log-t regression, divergent re-absorption.
pub mod traits;
/// Panel, club and collection types.
pub mod types;

pub use error::{Error, Result};
pub use traits::{DivergentMerger, RegressionEstimator, TransitionComputer};
pub use types::{
    Club, ClubCollection, ClubModel, CollectionMeta, HacMethod, Panel, periods_after_trim,
    validate_time_trim,
};
