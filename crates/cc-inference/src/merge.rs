//! Sequential merging of adjacent convergence clubs.
//!
//! Clubs arrive ordered by the growth ranking of the clustering step. The
//! scan grows a group from an anchor club by testing it together with the
//! next club; once a candidate is turned down the group is closed and the
//! scan restarts from that candidate. Two acceptance rules are supported:
//!
//! - **PS**: accept when the log-t statistic of `group ∪ candidate` exceeds
//!   the threshold.
//! - **vLT**: additionally require that statistic to beat the one of the
//!   candidate paired with its own successor, so a club joins the group it
//!   fits best. At the last club only the threshold test applies.
//!
//! # References
//!
//! - Phillips & Sul (2009), "Economic transition and growth." *Journal of
//!   Applied Econometrics* 24(7).
//! - von Lyncker & Thoennessen (2017), "Regional club convergence in the EU:
//!   evidence from a panel data analysis." *Empirical Economics* 52(2).

use std::fmt;
use std::str::FromStr;

use cc_core::{
    Club, ClubCollection, ClubModel, DivergentMerger, Error, RegressionEstimator, Result,
    TransitionComputer, validate_time_trim,
};
use serde::{Deserialize, Serialize};

use crate::club_model;
use crate::divergent::DivergentAbsorber;
use crate::logt::LogTRegression;
use crate::transition::RelativeTransition;

/// Critical value of the one-sided log-t test at the 5% level.
pub const DEFAULT_THRESHOLD: f64 = -1.65;

/// Acceptance rule for a candidate club.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeMethod {
    /// Phillips–Sul: the joint test alone decides.
    Ps,
    /// von Lyncker–Thoennessen: the joint test must also beat the
    /// candidate's pairing with the next club.
    Vlt,
}

impl FromStr for MergeMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PS" => Ok(Self::Ps),
            "vLT" => Ok(Self::Vlt),
            other => Err(Error::Parameter(format!(
                "unknown merge method '{}': expected 'PS' or 'vLT'",
                other
            ))),
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ps => f.write_str("PS"),
            Self::Vlt => f.write_str("vLT"),
        }
    }
}

/// Merge settings. The method has no default; everything else does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Fraction of initial periods discarded; `None` reuses the collection's value.
    pub time_trim: Option<f64>,
    /// Acceptance rule.
    pub method: MergeMethod,
    /// Critical value for the log-t statistic (default −1.65).
    pub threshold: f64,
    /// Re-absorb divergent units after merging.
    pub merge_divergent: bool,
    /// Critical value for divergent re-absorption (default −1.65).
    pub estar: f64,
}

impl MergeConfig {
    /// Settings for `method` with the conventional defaults.
    pub fn new(method: MergeMethod) -> Self {
        Self {
            time_trim: None,
            method,
            threshold: DEFAULT_THRESHOLD,
            merge_divergent: false,
            estar: DEFAULT_THRESHOLD,
        }
    }

    /// Override the collection's time trim.
    pub fn with_time_trim(mut self, time_trim: f64) -> Self {
        self.time_trim = Some(time_trim);
        self
    }

    /// Override the merge threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Re-absorb divergent units with critical value `estar` after merging.
    pub fn with_merge_divergent(mut self, estar: f64) -> Self {
        self.merge_divergent = true;
        self.estar = estar;
        self
    }
}

/// Outcome of testing one candidate club against the accumulating group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The candidate joins the group.
    Accept,
    /// The joint statistic is at or below the threshold.
    Reject,
    /// vLT only: the candidate fits its successor at least as well.
    Outranked,
}

/// One test performed during the scan. Indices refer to the input club order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    /// First club of the group being grown.
    pub anchor: usize,
    /// Club tested for joining.
    pub candidate: usize,
    /// Log-t statistic of `group ∪ candidate`.
    pub tvalue: f64,
    /// vLT: log-t statistic of `candidate ∪ candidate+1`, when computed.
    pub tvalue_next: Option<f64>,
    /// Result of the test.
    pub verdict: Verdict,
}

/// Apply the acceptance rule. `tvalue_next` is only consulted under vLT.
pub fn decide(
    method: MergeMethod,
    threshold: f64,
    tvalue: f64,
    tvalue_next: Option<f64>,
) -> Verdict {
    if !(tvalue > threshold) {
        return Verdict::Reject;
    }
    match (method, tvalue_next) {
        (MergeMethod::Vlt, Some(t2)) if !(tvalue > t2) => Verdict::Outranked,
        _ => Verdict::Accept,
    }
}

/// A group of input clubs closed by the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClosedGroup {
    members: Vec<usize>,
    append_last: bool,
}

/// Scan state: anchor `i`, candidate `k`, the clubs accumulated so far and
/// whether the last club has been consumed.
#[derive(Debug, Clone)]
struct Scan {
    last: usize,
    anchor: usize,
    candidate: usize,
    group: Vec<usize>,
    finished: bool,
}

impl Scan {
    fn new(n_clubs: usize) -> Self {
        debug_assert!(n_clubs >= 2);
        Self { last: n_clubs - 1, anchor: 0, candidate: 1, group: vec![0], finished: false }
    }

    /// Next `(anchor, candidate)` pair to test, or `None` when done.
    fn pending(&self) -> Option<(usize, usize)> {
        (!self.finished).then_some((self.anchor, self.candidate))
    }

    fn at_last(&self) -> bool {
        self.candidate == self.last
    }

    /// Advance on a verdict; yields the group when the inner scan stops.
    fn apply(&mut self, verdict: Verdict) -> Option<ClosedGroup> {
        match verdict {
            Verdict::Accept => self.accept(),
            Verdict::Reject => Some(self.reject()),
            Verdict::Outranked => Some(self.outranked()),
        }
    }

    fn accept(&mut self) -> Option<ClosedGroup> {
        self.group.push(self.candidate);
        if self.at_last() {
            self.finished = true;
            return Some(self.close(false));
        }
        self.candidate += 1;
        None
    }

    fn reject(&mut self) -> ClosedGroup {
        // Turning down the last club leaves it without a successor to anchor a
        // new group: it is emitted on its own.
        let append_last = self.at_last();
        if append_last {
            self.finished = true;
        }
        self.close(append_last)
    }

    fn outranked(&mut self) -> ClosedGroup {
        debug_assert!(!self.at_last(), "vLT second test needs a successor club");
        self.close(false)
    }

    fn close(&mut self, append_last: bool) -> ClosedGroup {
        let members = std::mem::take(&mut self.group);
        if !self.finished {
            self.anchor = self.candidate;
            debug_assert!(self.anchor < self.last);
            self.group.push(self.anchor);
            self.candidate = self.anchor + 1;
        }
        ClosedGroup { members, append_last }
    }
}

/// Sequential club merger over pluggable transition, regression and
/// divergent-unit collaborators.
#[derive(Debug, Clone)]
pub struct ClubMerger<T = RelativeTransition, R = LogTRegression, D = DivergentAbsorber> {
    transition: T,
    estimator: R,
    divergent: D,
}

impl ClubMerger {
    /// Merger with the relative-transition path, log-t regression and the
    /// default divergent absorber.
    pub fn new() -> Self {
        Self {
            transition: RelativeTransition,
            estimator: LogTRegression,
            divergent: DivergentAbsorber::new(),
        }
    }
}

impl Default for ClubMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R, D> ClubMerger<T, R, D>
where
    T: TransitionComputer,
    R: RegressionEstimator,
    D: DivergentMerger,
{
    /// Merger over custom collaborators.
    pub fn with_collaborators(transition: T, estimator: R, divergent: D) -> Self {
        Self { transition, estimator, divergent }
    }

    /// Merge adjacent clubs of `clubs`; the input is left untouched.
    pub fn merge(&self, clubs: &ClubCollection, config: &MergeConfig) -> Result<ClubCollection> {
        self.merge_with_trace(clubs, config).map(|(merged, _)| merged)
    }

    /// As [`merge`](Self::merge), also returning every test in scan order.
    pub fn merge_with_trace(
        &self,
        clubs: &ClubCollection,
        config: &MergeConfig,
    ) -> Result<(ClubCollection, Vec<MergeDecision>)> {
        clubs.validate()?;
        if !config.threshold.is_finite() {
            return Err(Error::Parameter(format!(
                "threshold must be finite, got {}",
                config.threshold
            )));
        }
        if config.merge_divergent && !config.estar.is_finite() {
            return Err(Error::Parameter(format!("estar must be finite, got {}", config.estar)));
        }
        let time_trim = config.time_trim.unwrap_or(clubs.meta.time_trim);
        validate_time_trim(clubs.n_periods(), time_trim)?;

        if clubs.n_clubs() < 2 {
            log::info!(
                "nothing to merge: collection has {} club(s); returning it unchanged",
                clubs.n_clubs()
            );
            return Ok((clubs.clone(), Vec::new()));
        }

        let tvalue_of = |units: &[usize]| -> Result<f64> {
            Ok(self.fit(clubs, units, time_trim)?.tvalue)
        };

        let input = &clubs.clubs;
        let last = input.len() - 1;
        let mut scan = Scan::new(input.len());
        let mut trace = Vec::new();
        let mut merged: Vec<Club> = Vec::new();

        while let Some((anchor, candidate)) = scan.pending() {
            let mut units = group_units(input, &scan.group);
            units.extend_from_slice(&input[candidate].id);
            let tvalue = tvalue_of(&units)?;

            let needs_next =
                config.method == MergeMethod::Vlt && tvalue > config.threshold && candidate < last;
            let tvalue_next = if needs_next {
                let mut pair = input[candidate].id.clone();
                pair.extend_from_slice(&input[candidate + 1].id);
                Some(tvalue_of(&pair)?)
            } else {
                None
            };

            let verdict = decide(config.method, config.threshold, tvalue, tvalue_next);
            log::debug!(
                "{}: {} + {} -> t={:.4}{} => {:?}",
                config.method,
                input[anchor].label,
                input[candidate].label,
                tvalue,
                tvalue_next.map(|t| format!(", t_next={:.4}", t)).unwrap_or_default(),
                verdict
            );
            trace.push(MergeDecision { anchor, candidate, tvalue, tvalue_next, verdict });

            if let Some(closed) = scan.apply(verdict) {
                let id = group_units(input, &closed.members);
                let model = self.fit(clubs, &id, time_trim)?;
                let unit_names = group_unit_names(input, &closed.members);
                merged.push(Club {
                    label: format!("club{}", merged.len() + 1),
                    merged_from: closed.members.iter().map(|&c| input[c].label.clone()).collect(),
                    id,
                    unit_names,
                    model,
                });

                if closed.append_last {
                    let tail = &input[last];
                    merged.push(Club {
                        label: format!("club{}", merged.len() + 1),
                        merged_from: vec![tail.label.clone()],
                        ..tail.clone()
                    });
                }
            }
        }

        log::info!("{}: merged {} clubs into {}", config.method, input.len(), merged.len());

        let out = ClubCollection {
            clubs: merged,
            meta: clubs.meta.clone(),
            divergent: clubs.divergent.clone(),
        };

        if config.merge_divergent {
            let absorbed = self.divergent.merge_divergent(&out, time_trim, config.estar)?;
            return Ok((absorbed, trace));
        }
        Ok((out, trace))
    }

    /// Log-t model of `units`. A numerically degenerate set (a single unit,
    /// zero dispersion) gets a NaN model, which never passes the threshold.
    fn fit(&self, clubs: &ClubCollection, units: &[usize], time_trim: f64) -> Result<ClubModel> {
        match club_model(&self.transition, &self.estimator, &clubs.meta, units, time_trim) {
            Err(Error::Computation(msg)) => {
                log::warn!("log-t fit on {} units failed: {}; using NaN model", units.len(), msg);
                Ok(ClubModel::with_tvalue(f64::NAN))
            }
            other => other,
        }
    }
}

/// Merge `clubs` with the default collaborators.
pub fn merge_clubs(clubs: &ClubCollection, config: &MergeConfig) -> Result<ClubCollection> {
    ClubMerger::new().merge(clubs, config)
}

fn group_units(clubs: &[Club], members: &[usize]) -> Vec<usize> {
    members.iter().flat_map(|&c| clubs[c].id.iter().copied()).collect()
}

fn group_unit_names(clubs: &[Club], members: &[usize]) -> Option<Vec<String>> {
    let mut names = Vec::new();
    for &c in members {
        names.extend(clubs[c].unit_names.as_ref()?.iter().cloned());
    }
    Some(names)
}
