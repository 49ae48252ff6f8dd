//! Re-absorption of divergent units into existing clubs.
//!
//! Every round scores each (divergent unit, club) pair by the log-t statistic
//! of the club extended with that unit. The best-scoring pair above `estar`
//! is merged and the club's model refitted; the loop stops when no pair
//! passes. Pairs are scored in parallel (rayon); ties go to the earliest
//! divergent unit, then the earliest club, so results do not depend on
//! scheduling.

use cc_core::{
    ClubCollection, DivergentMerger, Error, RegressionEstimator, Result, TransitionComputer,
    validate_time_trim,
};
use rayon::prelude::*;

use crate::club_model;
use crate::logt::LogTRegression;
use crate::transition::RelativeTransition;

/// Greedy divergent-unit absorber.
#[derive(Debug, Clone)]
pub struct DivergentAbsorber<T = RelativeTransition, R = LogTRegression> {
    transition: T,
    estimator: R,
}

impl DivergentAbsorber {
    /// Absorber using relative transition paths and the log-t regression.
    pub fn new() -> Self {
        Self { transition: RelativeTransition, estimator: LogTRegression }
    }
}

impl Default for DivergentAbsorber {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> DivergentAbsorber<T, R>
where
    T: TransitionComputer,
    R: RegressionEstimator,
{
    /// Absorber over custom collaborators.
    pub fn with_collaborators(transition: T, estimator: R) -> Self {
        Self { transition, estimator }
    }

    /// Best `(divergent position, club index, tvalue)` above `estar`, if any.
    fn best_pair(
        &self,
        clubs: &ClubCollection,
        divergent: &[usize],
        time_trim: f64,
        estar: f64,
    ) -> Result<Option<(usize, usize, f64)>> {
        let n_clubs = clubs.clubs.len();
        let scored: Vec<Result<Option<f64>>> = (0..divergent.len() * n_clubs)
            .into_par_iter()
            .map(|idx| {
                let (d, c) = (idx / n_clubs, idx % n_clubs);
                let mut units = clubs.clubs[c].id.clone();
                units.push(divergent[d]);
                match club_model(&self.transition, &self.estimator, &clubs.meta, &units, time_trim)
                {
                    Ok(m) => Ok(Some(m.tvalue)),
                    Err(Error::Computation(msg)) => {
                        log::warn!(
                            "divergent unit {} vs {}: {}; skipping pair",
                            divergent[d],
                            clubs.clubs[c].label,
                            msg
                        );
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .collect();

        let mut best: Option<(usize, usize, f64)> = None;
        for (idx, t) in scored.into_iter().enumerate() {
            let Some(t) = t? else { continue };
            if !(t > estar) {
                continue;
            }
            if best.is_none_or(|(_, _, bt)| t > bt) {
                best = Some((idx / n_clubs, idx % n_clubs, t));
            }
        }
        Ok(best)
    }
}

impl<T, R> DivergentMerger for DivergentAbsorber<T, R>
where
    T: TransitionComputer,
    R: RegressionEstimator,
{
    fn merge_divergent(
        &self,
        clubs: &ClubCollection,
        time_trim: f64,
        estar: f64,
    ) -> Result<ClubCollection> {
        clubs.validate()?;
        validate_time_trim(clubs.n_periods(), time_trim)?;
        if !estar.is_finite() {
            return Err(Error::Parameter(format!("estar must be finite, got {}", estar)));
        }

        let mut out = clubs.clone();
        if out.divergent.is_empty() || out.clubs.is_empty() {
            return Ok(out);
        }

        let n_divergent = out.divergent.len();
        while !out.divergent.is_empty() {
            let Some((d, c, t)) = self.best_pair(&out, &out.divergent, time_trim, estar)? else {
                break;
            };
            let unit = out.divergent.remove(d);
            let club = &mut out.clubs[c];
            club.id.push(unit);
            if let (Some(names), Some(all)) =
                (club.unit_names.as_mut(), clubs.meta.panel.unit_names())
            {
                names.push(all[unit].clone());
            }
            club.model =
                club_model(&self.transition, &self.estimator, &clubs.meta, &club.id, time_trim)?;
            log::debug!("divergent unit {} joins {} (t={:.4})", unit, club.label, t);
        }

        log::info!(
            "absorbed {} of {} divergent units (estar={})",
            n_divergent - out.divergent.len(),
            n_divergent,
            estar
        );
        Ok(out)
    }
}
