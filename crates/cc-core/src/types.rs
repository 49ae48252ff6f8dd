//! Common data types for convergence-club analysis

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of periods left for the log-t regression after trimming.
///
/// The first `round(n_periods * time_trim)` periods are discarded; rounding is
/// half-to-even. Period 1 never enters the regression (`log log 1` is
/// undefined), so at least one period is always dropped.
pub fn periods_after_trim(n_periods: usize, time_trim: f64) -> usize {
    let discard = (n_periods as f64 * time_trim).round_ties_even();
    if !(discard >= 0.0) {
        return 0;
    }
    n_periods.saturating_sub((discard as usize).max(1))
}

/// Check a time-trim fraction against the number of available periods.
///
/// Requires `n_periods >= 2`, `0 < time_trim <= 1` and at least two periods
/// remaining after trimming. Failures are [`Error::Parameter`].
pub fn validate_time_trim(n_periods: usize, time_trim: f64) -> Result<()> {
    if n_periods < 2 {
        return Err(Error::Parameter(format!(
            "at least 2 time periods are required, got {}",
            n_periods
        )));
    }
    if !time_trim.is_finite() || time_trim <= 0.0 || time_trim > 1.0 {
        return Err(Error::Parameter(format!("time_trim must be in (0, 1], got {}", time_trim)));
    }
    let remaining = periods_after_trim(n_periods, time_trim);
    if remaining < 2 {
        return Err(Error::Parameter(format!(
            "time_trim={} leaves {} of {} periods; at least 2 are required",
            time_trim, remaining, n_periods
        )));
    }
    Ok(())
}

/// Dense panel matrix: rows are cross-sectional units, columns are periods
/// (plus any non-data columns the caller keeps alongside).
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    n_units: usize,
    n_cols: usize,
    data: Vec<f64>, // length n_units*n_cols, row-major
    unit_names: Option<Vec<String>>,
}

impl Panel {
    /// Build a panel from row-wise data.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_units = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if n_units == 0 || n_cols == 0 {
            return Err(Error::InvalidInput("panel must be non-empty (units>0, cols>0)".into()));
        }
        let mut data = Vec::with_capacity(n_units * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::InvalidInput(format!(
                    "panel must be rectangular: row {} has len {}, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidInput(format!("panel row {} has non-finite values", i)));
            }
            data.extend(row);
        }
        Ok(Self { n_units, n_cols, data, unit_names: None })
    }

    /// Attach one name per unit.
    pub fn with_unit_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.n_units {
            return Err(Error::InvalidInput(format!(
                "expected {} unit names, got {}",
                self.n_units,
                names.len()
            )));
        }
        self.unit_names = Some(names);
        Ok(self)
    }

    /// Number of units (rows).
    pub fn n_units(&self) -> usize {
        self.n_units
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Unit names, if the panel carries them.
    pub fn unit_names(&self) -> Option<&[String]> {
        self.unit_names.as_deref()
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    /// Copy the sub-matrix `rows × cols` (in the given order) into a dense matrix.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> Result<DMatrix<f64>> {
        if let Some(&r) = rows.iter().find(|&&r| r >= self.n_units) {
            return Err(Error::Validation(format!(
                "row {} out of range (panel has {} units)",
                r, self.n_units
            )));
        }
        if let Some(&c) = cols.iter().find(|&&c| c >= self.n_cols) {
            return Err(Error::Validation(format!(
                "column {} out of range (panel has {} columns)",
                c, self.n_cols
            )));
        }
        let mut out = DMatrix::zeros(rows.len(), cols.len());
        for (i, &r) in rows.iter().enumerate() {
            let row = self.row(r);
            for (j, &c) in cols.iter().enumerate() {
                out[(i, j)] = row[c];
            }
        }
        Ok(out)
    }
}

/// Heteroskedasticity/autocorrelation-consistent variance estimator used by
/// the log-t regression. Both use the Quadratic-Spectral kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HacMethod {
    /// Quadratic-Spectral kernel with a fixed, data-independent bandwidth.
    #[default]
    Fqsb,
    /// Quadratic-Spectral kernel with the Andrews (1991) AR(1) plug-in bandwidth.
    Aqsb,
}

impl FromStr for HacMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FQSB" => Ok(Self::Fqsb),
            "AQSB" => Ok(Self::Aqsb),
            other => Err(Error::Parameter(format!(
                "unknown HAC method '{}': expected 'FQSB' or 'AQSB'",
                other
            ))),
        }
    }
}

impl fmt::Display for HacMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fqsb => f.write_str("FQSB"),
            Self::Aqsb => f.write_str("AQSB"),
        }
    }
}

/// Log-t regression result attached to a club.
///
/// Only `tvalue` drives merge decisions; the remaining fields are diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubModel {
    /// Slope on `log t` (the convergence speed coefficient).
    pub beta: f64,
    /// HAC standard error of `beta`.
    pub std_err: f64,
    /// t-statistic `beta / std_err`.
    pub tvalue: f64,
    /// One-sided p-value `Φ(tvalue)`.
    pub pvalue: f64,
    /// Regression intercept.
    pub intercept: f64,
    /// Kernel bandwidth used by the HAC estimator.
    pub bandwidth: f64,
    /// Number of periods used in the regression.
    pub n_obs: usize,
}

impl ClubModel {
    /// A model record carrying only a t-statistic (diagnostics set to NaN).
    pub fn with_tvalue(tvalue: f64) -> Self {
        Self {
            beta: f64::NAN,
            std_err: f64::NAN,
            tvalue,
            pvalue: f64::NAN,
            intercept: f64::NAN,
            bandwidth: f64::NAN,
            n_obs: 0,
        }
    }
}

/// A convergence club: an ordered group of panel rows with its regression result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    /// Club label (`club1`, `club2`, ...).
    pub label: String,
    /// Labels of the input clubs this club was merged from (empty for fresh clubs).
    pub merged_from: Vec<String>,
    /// Panel row indices of the member units.
    pub id: Vec<usize>,
    /// Member unit names, when the collection tracks them.
    pub unit_names: Option<Vec<String>>,
    /// Log-t regression over all member units.
    pub model: ClubModel,
}

impl Club {
    /// Create a club without unit names.
    pub fn new(label: impl Into<String>, id: Vec<usize>, model: ClubModel) -> Self {
        Self { label: label.into(), merged_from: Vec::new(), id, unit_names: None, model }
    }

    /// Attach unit names.
    pub fn with_unit_names(mut self, names: Vec<String>) -> Self {
        self.unit_names = Some(names);
        self
    }

    /// Number of member units.
    pub fn len(&self) -> usize {
        self.id.len()
    }

    /// True if the club has no members.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Metadata shared by every collection derived from the same clustering run.
#[derive(Debug, Clone)]
pub struct CollectionMeta {
    /// Panel the unit indices refer to.
    pub panel: Arc<Panel>,
    /// Columns holding the time series, in time order.
    pub data_cols: Vec<usize>,
    /// Column used to rank units at clustering time.
    pub ref_col: usize,
    /// HAC estimator for every log-t regression on this collection.
    pub hac_method: HacMethod,
    /// Default fraction of initial periods discarded before the regression.
    pub time_trim: f64,
    /// Whether clubs carry unit names.
    pub track_unit_names: bool,
}

impl CollectionMeta {
    /// Number of time periods (data columns).
    pub fn n_periods(&self) -> usize {
        self.data_cols.len()
    }

    /// Names of `ids`, or `None` when names are not tracked.
    pub fn unit_names_for(&self, ids: &[usize]) -> Option<Vec<String>> {
        if !self.track_unit_names {
            return None;
        }
        let names = self.panel.unit_names()?;
        Some(ids.iter().map(|&i| names[i].clone()).collect())
    }
}

/// Ordered clubs plus the units no club absorbed.
///
/// Club order is the growth ranking from the clustering step; merge tests only
/// ever pair adjacent clubs.
#[derive(Debug, Clone)]
pub struct ClubCollection {
    /// Clubs in ranking order.
    pub clubs: Vec<Club>,
    /// Shared metadata.
    pub meta: CollectionMeta,
    /// Units outside every club.
    pub divergent: Vec<usize>,
}

impl ClubCollection {
    /// Build a collection, checking every invariant including the stored time trim.
    pub fn new(clubs: Vec<Club>, meta: CollectionMeta, divergent: Vec<usize>) -> Result<Self> {
        let out = Self { clubs, meta, divergent };
        out.validate()?;
        validate_time_trim(out.meta.n_periods(), out.meta.time_trim)
            .map_err(|e| Error::InvalidInput(format!("stored {}", e)))?;
        Ok(out)
    }

    /// Check the structural invariants: columns inside the panel, every unit
    /// in at most one place, unit names consistent with the metadata flag.
    pub fn validate(&self) -> Result<()> {
        let panel = &self.meta.panel;
        let n_units = panel.n_units();

        let mut seen_cols = vec![false; panel.n_cols()];
        for &c in &self.meta.data_cols {
            if c >= panel.n_cols() {
                return Err(Error::InvalidInput(format!(
                    "data column {} out of range (panel has {} columns)",
                    c,
                    panel.n_cols()
                )));
            }
            if std::mem::replace(&mut seen_cols[c], true) {
                return Err(Error::InvalidInput(format!("data column {} listed twice", c)));
            }
        }
        if self.meta.ref_col >= panel.n_cols() {
            return Err(Error::InvalidInput(format!(
                "reference column {} out of range (panel has {} columns)",
                self.meta.ref_col,
                panel.n_cols()
            )));
        }
        if self.meta.track_unit_names && panel.unit_names().is_none() {
            return Err(Error::InvalidInput(
                "unit names are tracked but the panel has none".into(),
            ));
        }

        let mut seen = vec![false; n_units];
        let mut claim = |unit: usize, owner: &str| -> Result<()> {
            if unit >= n_units {
                return Err(Error::InvalidInput(format!(
                    "{}: unit {} out of range (panel has {} units)",
                    owner, unit, n_units
                )));
            }
            if std::mem::replace(&mut seen[unit], true) {
                return Err(Error::InvalidInput(format!("{}: unit {} appears twice", owner, unit)));
            }
            Ok(())
        };

        for club in &self.clubs {
            if club.id.is_empty() {
                return Err(Error::InvalidInput(format!("{} has no units", club.label)));
            }
            for &u in &club.id {
                claim(u, &club.label)?;
            }
            match (&club.unit_names, self.meta.track_unit_names) {
                (Some(names), true) if names.len() != club.id.len() => {
                    return Err(Error::InvalidInput(format!(
                        "{} has {} unit names for {} units",
                        club.label,
                        names.len(),
                        club.id.len()
                    )));
                }
                (None, true) => {
                    return Err(Error::InvalidInput(format!(
                        "{} is missing unit names",
                        club.label
                    )));
                }
                (Some(_), false) => {
                    return Err(Error::InvalidInput(format!(
                        "{} carries unit names but the collection does not track them",
                        club.label
                    )));
                }
                _ => {}
            }
        }
        for &u in &self.divergent {
            claim(u, "divergent")?;
        }
        Ok(())
    }

    /// Number of clubs.
    pub fn n_clubs(&self) -> usize {
        self.clubs.len()
    }

    /// Number of time periods.
    pub fn n_periods(&self) -> usize {
        self.meta.n_periods()
    }

    /// Size of each club, in order.
    pub fn club_sizes(&self) -> Vec<usize> {
        self.clubs.iter().map(Club::len).collect()
    }

    /// All club member indices, club by club.
    pub fn units(&self) -> Vec<usize> {
        self.clubs.iter().flat_map(|c| c.id.iter().copied()).collect()
    }

    /// Names of the divergent units, when tracked.
    pub fn divergent_names(&self) -> Option<Vec<String>> {
        self.meta.unit_names_for(&self.divergent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Arc<Panel> {
        let rows = (0..4).map(|i| (0..6).map(|t| 1.0 + i as f64 + t as f64).collect()).collect();
        Arc::new(
            Panel::from_rows(rows)
                .unwrap()
                .with_unit_names(vec!["a".into(), "b".into(), "c".into(), "d".into()])
                .unwrap(),
        )
    }

    fn meta(track: bool) -> CollectionMeta {
        CollectionMeta {
            panel: panel(),
            data_cols: (0..6).collect(),
            ref_col: 5,
            hac_method: HacMethod::Fqsb,
            time_trim: 1.0 / 3.0,
            track_unit_names: track,
        }
    }

    #[test]
    fn test_periods_after_trim_rounds_half_even() {
        assert_eq!(periods_after_trim(6, 1.0 / 3.0), 4);
        // 5 * 0.5 = 2.5 rounds to 2
        assert_eq!(periods_after_trim(5, 0.5), 3);
        // 7 * 0.5 = 3.5 rounds to 4
        assert_eq!(periods_after_trim(7, 0.5), 3);
        assert_eq!(periods_after_trim(4, 1.0), 0);
        // Nothing rounds away, but period 1 is still dropped.
        assert_eq!(periods_after_trim(10, 0.01), 9);
    }

    #[test]
    fn test_validate_time_trim() {
        assert!(validate_time_trim(6, 1.0 / 3.0).is_ok());
        assert!(matches!(validate_time_trim(6, 0.0), Err(Error::Parameter(_))));
        assert!(matches!(validate_time_trim(6, 1.5), Err(Error::Parameter(_))));
        assert!(matches!(validate_time_trim(6, f64::NAN), Err(Error::Parameter(_))));
        assert!(matches!(validate_time_trim(6, 0.9), Err(Error::Parameter(_))));
        assert!(matches!(validate_time_trim(1, 0.1), Err(Error::Parameter(_))));
        // Two periods: period 1 is skipped, one is left.
        assert!(matches!(validate_time_trim(2, 0.1), Err(Error::Parameter(_))));
        assert!(validate_time_trim(3, 0.1).is_ok());
    }

    #[test]
    fn test_panel_validation() {
        assert!(Panel::from_rows(vec![]).is_err());
        assert!(Panel::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(Panel::from_rows(vec![vec![1.0, f64::NAN]]).is_err());
        let p = Panel::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        assert!(p.with_unit_names(vec![]).is_err());
    }

    #[test]
    fn test_panel_select() {
        let p = panel();
        let m = p.select(&[2, 0], &[1, 3]).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 0)], 4.0);
        assert_eq!(m[(1, 1)], 4.0);
        assert!(p.select(&[9], &[0]).is_err());
    }

    #[test]
    fn test_collection_accepts_valid() {
        let m = meta(true);
        let clubs = vec![
            Club::new("club1", vec![0, 1], ClubModel::with_tvalue(1.0))
                .with_unit_names(vec!["a".into(), "b".into()]),
            Club::new("club2", vec![3], ClubModel::with_tvalue(0.5))
                .with_unit_names(vec!["d".into()]),
        ];
        let cc = ClubCollection::new(clubs, m, vec![2]).unwrap();
        assert_eq!(cc.n_clubs(), 2);
        assert_eq!(cc.club_sizes(), vec![2, 1]);
        assert_eq!(cc.units(), vec![0, 1, 3]);
        assert_eq!(cc.divergent_names(), Some(vec!["c".to_string()]));
    }

    #[test]
    fn test_collection_rejects_duplicates() {
        let clubs = vec![
            Club::new("club1", vec![0, 1], ClubModel::with_tvalue(1.0)),
            Club::new("club2", vec![1], ClubModel::with_tvalue(1.0)),
        ];
        let err = ClubCollection::new(clubs, meta(false), vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let clubs = vec![Club::new("club1", vec![0], ClubModel::with_tvalue(1.0))];
        assert!(ClubCollection::new(clubs, meta(false), vec![0]).is_err());
    }

    #[test]
    fn test_collection_rejects_bad_shape() {
        let mut m = meta(false);
        m.data_cols = vec![0, 9];
        assert!(ClubCollection::new(vec![], m, vec![]).is_err());

        let mut m = meta(false);
        m.time_trim = 0.0;
        assert!(matches!(ClubCollection::new(vec![], m, vec![]), Err(Error::InvalidInput(_))));

        let clubs = vec![Club::new("club1", vec![0], ClubModel::with_tvalue(1.0))];
        assert!(ClubCollection::new(clubs, meta(true), vec![]).is_err());

        let clubs = vec![Club::new("club1", vec![], ClubModel::with_tvalue(1.0))];
        assert!(ClubCollection::new(clubs, meta(false), vec![]).is_err());
    }

    #[test]
    fn test_hac_method_parse() {
        assert_eq!("AQSB".parse::<HacMethod>().unwrap(), HacMethod::Aqsb);
        assert_eq!(HacMethod::Fqsb.to_string(), "FQSB");
        assert!(matches!("NW".parse::<HacMethod>(), Err(Error::Parameter(_))));
    }
}
