//! Statistical testing
//!
//! The pipeline's responsibility ends at shaping a well-formed contingency
//! table or design matrix; the mathematics is delegated to external crates
//! (statrs distributions, ndarray linear algebra). Degenerate inputs are
//! passed through and reported as they come out, never repaired.

use std::fmt;

use log::debug;
use ndarray::{Array1, Array2};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::{CohortError, Result};
use crate::rowset::{RowSet, Value};
use crate::tabulate::ContingencyTable;

/// Result of a chi-square test of independence on a 2×2 table
#[derive(Debug, Clone)]
pub struct ChiSquareResult {
    /// Test statistic (continuity-corrected, as for any 2×2 table)
    pub statistic: f64,
    /// Upper-tail p-value
    pub p_value: f64,
    /// Degrees of freedom
    pub dof: usize,
    /// Expected frequencies under independence
    pub expected: [[f64; 2]; 2],
}

impl fmt::Display for ChiSquareResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "chi2 = {:.6}, p = {:.6}, dof = {}",
            self.statistic, self.p_value, self.dof
        )?;
        write!(
            f,
            "expected: [[{:.4}, {:.4}], [{:.4}, {:.4}]]",
            self.expected[0][0], self.expected[0][1], self.expected[1][0], self.expected[1][1]
        )
    }
}

/// Chi-square test of independence on a 2×2 contingency table
///
/// Applies the Yates continuity correction, standard practice at one
/// degree of freedom. Zero marginals produce NaN
/// statistics and expected frequencies; they are reported, not substituted.
///
/// # Errors
/// Returns an error only if the chi-squared distribution cannot be built.
pub fn chi2_contingency(table: &ContingencyTable) -> Result<ChiSquareResult> {
    let observed = table.counts();
    let row_totals = [
        observed[0][0] + observed[0][1],
        observed[1][0] + observed[1][1],
    ];
    let col_totals = [
        observed[0][0] + observed[1][0],
        observed[0][1] + observed[1][1],
    ];
    let grand_total = row_totals[0] + row_totals[1];

    let mut expected = [[0.0; 2]; 2];
    let mut statistic = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            expected[i][j] = row_totals[i] * col_totals[j] / grand_total;
            let diff = ((observed[i][j] - expected[i][j]).abs() - 0.5).max(0.0);
            statistic += diff * diff / expected[i][j];
        }
    }

    let dist = ChiSquared::new(1.0).map_err(|e| CohortError::Stats(e.to_string()))?;
    let p_value = if statistic.is_finite() {
        dist.sf(statistic)
    } else {
        f64::NAN
    };

    Ok(ChiSquareResult {
        statistic,
        p_value,
        dof: 1,
        expected,
    })
}

/// Build a design matrix and response vector from a derived row set
///
/// Every column except the response and the explicitly dropped ones becomes
/// a covariate, in column order. All cells must be numeric at this point.
///
/// # Errors
/// Returns an error on a missing column or a non-numeric cell.
pub fn design_matrix(
    rowset: &RowSet,
    response: &str,
    drop: &[&str],
) -> Result<(Vec<String>, Array2<f64>, Array1<f64>)> {
    let response_idx = rowset.column_index(response)?;
    for name in drop {
        rowset.column_index(name)?;
    }

    let covariate_indices: Vec<usize> = rowset
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, name)| *idx != response_idx && !drop.contains(&name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    let names: Vec<String> = covariate_indices
        .iter()
        .map(|&idx| rowset.columns()[idx].clone())
        .collect();

    let cell = |value: &Value, column: &str| -> Result<f64> {
        match value {
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                CohortError::Stats(format!("non-numeric value '{s}' in column '{column}'"))
            }),
            other => other.as_f64().ok_or_else(|| {
                CohortError::Stats(format!("null value in column '{column}'"))
            }),
        }
    };

    let n = rowset.num_rows();
    let k = covariate_indices.len();
    let mut design = Array2::<f64>::zeros((n, k));
    let mut y = Array1::<f64>::zeros(n);
    for (row_idx, row) in rowset.rows().iter().enumerate() {
        y[row_idx] = cell(&row[response_idx], response)?;
        for (col, &idx) in covariate_indices.iter().enumerate() {
            design[[row_idx, col]] = cell(&row[idx], &rowset.columns()[idx])?;
        }
    }
    Ok((names, design, y))
}

/// One fitted covariate of a logistic regression
#[derive(Debug, Clone)]
pub struct LogitTerm {
    /// Covariate name
    pub name: String,
    /// Fitted coefficient (log odds)
    pub coef: f64,
    /// Standard error of the coefficient
    pub std_err: f64,
    /// Wald z statistic
    pub z: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lower 95% confidence bound
    pub conf_low: f64,
    /// Upper 95% confidence bound
    pub conf_high: f64,
}

impl LogitTerm {
    /// Odds ratio for a one-unit increase in the covariate
    #[must_use]
    pub fn odds_ratio(&self) -> f64 {
        self.coef.exp()
    }

    /// Confidence bounds on the odds-ratio scale
    #[must_use]
    pub fn odds_ratio_bounds(&self) -> (f64, f64) {
        (self.conf_low.exp(), self.conf_high.exp())
    }
}

/// A fitted logistic regression
#[derive(Debug, Clone)]
pub struct LogitFit {
    /// Per-covariate estimates
    pub terms: Vec<LogitTerm>,
    /// IRLS iterations used
    pub iterations: usize,
    /// Log-likelihood at the optimum
    pub log_likelihood: f64,
    /// Number of observations
    pub n_observations: usize,
}

impl fmt::Display for LogitFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Logistic regression: n = {}, log-likelihood = {:.4}, iterations = {}",
            self.n_observations, self.log_likelihood, self.iterations
        )?;
        writeln!(
            f,
            "{:<24} {:>10} {:>10} {:>8} {:>10} {:>10} {:>10}",
            "", "coef", "std err", "z", "P>|z|", "2.5%", "97.5%"
        )?;
        for term in &self.terms {
            writeln!(
                f,
                "{:<24} {:>10.4} {:>10.4} {:>8.3} {:>10.4} {:>10.4} {:>10.4}",
                term.name, term.coef, term.std_err, term.z, term.p_value, term.conf_low,
                term.conf_high
            )?;
        }
        writeln!(f, "Odds ratios (one unit increase in covariate):")?;
        for term in &self.terms {
            let (low, high) = term.odds_ratio_bounds();
            writeln!(
                f,
                "{:<24} {:>10.4} [{:.4}, {:.4}]",
                term.name,
                term.odds_ratio(),
                low,
                high
            )?;
        }
        Ok(())
    }
}

/// Binary logistic regression fitted by iteratively reweighted least squares
///
/// No intercept is added; the caller's design matrix is used exactly as
/// given. Append a constant column to fit one.
#[derive(Debug, Clone)]
pub struct LogitModel {
    /// Maximum IRLS iterations before giving up
    pub max_iter: usize,
    /// Convergence tolerance on the coefficient update
    pub tolerance: f64,
}

impl Default for LogitModel {
    fn default() -> Self {
        Self {
            max_iter: 35,
            tolerance: 1e-8,
        }
    }
}

impl LogitModel {
    /// Fit the model to a design matrix and 0/1 response
    ///
    /// # Errors
    /// Returns an error on dimension mismatch, a singular information
    /// matrix, or failure to converge within `max_iter` iterations.
    pub fn fit(
        &self,
        names: &[String],
        design: &Array2<f64>,
        response: &Array1<f64>,
    ) -> Result<LogitFit> {
        let (n, k) = design.dim();
        if names.len() != k || response.len() != n {
            return Err(CohortError::Stats(format!(
                "design matrix is {n}x{k} but got {} names and {} responses",
                names.len(),
                response.len()
            )));
        }
        if n == 0 || k == 0 {
            return Err(CohortError::Stats("empty design matrix".to_string()));
        }

        let mut beta = Array1::<f64>::zeros(k);
        let mut covariance = Array2::<f64>::zeros((k, k));
        let mut converged = false;
        let mut iterations = 0;

        for iteration in 1..=self.max_iter {
            iterations = iteration;
            let eta = design.dot(&beta);
            let mu = eta.mapv(|e| 1.0 / (1.0 + (-e).exp()));

            // X' W X and X' W z with z the working response, accumulated
            // row by row; weights are floored to keep the system solvable
            // when fitted probabilities saturate.
            let mut xtwx = Array2::<f64>::zeros((k, k));
            let mut xtwz = Array1::<f64>::zeros(k);
            for i in 0..n {
                let w = (mu[i] * (1.0 - mu[i])).max(1e-10);
                let z = eta[i] + (response[i] - mu[i]) / w;
                for a in 0..k {
                    let xa = design[[i, a]];
                    xtwz[a] += xa * w * z;
                    for b in 0..k {
                        xtwx[[a, b]] += xa * w * design[[i, b]];
                    }
                }
            }

            let inverse = invert(&xtwx)?;
            let updated = inverse.dot(&xtwz);
            let step = updated
                .iter()
                .zip(beta.iter())
                .map(|(new, old)| (new - old).abs())
                .fold(0.0_f64, f64::max);
            beta = updated;
            covariance = inverse;
            if step < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(CohortError::Stats(format!(
                "IRLS did not converge in {} iterations",
                self.max_iter
            )));
        }
        debug!("IRLS converged in {iterations} iterations");

        let eta = design.dot(&beta);
        let log_likelihood = eta
            .iter()
            .zip(response.iter())
            .map(|(&e, &y)| {
                let mu = (1.0 / (1.0 + (-e).exp())).clamp(1e-12, 1.0 - 1e-12);
                y * mu.ln() + (1.0 - y) * (1.0 - mu).ln()
            })
            .sum();

        let normal = Normal::new(0.0, 1.0).map_err(|e| CohortError::Stats(e.to_string()))?;
        let quantile = normal.inverse_cdf(0.975);

        let terms = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let coef = beta[idx];
                let std_err = covariance[[idx, idx]].sqrt();
                let z = coef / std_err;
                LogitTerm {
                    name: name.clone(),
                    coef,
                    std_err,
                    z,
                    p_value: 2.0 * normal.sf(z.abs()),
                    conf_low: coef - quantile * std_err,
                    conf_high: coef + quantile * std_err,
                }
            })
            .collect();

        Ok(LogitFit {
            terms,
            iterations,
            log_likelihood,
            n_observations: n,
        })
    }
}

/// Invert a small symmetric positive-definite matrix by Gauss-Jordan
/// elimination with partial pivoting.
fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let k = matrix.nrows();
    let mut work = matrix.clone();
    let mut inverse = Array2::<f64>::eye(k);

    for col in 0..k {
        // Pivot on the largest remaining magnitude in this column
        let mut pivot_row = col;
        for row in (col + 1)..k {
            if work[[row, col]].abs() > work[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        let pivot = work[[pivot_row, col]];
        if !pivot.is_finite() || pivot.abs() < 1e-12 {
            return Err(CohortError::Stats(
                "singular information matrix (collinear covariates?)".to_string(),
            ));
        }
        if pivot_row != col {
            for j in 0..k {
                work.swap([pivot_row, j], [col, j]);
                inverse.swap([pivot_row, j], [col, j]);
            }
        }
        for j in 0..k {
            work[[col, j]] /= pivot;
            inverse[[col, j]] /= pivot;
        }
        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                let w = work[[col, j]];
                let v = inverse[[col, j]];
                work[[row, j]] -= factor * w;
                inverse[[row, j]] -= factor * v;
            }
        }
    }
    Ok(inverse)
}
