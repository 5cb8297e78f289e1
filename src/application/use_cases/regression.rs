//! Ordinary least squares fitting
//!
//! This module implements the numeric core behind `/analyze`:
//! - Design matrix assembly (intercept + named terms)
//! - Normal-equations solve via Gauss-Jordan elimination
//! - Coefficient inference (standard errors, t-values, p-values)
//! - Model fit statistics (R², adjusted R², F statistic)

use crate::domain::analysis::{CoefficientEntry, ModelFit, ResidualDiagnostics};
use crate::domain::error::{AppError, Result};

const INTERCEPT_TERM: &str = "(Intercept)";
const PIVOT_EPS: f64 = 1e-12;

/// A named regressor column. Columns must all have the same length as the
/// response vector; callers are responsible for listwise deletion beforehand.
#[derive(Debug, Clone)]
pub struct Term {
    pub name: String,
    pub values: Vec<f64>,
}

impl Term {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Fitted model: coefficient table plus residuals for diagnostics.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub model: ModelFit,
    pub residuals: Vec<f64>,
}

impl OlsFit {
    pub fn diagnostics(&self) -> ResidualDiagnostics {
        let n = self.residuals.len().max(1) as f64;
        let mean = self.residuals.iter().sum::<f64>() / n;
        let var = self
            .residuals
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<f64>()
            / n;
        ResidualDiagnostics {
            residual_mean: mean,
            residual_std: var.sqrt(),
            residual_min: self.residuals.iter().cloned().fold(f64::INFINITY, f64::min),
            residual_max: self
                .residuals
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Fit `y ~ 1 + terms` by ordinary least squares.
///
/// Errors with `InvalidRequest` when the system has fewer observations than
/// parameters or the design matrix is singular (collinear specification),
/// since both are properties of the requested model, not of the service.
pub fn fit_ols(terms: &[Term], y: &[f64]) -> Result<OlsFit> {
    let n = y.len();
    let p = terms.len() + 1;

    for term in terms {
        if term.values.len() != n {
            return Err(AppError::Internal(format!(
                "term {} has {} values, expected {}",
                term.name,
                term.values.len(),
                n
            )));
        }
    }
    if n <= p {
        return Err(AppError::invalid_request(
            format!(
                "not enough observations to fit the model: {} usable rows for {} parameters",
                n, p
            ),
            None,
        ));
    }

    // Row-major design matrix with a leading intercept column.
    let row = |i: usize| -> Vec<f64> {
        let mut r = Vec::with_capacity(p);
        r.push(1.0);
        for term in terms {
            r.push(term.values[i]);
        }
        r
    };

    // Normal equations: X'X and X'y.
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for i in 0..n {
        let r = row(i);
        for j in 0..p {
            xty[j] += r[j] * y[i];
            for k in j..p {
                xtx[j][k] += r[j] * r[k];
            }
        }
    }
    for j in 0..p {
        for k in 0..j {
            xtx[j][k] = xtx[k][j];
        }
    }

    let xtx_inv = invert(&xtx).ok_or_else(|| {
        AppError::invalid_request(
            "design matrix is singular; the requested terms are collinear",
            None,
        )
    })?;

    let mut beta = vec![0.0; p];
    for j in 0..p {
        for k in 0..p {
            beta[j] += xtx_inv[j][k] * xty[k];
        }
    }

    // Residuals and sums of squares.
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let mut rss = 0.0;
    let mut tss = 0.0;
    let mut residuals = Vec::with_capacity(n);
    for i in 0..n {
        let r = row(i);
        let fitted: f64 = r.iter().zip(&beta).map(|(x, b)| x * b).sum();
        let resid = y[i] - fitted;
        rss += resid * resid;
        tss += (y[i] - y_mean) * (y[i] - y_mean);
        residuals.push(resid);
    }

    let residual_df = n - p;
    let sigma2 = rss / residual_df as f64;

    let mut coefficients = Vec::with_capacity(p);
    for j in 0..p {
        let name = if j == 0 {
            INTERCEPT_TERM.to_string()
        } else {
            terms[j - 1].name.clone()
        };
        let variance = sigma2 * xtx_inv[j][j];
        let std_error = if variance > 0.0 { variance.sqrt() } else { 0.0 };
        let t_value = if std_error > 0.0 {
            beta[j] / std_error
        } else {
            0.0
        };
        coefficients.push(CoefficientEntry {
            term: name,
            estimate: beta[j],
            std_error,
            t_value,
            p_value: pvalue_z(t_value),
        });
    }

    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
    let adj_r_squared = if tss > 0.0 {
        1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / residual_df as f64
    } else {
        0.0
    };
    let f_statistic = if p > 1 && rss > 0.0 {
        Some(((tss - rss) / (p - 1) as f64) / (rss / residual_df as f64))
    } else {
        None
    };

    Ok(OlsFit {
        model: ModelFit {
            coefficients,
            r_squared,
            adj_r_squared,
            f_statistic,
            n_observations: n,
            n_dropped: 0,
            residual_df,
        },
        residuals,
    })
}

/// Invert a symmetric positive matrix by Gauss-Jordan elimination with
/// partial pivoting. Returns `None` when a pivot collapses below `PIVOT_EPS`.
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let p = matrix.len();
    let mut work: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut augmented = row.clone();
            augmented.extend((0..p).map(|j| if i == j { 1.0 } else { 0.0 }));
            augmented
        })
        .collect();

    for col in 0..p {
        let pivot_row = (col..p)
            .max_by(|&a, &b| {
                work[a][col]
                    .abs()
                    .partial_cmp(&work[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if work[pivot_row][col].abs() < PIVOT_EPS {
            return None;
        }
        work.swap(col, pivot_row);

        let pivot = work[col][col];
        for value in work[col].iter_mut() {
            *value /= pivot;
        }
        let lead = work[col].clone();
        for r in 0..p {
            if r == col {
                continue;
            }
            let factor = work[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..2 * p {
                work[r][c] -= factor * lead[c];
            }
        }
    }

    Some(work.into_iter().map(|row| row[p..].to_vec()).collect())
}

/// Two-sided p-value for a test statistic under the standard normal
/// approximation.
pub fn pvalue_z(z: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Standard normal CDF via the Abramowitz & Stegun erf approximation
/// (formula 7.1.26, max absolute error ~1.5e-7).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}
