//! Temperature dependence of equilibrium constants.
//!
//! Databases tabulate log10K at a handful of temperatures. A
//! [`Log10KInterpolator`] turns one such row into a function of temperature
//! (in degrees Celsius) using one of the [`Log10KModel`] forms.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constants::CELSIUS_TO_KELVIN;
use crate::error::{GeochemError, GeochemResult};

/// Functional form used to interpolate log10K in temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Log10KModel {
    /// Linear between tabulated points, constant beyond the ends
    #[default]
    PiecewiseLinear,
    /// Least-squares polynomial of degree up to four in T [C]
    FourthOrder,
    /// `a0 ln(T_K) + a1 + a2 T_K + a3 / T_K + a4 / T_K^2`
    MaierKelly,
}

/// A log10K row fitted to a temperature model.
#[derive(Debug, Clone, PartialEq)]
pub enum Log10KInterpolator {
    /// Single temperature: the value never changes
    Constant(f64),
    PiecewiseLinear { temperatures: Vec<f64>, values: Vec<f64> },
    /// Polynomial coefficients in increasing powers of T [C]
    Polynomial(Vec<f64>),
    /// Maier-Kelly coefficients
    MaierKelly([f64; 5]),
}

fn maier_kelly_basis(t_c: f64) -> [f64; 5] {
    let tk = t_c + CELSIUS_TO_KELVIN;
    [tk.ln(), 1.0, tk, 1.0 / tk, 1.0 / (tk * tk)]
}

/// Least-squares fit of `values ~ sum_c coeff_c * basis_c(t)`.
fn least_squares<const N: usize>(
    temperatures: &[f64],
    values: &[f64],
    ncoeff: usize,
    basis: impl Fn(f64) -> [f64; N],
) -> GeochemResult<Vec<f64>> {
    let n = temperatures.len();
    let a = DMatrix::from_fn(n, ncoeff, |r, c| basis(temperatures[r])[c]);
    let b = DVector::from_column_slice(values);
    a.svd(true, true)
        .solve(&b, 1.0e-14)
        .map(|x| x.iter().copied().collect())
        .map_err(|e| GeochemError::InvalidDatabase(format!("log10K fit failed: {e}")))
}

impl Log10KInterpolator {
    /// Fits `values`, tabulated at `temperatures` [C], with `model`.
    pub fn fit(model: Log10KModel, temperatures: &[f64], values: &[f64]) -> GeochemResult<Self> {
        if temperatures.len() != values.len() {
            return Err(GeochemError::SizeMismatch {
                what: "log10K values",
                expected: temperatures.len(),
                got: values.len(),
            });
        }
        match (temperatures.len(), values.first()) {
            (0, _) | (_, None) => {
                return Err(GeochemError::InsufficientTemperatures { model: "any", needed: 1, got: 0 })
            }
            (1, Some(v)) => return Ok(Self::Constant(*v)),
            _ => {}
        }

        match model {
            Log10KModel::PiecewiseLinear => {
                let mut pairs: Vec<(f64, f64)> = temperatures.iter().copied().zip(values.iter().copied()).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                Ok(Self::PiecewiseLinear {
                    temperatures: pairs.iter().map(|p| p.0).collect(),
                    values: pairs.iter().map(|p| p.1).collect(),
                })
            }
            Log10KModel::FourthOrder => {
                let degree = (temperatures.len() - 1).min(4);
                let coeffs =
                    least_squares(temperatures, values, degree + 1, |t| [1.0, t, t * t, t * t * t, t * t * t * t])?;
                Ok(Self::Polynomial(coeffs))
            }
            Log10KModel::MaierKelly => {
                if temperatures.len() < 5 {
                    return Err(GeochemError::InsufficientTemperatures {
                        model: "Maier-Kelly",
                        needed: 5,
                        got: temperatures.len(),
                    });
                }
                let c = least_squares(temperatures, values, 5, maier_kelly_basis)?;
                Ok(Self::MaierKelly([c[0], c[1], c[2], c[3], c[4]]))
            }
        }
    }

    /// log10K at temperature `t` [C].
    pub fn sample(&self, t: f64) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::PiecewiseLinear { temperatures, values } => {
                let last = temperatures.len() - 1;
                if t <= temperatures[0] {
                    return values[0];
                }
                if t >= temperatures[last] {
                    return values[last];
                }
                let k = temperatures.partition_point(|&x| x <= t).max(1);
                let (t0, t1) = (temperatures[k - 1], temperatures[k]);
                let w = (t - t0) / (t1 - t0);
                values[k - 1] + w * (values[k] - values[k - 1])
            }
            Self::Polynomial(c) => c.iter().rev().fold(0.0, |acc, ci| acc * t + ci),
            Self::MaierKelly(c) => {
                let basis = maier_kelly_basis(t);
                c.iter().zip(basis.iter()).map(|(a, b)| a * b).sum()
            }
        }
    }
}

/// Every row of a log10K table, fitted once and sampled at any temperature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Log10KTable {
    rows: Vec<Log10KInterpolator>,
}

impl Log10KTable {
    /// Fits each row of `table`, whose columns are tabulated at `temperatures` [C].
    pub fn fit(model: Log10KModel, temperatures: &[f64], table: &DMatrix<f64>) -> GeochemResult<Self> {
        let rows: Vec<Log10KInterpolator> = table
            .row_iter()
            .map(|row| {
                let values: Vec<f64> = row.iter().copied().collect();
                Log10KInterpolator::fit(model, temperatures, &values)
            })
            .collect::<GeochemResult<_>>()?;
        Ok(Log10KTable { rows })
    }

    pub fn push(&mut self, row: Log10KInterpolator) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// log10K of every row at temperature `t` [C].
    pub fn sample(&self, t: f64) -> Vec<f64> {
        self.rows.iter().map(|r| r.sample(t)).collect()
    }
}
