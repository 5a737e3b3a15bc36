//! Dense symmetric eigen-decomposition (cyclic Jacobi)
//!
//! Matrices are row-major `n * n` slices. The whole decomposition runs as one
//! sequential unit; sample counts in QC are small enough that O(n^3) sweeps
//! are cheap compared to the distance stage.

use crate::error::{CountQcError, Result};

const MAX_SWEEPS: usize = 100;

/// Off-diagonal mass, relative to the Frobenius norm, below which the matrix
/// is treated as diagonal
const CONVERGENCE_TOL: f64 = 1e-30;

/// Eigenpairs sorted by eigenvalue, largest first
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    /// `vectors[k]` is the unit eigenvector for `values[k]`
    pub vectors: Vec<Vec<f64>>,
}

/// Decompose the symmetric matrix `a` (row-major, `n x n`)
pub fn symmetric_eigen(a: &[f64], n: usize) -> Result<SymmetricEigen> {
    if a.len() != n * n {
        return Err(CountQcError::schema(format!(
            "expected {} entries for a {}x{} matrix, got {}",
            n * n,
            n,
            n,
            a.len()
        )));
    }
    if a.iter().any(|x| !x.is_finite()) {
        return Err(CountQcError::NumericalInstability {
            operation: "eigen-decomposition".to_string(),
            details: "matrix contains non-finite values".to_string(),
        });
    }

    let mut a = a.to_vec();
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let norm: f64 = a.iter().map(|x| x * x).sum();
    let mut converged = false;

    for sweep in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p * n + q] * a[p * n + q])
            .sum();
        if off == 0.0 || off <= CONVERGENCE_TOL * norm {
            log::debug!("Jacobi converged after {} sweeps", sweep);
            converged = true;
            break;
        }

        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq == 0.0 {
                    continue;
                }
                // Rotation angle that zeroes a[p][q]
                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                a[p * n + q] = 0.0;
                a[q * n + p] = 0.0;

                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    if !converged {
        return Err(CountQcError::NumericalInstability {
            operation: "eigen-decomposition".to_string(),
            details: format!("Jacobi iteration did not converge in {} sweeps", MAX_SWEEPS),
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j * n + j].total_cmp(&a[i * n + i]));

    let values = order.iter().map(|&k| a[k * n + k]).collect();
    let vectors = order
        .iter()
        .map(|&k| (0..n).map(|i| v[i * n + k]).collect())
        .collect();

    Ok(SymmetricEigen { values, vectors })
}
