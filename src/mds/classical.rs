//! Classical (Torgerson) multidimensional scaling
//!
//! Squared distances are double-centered into a Gram matrix whose leading
//! eigenvectors, scaled by the square roots of their eigenvalues, give the
//! sample coordinates.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

use super::eigen::symmetric_eigen;
use crate::distance::DistanceMatrix;
use crate::error::{CountQcError, Result};

/// Parameters for [`embed`]
#[derive(Debug, Clone)]
pub struct MdsParams {
    /// Number of embedding dimensions
    pub dimensions: usize,
    /// Eigenvalues below `-tolerance * max(1, max |eigenvalue|)` count as
    /// negative rather than as rounding noise
    pub tolerance: f64,
}

impl Default for MdsParams {
    fn default() -> Self {
        Self {
            dimensions: 2,
            tolerance: 1e-8,
        }
    }
}

/// Sample coordinates from classical MDS.
///
/// Axes are only defined up to rotation and reflection. Each axis is
/// oriented so its largest-magnitude coordinate is positive, which makes
/// output reproducible for identical input but not comparable across
/// different inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    /// Samples x dimensions
    #[serde(serialize_with = "serialize_rows")]
    coordinates: Array2<f64>,
    /// Eigenvalue behind each axis, largest first
    eigenvalues: Vec<f64>,
    /// Share of the total positive eigenvalue mass captured by each axis
    proportion_explained: Vec<f64>,
    sample_ids: Vec<String>,
}

fn serialize_rows<S: serde::Serializer>(
    coordinates: &Array2<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let rows: Vec<Vec<f64>> = coordinates.outer_iter().map(|row| row.to_vec()).collect();
    rows.serialize(serializer)
}

impl EmbeddingResult {
    pub fn coordinates(&self) -> ArrayView2<'_, f64> {
        self.coordinates.view()
    }

    /// Coordinates of one sample
    pub fn sample(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.coordinates.row(sample_idx)
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn proportion_explained(&self) -> &[f64] {
        &self.proportion_explained
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn dimensions(&self) -> usize {
        self.coordinates.ncols()
    }
}

/// Gram matrix B = -1/2 * J D^2 J of a symmetric distance matrix, row-major.
///
/// With D^2 symmetric its row and column means coincide, so one mean per
/// sample centers both ways.
fn gram_matrix(distances: ArrayView2<'_, f64>) -> Vec<f64> {
    let n = distances.nrows();
    let squared = distances.mapv(|d| d * d);
    let means = squared.sum_axis(Axis(1)) / n as f64;
    let overall = means.sum() / n as f64;

    squared
        .indexed_iter()
        .map(|((i, j), &sq)| -0.5 * (sq - (means[i] + means[j]) + overall))
        .collect()
}

/// Embed samples in `params.dimensions` dimensions by classical scaling.
///
/// Fails with `NegativeEigenvalue` if any requested axis has a clearly
/// negative eigenvalue, i.e. the distances do not fit in that many real
/// dimensions. Such axes are never silently clamped.
pub fn embed(distances: &DistanceMatrix, params: &MdsParams) -> Result<EmbeddingResult> {
    let n = distances.n_samples();
    if params.dimensions == 0 || params.dimensions > n {
        return Err(CountQcError::invalid_parameter(
            "dimensions",
            format!(
                "must be between 1 and the number of samples ({}), got {}",
                n, params.dimensions
            ),
        ));
    }
    if !(params.tolerance >= 0.0 && params.tolerance.is_finite()) {
        return Err(CountQcError::invalid_parameter(
            "tolerance",
            format!("must be a non-negative finite number, got {}", params.tolerance),
        ));
    }

    let gram = gram_matrix(distances.values());

    let eig = symmetric_eigen(&gram, n)?;

    let max_abs = eig.values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = params.tolerance * max_abs.max(1.0);

    for (k, &lambda) in eig.values.iter().take(params.dimensions).enumerate() {
        if lambda < -tol {
            return Err(CountQcError::NegativeEigenvalue {
                dimension: k + 1,
                eigenvalue: lambda,
            });
        }
    }

    let total_positive: f64 = eig.values.iter().filter(|&&v| v > tol).sum();

    let mut coordinates = Array2::zeros((n, params.dimensions));
    let mut proportion_explained = Vec::with_capacity(params.dimensions);
    for k in 0..params.dimensions {
        let lambda = eig.values[k];
        let scale = lambda.max(0.0).sqrt();
        let vector = &eig.vectors[k];

        // Orient the axis so its dominant component is positive
        let dominant = vector
            .iter()
            .copied()
            .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
        let sign = if dominant < 0.0 { -1.0 } else { 1.0 };

        for i in 0..n {
            coordinates[[i, k]] = sign * vector[i] * scale;
        }
        proportion_explained.push(if total_positive > 0.0 && lambda > tol {
            lambda / total_positive
        } else {
            0.0
        });
    }

    log::info!(
        "MDS: {} samples embedded in {} dimensions; eigenvalues {:?}",
        n,
        params.dimensions,
        &eig.values[..params.dimensions]
    );

    Ok(EmbeddingResult {
        coordinates,
        eigenvalues: eig.values[..params.dimensions].to_vec(),
        proportion_explained,
        sample_ids: distances.sample_ids().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{}", i)).collect()
    }

    fn euclidean(points: &[[f64; 2]]) -> Array2<f64> {
        let n = points.len();
        Array2::from_shape_fn((n, n), |(i, j)| {
            ((points[i][0] - points[j][0]).powi(2) + (points[i][1] - points[j][1]).powi(2)).sqrt()
        })
    }

    fn embedded_distance(e: &EmbeddingResult, i: usize, j: usize) -> f64 {
        e.sample(i)
            .iter()
            .zip(e.sample(j).iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_recovers_planar_configuration() {
        let points = [[0.0, 0.0], [3.0, 0.0], [0.0, 4.0], [3.0, 4.0]];
        let d = DistanceMatrix::from_values(ids(4), euclidean(&points)).unwrap();
        let e = embed(&d, &MdsParams::default()).unwrap();

        assert_eq!(e.coordinates().dim(), (4, 2));
        assert!((e.eigenvalues()[0] - 16.0).abs() < 1e-9);
        assert!((e.eigenvalues()[1] - 9.0).abs() < 1e-9);
        for i in 0..4 {
            for j in 0..4 {
                assert!((embedded_distance(&e, i, j) - d.get(i, j)).abs() < 1e-9);
            }
        }
        let total: f64 = e.proportion_explained().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_dimensions_match_request() {
        let points = [[0.0, 0.0], [1.0, 0.5], [2.0, 3.0], [4.0, 1.0], [0.5, 2.5]];
        let d = DistanceMatrix::from_values(ids(5), euclidean(&points)).unwrap();
        for k in 1..=3 {
            let e = embed(&d, &MdsParams { dimensions: k, tolerance: 1e-8 }).unwrap();
            assert_eq!(e.dimensions(), k);
            assert_eq!(e.coordinates().nrows(), 5);
            assert_eq!(e.eigenvalues().len(), k);
        }
    }

    #[test]
    fn test_permuted_samples_permute_rows() {
        let points = [[0.0, 0.0], [4.0, 0.0], [0.0, 1.0], [5.0, 2.0], [1.0, 3.5]];
        let perm = [3, 0, 4, 2, 1];
        let permuted: Vec<[f64; 2]> = perm.iter().map(|&p| points[p]).collect();

        let e = embed(
            &DistanceMatrix::from_values(ids(5), euclidean(&points)).unwrap(),
            &MdsParams::default(),
        )
        .unwrap();
        let ep = embed(
            &DistanceMatrix::from_values(ids(5), euclidean(&permuted)).unwrap(),
            &MdsParams::default(),
        )
        .unwrap();

        for k in 0..2 {
            // Same axis up to reflection
            let (moved, original) = (ep.coordinates(), e.coordinates());
            let same = perm
                .iter()
                .enumerate()
                .all(|(row, &p)| (moved[[row, k]] - original[[p, k]]).abs() < 1e-8);
            let flipped = perm
                .iter()
                .enumerate()
                .all(|(row, &p)| (moved[[row, k]] + original[[p, k]]).abs() < 1e-8);
            assert!(same || flipped, "axis {} is not a row permutation", k);
        }
    }

    #[test]
    fn test_negative_eigenvalue_reported() {
        // Star: a centre 1 away from three leaves that are 2 apart. Not Euclidean.
        let star = array![
            [0.0, 1.0, 1.0, 1.0],
            [1.0, 0.0, 2.0, 2.0],
            [1.0, 2.0, 0.0, 2.0],
            [1.0, 2.0, 2.0, 0.0],
        ];
        let d = DistanceMatrix::from_values(ids(4), star).unwrap();

        let e = embed(&d, &MdsParams { dimensions: 3, tolerance: 1e-8 }).unwrap();
        assert!((e.eigenvalues()[0] - 2.0).abs() < 1e-9);
        assert!(e.eigenvalues()[2].abs() < 1e-9);

        match embed(&d, &MdsParams { dimensions: 4, tolerance: 1e-8 }) {
            Err(CountQcError::NegativeEigenvalue { dimension, eigenvalue }) => {
                assert_eq!(dimension, 4);
                assert!((eigenvalue + 0.25).abs() < 1e-9);
            }
            other => panic!("expected NegativeEigenvalue, got {:?}", other),
        }
    }

    #[test]
    fn test_triangle_violation_in_third_dimension() {
        let violation = array![[0.0, 1.0, 3.0], [1.0, 0.0, 1.0], [3.0, 1.0, 0.0]];
        let d = DistanceMatrix::from_values(ids(3), violation).unwrap();
        assert!(embed(&d, &MdsParams::default()).is_ok());
        assert!(matches!(
            embed(&d, &MdsParams { dimensions: 3, tolerance: 1e-8 }),
            Err(CountQcError::NegativeEigenvalue { dimension: 3, .. })
        ));
    }

    #[test]
    fn test_invalid_dimensions() {
        let d = DistanceMatrix::from_values(ids(2), array![[0.0, 1.0], [1.0, 0.0]]).unwrap();
        for dimensions in [0, 3] {
            assert!(matches!(
                embed(&d, &MdsParams { dimensions, tolerance: 1e-8 }),
                Err(CountQcError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_gram_matrix_is_centered_inner_product() {
        let points = [[1.0, 0.0], [3.0, 1.0], [2.0, 5.0]];
        let gram = gram_matrix(euclidean(&points).view());

        let centroid = [2.0, 2.0];
        for i in 0..3 {
            for j in 0..3 {
                let expected = (points[i][0] - centroid[0]) * (points[j][0] - centroid[0])
                    + (points[i][1] - centroid[1]) * (points[j][1] - centroid[1]);
                assert!((gram[i * 3 + j] - expected).abs() < 1e-10, "B[{}][{}]", i, j);
            }
            let row_sum: f64 = gram[i * 3..(i + 1) * 3].iter().sum();
            assert!(row_sum.abs() < 1e-10);
        }
    }
}
