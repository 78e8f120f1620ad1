//! Eigendecomposition of the covariance and the noise subspace.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use tracing::warn;

use crate::Error;

/// Relative tolerance below which a negative eigenvalue is reported as a
/// degenerate (not positive semi-definite) covariance.
const PSD_TOLERANCE: f64 = 1e-9;

/// Eigenpairs of a Hermitian covariance, ascending by magnitude.
#[derive(Debug, Clone)]
pub struct Eigen {
    /// Eigenvalues, `|λ₀| <= |λ₁| <= …`.
    pub values: Array1<f64>,
    /// Unit eigenvectors as columns, in the order of [`Eigen::values`].
    pub vectors: Array2<Complex<f64>>,
}

impl Eigen {
    /// Decomposes a Hermitian matrix. Only the lower triangle is read.
    ///
    /// Stable order is kept for eigenvalues of equal magnitude.
    pub fn of(r: &Array2<Complex<f64>>) -> Self {
        let n = r.nrows();
        let m = DMatrix::from_fn(n, n, |i, j| r[[i, j]]);
        let eig = m.symmetric_eigen();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[a].abs().total_cmp(&eig.eigenvalues[b].abs()));

        let values = order.iter().map(|&k| eig.eigenvalues[k]).collect();
        let vectors = Array2::from_shape_fn((n, n), |(i, j)| eig.eigenvectors[(i, order[j])]);

        Self { values, vectors }
    }

    /// Whether the decomposed matrix is positive semi-definite up to a small
    /// tolerance relative to its largest eigenvalue.
    pub fn is_positive_semidefinite(&self) -> bool {
        let scale = self.values.iter().fold(0f64, |acc, v| acc.max(v.abs()));
        self.values.iter().all(|&v| v >= -PSD_TOLERANCE * scale)
    }
}

/// Orthonormal basis of the noise subspace, `sensors × (sensors − sources)`.
#[derive(Debug, Clone)]
pub struct NoiseSubspace {
    basis: Array2<Complex<f64>>,
}

impl NoiseSubspace {
    /// Takes the eigenvectors of the `sensors − sources` smallest-magnitude
    /// eigenvalues of `r`.
    ///
    /// A covariance that is not positive semi-definite is still decomposed,
    /// but a warning is logged.
    ///
    /// # Errors
    ///
    /// [`Error::NoSources`] if `sources` is zero, [`Error::InvalidGeometry`]
    /// if `sources >= sensors`.
    pub fn estimate(r: &Array2<Complex<f64>>, sources: usize) -> crate::Result<Self> {
        let sensors = r.nrows();
        check_geometry(sensors, sources)?;

        let eigen = Eigen::of(r);
        if !eigen.is_positive_semidefinite() {
            warn!(values = ?eigen.values, "degenerate covariance: not positive semi-definite");
        }

        Ok(Self::from_eigen(&eigen, sources))
    }

    fn from_eigen(eigen: &Eigen, sources: usize) -> Self {
        let dim = eigen.values.len() - sources;
        Self {
            basis: eigen.vectors.slice(ndarray::s![.., ..dim]).to_owned(),
        }
    }

    pub fn basis(&self) -> &Array2<Complex<f64>> {
        &self.basis
    }

    pub fn dim(&self) -> usize {
        self.basis.ncols()
    }

    /// MUSIC denominator `wᴴ·V·Vᴴ·w = ‖Vᴴ·w‖²`.
    pub fn projection(&self, w: &Array1<Complex<f64>>) -> f64 {
        self.basis
            .columns()
            .into_iter()
            .map(|v| {
                v.iter()
                    .zip(w)
                    .map(|(v, w)| v.conj() * w)
                    .sum::<Complex<f64>>()
                    .norm_sqr()
            })
            .sum()
    }
}

/// Fails unless `sensors > sources > 0`.
pub fn check_geometry(sensors: usize, sources: usize) -> crate::Result<()> {
    if sensors == 0 {
        return Err(Error::NoSensors);
    }
    if sources == 0 {
        return Err(Error::NoSources);
    }
    if sources >= sensors {
        return Err(Error::InvalidGeometry { sensors, sources });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    #[test]
    fn eigenvalues_sorted_by_magnitude() {
        let r = array![
            [c(3., 0.), c(0., 0.), c(0., 0.)],
            [c(0., 0.), c(-1., 0.), c(0., 0.)],
            [c(0., 0.), c(0., 0.), c(2., 0.)],
        ];
        let e = Eigen::of(&r);

        assert_eq!(e.values.len(), 3);
        assert!((e.values[0] + 1.).abs() < 1e-12);
        assert!((e.values[1] - 2.).abs() < 1e-12);
        assert!((e.values[2] - 3.).abs() < 1e-12);
        assert!(!e.is_positive_semidefinite());
    }

    #[test]
    fn eigenvectors_satisfy_definition() {
        let r = array![[c(2., 0.), c(0., 1.)], [c(0., -1.), c(2., 0.)]];
        let e = Eigen::of(&r);

        assert!((e.values[0] - 1.).abs() < 1e-12);
        assert!((e.values[1] - 3.).abs() < 1e-12);
        for k in 0..2 {
            let v = e.vectors.column(k);
            let rv = r.dot(&v);
            for (a, b) in rv.iter().zip(v.iter()) {
                assert!((a - *b * e.values[k]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn noise_subspace_is_orthogonal_to_source() {
        // rank-one covariance a·aᴴ plus a little white noise
        let a = array![c(1., 0.), c(0., 1.), c(-1., 0.), c(0., -1.)];
        let r = Array2::from_shape_fn((4, 4), |(i, j)| {
            a[i] * a[j].conj() + if i == j { c(0.01, 0.) } else { c(0., 0.) }
        });

        let noise = NoiseSubspace::estimate(&r, 1).unwrap();
        assert_eq!(noise.dim(), 3);
        assert!(noise.projection(&a) < 1e-20);

        let v = noise.basis();
        let gram = v.t().mapv(|z| z.conj()).dot(v);
        for ((i, j), z) in gram.indexed_iter() {
            let expected = if i == j { 1. } else { 0. };
            assert!((z - c(expected, 0.)).norm() < 1e-12, "({i}, {j}): {z}");
        }

        let b = array![c(1., 0.), c(1., 0.), c(1., 0.), c(1., 0.)];
        assert!(noise.projection(&b) > 0.1);
    }

    #[test]
    fn too_many_sources_is_rejected() {
        let r = Array2::<Complex<f64>>::eye(3);
        assert_eq!(
            NoiseSubspace::estimate(&r, 3).unwrap_err(),
            Error::InvalidGeometry {
                sensors: 3,
                sources: 3
            }
        );
        assert_eq!(check_geometry(0, 0).unwrap_err(), Error::NoSensors);
        assert_eq!(
            NoiseSubspace::estimate(&r, 0).unwrap_err(),
            Error::NoSources
        );
    }
}
