//! Covariance estimation.

use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use num_complex::Complex;

/// Biased sample covariance `y · yᴴ / snapshots` of a `sensors × snapshots`
/// observation matrix.
///
/// ```
/// use ndarray::array;
/// use num_complex::Complex;
///
/// let y = array![[Complex::new(1., 0.), Complex::new(-1., 0.)]];
/// let r = doa::cov::sample_covariance(&y);
/// assert_eq!(r[[0, 0]], Complex::new(1., 0.));
/// ```
pub fn sample_covariance<S>(y: &ArrayBase<S, Ix2>) -> Array2<Complex<f64>>
where
    S: Data<Elem = Complex<f64>>,
{
    let n = y.ncols() as f64;
    let yh = y.t().mapv(|z| z.conj());
    let mut r = y.dot(&yh);
    r.mapv_inplace(|z| z / n);
    hermitize(&mut r);
    r
}

/// Covariance filled one sensor pair at a time.
///
/// `traces(m, l)` returns the noisy traces of sensors `m` and `l`
/// (`l >= m`). Off-diagonal entries are `mean(x_m · conj(x_l))` and are
/// mirrored into the lower triangle. Diagonal entries are `mean(|x_m|²)`.
pub fn pairwise<F>(sensors: usize, mut traces: F) -> Array2<Complex<f64>>
where
    F: FnMut(usize, usize) -> (Array1<Complex<f64>>, Array1<Complex<f64>>),
{
    let mut r = Array2::zeros((sensors, sensors));

    for m in 0..sensors {
        for l in m..sensors {
            let (xm, xl) = traces(m, l);
            let n = xm.len() as f64;

            if l == m {
                let p = xm.iter().map(|z| z.norm_sqr()).sum::<f64>() / n;
                r[[m, m]] = Complex::new(p, 0.);
            } else {
                let c = xm
                    .iter()
                    .zip(&xl)
                    .map(|(a, b)| a * b.conj())
                    .sum::<Complex<f64>>()
                    / n;
                r[[m, l]] = c;
                r[[l, m]] = c.conj();
            }
        }
    }

    r
}

/// Forces exact conjugate symmetry: `r ← (r + rᴴ) / 2`.
pub fn hermitize(r: &mut Array2<Complex<f64>>) {
    let n = r.nrows();
    debug_assert_eq!(n, r.ncols(), "covariance must be square");

    for i in 0..n {
        r[[i, i]].im = 0.;
        for j in (i + 1)..n {
            let avg = (r[[i, j]] + r[[j, i]].conj()) * 0.5;
            r[[i, j]] = avg;
            r[[j, i]] = avg.conj();
        }
    }
}
