//! QPSK symbol source.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

use ndarray::Array1;
use num_complex::Complex;
use rand::Rng;

/// The four unit-magnitude points at odd multiples of 45°.
pub const CONSTELLATION: [Complex<f64>; 4] = [
    Complex::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    Complex::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    Complex::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    Complex::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// Draws `n` symbols uniformly, with replacement, from [`CONSTELLATION`].
///
/// ```
/// use rand::SeedableRng;
///
/// let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
/// let s = doa::qpsk::symbols(16, &mut rng);
/// assert_eq!(s.len(), 16);
/// assert!(s.iter().all(|z| (z.norm() - 1.).abs() < 1e-12));
/// ```
pub fn symbols<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Array1<Complex<f64>> {
    Array1::from_shape_simple_fn(n, || CONSTELLATION[rng.gen_range(0..CONSTELLATION.len())])
}

/// Phase of constellation point `k`, in radians.
pub fn phase(k: usize) -> f64 {
    FRAC_PI_4 * (2 * k + 1) as f64
}
