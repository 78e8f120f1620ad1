//! Snapshot synthesis: symbols through an array response plus complex
//! Gaussian noise.

use std::f64::consts::SQRT_2;

use ndarray::{Array2, ArrayBase, DataMut, Dimension};
use num_complex::Complex;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::qpsk;

/// How an SNR in dB is turned into a noise standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseScaling {
    /// σ = 10^(−SNR/20). Noise power equals 10^(−SNR/10) for unit-power
    /// sources.
    #[default]
    Amplitude,
    /// σ = 10^(−SNR/10).
    Power,
}

/// Circularly-symmetric complex Gaussian noise.
///
/// Each of the real and imaginary parts has standard deviation σ/√2,
/// so a sample has variance σ².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Noise {
    sigma: f64,
}

impl Noise {
    /// Noise for a given SNR. An infinite SNR gives silence.
    ///
    /// ```
    /// use doa::synth::{Noise, NoiseScaling};
    ///
    /// assert!((Noise::from_snr(20., NoiseScaling::Amplitude).sigma() - 0.1).abs() < 1e-15);
    /// assert!((Noise::from_snr(20., NoiseScaling::Power).sigma() - 0.01).abs() < 1e-15);
    /// assert_eq!(Noise::from_snr(f64::INFINITY, NoiseScaling::Amplitude).sigma(), 0.);
    /// ```
    pub fn from_snr(snr_db: f64, scaling: NoiseScaling) -> Self {
        let exponent = match scaling {
            NoiseScaling::Amplitude => -snr_db / 20.,
            NoiseScaling::Power => -snr_db / 10.,
        };

        Self {
            sigma: 10f64.powf(exponent),
        }
    }

    pub const fn silent() -> Self {
        Self { sigma: 0. }
    }

    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Complex<f64> {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        Complex::new(re, im) * (self.sigma / SQRT_2)
    }

    /// Adds independent noise to every element of `x`.
    pub fn add_to<S, D, R>(&self, x: &mut ArrayBase<S, D>, rng: &mut R)
    where
        S: DataMut<Elem = Complex<f64>>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        if self.sigma == 0. {
            return;
        }

        x.map_inplace(|z| *z += self.sample(rng));
    }
}

/// Independent QPSK streams, one row per source.
pub fn signals<R: Rng + ?Sized>(
    sources: usize,
    snapshots: usize,
    rng: &mut R,
) -> Array2<Complex<f64>> {
    let mut s = Array2::zeros((sources, snapshots));
    for mut row in s.rows_mut() {
        row.assign(&qpsk::symbols(snapshots, rng));
    }
    s
}

/// Noisy sensor observations `response · s + n` for fresh symbols `s`.
///
/// `response` is `sensors × sources` (steering vectors as columns, already
/// including any coupling). The result is `sensors × snapshots`.
pub fn observe<R: Rng + ?Sized>(
    response: &Array2<Complex<f64>>,
    snapshots: usize,
    noise: Noise,
    rng: &mut R,
) -> Array2<Complex<f64>> {
    let s = signals(response.ncols(), snapshots, rng);
    let mut y = response.dot(&s);
    noise.add_to(&mut y, rng);
    y
}
