//! Array geometries and their coupling behaviour.
//!
//! Both arrays implement [`ArrayModel`]: they provide the steering vector
//! used to scan the MUSIC spectrum and know how to produce one trial's
//! covariance estimate for a set of true angles.

use std::f64::consts::{PI, TAU};

use ndarray::{Array1, Array2, Axis};
use num_complex::Complex;
use rand::Rng;
use uom::si::{
    f64::{Frequency, Length, Velocity},
    ratio::ratio,
    velocity::meter_per_second,
};

use crate::{
    cov,
    synth::{self, Noise},
};

/// Speed of light in meters per second.
const C: f64 = 299_792_458.;

/// An array of sensors receiving narrowband plane waves.
pub trait ArrayModel: Sync {
    /// Number of sensors.
    fn sensors(&self) -> usize;

    /// Ideal (uncoupled) response to a plane wave from `theta` radians.
    fn steering(&self, theta: f64) -> Array1<Complex<f64>>;

    /// Covariance estimate for one trial with QPSK sources at `angles`
    /// (radians).
    fn covariance<R: Rng + ?Sized>(
        &self,
        angles: &[f64],
        snapshots: usize,
        noise: Noise,
        rng: &mut R,
    ) -> Array2<Complex<f64>>;

    /// Steering vectors of `angles` as columns, `sensors × angles.len()`.
    fn steering_matrix(&self, angles: &[f64]) -> Array2<Complex<f64>> {
        let mut a = Array2::zeros((self.sensors(), angles.len()));
        for (mut col, &theta) in a.columns_mut().into_iter().zip(angles) {
            col.assign(&self.steering(theta));
        }
        a
    }
}

/// Banded symmetric Toeplitz mutual coupling matrix.
///
/// With `B = min(sensors, bandwidth)` the first row is
/// `[1, c₁, …, c_B, 0, …]` where `c_l = (β / l)·exp(−2πl / (B + 1))`.
///
/// ```
/// let c = doa::array::coupling(4, 2, 0.);
/// assert_eq!(c, ndarray::Array2::eye(4));
/// ```
pub fn coupling(sensors: usize, bandwidth: usize, beta: f64) -> Array2<Complex<f64>> {
    let band = sensors.min(bandwidth);

    let mut coeffs = vec![Complex::new(0., 0.); sensors];
    for (l, c) in coeffs.iter_mut().enumerate().take(band + 1) {
        *c = if l == 0 {
            Complex::new(1., 0.)
        } else {
            let l = l as f64;
            Complex::new((beta / l) * (-TAU * l / (band as f64 + 1.)).exp(), 0.)
        };
    }

    Array2::from_shape_fn((sensors, sensors), |(i, j)| coeffs[i.abs_diff(j)])
}

/// Uniform linear array with banded mutual coupling.
#[derive(Debug, Clone)]
pub struct UniformLinear {
    sensors: usize,
    /// Element spacing in wavelengths.
    spacing: f64,
    coupling: Array2<Complex<f64>>,
}

impl UniformLinear {
    /// Half-wavelength array without coupling.
    pub fn new(sensors: usize) -> Self {
        Self {
            sensors,
            spacing: 0.5,
            coupling: Array2::eye(sensors),
        }
    }

    /// Element spacing in wavelengths.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// See [`coupling`].
    pub fn with_coupling(mut self, bandwidth: usize, beta: f64) -> Self {
        self.coupling = coupling(self.sensors, bandwidth, beta);
        self
    }

    pub fn coupling(&self) -> &Array2<Complex<f64>> {
        &self.coupling
    }

    /// Coupled response `C · A(angles)`.
    pub fn response(&self, angles: &[f64]) -> Array2<Complex<f64>> {
        self.coupling.dot(&self.steering_matrix(angles))
    }
}

impl ArrayModel for UniformLinear {
    fn sensors(&self) -> usize {
        self.sensors
    }

    /// `a_k(θ) = exp(−j·2π·d·k·sin θ)`.
    fn steering(&self, theta: f64) -> Array1<Complex<f64>> {
        let step = -TAU * self.spacing * theta.sin();
        Array1::from_shape_fn(self.sensors, |k| Complex::from_polar(1., step * k as f64))
    }

    fn covariance<R: Rng + ?Sized>(
        &self,
        angles: &[f64],
        snapshots: usize,
        noise: Noise,
        rng: &mut R,
    ) -> Array2<Complex<f64>> {
        let y = synth::observe(&self.response(angles), snapshots, noise, rng);
        cov::sample_covariance(&y)
    }
}

/// How the circular array's covariance entries are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairSynthesis {
    /// One symbol stream per source and one noisy trace per sensor per
    /// trial; every entry comes from the same traces.
    #[default]
    SharedTraces,
    /// Fresh symbols and noise for every sensor pair, so each entry is an
    /// independent estimate.
    PerPair,
}

/// Virtual uniform circular array.
///
/// Sensor `k` sits at azimuth `2πk / N` and sees a plane wave from `θ` with
/// phase `κ·cos(θ − 2πk / N)` where `κ = 2π·f_c·d / c`. The spacing `d` is
/// `c / (8·f_c·sin²(π / N))`.
#[derive(Debug, Clone)]
pub struct VirtualCircular {
    sensors: usize,
    carrier: Frequency,
    spacing: Length,
    synthesis: PairSynthesis,
}

impl VirtualCircular {
    pub fn new(sensors: usize, carrier: Frequency) -> Self {
        let c = Velocity::new::<meter_per_second>(C);
        let s = (PI / sensors as f64).sin();

        Self {
            sensors,
            carrier,
            spacing: c / (carrier * (8. * s * s)),
            synthesis: PairSynthesis::default(),
        }
    }

    pub fn with_synthesis(mut self, synthesis: PairSynthesis) -> Self {
        self.synthesis = synthesis;
        self
    }

    pub fn spacing(&self) -> Length {
        self.spacing
    }

    /// Phase scale `κ = 2π·f_c·d / c`, in radians.
    pub fn wavenumber(&self) -> f64 {
        let c = Velocity::new::<meter_per_second>(C);
        TAU * (self.carrier * self.spacing / c).get::<ratio>()
    }
}

impl ArrayModel for VirtualCircular {
    fn sensors(&self) -> usize {
        self.sensors
    }

    fn steering(&self, theta: f64) -> Array1<Complex<f64>> {
        let kappa = self.wavenumber();
        let n = self.sensors as f64;
        Array1::from_shape_fn(self.sensors, |k| {
            Complex::from_polar(1., kappa * (theta - TAU * k as f64 / n).cos())
        })
    }

    fn covariance<R: Rng + ?Sized>(
        &self,
        angles: &[f64],
        snapshots: usize,
        noise: Noise,
        rng: &mut R,
    ) -> Array2<Complex<f64>> {
        let a = self.steering_matrix(angles);

        match self.synthesis {
            PairSynthesis::SharedTraces => {
                cov::sample_covariance(&synth::observe(&a, snapshots, noise, rng))
            }
            PairSynthesis::PerPair => cov::pairwise(self.sensors, |m, l| {
                let y = synth::observe(&a.select(Axis(0), &[m, l]), snapshots, noise, rng);
                (y.row(0).to_owned(), y.row(1).to_owned())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uom::si::{frequency::megahertz, length::meter};

    use super::*;

    fn uca() -> VirtualCircular {
        VirtualCircular::new(12, Frequency::new::<megahertz>(39.))
    }

    #[test]
    fn coupling_is_banded_toeplitz() {
        let c = coupling(5, 2, 0.2);

        let c1 = 0.2 * (-TAU / 3.).exp();
        let c2 = 0.1 * (-2. * TAU / 3.).exp();
        assert_eq!(c[[0, 0]], Complex::new(1., 0.));
        assert!((c[[0, 1]].re - c1).abs() < 1e-15);
        assert!((c[[3, 1]].re - c2).abs() < 1e-15);
        assert_eq!(c[[0, 3]], Complex::new(0., 0.));
        assert_eq!(c[[4, 0]], Complex::new(0., 0.));

        for ((i, j), z) in c.indexed_iter() {
            assert_eq!(*z, c[[j, i]]);
            assert_eq!(*z, c[[0, i.abs_diff(j)]]);
        }
    }

    #[test]
    fn wide_coupling_band_is_clamped_to_array() {
        let c = coupling(3, 10, 0.5);
        assert_eq!(c.dim(), (3, 3));
        assert!(c[[0, 2]].re > 0.);
        assert!(c[[0, 1]].re > c[[0, 2]].re);
    }

    #[test]
    fn linear_steering_broadside_is_all_ones() {
        let a = UniformLinear::new(4).steering(0.);
        assert!(a.iter().all(|z| (z - Complex::new(1., 0.)).norm() < 1e-12));
    }

    #[test]
    fn linear_steering_half_wavelength_endfire() {
        // sin(90°) = 1 with d = λ/2: alternating signs
        let a = UniformLinear::new(4).steering(PI / 2.);
        for (k, z) in a.iter().enumerate() {
            let expected = if k % 2 == 0 { 1. } else { -1. };
            assert!((z.re - expected).abs() < 1e-12 && z.im.abs() < 1e-12);
        }
    }

    #[test]
    fn quarter_wavelength_endfire_steps_by_quarter_turn() {
        let a = UniformLinear::new(4).with_spacing(0.25).steering(PI / 2.);
        // exp(−j·π/2·k) = (−j)^k
        let mut expected = Complex::new(1., 0.);
        for z in a.iter() {
            assert!((z - expected).norm() < 1e-12, "{z} vs {expected}");
            expected *= Complex::new(0., -1.);
        }
    }

    #[test]
    fn coupling_shapes_linear_response() {
        let ula = UniformLinear::new(5).with_coupling(2, 0.2);
        assert_eq!(ula.coupling(), &coupling(5, 2, 0.2));

        let theta = 0.7;
        let response = ula.response(&[theta]);
        let expected = ula.coupling().dot(&ula.steering(theta));
        for (z, e) in response.column(0).iter().zip(&expected) {
            assert!((z - e).norm() < 1e-12);
        }
    }

    #[test]
    fn uncoupled_noiseless_covariance_is_ideal() {
        let ula = UniformLinear::new(4).with_coupling(3, 0.);
        assert_eq!(ula.coupling(), &Array2::<Complex<f64>>::eye(4));
        let theta = 0.3;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let r = ula.covariance(&[theta], 64, Noise::silent(), &mut rng);

        // unit-power source: R = a·aᴴ
        let a = ula.steering(theta);
        for ((i, j), z) in r.indexed_iter() {
            let ideal = a[i] * a[j].conj();
            assert!((z - ideal).norm() < 1e-12, "({i}, {j}): {z} vs {ideal}");
        }
    }

    #[test]
    fn circular_spacing_and_wavenumber() {
        let uca = uca();
        let s = (PI / 12.).sin();
        let d = C / (8. * 39e6 * s * s);
        assert!((uca.spacing().get::<meter>() - d).abs() < 1e-9);
        assert!((uca.wavenumber() - TAU / (8. * s * s)).abs() < 1e-9);
    }

    #[test]
    fn circular_steering_has_unit_gain() {
        let a = uca().steering(0.4);
        assert_eq!(a.len(), 12);
        assert!(a.iter().all(|z| (z.norm() - 1.).abs() < 1e-12));
    }

    #[test]
    fn circular_noiseless_diagonal_is_source_power() {
        for synthesis in [PairSynthesis::SharedTraces, PairSynthesis::PerPair] {
            let uca = uca().with_synthesis(synthesis);
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            let r = uca.covariance(&[0.2], 16, Noise::silent(), &mut rng);

            for k in 0..12 {
                assert!((r[[k, k]] - Complex::new(1., 0.)).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn per_pair_single_source_matches_steering_correlation() {
        let uca = uca().with_synthesis(PairSynthesis::PerPair);
        let theta = -0.5;
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let r = uca.covariance(&[theta], 8, Noise::silent(), &mut rng);

        let a = uca.steering(theta);
        for ((i, j), z) in r.indexed_iter() {
            let ideal = a[i] * a[j].conj();
            assert!((z - ideal).norm() < 1e-12, "({i}, {j})");
        }
    }
}
