//! Monte Carlo evaluation of the estimator.
//!
//! Every trial owns a ChaCha stream derived from the run seed, the SNR
//! batch and the trial index, so trials run in parallel and the results
//! depend only on the configuration.

use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, info_span, instrument};
use uom::si::{f64::Frequency, frequency::megahertz};

use crate::{
    array::{ArrayModel, PairSynthesis, UniformLinear, VirtualCircular},
    metric::{self, Rmse},
    music::{Grid, Spectrum},
    peaks::{self, Criteria},
    subspace::{self, NoiseSubspace},
    synth::{Noise, NoiseScaling},
    Error,
};

/// True angles of the virtual-array scenario, in degrees.
pub const TRUE_ANGLES: [f64; 8] = [-60., -45., -30., 0., 15., 30., 45., 60.];

/// Detection probability of a single source under mutual coupling.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    pub sensors: usize,
    pub snapshots: usize,
    /// Lowest SNR of the sweep, in dB.
    pub snr_low: i32,
    /// Highest SNR of the sweep, in dB. Included.
    pub snr_high: i32,
    /// Direction of the source, in degrees.
    pub true_angle: f64,
    /// Coupling bandwidth (number of coupled neighbours).
    pub coupling_bandwidth: usize,
    /// Coupling strength β.
    pub coupling_beta: f64,
    /// Trials per SNR value.
    pub trials: usize,
    /// Detection tolerance, in degrees.
    pub tolerance: f64,
    /// Run every SNR value without noise.
    pub noiseless: bool,
    pub noise_scaling: NoiseScaling,
    pub grid: Grid,
    pub criteria: Criteria,
    pub seed: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            sensors: 5,
            snapshots: 100,
            snr_low: -10,
            snr_high: 0,
            true_angle: 10.,
            coupling_bandwidth: 4,
            coupling_beta: 0.01,
            trials: 10,
            tolerance: metric::DEFAULT_TOLERANCE,
            noiseless: false,
            noise_scaling: NoiseScaling::Amplitude,
            grid: Grid::default(),
            criteria: Criteria::coupling(),
            seed: 0,
        }
    }
}

/// Detection ratio per SNR value.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub snr: Vec<i32>,
    pub ratio: Vec<f64>,
}

/// RMSE of a circular virtual array resolving several sources at once.
#[derive(Debug, Clone)]
pub struct VirtualArrayConfig {
    pub sensors: usize,
    /// Source directions, in degrees. Also the number of expected sources.
    pub true_angles: Vec<f64>,
    pub snapshots: usize,
    /// SNR in dB.
    pub snr: f64,
    pub trials: usize,
    pub carrier: Frequency,
    pub synthesis: PairSynthesis,
    pub noise_scaling: NoiseScaling,
    pub grid: Grid,
    pub criteria: Criteria,
    pub seed: u64,
}

impl Default for VirtualArrayConfig {
    fn default() -> Self {
        Self {
            sensors: 12,
            true_angles: TRUE_ANGLES.to_vec(),
            snapshots: 2000,
            snr: 20.,
            trials: 10,
            carrier: Frequency::new::<megahertz>(39.),
            synthesis: PairSynthesis::default(),
            noise_scaling: NoiseScaling::Power,
            grid: Grid::default(),
            criteria: Criteria::virtual_array(),
            seed: 0,
        }
    }
}

impl VirtualArrayConfig {
    /// Keeps the first `sources` entries of [`TRUE_ANGLES`].
    pub fn with_sources(mut self, sources: usize) -> crate::Result<Self> {
        if sources > TRUE_ANGLES.len() {
            return Err(Error::TooManySources {
                requested: sources,
                available: TRUE_ANGLES.len(),
            });
        }
        self.true_angles = TRUE_ANGLES[..sources].to_vec();
        Ok(self)
    }
}

/// Outcome of [`virtual_array_resolve`].
#[derive(Debug, Clone)]
pub struct VirtualArrayRun {
    /// Grid angles, in degrees.
    pub angles: Array1<f64>,
    /// Normalized spectrum of the last trial, in dB.
    pub spectrum: Array1<f64>,
    /// NaN if no trial detected enough angles.
    pub rmse: f64,
}

/// RMSE per SNR value.
#[derive(Debug, Clone, PartialEq)]
pub struct RmseSweep {
    pub snr: Vec<i32>,
    pub rmse: Vec<f64>,
}

/// What stays fixed across the trials of a run.
struct Scenario<'a, A> {
    array: &'a A,
    /// Radians.
    truth: Vec<f64>,
    sources: usize,
    snapshots: usize,
    grid: Grid,
    criteria: Criteria,
    seed: u64,
    trials: usize,
}

impl<A: ArrayModel> Scenario<'_, A> {
    fn rng(&self, batch: usize, trial: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream((batch * self.trials + trial) as u64);
        rng
    }

    /// One trial: estimated angles (degrees, ascending) and the spectrum
    /// they came from.
    fn trial(&self, noise: Noise, batch: usize, trial: usize) -> crate::Result<(Vec<f64>, Spectrum)> {
        let mut rng = self.rng(batch, trial);

        let r = self
            .array
            .covariance(&self.truth, self.snapshots, noise, &mut rng);
        let subspace = NoiseSubspace::estimate(&r, self.sources)?;
        let spectrum = Spectrum::scan(self.array, &subspace, self.grid);
        let angles = peaks::estimate(&spectrum, &self.criteria, self.sources);

        debug!(trial, ?angles, "trial done");
        Ok((angles, spectrum))
    }

    /// Runs every trial of a batch in parallel, results in trial order.
    fn batch<T, F>(&self, noise: Noise, batch: usize, score: F) -> crate::Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, Vec<f64>, Spectrum) -> T + Sync,
    {
        (0..self.trials)
            .into_par_iter()
            .map(|t| {
                let (angles, spectrum) = self.trial(noise, batch, t)?;
                Ok(score(t, angles, spectrum))
            })
            .collect()
    }
}

fn check_counts(snapshots: usize, trials: usize) -> crate::Result<()> {
    if snapshots == 0 {
        return Err(Error::NoSnapshots);
    }
    if trials == 0 {
        return Err(Error::NoTrials);
    }
    Ok(())
}

fn snr_range(low: i32, high: i32) -> crate::Result<Vec<i32>> {
    if low > high {
        return Err(Error::EmptySnrRange { low, high });
    }
    Ok((low..=high).collect())
}

/// Detection probability of MUSIC against SNR for one source seen by a
/// uniform linear array with banded mutual coupling.
///
/// A trial counts as a detection when the estimated angle lies within the
/// tolerance of the true one.
///
/// ```
/// let config = doa::ResolveConfig {
///     snr_low: -2,
///     snr_high: 0,
///     trials: 4,
///     ..Default::default()
/// };
/// let detection = doa::resolve(&config).unwrap();
/// assert_eq!(detection.snr, vec![-2, -1, 0]);
/// assert!(detection.ratio.iter().all(|r| (0. ..=1.).contains(r)));
/// ```
#[instrument(skip_all, fields(sensors = config.sensors, angle = config.true_angle))]
pub fn resolve(config: &ResolveConfig) -> crate::Result<Detection> {
    let truth = [config.true_angle];
    subspace::check_geometry(config.sensors, truth.len())?;
    check_counts(config.snapshots, config.trials)?;
    let snr = snr_range(config.snr_low, config.snr_high)?;

    let array = UniformLinear::new(config.sensors)
        .with_coupling(config.coupling_bandwidth, config.coupling_beta);
    let scenario = Scenario {
        array: &array,
        truth: truth.iter().map(|d| d.to_radians()).collect(),
        sources: truth.len(),
        snapshots: config.snapshots,
        grid: config.grid,
        criteria: config.criteria,
        seed: config.seed,
        trials: config.trials,
    };

    let mut ratio = Vec::with_capacity(snr.len());
    for (batch, &snr_db) in snr.iter().enumerate() {
        let _span = info_span!("snr", snr = snr_db, trials = config.trials).entered();

        let noise = if config.noiseless {
            Noise::silent()
        } else {
            Noise::from_snr(snr_db as f64, config.noise_scaling)
        };
        let scores = scenario.batch(noise, batch, |_, angles, _| {
            metric::all_or_none(&truth, &angles, config.tolerance)
        })?;

        let r = scores.iter().sum::<f64>() / config.trials as f64;
        info!(ratio = r, "detection ratio");
        ratio.push(r);
    }

    Ok(Detection { snr, ratio })
}

/// Squared errors of one batch plus the spectrum of its last trial.
fn rmse_batch(
    config: &VirtualArrayConfig,
    scenario: &Scenario<'_, VirtualCircular>,
    snr: f64,
    batch: usize,
) -> crate::Result<(f64, Spectrum)> {
    let mut truth = config.true_angles.clone();
    truth.sort_by(f64::total_cmp);

    let noise = Noise::from_snr(snr, config.noise_scaling);
    let last = config.trials - 1;
    let results = scenario.batch(noise, batch, |t, angles, spectrum| {
        (
            metric::squared_error(&truth, &angles),
            (t == last).then_some(spectrum),
        )
    })?;

    let mut rmse = Rmse::new();
    let mut spectrum = None;
    for (se, s) in results {
        rmse.add(se);
        spectrum = s.or(spectrum);
    }

    let value = rmse.value();
    info!(
        rmse = value,
        contributing = rmse.contributing(),
        excluded = rmse.excluded(),
        "RMSE"
    );
    // trials > 0, so the last trial always hands back its spectrum
    Ok((value, spectrum.ok_or(Error::NoTrials)?))
}

fn virtual_scenario<'a>(
    config: &VirtualArrayConfig,
    array: &'a VirtualCircular,
) -> crate::Result<Scenario<'a, VirtualCircular>> {
    subspace::check_geometry(config.sensors, config.true_angles.len())?;
    check_counts(config.snapshots, config.trials)?;

    Ok(Scenario {
        array,
        truth: config.true_angles.iter().map(|d| d.to_radians()).collect(),
        sources: config.true_angles.len(),
        snapshots: config.snapshots,
        grid: config.grid,
        criteria: config.criteria,
        seed: config.seed,
        trials: config.trials,
    })
}

fn virtual_array(config: &VirtualArrayConfig) -> VirtualCircular {
    VirtualCircular::new(config.sensors, config.carrier).with_synthesis(config.synthesis)
}

/// RMSE of MUSIC on a virtual circular array at one SNR, together with the
/// last trial's normalized spectrum.
///
/// Only trials that detect at least as many angles as there are sources
/// contribute to the RMSE.
#[instrument(skip_all, fields(sensors = config.sensors, sources = config.true_angles.len(), snr = config.snr))]
pub fn virtual_array_resolve(config: &VirtualArrayConfig) -> crate::Result<VirtualArrayRun> {
    let array = virtual_array(config);
    let scenario = virtual_scenario(config, &array)?;

    let (rmse, spectrum) = rmse_batch(config, &scenario, config.snr, 0)?;

    Ok(VirtualArrayRun {
        angles: config.grid.degrees(),
        spectrum: spectrum.normalized(),
        rmse,
    })
}

/// [`virtual_array_resolve`] over an inclusive SNR range in 1 dB steps.
/// `config.snr` is ignored.
#[instrument(skip_all, fields(sensors = config.sensors, sources = config.true_angles.len()))]
pub fn rmse_sweep(config: &VirtualArrayConfig, snr_low: i32, snr_high: i32) -> crate::Result<RmseSweep> {
    let array = virtual_array(config);
    let scenario = virtual_scenario(config, &array)?;
    let snr = snr_range(snr_low, snr_high)?;

    let mut rmse = Vec::with_capacity(snr.len());
    for (batch, &snr_db) in snr.iter().enumerate() {
        let _span = info_span!("snr", snr = snr_db, trials = config.trials).entered();
        let (value, _) = rmse_batch(config, &scenario, snr_db as f64, batch)?;
        rmse.push(value);
    }

    Ok(RmseSweep { snr, rmse })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ResolveConfig {
        ResolveConfig {
            snapshots: 50,
            snr_low: -6,
            snr_high: -3,
            trials: 6,
            seed: 42,
            ..Default::default()
        }
    }

    fn at_snr(snr: i32, trials: usize) -> f64 {
        let config = ResolveConfig {
            snr_low: snr,
            snr_high: snr,
            trials,
            seed: 7,
            ..Default::default()
        };
        resolve(&config).unwrap().ratio[0]
    }

    #[test]
    fn seeded_runs_are_identical() {
        let a = resolve(&small()).unwrap();
        let b = resolve(&small()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.snr, vec![-6, -5, -4, -3]);

        let c = resolve(&ResolveConfig { seed: 43, ..small() }).unwrap();
        assert_eq!(c.snr, a.snr);
    }

    #[test]
    fn ratios_are_probabilities() {
        let d = resolve(&small()).unwrap();
        assert_eq!(d.ratio.len(), d.snr.len());
        assert!(d.ratio.iter().all(|r| (0. ..=1.).contains(r)));
    }

    #[test]
    fn noiseless_uncoupled_source_is_always_found() {
        for angle in [-84.5, -60., -12.3, 0., 10., 37.7, 84.5] {
            let config = ResolveConfig {
                true_angle: angle,
                coupling_beta: 0.,
                noiseless: true,
                snr_low: -3,
                snr_high: 3,
                trials: 3,
                ..Default::default()
            };
            let d = resolve(&config).unwrap();
            assert!(d.ratio.iter().all(|&r| r == 1.), "{angle}°: {:?}", d.ratio);
        }
    }

    #[test]
    fn default_scenario_improves_with_snr() {
        let d = resolve(&ResolveConfig::default()).unwrap();
        assert_eq!(d.snr.len(), 11);
        assert!(d.ratio[10] >= d.ratio[0], "{:?}", d.ratio);
    }

    #[test]
    fn detection_trend_over_coarse_snr_grid() {
        let low = at_snr(-15, 100);
        let mid = at_snr(-5, 100);
        let high = at_snr(5, 100);

        assert!(low < mid, "{low} {mid}");
        assert!(mid <= high, "{mid} {high}");
        assert!(high > 0.9, "{high}");
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let one_sensor = ResolveConfig {
            sensors: 1,
            ..small()
        };
        assert_eq!(
            resolve(&one_sensor).unwrap_err(),
            Error::InvalidGeometry {
                sensors: 1,
                sources: 1
            }
        );

        let backwards = ResolveConfig {
            snr_low: 3,
            snr_high: 2,
            ..small()
        };
        assert_eq!(
            resolve(&backwards).unwrap_err(),
            Error::EmptySnrRange { low: 3, high: 2 }
        );

        let no_trials = ResolveConfig {
            trials: 0,
            ..small()
        };
        assert_eq!(resolve(&no_trials).unwrap_err(), Error::NoTrials);
    }

    #[test]
    fn virtual_array_resolves_all_sources() {
        let run = virtual_array_resolve(&VirtualArrayConfig {
            trials: 3,
            seed: 1,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(run.angles.len(), 720);
        assert_eq!(run.spectrum.len(), 720);
        assert!(run.spectrum.iter().all(|&p| p <= 0.));
        assert!(run.spectrum.iter().any(|&p| p == 0.));
        assert!(run.rmse.is_finite() && run.rmse < 1., "rmse {}", run.rmse);
    }

    #[test]
    fn per_pair_synthesis_resolves_all_sources() {
        let run = virtual_array_resolve(&VirtualArrayConfig {
            synthesis: PairSynthesis::PerPair,
            trials: 2,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(run.spectrum.len(), 720);
        assert!(run.rmse.is_finite() && run.rmse < 1., "rmse {}", run.rmse);
    }

    #[test]
    fn source_count_is_bounded() {
        let config = VirtualArrayConfig::default().with_sources(3).unwrap();
        assert_eq!(config.true_angles, vec![-60., -45., -30.]);

        assert_eq!(
            VirtualArrayConfig::default().with_sources(9).unwrap_err(),
            Error::TooManySources {
                requested: 9,
                available: 8
            }
        );

        let silent = VirtualArrayConfig {
            trials: 2,
            snapshots: 100,
            ..VirtualArrayConfig::default().with_sources(0).unwrap()
        };
        assert_eq!(virtual_array_resolve(&silent).unwrap_err(), Error::NoSources);
        assert_eq!(rmse_sweep(&silent, 0, 1).unwrap_err(), Error::NoSources);

        let crowded = VirtualArrayConfig {
            sensors: 8,
            ..Default::default()
        };
        assert_eq!(
            virtual_array_resolve(&crowded).unwrap_err(),
            Error::InvalidGeometry {
                sensors: 8,
                sources: 8
            }
        );
    }

    #[test]
    fn rmse_sweep_covers_range() {
        let config = VirtualArrayConfig {
            trials: 2,
            snapshots: 500,
            ..VirtualArrayConfig::default().with_sources(4).unwrap()
        };
        let sweep = rmse_sweep(&config, 18, 20).unwrap();
        assert_eq!(sweep.snr, vec![18, 19, 20]);
        assert_eq!(sweep.rmse.len(), 3);

        let bits = |s: &RmseSweep| s.rmse.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&sweep), bits(&rmse_sweep(&config, 18, 20).unwrap()));
    }
}
