//! Scoring estimated angles against the truth.
//!
//! The two scores match angles differently: detection looks for
//! any estimate near each true angle, RMSE pairs sorted lists by position.

use tracing::warn;

/// Default tolerance of [`all_or_none`], in degrees.
pub const DEFAULT_TOLERANCE: f64 = 1.;

/// `1.0` if every true angle has some detected angle within `tolerance`
/// degrees, else `0.0`.
///
/// ```
/// use doa::metric::all_or_none;
///
/// assert_eq!(all_or_none(&[10., 30.], &[29.5, 10.2], 1.), 1.);
/// assert_eq!(all_or_none(&[10., 30.], &[10.2], 1.), 0.);
/// assert_eq!(all_or_none(&[10.], &[], 1.), 0.);
/// ```
pub fn all_or_none(truth: &[f64], detected: &[f64], tolerance: f64) -> f64 {
    let hit = |t: f64| detected.iter().any(|d| (d - t).abs() <= tolerance);

    if truth.iter().all(|&t| hit(t)) {
        1.
    } else {
        0.
    }
}

/// Mean squared error between position-matched angles.
///
/// Both lists are expected ascending. Returns `None` when fewer angles were
/// detected than there are true angles; extra detections are ignored.
pub fn squared_error(truth: &[f64], detected: &[f64]) -> Option<f64> {
    if detected.len() < truth.len() || truth.is_empty() {
        return None;
    }

    let sum: f64 = truth
        .iter()
        .zip(detected)
        .map(|(t, d)| (d - t).powi(2))
        .sum();

    Some(sum / truth.len() as f64)
}

/// Accumulates per-trial squared errors into a root mean square.
#[derive(Debug, Clone, Default)]
pub struct Rmse {
    sum: f64,
    contributing: usize,
    excluded: usize,
}

impl Rmse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one trial; `None` marks a trial with too few detections.
    pub fn add(&mut self, squared_error: Option<f64>) {
        match squared_error {
            Some(se) => {
                self.sum += se;
                self.contributing += 1;
            }
            None => self.excluded += 1,
        }
    }

    pub fn contributing(&self) -> usize {
        self.contributing
    }

    pub fn excluded(&self) -> usize {
        self.excluded
    }

    /// Root of the mean squared error over contributing trials, or NaN if
    /// no trial contributed.
    pub fn value(&self) -> f64 {
        if self.contributing == 0 {
            warn!(
                excluded = self.excluded,
                "no trial detected enough angles, RMSE is undefined"
            );
            return f64::NAN;
        }

        (self.sum / self.contributing as f64).sqrt()
    }
}

impl Extend<Option<f64>> for Rmse {
    fn extend<T: IntoIterator<Item = Option<f64>>>(&mut self, iter: T) {
        for se in iter {
            self.add(se);
        }
    }
}
