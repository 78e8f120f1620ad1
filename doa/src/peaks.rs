//! Peak picking on a spectrum curve.
//!
//! Local maxima are found the usual way for sampled curves: a flat top
//! counts as one peak at its middle sample, and the two end samples are
//! never peaks. Candidates are then filtered by height, by minimum distance
//! (taller peaks win) and finally by topographic prominence.

use crate::music::{Grid, Spectrum};

/// Which version of the spectrum the height floor is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    /// Peak at 0 dB, see [`Spectrum::normalized`].
    #[default]
    Normalized,
    /// See [`Spectrum::raw`].
    Raw,
}

/// Thresholds a local maximum must pass to count as a peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criteria {
    /// Minimum height in dB.
    pub height: Option<f64>,
    /// Minimum prominence in dB.
    pub prominence: Option<f64>,
    /// Minimum index distance between neighbouring peaks. Values below 1
    /// behave like 1.
    pub distance: Option<usize>,
    pub scale: Scale,
}

impl Criteria {
    /// Local maxima of the normalized spectrum no lower than −100 dB.
    pub const fn coupling() -> Self {
        Self {
            height: Some(-100.),
            prominence: None,
            distance: None,
            scale: Scale::Normalized,
        }
    }

    /// Maxima of the raw spectrum above 5 dB, at least 10 samples apart and
    /// 2 dB prominent.
    pub const fn virtual_array() -> Self {
        Self {
            height: Some(5.),
            prominence: Some(2.),
            distance: Some(10),
            scale: Scale::Raw,
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::coupling()
    }
}

/// Plateau-aware local maxima of `x`, ascending.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = vec![];
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }

            if x[ahead] < x[i] {
                let right = ahead - 1;
                peaks.push((i + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drops peaks closer than `distance` to a taller one.
///
/// Of two equally tall peaks the later one wins.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    let mut priority: Vec<usize> = (0..peaks.len()).collect();
    priority.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in priority.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, keep)| keep.then_some(p))
        .collect()
}

/// Topographic prominence of the peak at `peak`.
///
/// On each side the curve is followed until it rises above the peak or the
/// curve ends; the higher of the two minima found is the base.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let top = x[peak];

    let mut left_min = top;
    for &v in x[..=peak].iter().rev() {
        if v > top {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = top;
    for &v in &x[peak..] {
        if v > top {
            break;
        }
        right_min = right_min.min(v);
    }

    top - left_min.max(right_min)
}

/// Indices of the peaks of `x` passing `criteria`, ascending.
///
/// ```
/// use doa::peaks::{find, Criteria, Scale};
///
/// let x = [0., 3., 1., 5., 1., 2., 0.];
/// let all = Criteria { height: None, prominence: None, distance: None, scale: Scale::Raw };
/// assert_eq!(find(&x, &all), vec![1, 3, 5]);
///
/// let tall = Criteria { height: Some(2.5), ..all };
/// assert_eq!(find(&x, &tall), vec![1, 3]);
/// ```
pub fn find(x: &[f64], criteria: &Criteria) -> Vec<usize> {
    let mut peaks = local_maxima(x);

    if let Some(height) = criteria.height {
        peaks.retain(|&p| x[p] >= height);
    }

    if let Some(distance) = criteria.distance {
        if distance > 1 && peaks.len() > 1 {
            peaks = select_by_distance(x, &peaks, distance);
        }
    }

    if let Some(min) = criteria.prominence {
        peaks.retain(|&p| prominence(x, p) >= min);
    }

    peaks
}

/// Converts the `count` tallest peaks of `x` to angles, ascending.
///
/// Returns fewer angles when fewer peaks exist, and none for an empty
/// `peaks`.
pub fn top_angles(x: &[f64], peaks: &[usize], count: usize, grid: Grid) -> Vec<f64> {
    let mut ranked = peaks.to_vec();
    // stable, so equal heights keep index order
    ranked.sort_by(|&a, &b| x[b].total_cmp(&x[a]));
    ranked.truncate(count);

    let mut angles: Vec<f64> = ranked.into_iter().map(|i| grid.degrees_at(i)).collect();
    angles.sort_by(f64::total_cmp);
    angles
}

/// Peak search on a spectrum: the `count` best candidate angles in degrees.
pub fn estimate(spectrum: &Spectrum, criteria: &Criteria, count: usize) -> Vec<f64> {
    let x = match criteria.scale {
        Scale::Normalized => spectrum.normalized().to_vec(),
        Scale::Raw => spectrum.raw().to_vec(),
    };
    let peaks = find(&x, criteria);

    top_angles(&x, &peaks, count, spectrum.grid())
}
