//! MUSIC pseudo-spectrum.

use std::f64::consts::FRAC_PI_2;

use ndarray::Array1;
use ndarray_stats::QuantileExt;

use crate::{array::ArrayModel, subspace::NoiseSubspace, Error};

/// Uniform search grid over [−90°, 90°], both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    points: usize,
}

impl Grid {
    pub const DEFAULT_POINTS: usize = 720;

    pub fn new(points: usize) -> crate::Result<Self> {
        if points < 2 {
            return Err(Error::EmptyGrid);
        }
        Ok(Self { points })
    }

    pub const fn points(&self) -> usize {
        self.points
    }

    /// Grid step in degrees.
    pub fn resolution(&self) -> f64 {
        180. / (self.points - 1) as f64
    }

    /// Angle of grid index `i`, in degrees.
    ///
    /// ```
    /// let grid = doa::music::Grid::default();
    /// assert_eq!(grid.degrees_at(0), -90.);
    /// assert_eq!(grid.degrees_at(719), 90.);
    /// ```
    pub fn degrees_at(&self, i: usize) -> f64 {
        -90. + 180. * i as f64 / (self.points - 1) as f64
    }

    pub fn radians(&self) -> Array1<f64> {
        Array1::linspace(-FRAC_PI_2, FRAC_PI_2, self.points)
    }

    pub fn degrees(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.points, |i| self.degrees_at(i))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            points: Self::DEFAULT_POINTS,
        }
    }
}

/// MUSIC power over a [`Grid`], in dB.
#[derive(Debug, Clone)]
pub struct Spectrum {
    grid: Grid,
    power_db: Array1<f64>,
}

impl Spectrum {
    /// Scans `10·log10(1 / wᴴ·V·Vᴴ·w)` over the grid.
    ///
    /// A direction where the projection vanishes gives `+∞`; it is kept as
    /// is since it marks a true direction.
    pub fn scan<A: ArrayModel>(array: &A, noise: &NoiseSubspace, grid: Grid) -> Self {
        let power_db = grid
            .radians()
            .mapv(|theta| -10. * noise.projection(&array.steering(theta)).log10());

        Self { grid, power_db }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Unnormalized power in dB.
    pub fn raw(&self) -> &Array1<f64> {
        &self.power_db
    }

    /// Power in dB relative to the highest point, which sits at exactly 0 dB.
    pub fn normalized(&self) -> Array1<f64> {
        let max = *self.power_db.max_skipnan();
        self.power_db
            .mapv(|p| if p == max { 0. } else { p - max })
    }
}
