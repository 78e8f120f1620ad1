//! Direction-of-arrival estimation with MUSIC.
//!
//! The pipeline for a single trial is
//!
//! 1. draw QPSK symbols for every source ([`qpsk`]),
//! 2. push them through an [`array::ArrayModel`] and add noise ([`synth`]),
//! 3. estimate the sensor covariance ([`cov`]),
//! 4. split off the noise subspace ([`subspace`]),
//! 5. scan the MUSIC pseudo-spectrum over a grid ([`music`]),
//! 6. pick peaks and turn them into angles ([`peaks`]),
//! 7. score the angles against the truth ([`metric`]).
//!
//! [`sim`] repeats that over trials and SNR values.

pub mod array;
pub mod cov;
pub mod metric;
pub mod music;
pub mod peaks;
pub mod qpsk;
pub mod sim;
pub mod subspace;
pub mod synth;

pub use sim::{resolve, rmse_sweep, virtual_array_resolve, ResolveConfig, VirtualArrayConfig};

/// Error returned when a scenario cannot be run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The noise subspace would be empty.
    #[error("{sources} expected sources leave no noise subspace with {sensors} sensors")]
    InvalidGeometry { sensors: usize, sources: usize },
    #[error("the array has no sensors")]
    NoSensors,
    #[error("at least one source is required")]
    NoSources,
    #[error("at least one snapshot is required")]
    NoSnapshots,
    #[error("at least one trial is required")]
    NoTrials,
    #[error("empty SNR range {low}..={high} dB")]
    EmptySnrRange { low: i32, high: i32 },
    /// More sources were requested than there are known true angles.
    #[error("requested {requested} sources but only {available} true angles are defined")]
    TooManySources { requested: usize, available: usize },
    #[error("the search grid needs at least two points")]
    EmptyGrid,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
