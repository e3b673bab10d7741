//! Weighted Linde-Buzo-Gray stippling.
//!
//! A density image is approximated by stipples: many small points where the image is dark, few
//! large ones where it is light. Each iteration partitions the grid among the current stipples,
//! accumulates the density every stipple covers and then splits, merges or keeps it depending on
//! whether that density lies in a hysteresis band around the ink a stipple of its size deposits.
//! After the loop settles, natural-neighbor weights are computed for every grid cell.
pub mod cancel;
pub mod cells;
pub mod color;
pub mod density;
pub mod engine;
pub mod error;
pub mod knn;
pub mod natural;
pub mod params;
pub mod partition;
pub mod point;

pub use cancel::CancelToken;
pub use density::DensityField;
pub use engine::{
    NoopObserver, Observer, Status, Stipple, StippleKind, StippleResult, Stippler, Termination,
};
pub use error::{Error, Result};
pub use natural::{NeighborConfig, NeighborWeightTable};
pub use params::{Params, PointMapping};
pub use partition::{BruteForcePartitioner, PartitionMap, Partitioner};
pub use point::Point;

use rand::Rng;

/// Stipple `density` with the default partitioner and no progress reporting.
pub fn stipple<R: Rng>(
    density: &DensityField,
    params: &Params,
    rng: &mut R,
) -> Result<StippleResult> {
    Stippler::new().run(density, params, rng, &mut NoopObserver)
}
