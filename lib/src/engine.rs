use crate::cancel::CancelToken;
use crate::cells::{accumulate, CellStats};
use crate::density::DensityField;
use crate::error::Result;
use crate::knn::SiteIndex;
use crate::natural::{compute_weights, NeighborConfig, NeighborWeightTable};
use crate::params::{Decision, Params};
use crate::partition::{BruteForcePartitioner, PartitionMap, Partitioner};
use crate::point::Point;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Whether a stipple survived the last iteration or was born from a split. Only useful for
/// coloring.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StippleKind {
    Kept,
    New,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stipple {
    /// Normalized position in `[0, 1]²`.
    pub pos: Point,
    /// Diameter in pixels of the input image.
    pub size: f64,
    pub kind: StippleKind,
}

/// Progress of one iteration.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Status {
    pub iteration: usize,
    /// Number of stipples after the iteration.
    pub size: usize,
    pub splits: usize,
    pub merges: usize,
    pub hysteresis: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// An iteration neither split nor merged a cell.
    Converged,
    MaxIterations,
    /// No stipples left, the density field has no ink.
    EmptyField,
}

#[derive(Clone, Debug)]
pub struct StippleResult {
    pub stipples: Vec<Stipple>,
    /// Partition of the super-sampled grid over `stipples`.
    pub partition: PartitionMap,
    /// Natural-neighbor weights, indices refer to `stipples`. Empty after
    /// [`Stippler::without_weights`].
    pub weights: NeighborWeightTable,
    pub termination: Termination,
    pub iterations: usize,
}

/// Receives per-iteration progress. Every method defaults to doing nothing.
pub trait Observer {
    fn status(&mut self, _status: &Status) {}

    fn stipples(&mut self, _stipples: &[Stipple]) {}

    fn partition(&mut self, _partition: &PartitionMap) {}
}

pub struct NoopObserver;

impl Observer for NoopObserver {}

fn random_stipples<R: Rng>(n: usize, size: f64, rng: &mut R) -> Vec<Stipple> {
    (0..n)
        .map(|_| Stipple {
            pos: Point::new(rng.gen_range(0.01..0.99), rng.gen_range(0.01..0.99)),
            size,
            kind: StippleKind::Kept,
        })
        .collect()
}

fn jitter<R: Rng>(p: Point, rng: &mut R) -> Point {
    p + Point::new(rng.gen_range(-0.001..0.001), rng.gen_range(-0.001..0.001))
}

/// Two seeds half a circle radius either side of the centroid, along the cell orientation.
fn split_seeds<R: Rng>(
    cell: &CellStats,
    width: usize,
    height: usize,
    rng: &mut R,
) -> (Point, Point) {
    let radius = (cell.area.max(1.0) / PI).sqrt();
    let offset = Point::new(0.5 * radius, 0.0)
        .rotate(cell.orientation)
        .scale(1.0 / width as f64, 1.0 / height as f64);

    (
        jitter((cell.centroid - offset).clamp_unit(), rng),
        jitter((cell.centroid + offset).clamp_unit(), rng),
    )
}

/// Weighted Linde-Buzo-Gray stippling.
pub struct Stippler<P = BruteForcePartitioner> {
    partitioner: P,
    /// `None` skips the natural-neighbor pass.
    neighbors: Option<NeighborConfig>,
    cancel: CancelToken,
}

impl Default for Stippler {
    fn default() -> Self {
        Self::new()
    }
}

impl Stippler {
    pub fn new() -> Self {
        Self {
            partitioner: BruteForcePartitioner,
            neighbors: Some(NeighborConfig::default()),
            cancel: CancelToken::new(),
        }
    }
}

impl<P: Partitioner> Stippler<P> {
    pub fn with_partitioner<Q: Partitioner>(self, partitioner: Q) -> Stippler<Q> {
        Stippler {
            partitioner,
            neighbors: self.neighbors,
            cancel: self.cancel,
        }
    }

    pub fn with_neighbors(mut self, neighbors: NeighborConfig) -> Self {
        self.neighbors = Some(neighbors);
        self
    }

    /// Leave `StippleResult::weights` empty. The partition is still computed.
    pub fn without_weights(mut self) -> Self {
        self.neighbors = None;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the split/merge loop on `density` and compute natural-neighbor weights for the
    /// result. Super-sampling is applied here, callers pass the field at image resolution.
    ///
    /// With the default [`NeighborConfig`] a pixel with more than 8 natural neighbors fails the
    /// run with [`Error::NeighborOverflow`](crate::Error::NeighborOverflow). Sparse images with
    /// few, large cells hit this near the border.
    pub fn run<R: Rng>(
        &self,
        density: &DensityField,
        params: &Params,
        rng: &mut R,
        observer: &mut dyn Observer,
    ) -> Result<StippleResult> {
        params.validate()?;

        let density = density.supersample(params.super_sampling_factor)?;
        let (width, height) = (density.width(), density.height());

        info!(
            "Stippling {}x{} grid, {} initial points",
            width, height, params.initial_points
        );

        if density.is_blank() {
            info!("Density field has no ink, every stipple will merge");
        }

        let mut stipples = random_stipples(params.initial_points, params.initial_point_size, rng);
        let mut iteration = 0;

        let termination = loop {
            self.cancel.check()?;

            // Only reached when another iteration is allowed: a field that empties in the last
            // one ends on the cap check below and reports `MaxIterations`.
            if stipples.is_empty() {
                observer.stipples(&stipples);
                break Termination::EmptyField;
            }

            let sites = stipples.iter().map(|s| s.pos).collect::<Vec<_>>();
            let partition = self.partitioner.partition(&sites, width, height);
            let cells = accumulate(&partition, &density)?;
            debug_assert_eq!(cells.len(), stipples.len());

            let hysteresis = params.hysteresis_at(iteration);
            let mut status = Status {
                iteration,
                hysteresis,
                ..Status::default()
            };

            let mut next = Vec::with_capacity(stipples.len());

            for cell in &cells {
                let diameter = params.diameter(cell.mean_density());

                match params
                    .band(diameter, hysteresis)
                    .decide(cell.sum_density, cell.area)
                {
                    Decision::Merge => status.merges += 1,
                    Decision::Keep => next.push(Stipple {
                        pos: cell.centroid,
                        size: diameter,
                        kind: StippleKind::Kept,
                    }),
                    Decision::Split => {
                        let (a, b) = split_seeds(cell, width, height, rng);

                        for pos in [a, b] {
                            next.push(Stipple {
                                pos,
                                size: diameter,
                                kind: StippleKind::New,
                            });
                        }

                        status.splits += 1;
                    }
                }
            }

            stipples = next;
            status.size = stipples.len();

            debug!(
                "Iteration {}: {} points, {} splits, {} merges, hysteresis {:.3}",
                status.iteration, status.size, status.splits, status.merges, status.hysteresis
            );

            observer.status(&status);
            observer.partition(&partition);
            observer.stipples(&stipples);

            iteration += 1;

            if status.splits == 0 && status.merges == 0 {
                break Termination::Converged;
            }

            if iteration == params.max_iterations {
                warn!(
                    "Stopped after {} iterations without converging",
                    params.max_iterations
                );
                break Termination::MaxIterations;
            }
        };

        info!(
            "Stippling finished after {} iterations ({:?}), {} points",
            iteration,
            termination,
            stipples.len()
        );

        if stipples.is_empty() {
            return Ok(StippleResult {
                stipples,
                partition: PartitionMap::undefined(width, height),
                weights: NeighborWeightTable::empty(),
                termination,
                iterations: iteration,
            });
        }

        let sites = stipples.iter().map(|s| s.pos).collect::<Vec<_>>();
        let partition = self.partitioner.partition(&sites, width, height);

        let weights = match self.neighbors {
            Some(neighbors) => {
                let grid = sites
                    .iter()
                    .map(|p| p.scale(width as f64, height as f64))
                    .collect::<Vec<_>>();
                let index = SiteIndex::new(&grid);
                compute_weights(&grid, &partition, &index, neighbors, &self.cancel)?
            }
            None => NeighborWeightTable::empty(),
        };

        Ok(StippleResult {
            stipples,
            partition,
            weights,
            termination,
            iterations: iteration,
        })
    }
}
