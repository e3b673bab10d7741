use crate::density::DensityField;
use crate::error::{Error, Result};
use crate::partition::{PartitionMap, UNDEFINED};
use crate::point::Point;
use rayon::prelude::*;

/// Aggregate of all grid cells owned by one site.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellStats {
    /// Number of owned grid cells. Zero means the site vanished.
    pub area: f64,
    pub sum_density: f64,
    /// Density-weighted mean position, normalized to `[0, 1]²`.
    pub centroid: Point,
    /// Direction of maximum spread in radians.
    pub orientation: f64,
}

impl CellStats {
    pub fn is_empty(&self) -> bool {
        self.area == 0.0
    }

    pub fn mean_density(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.sum_density / self.area
        }
    }
}

// Raw density moments in grid units.
#[derive(Clone, Copy, Default)]
struct Moments {
    area: f64,
    m00: f64,
    m10: f64,
    m01: f64,
    m11: f64,
    m20: f64,
    m02: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64, density: f64) {
        self.area += 1.0;
        self.m00 += density;
        self.m10 += x * density;
        self.m01 += y * density;
        self.m11 += x * y * density;
        self.m20 += x * x * density;
        self.m02 += y * y * density;
    }

    fn merge(&mut self, other: &Moments) {
        self.area += other.area;
        self.m00 += other.m00;
        self.m10 += other.m10;
        self.m01 += other.m01;
        self.m11 += other.m11;
        self.m20 += other.m20;
        self.m02 += other.m02;
    }

    fn finish(&self, width: usize, height: usize) -> CellStats {
        let mut cell = CellStats {
            area: self.area,
            sum_density: self.m00,
            ..CellStats::default()
        };

        if self.m00 <= 0.0 {
            return cell;
        }

        let cx = self.m10 / self.m00;
        let cy = self.m01 / self.m00;

        let a = self.m20 / self.m00 - cx * cx;
        let b = 2.0 * (self.m11 / self.m00 - cx * cy);
        let c = self.m02 / self.m00 - cy * cy;
        cell.orientation = b.atan2(a - c) / 2.0;

        cell.centroid = Point::new((cx + 0.5) / width as f64, (cy + 0.5) / height as f64);
        cell
    }
}

/// Sweep the partition and density once, one entry per site of the partition.
///
/// Densities are floored at `f32::EPSILON` so that every owned cell has a centroid, even on blank
/// paper.
pub fn accumulate(partition: &PartitionMap, density: &DensityField) -> Result<Vec<CellStats>> {
    let (width, height) = (partition.width(), partition.height());

    if density.width() != width || density.height() != height {
        return Err(Error::InvalidDensity(format!(
            "partition is {}x{} but density is {}x{}",
            width,
            height,
            density.width(),
            density.height()
        )));
    }

    let count = partition.site_count();

    if count == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let threads = rayon::current_num_threads().max(1);
    let rows_per_chunk = height.div_ceil(threads);
    let chunks = (0..height).step_by(rows_per_chunk).collect::<Vec<_>>();

    let moments = chunks
        .into_par_iter()
        .map(|start| {
            let mut local = vec![Moments::default(); count];

            for y in start..(start + rows_per_chunk).min(height) {
                for (x, (&index, &value)) in
                    partition.row(y).iter().zip(density.row(y)).enumerate()
                {
                    if index == UNDEFINED {
                        continue;
                    }

                    let value = (value as f64).max(f32::EPSILON as f64);
                    local[index as usize].add(x as f64, y as f64, value);
                }
            }

            local
        })
        .reduce(
            || vec![Moments::default(); count],
            |mut acc, local| {
                for (a, l) in acc.iter_mut().zip(&local) {
                    a.merge(l);
                }
                acc
            },
        );

    Ok(moments.iter().map(|m| m.finish(width, height)).collect())
}
