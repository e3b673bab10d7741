//! Natural-neighbor (Sibson) weights for every grid cell.
//!
//! For a pixel `p` a virtual site is inserted at its center together with the `k` nearest real
//! sites. The cells that would switch to the virtual site are tallied by their owner in the final
//! partition; normalized tallies are the interpolation weights of those owners at `p`.
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::knn::SiteIndex;
use crate::partition::{cell_center, nearest_site, PartitionMap};
use crate::point::Point;
use log::{debug, info};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborConfig {
    /// Number of real sites competing with the virtual site.
    pub k: usize,
    /// Slots per pixel in the weight table. Exceeding it is an error, not a truncation.
    pub capacity: usize,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self { k: 16, capacity: 8 }
    }
}

/// Sparse per-pixel `(site, weight)` table, `capacity` slots per pixel.
///
/// Slots are ordered by ascending site index; unused slots hold index 0 and weight 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborWeightTable {
    width: usize,
    height: usize,
    capacity: usize,
    indices: Vec<u32>,
    weights: Vec<f32>,
}

impl NeighborWeightTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Raw slot arrays, `capacity` consecutive entries per pixel in row-major order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Used slots of pixel `(x, y)`.
    pub fn entry(&self, x: usize, y: usize) -> impl Iterator<Item = (u32, f32)> + '_ {
        let offset = (y * self.width + x) * self.capacity;
        let range = offset..offset + self.capacity;

        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.weights[range].iter().copied())
            .filter(|&(_, w)| w > 0.0)
    }
}

// Inclusive pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Rect {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

// Keep the part of a convex polygon where `(q - mid) · normal <= 0`.
fn clip(polygon: &[Point], mid: Point, normal: Point) -> Vec<Point> {
    let side = |q: &Point| (*q - mid).dot(&normal);
    let mut result = Vec::with_capacity(polygon.len() + 1);

    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (sc, sn) = (side(current), side(next));

        if sc <= 0.0 {
            result.push(*current);
        }

        if (sc < 0.0 && sn > 0.0) || (sc > 0.0 && sn < 0.0) {
            let t = sc / (sc - sn);
            result.push(*current + (*next - *current) * t);
        }
    }

    result
}

/// Bounding box of the virtual site's Voronoi cell among `neighbors`, limited to the grid.
fn virtual_cell_bounds(p: Point, neighbors: &[Point], width: usize, height: usize) -> Rect {
    let (w, h) = (width as f64, height as f64);
    let mut polygon = vec![
        Point::new(0.5, 0.5),
        Point::new(w - 0.5, 0.5),
        Point::new(w - 0.5, h - 0.5),
        Point::new(0.5, h - 0.5),
    ];

    for n in neighbors {
        let normal = *n - p;

        if normal.dot(&normal) == 0.0 {
            continue;
        }

        polygon = clip(&polygon, (p + *n) / 2.0, normal);

        if polygon.is_empty() {
            break;
        }
    }

    let (mut min, mut max) = (p, p);

    for q in &polygon {
        min = Point::new(min.x.min(q.x), min.y.min(q.y));
        max = Point::new(max.x.max(q.x), max.y.max(q.y));
    }

    // one cell of slack absorbs rounding on the bisectors
    let lo = |v: f64, limit: usize| {
        ((v - 0.5).floor() - 1.0).clamp(0.0, (limit - 1) as f64) as usize
    };
    let hi = |v: f64, limit: usize| {
        ((v - 0.5).ceil() + 1.0).clamp(0.0, (limit - 1) as f64) as usize
    };

    Rect {
        x0: lo(min.x, width),
        y0: lo(min.y, height),
        x1: hi(max.x, width),
        y1: hi(max.y, height),
    }
}

/// Count cells in `rect` owned by local site 0, grouped by their original owner.
fn tally_region(
    local: &[Point],
    partition: &PartitionMap,
    rect: Rect,
    tally: &mut Vec<(u32, u32)>,
) -> u32 {
    tally.clear();
    let mut total = 0;

    for y in rect.y0..=rect.y1 {
        for x in rect.x0..=rect.x1 {
            if nearest_site(local, cell_center(x, y)) != Some(0) {
                continue;
            }

            let owner = partition.get(x, y);

            match tally.iter_mut().find(|(index, _)| *index == owner) {
                Some((_, count)) => *count += 1,
                None => tally.push((owner, 1)),
            }

            total += 1;
        }
    }

    tally.sort_unstable_by_key(|&(index, _)| index);
    total
}

/// Natural-neighbor weights for every cell of `partition`.
///
/// `sites` must be in grid units and `index` built over exactly those points.
pub fn compute_weights(
    sites: &[Point],
    partition: &PartitionMap,
    index: &SiteIndex,
    config: NeighborConfig,
    cancel: &CancelToken,
) -> Result<NeighborWeightTable> {
    if config.k == 0 || config.capacity == 0 {
        return Err(Error::InvalidConfig(format!(
            "natural neighbor search needs k >= 1 and capacity >= 1, got {config:?}"
        )));
    }

    let (width, height) = (partition.width(), partition.height());

    if sites.is_empty() || !partition.is_defined() || width == 0 || height == 0 {
        return Ok(NeighborWeightTable::empty());
    }

    let capacity = config.capacity;
    let row_len = width * capacity;
    let mut indices = vec![0u32; row_len * height];
    let mut weights = vec![0f32; row_len * height];

    info!(
        "Natural neighbors: {}x{} cells, {} sites, k = {}",
        width,
        height,
        sites.len(),
        config.k
    );

    let start = Instant::now();
    let rows_done = AtomicUsize::new(0);
    let report_every = (height / 10).max(1);

    indices
        .par_chunks_mut(row_len)
        .zip(weights.par_chunks_mut(row_len))
        .enumerate()
        .try_for_each(|(y, (index_row, weight_row))| -> Result<()> {
            cancel.check()?;

            let mut local = Vec::with_capacity(config.k + 1);
            let mut tally = Vec::with_capacity(capacity + 1);

            for x in 0..width {
                let p = cell_center(x, y);

                local.clear();
                local.push(p);
                local.extend(index.nearest(p, config.k).into_iter().map(|i| sites[i]));

                let rect = virtual_cell_bounds(p, &local[1..], width, height);
                let total = tally_region(&local, partition, rect, &mut tally);

                if tally.len() > capacity {
                    return Err(Error::NeighborOverflow {
                        x,
                        y,
                        count: tally.len(),
                        capacity,
                    });
                }

                let offset = x * capacity;

                for (slot, &(site, count)) in tally.iter().enumerate() {
                    index_row[offset + slot] = site;
                    weight_row[offset + slot] = count as f32 / total as f32;
                }
            }

            let done = rows_done.fetch_add(1, Ordering::Relaxed) + 1;

            if done % report_every == 0 {
                debug!(
                    "Natural neighbors: {}/{} rows after {:.1?}",
                    done,
                    height,
                    start.elapsed()
                );
            }

            Ok(())
        })?;

    info!("Natural neighbors done in {:.1?}", start.elapsed());

    Ok(NeighborWeightTable {
        width,
        height,
        capacity,
        indices,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{BruteForcePartitioner, Partitioner};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::FRAC_PI_2;

    fn setup(
        sites: &[Point],
        width: usize,
        height: usize,
    ) -> (Vec<Point>, PartitionMap, SiteIndex) {
        let partition = BruteForcePartitioner.partition(sites, width, height);
        let grid = sites
            .iter()
            .map(|s| s.scale(width as f64, height as f64))
            .collect::<Vec<_>>();
        let index = SiteIndex::new(&grid);
        (grid, partition, index)
    }

    fn random_sites(count: usize, seed: u64) -> Vec<Point> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..count)
            .map(|_| Point::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
            .collect()
    }

    #[test]
    fn single_site_takes_all_weight() {
        let (grid, partition, index) = setup(&[Point::new(0.4, 0.6)], 9, 7);
        let table = compute_weights(
            &grid,
            &partition,
            &index,
            NeighborConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();

        for y in 0..7 {
            for x in 0..9 {
                assert_eq!(table.entry(x, y).collect::<Vec<_>>(), vec![(0, 1.0)]);
            }
        }
    }

    #[test]
    fn weights_are_normalized() {
        let (grid, partition, index) = setup(&random_sites(40, 7), 48, 36);
        let config = NeighborConfig { k: 16, capacity: 16 };
        let table =
            compute_weights(&grid, &partition, &index, config, &CancelToken::new()).unwrap();

        assert_eq!(table.width(), 48);
        assert_eq!(table.height(), 36);

        for y in 0..36 {
            for x in 0..48 {
                let entry = table.entry(x, y).collect::<Vec<_>>();
                let sum: f32 = entry.iter().map(|&(_, w)| w).sum();

                assert!((sum - 1.0).abs() < 1e-4, "pixel ({x}, {y}) sums to {sum}");
                assert!(entry.iter().all(|&(_, w)| (0.0..=1.0).contains(&w)));
                assert!(entry.windows(2).all(|pair| pair[0].0 < pair[1].0));
            }
        }
    }

    #[test]
    fn owner_of_pixel_always_contributes() {
        let (grid, partition, index) = setup(&random_sites(25, 3), 30, 30);
        let config = NeighborConfig { k: 16, capacity: 16 };
        let table =
            compute_weights(&grid, &partition, &index, config, &CancelToken::new()).unwrap();

        for y in 0..30 {
            for x in 0..30 {
                let owner = partition.get(x, y);
                assert!(table.entry(x, y).any(|(site, _)| site == owner));
            }
        }
    }

    #[test]
    fn bounded_scan_matches_full_scan() {
        let (width, height) = (40, 25);
        let (grid, partition, index) = setup(&random_sites(60, 11), width, height);
        let full = Rect {
            x0: 0,
            y0: 0,
            x1: width - 1,
            y1: height - 1,
        };

        let (mut bounded_tally, mut full_tally) = (Vec::new(), Vec::new());

        for y in 0..height {
            for x in 0..width {
                let p = cell_center(x, y);
                let mut local = vec![p];
                local.extend(index.nearest(p, 16).into_iter().map(|i| grid[i]));

                let rect = virtual_cell_bounds(p, &local[1..], width, height);
                let a = tally_region(&local, &partition, rect, &mut bounded_tally);
                let b = tally_region(&local, &partition, full, &mut full_tally);

                assert_eq!(a, b);
                assert_eq!(bounded_tally, full_tally);
            }
        }
    }

    #[test]
    fn overflow_is_reported() {
        let sites = [
            Point::new(0.25, 0.25),
            Point::new(0.75, 0.25),
            Point::new(0.25, 0.75),
            Point::new(0.75, 0.75),
        ];
        let (grid, partition, index) = setup(&sites, 16, 16);
        let config = NeighborConfig { k: 16, capacity: 1 };

        let result = compute_weights(&grid, &partition, &index, config, &CancelToken::new());
        assert!(matches!(
            result,
            Err(Error::NeighborOverflow { capacity: 1, .. })
        ));
    }

    #[test]
    fn corner_pixel_overflows_default_table() {
        // twelve sites on a quarter circle around the corner all border the corner pixel's cell
        let (width, height) = (56, 56);
        let sites = (0..12)
            .map(|i| {
                let angle = (i as f64 + 0.5) * FRAC_PI_2 / 12.0;
                Point::new(
                    40.0 * angle.cos() / width as f64,
                    40.0 * angle.sin() / height as f64,
                )
            })
            .collect::<Vec<_>>();
        let (grid, partition, index) = setup(&sites, width, height);

        let mut tally = Vec::new();
        let p = cell_center(0, 0);
        let mut local = vec![p];
        local.extend(index.nearest(p, 16).into_iter().map(|i| grid[i]));
        let rect = virtual_cell_bounds(p, &local[1..], width, height);
        tally_region(&local, &partition, rect, &mut tally);
        assert_eq!(tally.len(), 12);

        let result = compute_weights(
            &grid,
            &partition,
            &index,
            NeighborConfig::default(),
            &CancelToken::new(),
        );
        match result {
            Err(Error::NeighborOverflow { count, capacity, .. }) => {
                assert_eq!(capacity, 8);
                assert!(count > 8);
            }
            other => panic!("expected an overflow, got {other:?}"),
        }
    }

    #[test]
    fn no_sites_give_empty_table() {
        let partition = BruteForcePartitioner.partition(&[], 8, 8);
        let table = compute_weights(
            &[],
            &partition,
            &SiteIndex::new(&[]),
            NeighborConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn cancellation_stops_the_pass() {
        let (grid, partition, index) = setup(&random_sites(10, 5), 20, 20);
        let cancel = CancelToken::new();
        cancel.cancel();

        let config = NeighborConfig::default();
        let result = compute_weights(&grid, &partition, &index, config, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
