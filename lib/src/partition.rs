//! Discrete Voronoi partition of a raster grid.
//!
//! Every grid cell is labelled with the index of the site closest to the cell center. Sites are
//! given in normalized `[0, 1]²` space and scaled to grid units, so cell `(x, y)` is compared
//! against sites at `(x + 0.5, y + 0.5)`.
use crate::point::Point;
use rayon::prelude::*;

/// Label of a cell that no site owns. Only produced for an empty site list.
pub const UNDEFINED: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionMap {
    width: usize,
    height: usize,
    site_count: usize,
    indices: Vec<u32>,
}

impl PartitionMap {
    pub fn undefined(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            site_count: 0,
            indices: vec![UNDEFINED; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of sites the map was built from, including sites that own no cell.
    pub fn site_count(&self) -> usize {
        self.site_count
    }

    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.indices[y * self.width + x]
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.indices[y * self.width..(y + 1) * self.width]
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// False when the map came from an empty site list and must not be read.
    pub fn is_defined(&self) -> bool {
        self.site_count > 0
    }
}

/// Center of grid cell `(x, y)` in grid units.
pub fn cell_center(x: usize, y: usize) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

/// Index of the site closest to `p`. Both are expected in the same units; on exact ties the
/// lowest index wins.
pub fn nearest_site(sites: &[Point], p: Point) -> Option<u32> {
    let mut best = None;
    let mut minimum = f64::INFINITY;

    for (index, site) in sites.iter().enumerate() {
        let distance = site.distance_squared(&p);

        if distance < minimum {
            minimum = distance;
            best = Some(index as u32);
        }
    }

    best
}

/// Strategy for labelling a grid. Swapping in a faster method does not touch the engine.
pub trait Partitioner: Send + Sync {
    fn partition(&self, sites: &[Point], width: usize, height: usize) -> PartitionMap;
}

/// Tests every site for every cell, one row per rayon task.
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForcePartitioner;

impl Partitioner for BruteForcePartitioner {
    fn partition(&self, sites: &[Point], width: usize, height: usize) -> PartitionMap {
        if sites.is_empty() || width == 0 || height == 0 {
            return PartitionMap::undefined(width, height);
        }

        let scaled = sites
            .iter()
            .map(|s| s.scale(width as f64, height as f64))
            .collect::<Vec<_>>();

        let mut indices = vec![UNDEFINED; width * height];

        indices
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    *cell = nearest_site(&scaled, cell_center(x, y)).unwrap_or(UNDEFINED);
                }
            });

        PartitionMap {
            width,
            height,
            site_count: sites.len(),
            indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sites_give_undefined_map() {
        let map = BruteForcePartitioner.partition(&[], 4, 3);
        assert!(!map.is_defined());
        assert!(map.indices().iter().all(|&i| i == UNDEFINED));
    }

    #[test]
    fn two_sites_split_grid_in_halves() {
        let sites = [Point::new(0.25, 0.5), Point::new(0.75, 0.5)];
        let map = BruteForcePartitioner.partition(&sites, 8, 4);

        for y in 0..4 {
            assert_eq!(map.row(y), &[0, 0, 0, 0, 1, 1, 1, 1]);
        }
        assert_eq!(map.site_count(), 2);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let sites = [Point::new(0.5, 0.5), Point::new(0.5, 0.5)];
        let map = BruteForcePartitioner.partition(&sites, 3, 3);
        assert!(map.indices().iter().all(|&i| i == 0));

        let local = [Point::new(0.0, 0.0), Point::new(2.0, 0.0)];
        assert_eq!(nearest_site(&local, Point::new(1.0, 0.0)), Some(0));
    }

    #[test]
    fn every_cell_owned_by_its_nearest_site() {
        let sites = [
            Point::new(0.1, 0.2),
            Point::new(0.8, 0.3),
            Point::new(0.4, 0.9),
            Point::new(0.55, 0.5),
        ];
        let (width, height) = (17, 11);
        let map = BruteForcePartitioner.partition(&sites, width, height);

        for y in 0..height {
            for x in 0..width {
                let center = cell_center(x, y);
                let owner = map.get(x, y) as usize;
                let owner_distance = sites[owner]
                    .scale(width as f64, height as f64)
                    .distance_squared(&center);

                for site in &sites {
                    let d = site
                        .scale(width as f64, height as f64)
                        .distance_squared(&center);
                    assert!(owner_distance <= d);
                }
            }
        }
    }
}
