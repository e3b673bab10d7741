use crate::point::Point;
use kiddo::{KdTree, SquaredEuclidean};
use log::debug;

// Below this many sites a linear scan beats building a tree.
const LINEAR_SCAN_LIMIT: usize = 64;

// Leaf size of `kiddo::KdTree`. A full leaf whose points all share the coordinate it is split on
// cannot be split, so no axis value may repeat this often.
const BUCKET_SIZE: usize = 32;

fn longest_run(mut values: Vec<f64>) -> usize {
    values.sort_unstable_by(f64::total_cmp);

    let mut longest = 0;
    let mut run = 0;

    for (i, v) in values.iter().enumerate() {
        if i > 0 && values[i - 1] == *v {
            run += 1;
        } else {
            run = 1;
        }

        longest = longest.max(run);
    }

    longest
}

fn tree_can_hold(points: &[Point]) -> bool {
    points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
        && longest_run(points.iter().map(|p| p.x).collect()) < BUCKET_SIZE
        && longest_run(points.iter().map(|p| p.y).collect()) < BUCKET_SIZE
}

/// k-d tree over site positions, built once after the stippling loop has settled.
pub struct SiteIndex {
    points: Vec<Point>,
    tree: Option<KdTree<f64, 2>>,
}

impl SiteIndex {
    pub fn new(points: &[Point]) -> Self {
        let mut tree = None;

        if points.len() > LINEAR_SCAN_LIMIT {
            if tree_can_hold(points) {
                let mut kdtree: KdTree<f64, 2> = KdTree::with_capacity(points.len());

                for (i, p) in points.iter().enumerate() {
                    kdtree.add(&[p.x, p.y], i as u64);
                }

                tree = Some(kdtree);
            } else {
                debug!(
                    "{} sites repeat a coordinate too often for a k-d tree, scanning linearly",
                    points.len()
                );
            }
        }

        Self {
            points: points.to_vec(),
            tree,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices of up to `k` sites closest to `query`, nearest first.
    pub fn nearest(&self, query: Point, k: usize) -> Vec<usize> {
        let k = k.min(self.points.len());

        if k == 0 {
            return Vec::new();
        }

        match &self.tree {
            Some(tree) => tree
                .nearest_n::<SquaredEuclidean>(&[query.x, query.y], k)
                .into_iter()
                .map(|n| n.item as usize)
                .collect(),
            None => {
                let mut indices: Vec<usize> = (0..self.points.len()).collect();
                indices.sort_by(|&a, &b| {
                    self.points[a]
                        .distance_squared(&query)
                        .total_cmp(&self.points[b].distance_squared(&query))
                });
                indices.truncate(k);
                indices
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn brute_force(points: &[Point], query: Point, k: usize) -> Vec<usize> {
        let mut expected: Vec<usize> = (0..points.len()).collect();
        expected.sort_by(|&a, &b| {
            points[a]
                .distance_squared(&query)
                .total_cmp(&points[b].distance_squared(&query))
        });
        expected.truncate(k);
        expected
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = SiteIndex::new(&[]);
        assert!(index.is_empty());
        assert!(index.nearest(Point::new(1.0, 1.0), 16).is_empty());
    }

    #[test]
    fn k_is_clamped_to_site_count() {
        let index = SiteIndex::new(&[Point::new(0.0, 0.0), Point::new(5.0, 5.0)]);
        let found = index.nearest(Point::new(4.0, 4.0), 16);
        assert_eq!(found, vec![1, 0]);
    }

    #[test]
    fn small_sets_are_sorted_by_distance() {
        let points = [
            Point::new(9.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(5.0, 0.0),
        ];
        let index = SiteIndex::new(&points);
        assert_eq!(index.nearest(Point::new(0.0, 0.0), 2), vec![1, 2]);
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let points: Vec<Point> = (0..500)
            .map(|_| Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();
        let index = SiteIndex::new(&points);
        assert!(index.tree.is_some());

        for _ in 0..50 {
            let query = Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0));
            let mut found = index.nearest(query, 16);
            let mut expected = brute_force(&points, query, 16);

            found.sort_unstable();
            expected.sort_unstable();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn vertical_line_of_sites() {
        let points: Vec<Point> = (0..100).map(|i| Point::new(50.0, i as f64)).collect();
        let index = SiteIndex::new(&points);

        assert!(index.tree.is_none());

        let found = index.nearest(Point::new(50.3, 20.2), 4);
        assert_eq!(found, vec![20, 21, 19, 22]);
    }

    #[test]
    fn repeated_coordinates_below_leaf_size_use_tree() {
        // every y value repeats 31 times
        let points: Vec<Point> = (0..31)
            .flat_map(|x| (0..3).map(move |y| Point::new(x as f64, y as f64 * 10.0)))
            .collect();
        let index = SiteIndex::new(&points);
        assert!(index.tree.is_some());

        let mut rng = ChaCha8Rng::seed_from_u64(77);

        for _ in 0..50 {
            let query = Point::new(rng.gen_range(0.0..31.0), rng.gen_range(0.0..20.0));
            let mut found = index.nearest(query, 8);
            let mut expected = brute_force(&points, query, 8);

            found.sort_unstable();
            expected.sort_unstable();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn stacked_sites_fall_back_to_scan() {
        let mut points = vec![Point::new(3.0, 4.0); 80];
        points.push(Point::new(10.0, 10.0));
        let index = SiteIndex::new(&points);

        assert!(index.tree.is_none());
        assert_eq!(index.nearest(Point::new(10.0, 9.0), 1), vec![80]);
    }
}
