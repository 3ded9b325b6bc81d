//! Sort-and-sweep broad phase over world bounding boxes

use crate::body::Body;
use physisim_math::{Aabb2, Transform2};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// World bounding boxes of every body, in input order
pub(crate) fn compute_aabbs(bodies: &[Body], poses: &[Transform2]) -> Vec<Aabb2> {
    #[cfg(feature = "parallel")]
    {
        bodies
            .par_iter()
            .zip(poses.par_iter())
            .map(|(body, pose)| body.shape.aabb(pose))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        bodies
            .iter()
            .zip(poses)
            .map(|(body, pose)| body.shape.aabb(pose))
            .collect()
    }
}

/// Index pairs `(i, j)` with `i < j` whose boxes overlap, sorted
///
/// Touching boxes count as overlapping so no contact can be missed.
pub fn find_pairs(aabbs: &[Aabb2]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..aabbs.len()).collect();
    order.sort_by(|&a, &b| aabbs[a].min.x.total_cmp(&aabbs[b].min.x).then(a.cmp(&b)));

    let mut pairs = Vec::new();
    for (k, &i) in order.iter().enumerate() {
        let box_i = &aabbs[i];
        for &j in &order[k + 1..] {
            let box_j = &aabbs[j];
            if box_j.min.x > box_i.max.x {
                break;
            }
            if box_i.overlaps(box_j) {
                pairs.push((i.min(j), i.max(j)));
            }
        }
    }

    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use physisim_math::Vec2;

    fn square(x: f64, y: f64) -> Aabb2 {
        Aabb2::from_center_half_extents(Vec2::new(x, y), Vec2::splat(0.5))
    }

    #[test]
    fn test_finds_overlaps_only() {
        let boxes = [square(0.0, 0.0), square(0.9, 0.0), square(5.0, 0.0), square(0.0, 0.9)];
        assert_eq!(find_pairs(&boxes), vec![(0, 1), (0, 3), (1, 3)]);
    }

    #[test]
    fn test_same_x_different_y() {
        let boxes = [square(0.0, 0.0), square(0.0, 3.0)];
        assert!(find_pairs(&boxes).is_empty());
    }

    #[test]
    fn test_touching_boxes_are_candidates() {
        let boxes = [square(0.0, 0.0), square(1.0, 0.0)];
        assert_eq!(find_pairs(&boxes), vec![(0, 1)]);
    }

    #[test]
    fn test_matches_brute_force() {
        let boxes: Vec<Aabb2> = (0..40)
            .map(|i| {
                let f = i as f64;
                square((f * 0.37).sin() * 4.0, (f * 0.91).cos() * 4.0)
            })
            .collect();
        let mut brute = Vec::new();
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if boxes[i].overlaps(&boxes[j]) {
                    brute.push((i, j));
                }
            }
        }
        assert_eq!(find_pairs(&boxes), brute);
    }
}
