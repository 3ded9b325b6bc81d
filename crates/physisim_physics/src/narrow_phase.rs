//! Exact contact generation with the separating axis test

use crate::manifold::ContactPoint;
use crate::shape::{Polygon, Shape};
use physisim_math::{consts::EPSILON, Transform2, Vec2};

/// Contact between two shapes, normal pointing from the first to the second
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub normal: Vec2,
    pub penetration: f64,
    pub points: Vec<ContactPoint>,
}

impl Collision {
    fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// Test two posed shapes for overlap
///
/// Returns `None` when the shapes are separated or merely touching.
pub fn collide(shape_a: &Shape, xf_a: &Transform2, shape_b: &Shape, xf_b: &Transform2) -> Option<Collision> {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => circle_circle(xf_a.position, a.radius(), xf_b.position, b.radius()),
        (Shape::Circle(a), Shape::Polygon(b)) => {
            circle_polygon(xf_a.position, a.radius(), &WorldPolygon::new(b, xf_b))
        }
        (Shape::Polygon(a), Shape::Circle(b)) => {
            circle_polygon(xf_b.position, b.radius(), &WorldPolygon::new(a, xf_a)).map(Collision::flipped)
        }
        (Shape::Polygon(a), Shape::Polygon(b)) => {
            polygon_polygon(&WorldPolygon::new(a, xf_a), &WorldPolygon::new(b, xf_b))
        }
    }
}

/// Polygon transformed into world space
struct WorldPolygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
}

impl WorldPolygon {
    fn new(polygon: &Polygon, xf: &Transform2) -> Self {
        Self {
            vertices: polygon.vertices().iter().map(|&v| xf.transform_point(v)).collect(),
            normals: polygon.normals().iter().map(|&n| xf.transform_direction(n)).collect(),
        }
    }

    fn project(&self, axis: Vec2) -> (f64, f64) {
        self.vertices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), v| {
            let d = v.dot(axis);
            (lo.min(d), hi.max(d))
        })
    }

    fn edge(&self, index: usize) -> (Vec2, Vec2) {
        (self.vertices[index], self.vertices[(index + 1) % self.vertices.len()])
    }
}

/// Overlap of two projected intervals along `axis`
///
/// Returns the direction B must move to separate (`axis` or `-axis`) and the
/// distance, or `None` when the intervals are disjoint or only touch.
fn axis_overlap(axis: Vec2, (min_a, max_a): (f64, f64), (min_b, max_b): (f64, f64)) -> Option<(Vec2, f64)> {
    let push_forward = max_a - min_b;
    let push_back = max_b - min_a;
    if push_forward <= 0.0 || push_back <= 0.0 {
        return None;
    }
    if push_forward <= push_back {
        Some((axis, push_forward))
    } else {
        Some((-axis, push_back))
    }
}

fn circle_circle(center_a: Vec2, radius_a: f64, center_b: Vec2, radius_b: f64) -> Option<Collision> {
    let delta = center_b - center_a;
    let distance = delta.length();
    let penetration = radius_a + radius_b - distance;
    if penetration <= 0.0 {
        return None;
    }
    // Concentric circles have no preferred direction
    let normal = if distance > EPSILON { delta / distance } else { Vec2::Y };
    Some(Collision {
        normal,
        penetration,
        points: vec![ContactPoint::new(center_a + normal * radius_a, penetration)],
    })
}

/// Circle first, polygon second
fn circle_polygon(center: Vec2, radius: f64, polygon: &WorldPolygon) -> Option<Collision> {
    let nearest_vertex = polygon
        .vertices
        .iter()
        .copied()
        .fold((Vec2::ZERO, f64::MAX), |best, v| {
            let d = v.distance_squared(center);
            if d < best.1 {
                (v, d)
            } else {
                best
            }
        })
        .0;
    let vertex_axis = (nearest_vertex - center).try_normalize();

    let mut best: Option<(Vec2, f64)> = None;
    for axis in polygon.normals.iter().copied().chain(vertex_axis) {
        let c = center.dot(axis);
        let (normal, depth) = axis_overlap(axis, (c - radius, c + radius), polygon.project(axis))?;
        if best.map_or(true, |(_, d)| depth < d) {
            best = Some((normal, depth));
        }
    }

    let (normal, penetration) = best?;
    Some(Collision {
        normal,
        penetration,
        points: vec![ContactPoint::new(center + normal * radius, penetration)],
    })
}

fn polygon_polygon(a: &WorldPolygon, b: &WorldPolygon) -> Option<Collision> {
    // Axes of A are tested before axes of B; on equal overlap the earlier axis is kept
    let mut best: Option<(Vec2, f64, bool)> = None;
    for (from_a, owner) in [(true, a), (false, b)] {
        for &axis in &owner.normals {
            let (normal, depth) = axis_overlap(axis, a.project(axis), b.project(axis))?;
            if best.map_or(true, |(_, d, _)| depth < d) {
                best = Some((normal, depth, from_a));
            }
        }
    }
    let (normal, penetration, from_a) = best?;

    let (reference, incident, outward) = if from_a { (a, b, normal) } else { (b, a, -normal) };
    let points = clip_contacts(reference, incident, outward)
        .unwrap_or_else(|| vec![deepest_point(incident, outward, penetration)]);

    Some(Collision {
        normal,
        penetration,
        points,
    })
}

/// Clip the incident edge against the side planes of the reference edge
fn clip_contacts(reference: &WorldPolygon, incident: &WorldPolygon, outward: Vec2) -> Option<Vec<ContactPoint>> {
    let ref_index = index_of_extreme(&reference.normals, |n| n.dot(outward));
    let ref_normal = reference.normals[ref_index];
    let (v1, v2) = reference.edge(ref_index);

    let inc_index = index_of_extreme(&incident.normals, |n| -n.dot(ref_normal));
    let (i1, i2) = incident.edge(inc_index);

    let tangent = (v2 - v1).try_normalize()?;
    let segment = clip_segment([i1, i2], -tangent, -tangent.dot(v1))?;
    let segment = clip_segment(segment, tangent, tangent.dot(v2))?;

    let points: Vec<ContactPoint> = segment
        .iter()
        .filter_map(|&p| {
            let separation = ref_normal.dot(p - v1);
            (separation <= 0.0).then(|| ContactPoint::new(p, -separation))
        })
        .collect();

    (!points.is_empty()).then_some(points)
}

/// Keep the part of a segment behind the plane `normal · p = offset`
fn clip_segment(segment: [Vec2; 2], normal: Vec2, offset: f64) -> Option<[Vec2; 2]> {
    let da = normal.dot(segment[0]) - offset;
    let db = normal.dot(segment[1]) - offset;

    let mut out = [Vec2::ZERO; 2];
    let mut count = 0;
    if da <= 0.0 {
        out[count] = segment[0];
        count += 1;
    }
    if db <= 0.0 {
        out[count] = segment[1];
        count += 1;
    }
    if da * db < 0.0 && count < 2 {
        out[count] = segment[0] + (segment[1] - segment[0]) * (da / (da - db));
        count += 1;
    }

    (count == 2).then_some(out)
}

fn deepest_point(incident: &WorldPolygon, outward: Vec2, penetration: f64) -> ContactPoint {
    let index = index_of_extreme(&incident.vertices, |v| -v.dot(outward));
    ContactPoint::new(incident.vertices[index], penetration)
}

/// First index maximising `score`
fn index_of_extreme(items: &[Vec2], score: impl Fn(Vec2) -> f64) -> usize {
    let mut best = 0;
    let mut best_score = f64::MIN;
    for (i, &item) in items.iter().enumerate() {
        let s = score(item);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f64, y: f64) -> Transform2 {
        Transform2::from_position(Vec2::new(x, y))
    }

    #[test]
    fn test_squares_overlap_along_x() {
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let delta = 0.1;
        let hit = collide(&square, &at(0.0, 0.0), &square, &at(1.0 - delta, 0.0)).unwrap();
        assert_relative_eq!(hit.penetration, delta, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.y, 0.0, epsilon = 1e-12);
        assert_eq!(hit.points.len(), 2);
        for p in &hit.points {
            assert_relative_eq!(p.penetration, delta, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_separated_and_touching_squares() {
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        assert!(collide(&square, &at(0.0, 0.0), &square, &at(1.5, 0.0)).is_none());
        assert!(collide(&square, &at(0.0, 0.0), &square, &at(1.0, 0.0)).is_none());
    }

    #[test]
    fn test_equal_overlap_prefers_first_axis() {
        // Diagonal offset gives the same overlap on x and y
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let hit = collide(&square, &at(0.0, 0.0), &square, &at(0.8, 0.8)).unwrap();
        let again = collide(&square, &at(0.0, 0.0), &square, &at(0.8, 0.8)).unwrap();
        assert_eq!(hit, again);
        assert_relative_eq!(hit.penetration, 0.2, epsilon = 1e-12);
        // A's bottom edge is tested first and ties with the side edge: +y wins
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_points_from_a_to_b() {
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let hit = collide(&square, &at(0.0, 0.0), &square, &at(0.0, -0.9)).unwrap();
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1e-12);
        let flipped = collide(&square, &at(0.0, -0.9), &square, &at(0.0, 0.0)).unwrap();
        assert_relative_eq!(flipped.normal.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_circle() {
        let circle = Shape::circle(1.0).unwrap();
        let hit = collide(&circle, &at(0.0, 0.0), &circle, &at(1.5, 0.0)).unwrap();
        assert_relative_eq!(hit.penetration, 0.5, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.points[0].position.x, 1.0, epsilon = 1e-12);
        assert!(collide(&circle, &at(0.0, 0.0), &circle, &at(2.0, 0.0)).is_none());

        let concentric = collide(&circle, &at(0.0, 0.0), &circle, &at(0.0, 0.0)).unwrap();
        assert_eq!(concentric.normal, Vec2::Y);
    }

    #[test]
    fn test_circle_on_box_face() {
        let ground = Shape::rectangle(10.0, 1.0).unwrap();
        let ball = Shape::circle(0.5).unwrap();
        let hit = collide(&ground, &at(0.0, 0.0), &ball, &at(0.0, 0.9)).unwrap();
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.penetration, 0.1, epsilon = 1e-12);
        // contact lies on the circle surface
        assert_relative_eq!(hit.points[0].position.y, 0.4, epsilon = 1e-12);

        let reversed = collide(&ball, &at(0.0, 0.9), &ground, &at(0.0, 0.0)).unwrap();
        assert_relative_eq!(reversed.normal.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_near_box_corner() {
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let ball = Shape::circle(0.5).unwrap();
        // Outside the corner region along the diagonal: face axes overlap, vertex axis does not
        assert!(collide(&ball, &at(0.9, 0.9), &square, &at(0.0, 0.0)).is_none());

        let hit = collide(&ball, &at(0.8, 0.8), &square, &at(0.0, 0.0)).unwrap();
        let expected = Vec2::new(-1.0, -1.0).normalize();
        assert_relative_eq!(hit.normal.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.y, expected.y, epsilon = 1e-9);
        assert_relative_eq!(hit.penetration, 0.5 - 0.3 * 2.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_rotated_box_on_ground() {
        let ground = Shape::rectangle(10.0, 1.0).unwrap();
        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let tilted = Transform2::from_position_angle(Vec2::new(0.0, 1.15), core::f64::consts::FRAC_PI_4);
        let hit = collide(&ground, &at(0.0, 0.0), &square, &tilted).unwrap();
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(hit.penetration, 0.5 + 0.5f64.sqrt() * 1.0 - 1.15, epsilon = 1e-9);
        assert_eq!(hit.points.len(), 1);
    }
}
