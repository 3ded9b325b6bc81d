//! Physics queries (point picking, region queries, raycasting)

use crate::body::{Body, BodyId};
use crate::layers::CollisionGroups;
use crate::shape::Shape;
use physisim_math::{Aabb2, Ray2, Vec2};

/// Result of a raycast query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// The body that was hit
    pub body: BodyId,
    /// Hit point in world space
    pub point: Vec2,
    /// Surface normal at hit point
    pub normal: Vec2,
    /// Distance from ray origin
    pub distance: f64,
}

/// Options for queries
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum distance for rays
    pub max_distance: f64,
    /// Only report solid bodies (not sensors)
    pub solid_only: bool,
    /// Collision groups filter
    pub filter: CollisionGroups,
    /// Bodies to exclude
    pub exclude: Vec<BodyId>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_distance: f64::MAX,
            solid_only: true,
            filter: CollisionGroups::ALL,
            exclude: Vec::new(),
        }
    }
}

impl QueryOptions {
    /// Set maximum distance
    pub fn with_max_distance(mut self, distance: f64) -> Self {
        self.max_distance = distance;
        self
    }

    /// Set whether to report sensors
    pub fn with_sensors(mut self, include_sensors: bool) -> Self {
        self.solid_only = !include_sensors;
        self
    }

    /// Set collision filter
    pub fn with_filter(mut self, filter: CollisionGroups) -> Self {
        self.filter = filter;
        self
    }

    /// Add a body to exclude
    pub fn exclude(mut self, body: BodyId) -> Self {
        self.exclude.push(body);
        self
    }

    fn accepts(&self, body: &Body) -> bool {
        !(self.solid_only && body.is_sensor)
            && self.filter.can_collide(&body.groups)
            && !self.exclude.contains(&body.id)
    }
}

/// Query interface over a borrowed body list
pub struct PhysicsQuery<'a> {
    bodies: &'a [Body],
}

impl<'a> PhysicsQuery<'a> {
    pub fn new(bodies: &'a [Body]) -> Self {
        Self { bodies }
    }

    /// Bodies whose shape contains a world point, in input order
    pub fn point(&self, point: Vec2, options: &QueryOptions) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|b| options.accepts(b) && b.shape.contains_point(&b.transform(), point))
            .map(|b| b.id)
            .collect()
    }

    /// Bodies whose bounding box overlaps a region, in input order
    pub fn aabb(&self, region: &Aabb2, options: &QueryOptions) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|b| options.accepts(b) && b.shape.aabb(&b.transform()).overlaps(region))
            .map(|b| b.id)
            .collect()
    }

    /// Cast a ray and get the nearest hit
    ///
    /// Rays starting inside a shape hit it at distance zero.
    pub fn raycast(&self, origin: Vec2, direction: Vec2, options: &QueryOptions) -> Option<RaycastHit> {
        let ray = Ray2::new(origin, direction)?;
        let mut best: Option<RaycastHit> = None;

        for body in self.bodies.iter().filter(|b| options.accepts(b)) {
            let Some(hit) = cast_body(&ray, body) else {
                continue;
            };
            if hit.distance <= options.max_distance && best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
        best
    }
}

fn cast_body(ray: &Ray2, body: &Body) -> Option<RaycastHit> {
    let transform = body.transform();
    match &body.shape {
        Shape::Circle(circle) => {
            let t = ray.intersect_circle(body.position, circle.radius())?;
            let point = ray.at(t);
            let normal = (point - body.position).try_normalize().unwrap_or(-ray.direction);
            Some(RaycastHit {
                body: body.id,
                point,
                normal,
                distance: t,
            })
        }
        Shape::Polygon(_) => {
            if body.shape.contains_point(&transform, ray.origin) {
                return Some(RaycastHit {
                    body: body.id,
                    point: ray.origin,
                    normal: -ray.direction,
                    distance: 0.0,
                });
            }
            let vertices = body.shape.world_vertices(&transform);
            let n = vertices.len();
            (0..n)
                .filter_map(|i| {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % n];
                    let t = ray.intersect_segment(a, b)?;
                    let edge = (b - a).normalize();
                    Some(RaycastHit {
                        body: body.id,
                        point: ray.at(t),
                        normal: Vec2::new(edge.y, -edge.x),
                        distance: t,
                    })
                })
                .min_by(|x, y| x.distance.total_cmp(&y.distance))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use approx::assert_relative_eq;

    fn scene() -> Vec<Body> {
        vec![
            BodyDesc::fixed(Shape::rectangle(10.0, 1.0).unwrap())
                .with_position(0.0, -0.5)
                .build(BodyId(1))
                .unwrap(),
            BodyDesc::dynamic(Shape::circle(0.5).unwrap())
                .with_position(3.0, 2.0)
                .build(BodyId(2))
                .unwrap(),
            BodyDesc::dynamic(Shape::circle(0.5).unwrap())
                .with_position(-3.0, 2.0)
                .sensor(true)
                .build(BodyId(3))
                .unwrap(),
        ]
    }

    #[test]
    fn test_point_query() {
        let bodies = scene();
        let query = PhysicsQuery::new(&bodies);
        assert_eq!(query.point(Vec2::new(3.2, 2.1), &QueryOptions::default()), vec![BodyId(2)]);
        assert_eq!(query.point(Vec2::new(0.0, -0.2), &QueryOptions::default()), vec![BodyId(1)]);
        assert!(query.point(Vec2::new(0.0, 5.0), &QueryOptions::default()).is_empty());
        // sensors only when asked for
        assert!(query.point(Vec2::new(-3.0, 2.0), &QueryOptions::default()).is_empty());
        assert_eq!(
            query.point(Vec2::new(-3.0, 2.0), &QueryOptions::default().with_sensors(true)),
            vec![BodyId(3)]
        );
    }

    #[test]
    fn test_aabb_query() {
        let bodies = scene();
        let query = PhysicsQuery::new(&bodies);
        let region = Aabb2::new(Vec2::new(2.0, 0.5), Vec2::new(5.0, 5.0));
        assert_eq!(query.aabb(&region, &QueryOptions::default()), vec![BodyId(2)]);
    }

    #[test]
    fn test_raycast_nearest_hit() {
        let bodies = scene();
        let query = PhysicsQuery::new(&bodies);

        let hit = query
            .raycast(Vec2::new(3.0, 10.0), Vec2::NEG_Y, &QueryOptions::default())
            .unwrap();
        assert_eq!(hit.body, BodyId(2));
        assert_relative_eq!(hit.distance, 7.5, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-9);

        let hit = query
            .raycast(Vec2::new(0.0, 10.0), Vec2::NEG_Y, &QueryOptions::default())
            .unwrap();
        assert_eq!(hit.body, BodyId(1));
        assert_relative_eq!(hit.distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-9);

        let excluded = QueryOptions::default().exclude(BodyId(2)).with_max_distance(5.0);
        assert!(query.raycast(Vec2::new(3.0, 10.0), Vec2::NEG_Y, &excluded).is_none());
    }
}
