//! Collision shapes and their mass properties

use crate::error::{PhysicsError, Result};
use physisim_math::{consts::EPSILON, Aabb2, Transform2, Vec2};
use serde::{Deserialize, Serialize};

/// Circle centred on the body origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Circle {
    radius: f64,
}

impl Circle {
    /// Create a circle, rejecting zero, negative or non-finite radii
    pub fn new(radius: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "circle radius must be positive, got {}",
                radius
            )));
        }
        Ok(Self { radius })
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl TryFrom<f64> for Circle {
    type Error = PhysicsError;

    fn try_from(radius: f64) -> Result<Self> {
        Self::new(radius)
    }
}

impl From<Circle> for f64 {
    fn from(circle: Circle) -> f64 {
        circle.radius
    }
}

/// Convex polygon in body-local space, counter-clockwise
///
/// Edge `i` runs from vertex `i` to vertex `i + 1` and `normals[i]` is its
/// outward unit normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec2>", into = "Vec<Vec2>")]
pub struct Polygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
}

impl Polygon {
    /// Create a convex polygon
    ///
    /// Clockwise input is reversed. Fewer than three vertices, non-finite
    /// coordinates, zero area, repeated or collinear vertices and concave
    /// outlines are rejected.
    pub fn new(vertices: Vec<Vec2>) -> Result<Self> {
        let invalid = |msg: String| Err(PhysicsError::InvalidShape(msg));

        if vertices.len() < 3 {
            return invalid(format!("polygon needs at least 3 vertices, got {}", vertices.len()));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return invalid("polygon vertices must be finite".to_string());
        }

        let mut vertices = vertices;
        let area = signed_area(&vertices);
        if area.abs() <= EPSILON {
            return invalid("polygon has zero area".to_string());
        }
        if area < 0.0 {
            vertices.reverse();
        }

        let n = vertices.len();
        let mut normals = Vec::with_capacity(n);
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let c = vertices[(i + 2) % n];
            let edge = b - a;
            let Some(dir) = edge.try_normalize() else {
                return invalid(format!("polygon vertex {} repeats vertex {}", (i + 1) % n, i));
            };
            // Strictly left turns only: a zero turn is a collinear vertex
            let turn = edge.cross(c - b);
            if turn <= EPSILON * edge.length() * (c - b).length().max(1.0) {
                return invalid(format!("polygon is not strictly convex at vertex {}", (i + 1) % n));
            }
            normals.push(Vec2::new(dir.y, -dir.x));
        }

        Ok(Self { vertices, normals })
    }

    /// Axis-aligned box centred on the origin
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "rectangle size must be positive, got {} x {}",
                width, height
            )));
        }
        let hw = width * 0.5;
        let hh = height * 0.5;
        Self::new(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false: a polygon has at least three vertices
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn area(&self) -> f64 {
        signed_area(&self.vertices)
    }

    pub fn centroid(&self) -> Vec2 {
        let n = self.vertices.len();
        let mut sum = Vec2::ZERO;
        let mut twice_area = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let cross = a.cross(b);
            twice_area += cross;
            sum += (a + b) * cross;
        }
        sum / (3.0 * twice_area)
    }

    /// Moment of inertia of a uniform lamina about the local origin
    pub fn inertia_for_mass(&self, mass: f64) -> f64 {
        let n = self.vertices.len();
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let cross = a.cross(b);
            numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
            denominator += cross;
        }
        mass * numerator / (6.0 * denominator)
    }

    /// Vertex furthest along `direction` (local space)
    pub fn support(&self, direction: Vec2) -> Vec2 {
        let mut best = self.vertices[0];
        let mut best_dot = best.dot(direction);
        for &v in &self.vertices[1..] {
            let d = v.dot(direction);
            if d > best_dot {
                best_dot = d;
                best = v;
            }
        }
        best
    }

    fn contains_local(&self, point: Vec2) -> bool {
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(point - *v) <= 0.0)
    }
}

impl TryFrom<Vec<Vec2>> for Polygon {
    type Error = PhysicsError;

    fn try_from(vertices: Vec<Vec2>) -> Result<Self> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<Vec2> {
    fn from(polygon: Polygon) -> Vec<Vec2> {
        polygon.vertices
    }
}

/// Collision geometry attached to a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
}

impl Shape {
    /// Create a circle shape
    pub fn circle(radius: f64) -> Result<Self> {
        Circle::new(radius).map(Self::Circle)
    }

    /// Create a convex polygon shape
    pub fn polygon(vertices: Vec<Vec2>) -> Result<Self> {
        Polygon::new(vertices).map(Self::Polygon)
    }

    /// Create a box shape from full size
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        Polygon::rectangle(width, height).map(Self::Polygon)
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Circle(c) => core::f64::consts::PI * c.radius * c.radius,
            Self::Polygon(p) => p.area(),
        }
    }

    pub fn centroid(&self) -> Vec2 {
        match self {
            Self::Circle(_) => Vec2::ZERO,
            Self::Polygon(p) => p.centroid(),
        }
    }

    /// Moment of inertia about the body origin for a given mass
    pub fn inertia_for_mass(&self, mass: f64) -> f64 {
        match self {
            Self::Circle(c) => 0.5 * mass * c.radius * c.radius,
            Self::Polygon(p) => p.inertia_for_mass(mass),
        }
    }

    /// Radius of the smallest origin-centred circle enclosing the shape
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Self::Circle(c) => c.radius,
            Self::Polygon(p) => p
                .vertices
                .iter()
                .map(|v| v.length())
                .fold(0.0, f64::max),
        }
    }

    /// World-space bounding box
    pub fn aabb(&self, transform: &Transform2) -> Aabb2 {
        match self {
            Self::Circle(c) => Aabb2::from_center_half_extents(transform.position, Vec2::splat(c.radius)),
            Self::Polygon(p) => p
                .vertices
                .iter()
                .fold(Aabb2::EMPTY, |aabb, &v| aabb.expand_to_include(transform.transform_point(v))),
        }
    }

    /// Polygon vertices in world space; empty for circles
    pub fn world_vertices(&self, transform: &Transform2) -> Vec<Vec2> {
        match self {
            Self::Circle(_) => Vec::new(),
            Self::Polygon(p) => p.vertices.iter().map(|&v| transform.transform_point(v)).collect(),
        }
    }

    /// Whether a world-space point lies inside or on the shape
    pub fn contains_point(&self, transform: &Transform2, point: Vec2) -> bool {
        let local = transform.inverse_transform_point(point);
        match self {
            Self::Circle(c) => local.length_squared() <= c.radius * c.radius,
            Self::Polygon(p) => p.contains_local(local),
        }
    }
}

fn signed_area(vertices: &[Vec2]) -> f64 {
    let n = vertices.len();
    (0..n)
        .map(|i| vertices[i].cross(vertices[(i + 1) % n]))
        .sum::<f64>()
        * 0.5
}
