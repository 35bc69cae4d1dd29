use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Per-layer geometry, keyed and ordered by layer name.
pub type LayerGeometry = BTreeMap<String, Vec<Polygon>>;

/// A 2D point in layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(*first, *first);
        for p in iter {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// A closed polygon. Closure from the last point back to the first is implied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle from two opposite corners, counter-clockwise from the lower-left.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let (lx, hx) = (x0.min(x1), x0.max(x1));
        let (ly, hy) = (y0.min(y1), y0.max(y1));
        Self::new(vec![
            Point::new(lx, ly),
            Point::new(hx, ly),
            Point::new(hx, hy),
            Point::new(lx, hy),
        ])
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.points)
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Create a new polygon with every point passed through `transform`.
    pub fn transform(&self, transform: &Transform) -> Self {
        Self {
            points: self.points.iter().map(|p| transform.apply(p)).collect(),
        }
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Bounding box of every point on every layer.
pub fn geometry_bbox(geometry: &LayerGeometry) -> Option<BBox> {
    BBox::from_points(
        geometry
            .values()
            .flat_map(|polys| polys.iter())
            .flat_map(|p| p.points.iter()),
    )
}
