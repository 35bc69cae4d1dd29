//! Affine transforms.
//!
//! A [Transform] is a 3x3 affine matrix, stored as its 2x2 linear part `a`
//! plus a translation `b`, applied to column vectors:
//!
//! ```text
//! x' = a[0][0] * x + a[0][1] * y + b[0]
//! y' = a[1][0] * x + a[1][1] * y + b[1]
//! ```
//!
//! The linear part decomposes as `R(theta) * Shear(k) * Scale(sx, sy)`,
//! which is what the `rotation()`, `shear_factor()` and `scale_factors()` queries report.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Tolerance for the `does_*` predicates.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Linear part, row-major.
    pub a: [[f64; 2]; 2],
    /// Translation.
    pub b: [f64; 2],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            a: [[1.0, 0.0], [0.0, 1.0]],
            b: [0.0, 0.0],
        }
    }

    pub fn from_matrix(a: [[f64; 2]; 2], b: [f64; 2]) -> Self {
        Self { a, b }
    }

    /// Translation by `(dx, dy)`.
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self {
            b: [dx, dy],
            ..Self::identity()
        }
    }

    /// Counter-clockwise rotation about the origin, in degrees.
    pub fn rotate(degrees: f64) -> Self {
        Self::rotate_radians(degrees.to_radians())
    }

    pub fn rotate_radians(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: [[cos, -sin], [sin, cos]],
            b: [0.0, 0.0],
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: [[sx, 0.0], [0.0, sy]],
            b: [0.0, 0.0],
        }
    }

    pub fn uniform_scale(k: f64) -> Self {
        Self::scale(k, k)
    }

    /// Mirror about the x-axis (`y -> -y`).
    pub fn flip_x() -> Self {
        Self::scale(1.0, -1.0)
    }

    /// Mirror about the y-axis (`x -> -x`).
    pub fn flip_y() -> Self {
        Self::scale(-1.0, 1.0)
    }

    /// Horizontal shear, `x -> x + k * y`.
    pub fn shear(k: f64) -> Self {
        Self {
            a: [[1.0, k], [0.0, 1.0]],
            b: [0.0, 0.0],
        }
    }

    /// Compose `self` on top of `below`: points pass through `below` first, then `self`.
    pub fn compose(&self, below: &Transform) -> Transform {
        let (a, c) = (&self.a, &below.a);
        Transform {
            a: [
                [
                    a[0][0] * c[0][0] + a[0][1] * c[1][0],
                    a[0][0] * c[0][1] + a[0][1] * c[1][1],
                ],
                [
                    a[1][0] * c[0][0] + a[1][1] * c[1][0],
                    a[1][0] * c[0][1] + a[1][1] * c[1][1],
                ],
            ],
            b: [
                a[0][0] * below.b[0] + a[0][1] * below.b[1] + self.b[0],
                a[1][0] * below.b[0] + a[1][1] * below.b[1] + self.b[1],
            ],
        }
    }

    pub fn then(&self, above: &Transform) -> Transform {
        above.compose(self)
    }

    pub fn then_translate(&self, dx: f64, dy: f64) -> Transform {
        self.then(&Self::translate(dx, dy))
    }

    pub fn then_rotate(&self, degrees: f64) -> Transform {
        self.then(&Self::rotate(degrees))
    }

    pub fn then_scale(&self, sx: f64, sy: f64) -> Transform {
        self.then(&Self::scale(sx, sy))
    }

    pub fn apply(&self, p: &Point) -> Point {
        Point::new(
            self.a[0][0] * p.x + self.a[0][1] * p.y + self.b[0],
            self.a[1][0] * p.x + self.a[1][1] * p.y + self.b[1],
        )
    }

    /// The full 3x3 homogeneous matrix.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.a[0][0], self.a[0][1], self.b[0]],
            [self.a[1][0], self.a[1][1], self.b[1]],
            [0.0, 0.0, 1.0],
        ]
    }

    pub fn determinant(&self) -> f64 {
        self.a[0][0] * self.a[1][1] - self.a[0][1] * self.a[1][0]
    }

    pub fn translation(&self) -> Point {
        Point::new(self.b[0], self.b[1])
    }

    /// Rotation angle in radians, in `(-pi, pi]`.
    pub fn rotation(&self) -> f64 {
        self.decompose().theta
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation().to_degrees()
    }

    /// Per-axis scale `(sx, sy)`. `sy` is negative for mirrored transforms.
    pub fn scale_factors(&self) -> (f64, f64) {
        let d = self.decompose();
        (d.sx, d.sy)
    }

    /// Shear factor `k` of the decomposition.
    pub fn shear_factor(&self) -> f64 {
        self.decompose().shear
    }

    pub fn does_translate(&self) -> bool {
        self.b[0].abs() > EPSILON || self.b[1].abs() > EPSILON
    }

    pub fn does_rotate(&self) -> bool {
        self.rotation().abs() > EPSILON
    }

    pub fn does_scale(&self) -> bool {
        let (sx, sy) = self.scale_factors();
        (sx - 1.0).abs() > EPSILON || (sy.abs() - 1.0).abs() > EPSILON
    }

    pub fn does_shear(&self) -> bool {
        self.shear_factor().abs() > EPSILON
    }

    pub fn does_flip(&self) -> bool {
        self.determinant() < 0.0
    }

    /// Rotation, mirroring and translation only: no scaling or shearing.
    pub fn is_native(&self) -> bool {
        !self.does_scale() && !self.does_shear()
    }

    fn decompose(&self) -> Decomposition {
        let [[a, b], [c, d]] = self.a;
        let sx = a.hypot(c);
        if sx < EPSILON {
            // Degenerate first column; report the raw second column.
            return Decomposition {
                theta: 0.0,
                sx,
                sy: d,
                shear: b,
            };
        }
        let theta = c.atan2(a);
        let (sin, cos) = theta.sin_cos();
        let m = b * cos + d * sin;
        let sy = d * cos - b * sin;
        let shear = if sy.abs() < EPSILON { m } else { m / sy };
        Decomposition {
            theta,
            sx,
            sy,
            shear,
        }
    }
}

struct Decomposition {
    theta: f64,
    sx: f64,
    sy: f64,
    shear: f64,
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10.0, 20.0);
        let result = t.apply(&Point::new(5.0, 5.0));
        assert!(close(result.x, 15.0));
        assert!(close(result.y, 25.0));
        assert!(t.does_translate());
        assert!(!t.does_rotate());
        assert!(t.is_native());
    }

    #[test]
    fn test_compose_order() {
        // Rotate first, then translate.
        let t = Transform::translate(10.0, 0.0).compose(&Transform::rotate(90.0));
        let p = t.apply(&Point::new(1.0, 0.0));
        assert!(close(p.x, 10.0));
        assert!(close(p.y, 1.0));

        let chained = Transform::rotate(90.0).then_translate(10.0, 0.0);
        assert_eq!(chained, t);
        assert_eq!(Transform::translate(10.0, 0.0) * Transform::rotate(90.0), t);
    }

    #[test]
    fn test_decompose_rotation_and_scale() {
        let t = Transform::scale(2.0, 3.0).then_rotate(30.0).then_translate(1.0, -1.0);
        assert!(close(t.rotation_degrees(), 30.0));
        let (sx, sy) = t.scale_factors();
        assert!(close(sx, 2.0));
        assert!(close(sy, 3.0));
        assert!(close(t.shear_factor(), 0.0));
        assert_eq!(t.translation(), Point::new(1.0, -1.0));
        assert!(t.does_scale());
        assert!(!t.does_shear());
        assert!(!t.is_native());
    }

    #[test]
    fn test_decompose_shear() {
        let t = Transform::shear(0.5).then_rotate(45.0);
        assert!(close(t.shear_factor(), 0.5));
        assert!(close(t.rotation_degrees(), 45.0));
        assert!(t.does_shear());
        assert!(!t.does_scale());
    }

    #[test]
    fn test_flip_is_native() {
        let t = Transform::flip_x().then_rotate(90.0);
        assert!(t.does_flip());
        assert!(!t.does_scale());
        assert!(t.is_native());
        let (sx, sy) = t.scale_factors();
        assert!(close(sx, 1.0));
        assert!(close(sy, -1.0));
        assert!(close(t.rotation_degrees(), 90.0));

        let mirrored = Transform::flip_y();
        assert!(mirrored.does_flip());
        assert!(close(mirrored.rotation_degrees(), 180.0));
    }

    #[test]
    fn test_epsilon_predicates() {
        // Four quarter turns accumulate floating-point noise.
        let mut t = Transform::identity();
        for _ in 0..4 {
            t = t.then_rotate(90.0);
        }
        assert!(!t.does_rotate());
        assert!(!t.does_scale());
        assert!(!t.does_translate());
    }

    #[test]
    fn test_scale_cancels() {
        let t = Transform::uniform_scale(2.0).then_scale(0.5, 0.5);
        assert!(t.is_native());
    }

    #[test]
    fn test_from_matrix() {
        let quarter = Transform::from_matrix([[0.0, -1.0], [1.0, 0.0]], [5.0, 6.0]);
        assert!(close(quarter.rotation_degrees(), 90.0));
        assert!(quarter.is_native());
        assert_eq!(quarter.translation(), Point::new(5.0, 6.0));

        let skewed = Transform::from_matrix([[2.0, 1.0], [0.0, 1.0]], [0.0, 0.0]);
        let (sx, sy) = skewed.scale_factors();
        assert!(close(sx, 2.0));
        assert!(close(sy, 1.0));
        assert!(close(skewed.shear_factor(), 1.0));
        assert!(close(skewed.determinant(), 2.0));
    }

    #[test]
    fn test_matrix() {
        let m = Transform::translate(3.0, 4.0).matrix();
        assert_eq!(m[0], [1.0, 0.0, 3.0]);
        assert_eq!(m[1], [0.0, 1.0, 4.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0]);
    }
}
