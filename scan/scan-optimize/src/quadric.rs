//! Quadric error metric.
//!
//! A quadric accumulates the squared distance to a set of planes as a
//! symmetric 4x4 matrix `Q = Σ p pᵀ` with `p = [n, -n·x₀]`. The error of a
//! point `v` is `vᵀ Q v` in homogeneous coordinates.

use std::ops::{Add, AddAssign};

use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Squared distance to a set of planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric(Matrix4<f64>);

impl Default for Quadric {
    fn default() -> Self {
        Self(Matrix4::zeros())
    }
}

impl Quadric {
    /// Quadric of the plane through `point` with unit `normal`.
    #[must_use]
    pub fn from_plane(normal: &Vector3<f64>, point: &Point3<f64>) -> Self {
        let p = Vector4::new(normal.x, normal.y, normal.z, -normal.dot(&point.coords));
        Self(p * p.transpose())
    }

    /// Sum of squared plane distances at `point`.
    #[must_use]
    pub fn error(&self, point: &Point3<f64>) -> f64 {
        let v = point.to_homogeneous();
        v.dot(&(self.0 * v))
    }

    /// Point of least error, or `None` when the planes do not pin one down
    /// (flat or cylindrical neighborhoods).
    #[must_use]
    pub fn minimizer(&self) -> Option<Point3<f64>> {
        let a: Matrix3<f64> = self.0.fixed_view::<3, 3>(0, 0).into_owned();
        if a.determinant().abs() < 1e-10 {
            return None;
        }
        let b = Vector3::new(-self.0[(0, 3)], -self.0[(1, 3)], -self.0[(2, 3)]);
        a.try_inverse().map(|inv| Point3::from(inv * b))
    }
}

impl Add for Quadric {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_error_is_squared_distance() {
        let q = Quadric::from_plane(&Vector3::z(), &Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(q.error(&Point3::new(5.0, -2.0, 1.0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.error(&Point3::new(0.0, 0.0, 3.0)), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_neighborhood_has_no_minimizer() {
        let q = Quadric::from_plane(&Vector3::z(), &Point3::origin())
            + Quadric::from_plane(&Vector3::z(), &Point3::new(1.0, 0.0, 0.0));
        assert!(q.minimizer().is_none());
    }

    #[test]
    fn corner_minimizer_is_the_corner() {
        let corner = Point3::new(0.1, 0.2, 0.3);
        let mut q = Quadric::default();
        q += Quadric::from_plane(&Vector3::x(), &corner);
        q += Quadric::from_plane(&Vector3::y(), &corner);
        q += Quadric::from_plane(&Vector3::z(), &corner);
        let m = q.minimizer().unwrap();
        assert_relative_eq!(m, corner, epsilon = 1e-9);
        assert_relative_eq!(q.error(&m), 0.0, epsilon = 1e-12);
    }
}
