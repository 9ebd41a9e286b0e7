use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect};

/// A 3x3 affine matrix stored column-major.
///
/// Layout: `[m00, m01, m02, m10, m11, m12, m20, m21, m22]`, where
/// `(m00, m11)` are the axis scales and `(m20, m21)` the translation. A point
/// transforms as `x' = m00·x + m10·y + m20`, `y' = m01·x + m11·y + m21`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3([f64; 9]);

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub const fn from_values(values: [f64; 9]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; 9] {
        &self.0
    }

    pub fn from_scaling(scale: Point) -> Self {
        Self([scale.x, 0.0, 0.0, 0.0, scale.y, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn from_translation(delta: Point) -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, delta.x, delta.y, 1.0])
    }

    /// The matrix mapping `from` onto `to`.
    pub fn between(from: &Rect, to: &Rect) -> Self {
        let sx = to.width() / from.width();
        let sy = to.height() / from.height();
        Self([
            sx,
            0.0,
            0.0,
            0.0,
            sy,
            0.0,
            to.x() - from.x() * sx,
            to.y() - from.y() * sy,
            1.0,
        ])
    }

    /// `self · other`: applying the result applies `other` first, then `self`.
    pub fn multiply(&self, other: &Mat3) -> Mat3 {
        let a = &self.0;
        let b = &other.0;
        let mut out = [0.0; 9];
        for col in 0..3 {
            for row in 0..3 {
                out[col * 3 + row] = (0..3).map(|k| a[k * 3 + row] * b[col * 3 + k]).sum();
            }
        }
        Mat3(out)
    }

    /// `self · scaling(scale)`
    pub fn scale(&self, scale: Point) -> Mat3 {
        self.multiply(&Mat3::from_scaling(scale))
    }

    /// `self · translation(delta)`
    pub fn translate(&self, delta: Point) -> Mat3 {
        self.multiply(&Mat3::from_translation(delta))
    }

    pub fn determinant(&self) -> f64 {
        let [a00, a01, a02, a10, a11, a12, a20, a21, a22] = self.0;
        a00 * (a22 * a11 - a12 * a21)
            + a01 * (-a22 * a10 + a12 * a20)
            + a02 * (a21 * a10 - a11 * a20)
    }

    /// `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Mat3> {
        let [a00, a01, a02, a10, a11, a12, a20, a21, a22] = self.0;
        let b01 = a22 * a11 - a12 * a21;
        let b11 = -a22 * a10 + a12 * a20;
        let b21 = a21 * a10 - a11 * a20;

        let det = a00 * b01 + a01 * b11 + a02 * b21;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;

        Some(Mat3([
            b01 * inv,
            (-a22 * a01 + a02 * a21) * inv,
            (a12 * a01 - a02 * a11) * inv,
            b11 * inv,
            (a22 * a00 - a02 * a20) * inv,
            (-a12 * a00 + a02 * a10) * inv,
            b21 * inv,
            (-a21 * a00 + a01 * a20) * inv,
            (a11 * a00 - a01 * a10) * inv,
        ]))
    }

    pub fn transform_point(&self, p: Point) -> Point {
        let m = &self.0;
        Point::new(m[0] * p.x + m[3] * p.y + m[6], m[1] * p.x + m[4] * p.y + m[7])
    }

    pub fn scale_factors(&self) -> Point {
        Point::new(self.0[0], self.0[4])
    }

    pub fn translation(&self) -> Point {
        Point::new(self.0[6], self.0[7])
    }
}
