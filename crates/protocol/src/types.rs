use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::Mat3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("non-finite rect: {x}, {y}, {w}, {h}")]
    NonFinite { x: f64, y: f64, w: f64, h: f64 },
    #[error("invalid canvas: {width}x{height} at dpr {dpr}")]
    InvalidCanvas { width: f64, height: f64, dpr: f64 },
    #[error("config space must have a positive finite size, got {0}")]
    EmptyConfigSpace(Rect),
    #[error("bar height must be positive, got {0}")]
    InvalidBarHeight(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Apply an affine transform to this point.
    pub fn transform(self, m: &Mat3) -> Self {
        m.transform_point(self)
    }
}

/// An immutable axis-aligned rectangle.
///
/// Every operation that looks like a mutation returns a new rect, and every
/// one that takes computed coordinates returns a `GeometryError` instead of
/// letting `NaN` or infinity leak into later transforms. Deserialization
/// applies the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRect")]
pub struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

#[derive(Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl TryFrom<RawRect> for Rect {
    type Error = GeometryError;

    fn try_from(raw: RawRect) -> Result<Self, Self::Error> {
        Rect::try_new(raw.x, raw.y, raw.w, raw.h)
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Rect {
    pub const EMPTY: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    /// Build a rect from coordinates known to be finite, such as literals
    /// and constants. Anything computed goes through [`Rect::try_new`].
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Construct a rect, rejecting non-finite coordinates.
    pub fn try_new(x: f64, y: f64, w: f64, h: f64) -> Result<Self, GeometryError> {
        let rect = Self::new(x, y, w, h);
        if rect.is_valid() {
            Ok(rect)
        } else {
            Err(GeometryError::NonFinite { x, y, w, h })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0.0 && self.h == 0.0
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.w
    }

    pub fn height(&self) -> f64 {
        self.h
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.h / 2.0
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Point {
        Point::new(self.w, self.h)
    }

    /// `[x, y, right, bottom]`
    pub fn to_bounds(&self) -> [f64; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    /// `[x, y, width, height]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }

    /// The matrix mapping the unit square onto this rect.
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::from_values([self.w, 0.0, 0.0, 0.0, self.h, 0.0, self.x, self.y, 1.0])
    }

    pub fn has_intersection_with(&self, other: &Rect) -> bool {
        let top = self.top().max(other.top());
        let bottom = top.max(self.bottom().min(other.bottom()));
        if bottom - top == 0.0 {
            return false;
        }
        let left = self.left().max(other.left());
        let right = left.max(self.right().min(other.right()));
        right - left != 0.0
    }

    pub fn contains_x(&self, p: Point) -> bool {
        p.x >= self.left() && p.x <= self.right()
    }

    pub fn contains_y(&self, p: Point) -> bool {
        p.y >= self.top() && p.y <= self.bottom()
    }

    pub fn contains(&self, p: Point) -> bool {
        self.contains_x(p) && self.contains_y(p)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && other.right() <= self.right()
            && self.top() <= other.top()
            && other.bottom() <= self.bottom()
    }

    /// `other` straddles this rect's left edge.
    pub fn left_overlaps_with(&self, other: &Rect) -> bool {
        other.left() <= self.left() && other.right() >= self.left()
    }

    /// This rect's right edge lies within `other`.
    pub fn right_overlaps_with(&self, other: &Rect) -> bool {
        self.right() >= other.left() && self.right() <= other.right()
    }

    pub fn overlaps_x(&self, other: &Rect) -> bool {
        self.left() <= other.right() && self.right() >= other.left()
    }

    pub fn overlaps_y(&self, other: &Rect) -> bool {
        self.top() <= other.bottom() && self.bottom() >= other.top()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.overlaps_x(other) && self.overlaps_y(other)
    }

    /// Apply an affine transform. When the transform flips an axis the origin
    /// moves by the (negative) transformed extent so width and height stay
    /// positive.
    pub fn transform_rect(&self, m: &Mat3) -> Result<Rect, GeometryError> {
        let v = m.values();
        let x = self.x * v[0] + self.y * v[3] + v[6];
        let y = self.x * v[1] + self.y * v[4] + v[7];
        let w = self.w * v[0] + self.h * v[3];
        let h = self.w * v[1] + self.h * v[4];

        Rect::try_new(
            x + if w < 0.0 { w } else { 0.0 },
            y + if h < 0.0 { h } else { 0.0 },
            w.abs(),
            h.abs(),
        )
    }

    /// Transform that mirrors the y axis inside this rect, so its top edge
    /// becomes its bottom edge and vice versa.
    pub fn invert_y_transform(&self) -> Mat3 {
        Mat3::from_values([1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, self.y * 2.0 + self.h, 1.0])
    }

    pub fn with_x(&self, x: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(x, self.y, self.w, self.h)
    }

    pub fn with_y(&self, y: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, y, self.w, self.h)
    }

    pub fn with_width(&self, w: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, self.y, w, self.h)
    }

    pub fn with_height(&self, h: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, self.y, self.w, h)
    }

    /// Scale factors from this rect's size to `to`'s size, placed at `to`'s origin.
    pub fn between(&self, to: &Rect) -> Result<Rect, GeometryError> {
        Rect::try_new(to.x, to.y, to.w / self.w, to.h / self.h)
    }

    /// Move the origin to `(x, y)`, keeping the size.
    pub fn translate(&self, x: f64, y: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(x, y, self.w, self.h)
    }

    pub fn translate_x(&self, x: f64) -> Result<Rect, GeometryError> {
        self.with_x(x)
    }

    pub fn translate_y(&self, y: f64) -> Result<Rect, GeometryError> {
        self.with_y(y)
    }

    pub fn scale_x(&self, x: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, self.y, self.w * x, self.h)
    }

    pub fn scale_y(&self, y: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, self.y, self.w, self.h * y)
    }

    /// Scale origin and size.
    pub fn scale(&self, x: f64, y: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x * x, self.y * y, self.w * x, self.h * y)
    }

    pub fn scale_origin_by(&self, x: f64, y: f64) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x * x, self.y * y, self.w, self.h)
    }

    pub fn scaled_by(&self, factor: Point) -> Result<Rect, GeometryError> {
        Rect::try_new(self.x, self.y, self.w * factor.x, self.h * factor.y)
    }

    /// Comma-joined, integer-rounded `x,y,width,height` for query strings.
    pub fn encode(&self) -> String {
        self.to_array()
            .iter()
            .map(|n| format!("{}", round_half_up(*n)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Inverse of [`Rect::encode`]. Returns `None` for anything that is not
    /// exactly four finite numbers.
    pub fn decode(encoded: &str) -> Option<Rect> {
        let parts: Vec<&str> = encoded.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut values = [0.0; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.trim().parse::<f64>().ok()?;
        }
        Rect::try_new(values[0], values[1], values[2], values[3]).ok()
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

// Rounds .5 towards positive infinity; `f64::round` rounds away from zero.
fn round_half_up(n: f64) -> f64 {
    let rounded = (n + 0.5).floor();
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_divides_sizes() {
        let from = Rect::new(1.0, 1.0, 2.0, 4.0);
        let to = Rect::new(2.0, 2.0, 4.0, 10.0);
        assert_eq!(from.between(&to).ok(), Some(Rect::new(2.0, 2.0, 2.0, 2.5)));
    }

    #[test]
    fn between_zero_size_is_rejected() {
        let from = Rect::new(0.0, 0.0, 0.0, 1.0);
        assert!(from.between(&Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn try_new_rejects_nan() {
        assert!(Rect::try_new(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(Rect::try_new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
        assert!(Rect::try_new(0.0, 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn edges_and_centers() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.bottom(), 60.0);
        assert_eq!(r.center_x(), 25.0);
        assert_eq!(r.center_y(), 40.0);
        assert_eq!(r.to_bounds(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn contains_is_inclusive() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(!r.contains(Point::new(10.1, 5.0)));
        assert!(r.contains_rect(&Rect::new(2.0, 2.0, 8.0, 8.0)));
        assert!(!r.contains_rect(&Rect::new(2.0, 2.0, 9.0, 8.0)));
    }

    #[test]
    fn overlap_predicates() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(20.0, 0.0, 5.0, 5.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.has_intersection_with(&b));
        // Touching edges overlap but do not intersect.
        let d = Rect::new(10.0, 0.0, 5.0, 10.0);
        assert!(a.overlaps(&d));
        assert!(!a.has_intersection_with(&d));
        assert!(b.left_overlaps_with(&a));
        assert!(a.right_overlaps_with(&b));
        assert!(!a.left_overlaps_with(&b));
    }

    #[test]
    fn transform_rect_scales_and_translates() {
        let m = Mat3::from_values([2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 5.0, 7.0, 1.0]);
        let r = Rect::new(1.0, 1.0, 2.0, 2.0).transform_rect(&m);
        assert_eq!(r.ok(), Some(Rect::new(7.0, 10.0, 4.0, 6.0)));
    }

    #[test]
    fn transform_rect_flips_into_positive_extent() {
        let space = Rect::new(0.0, 0.0, 100.0, 10.0);
        let flipped = Rect::new(0.0, 2.0, 10.0, 1.0).transform_rect(&space.invert_y_transform());
        assert_eq!(flipped.ok(), Some(Rect::new(0.0, 7.0, 10.0, 1.0)));
    }

    #[test]
    fn transform_rect_rejects_non_finite() {
        let m = Mat3::from_values([f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(Rect::new(0.0, 0.0, 1.0, 1.0).transform_rect(&m).is_err());
    }

    #[test]
    fn encode_rounds_to_integers() {
        let r = Rect::new(1.4, 2.5, 3.6, -0.2);
        assert_eq!(r.encode(), "1,3,4,0");
        assert_eq!(r.to_string(), "1,3,4,0");
    }

    #[test]
    fn decode_round_trip() {
        let r = Rect::new(12.0, 0.0, 340.0, 25.0);
        assert_eq!(Rect::decode(&r.encode()), Some(r));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Rect::decode("1,2,3"), None);
        assert_eq!(Rect::decode("1,2,3,x"), None);
        assert_eq!(Rect::decode("1,2,3,4,5"), None);
        assert_eq!(Rect::decode("1,2,NaN,4"), None);
    }

    #[test]
    fn builders_reject_non_finite_results() {
        let r = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert!(r.scale_x(f64::NAN).is_err());
        assert!(r.scale_y(f64::INFINITY).is_err());
        assert!(r.scaled_by(Point::new(1.0, f64::NAN)).is_err());
        assert!(r.scale_origin_by(f64::NAN, 1.0).is_err());
        assert!(r.with_x(f64::NAN).is_err());
        assert!(r.with_width(f64::INFINITY).is_err());
        assert!(r.translate(0.0, f64::NEG_INFINITY).is_err());
        assert_eq!(r.with_height(4.0), Ok(Rect::new(0.0, 0.0, 1.0, 4.0)));
        assert_eq!(r.translate_x(2.0), Ok(Rect::new(2.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn deserialize_rejects_non_finite() {
        let raw = RawRect {
            x: 0.0,
            y: 0.0,
            w: f64::NAN,
            h: 1.0,
        };
        assert!(Rect::try_from(raw).is_err());
        assert!(serde_json::from_str::<Rect>(r#"{"x":0.0,"y":0.0,"w":1e400,"h":1.0}"#).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&r).unwrap_or_default();
        let back: Rect = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(back, r);
    }
}
