//! Config-space ↔ view ↔ physical-space transforms.
//!
//! A model (typically a flamegraph) lives in a fixed *config space*
//! (time × depth). The user looks at a zoomed/panned window into it, the
//! *config view*. Renderers draw into *physical space*, the canvas in device
//! pixels, which relates to *logical space* (CSS-like pixels) through the
//! device pixel ratio.

use serde::{Deserialize, Serialize};

use crate::transform::Mat3;
use crate::types::{GeometryError, Point, Rect};

/// Anything that exposes a config space a [`CanvasView`] can navigate.
pub trait ConfigSpaceModel {
    fn config_space(&self) -> Rect;
}

impl ConfigSpaceModel for Rect {
    fn config_space(&self) -> Rect {
        *self
    }
}

/// The drawable area of one canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSpace {
    physical_space: Rect,
    logical_space: Rect,
    logical_to_physical: Mat3,
    physical_to_logical: Mat3,
    dpr: f64,
}

impl CanvasSpace {
    /// `width`/`height` are the canvas size in device pixels; `origin` reserves
    /// a leading margin (e.g. for an axis) that is excluded from physical space.
    pub fn new(width: f64, height: f64, dpr: f64, origin: Point) -> Result<Self, GeometryError> {
        let invalid = GeometryError::InvalidCanvas { width, height, dpr };
        if !(dpr.is_finite() && dpr > 0.0) || width <= origin.x || height <= origin.y {
            return Err(invalid);
        }

        let physical_space =
            Rect::try_new(origin.x, origin.y, width - origin.x, height - origin.y)?;
        let logical_space = physical_space.scale(1.0 / dpr, 1.0 / dpr)?;

        Ok(Self {
            physical_space,
            logical_space,
            logical_to_physical: Mat3::between(&logical_space, &physical_space),
            physical_to_logical: Mat3::between(&physical_space, &logical_space),
            dpr,
        })
    }

    pub fn physical_space(&self) -> Rect {
        self.physical_space
    }

    pub fn logical_space(&self) -> Rect {
        self.logical_space
    }

    pub fn logical_to_physical(&self) -> Mat3 {
        self.logical_to_physical
    }

    pub fn physical_to_logical(&self) -> Mat3 {
        self.physical_to_logical
    }

    pub fn dpr(&self) -> f64 {
        self.dpr
    }
}

/// How the config view is fitted vertically into the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    /// One row per `bar_height` pixels, starting at the top of config space.
    #[default]
    AnchorTop,
    /// One row per `bar_height` pixels, scrolled so the deepest rows are visible.
    AnchorBottom,
    /// The whole config space height is squeezed into the canvas.
    StretchToFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasViewOptions {
    pub inverted: bool,
    /// Narrowest config view the user can zoom into.
    pub min_width: f64,
    /// Physical pixels per config-space row.
    pub bar_height: f64,
    /// Extra rows reserved below the model.
    pub depth_offset: f64,
    pub mode: ViewMode,
}

impl Default for CanvasViewOptions {
    fn default() -> Self {
        Self {
            inverted: false,
            min_width: 0.0,
            bar_height: 20.0,
            depth_offset: 0.0,
            mode: ViewMode::AnchorTop,
        }
    }
}

/// Inclusive `[min, max]` range used for clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// When `min > max`, `max` wins.
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Clamp a requested view into `[min, max]` extents, then clamp its origin so
/// it never leaves `[0, max - extent]`.
pub fn compute_clamped_config_view(
    view: &Rect,
    width: Bounds,
    height: Bounds,
) -> Result<Rect, GeometryError> {
    if !view.is_valid() {
        return Err(GeometryError::NonFinite {
            x: view.x(),
            y: view.y(),
            w: view.width(),
            h: view.height(),
        });
    }

    let clamped_width = clamp(view.width(), width.min, width.max);
    let clamped_height = clamp(view.height(), height.min, height.max);

    let max_x = width.max - clamped_width;
    let max_y = if clamped_height >= height.max {
        0.0
    } else {
        height.max - clamped_height
    };

    Rect::try_new(
        clamp(view.x(), 0.0, max_x),
        clamp(view.y(), 0.0, max_y),
        clamped_width,
        clamped_height,
    )
}

/// How to bring a frame into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoomStrategy {
    /// Move the view as little as possible; zoom only if the frame is wider than the view.
    Min,
    /// Fit the view exactly to the frame's horizontal extent.
    Exact,
}

pub fn compute_config_view_with_strategy(
    strategy: ZoomStrategy,
    view: &Rect,
    frame: &Rect,
) -> Result<Rect, GeometryError> {
    match strategy {
        ZoomStrategy::Exact => frame.with_height(view.height()),
        ZoomStrategy::Min => {
            if view.width() <= frame.width() {
                return frame.with_height(view.height());
            }
            if view.contains_rect(frame) {
                return Ok(*view);
            }

            let mut offset = *view;
            if frame.left() < view.left() {
                offset = offset.with_x(frame.x())?;
            } else if frame.right() > view.right() {
                offset = offset.with_x(offset.x() + frame.right() - offset.right())?;
            }

            if frame.bottom() < view.top() {
                offset = offset.with_y(frame.top())?;
            } else if frame.bottom() > view.bottom() {
                offset = offset.with_y(offset.y() + frame.bottom() - offset.bottom())?;
            }
            Ok(offset)
        }
    }
}

/// Scale by `scale` around `center`: `p' = center + scale · (p - center)`.
pub fn center_scale_matrix(scale: Point, center: Point) -> Mat3 {
    Mat3::from_translation(center)
        .scale(scale)
        .translate(center.scale(-1.0))
}

/// A navigable window into a model's config space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasView {
    model_space: Rect,
    config_space: Rect,
    config_view: Rect,
    options: CanvasViewOptions,
}

impl CanvasView {
    pub fn new<M: ConfigSpaceModel + ?Sized>(
        canvas: &CanvasSpace,
        model: &M,
        options: CanvasViewOptions,
    ) -> Result<Self, GeometryError> {
        let model_space = model.config_space();
        if !model_space.is_valid() || model_space.width() <= 0.0 {
            return Err(GeometryError::EmptyConfigSpace(model_space));
        }
        if !(options.bar_height.is_finite() && options.bar_height > 0.0) {
            return Err(GeometryError::InvalidBarHeight(options.bar_height));
        }

        let mut view = Self {
            model_space,
            config_space: Rect::EMPTY,
            config_view: Rect::EMPTY,
            options,
        };
        view.init_config_space(canvas)?;
        view.reset_config_view(canvas)?;
        Ok(view)
    }

    pub fn config_space(&self) -> Rect {
        self.config_space
    }

    pub fn config_view(&self) -> Rect {
        self.config_view
    }

    pub fn options(&self) -> &CanvasViewOptions {
        &self.options
    }

    pub fn inverted(&self) -> bool {
        self.options.inverted
    }

    fn visible_rows(&self, canvas: &CanvasSpace) -> f64 {
        canvas.physical_space().height() / self.options.bar_height
    }

    fn init_config_space(&mut self, canvas: &CanvasSpace) -> Result<(), GeometryError> {
        let rows = self.model_space.height() + self.options.depth_offset;
        let height = match self.options.mode {
            ViewMode::StretchToFit => rows,
            ViewMode::AnchorTop | ViewMode::AnchorBottom => rows.max(self.visible_rows(canvas)),
        };
        self.config_space = Rect::try_new(0.0, 0.0, self.model_space.width(), height)?;
        Ok(())
    }

    fn initial_config_view(
        &self,
        canvas: &CanvasSpace,
        space: &Rect,
    ) -> Result<Rect, GeometryError> {
        match self.options.mode {
            ViewMode::StretchToFit => Ok(*space),
            ViewMode::AnchorTop => space.with_height(self.visible_rows(canvas)),
            ViewMode::AnchorBottom => {
                let height = self.visible_rows(canvas);
                let y = (space.y() - (height - space.height())).ceil().max(0.0);
                space.with_height(height)?.with_y(y)
            }
        }
    }

    /// Reset the view to show the model from its start.
    pub fn reset_config_view(&mut self, canvas: &CanvasSpace) -> Result<(), GeometryError> {
        let initial = self.initial_config_view(canvas, &self.config_space)?;
        self.set_config_view(&initial)
    }

    /// Recompute config space for a resized canvas, keeping the current
    /// horizontal window.
    pub fn resize(&mut self, canvas: &CanvasSpace) -> Result<(), GeometryError> {
        self.init_config_space(canvas)?;
        let view = match self.options.mode {
            ViewMode::StretchToFit => self.config_view.with_height(self.config_space.height())?,
            ViewMode::AnchorTop | ViewMode::AnchorBottom => {
                self.config_view.with_height(self.visible_rows(canvas))?
            }
        };
        self.set_config_view(&view)
    }

    pub fn set_config_view(&mut self, view: &Rect) -> Result<(), GeometryError> {
        self.set_config_view_with_min_width(view, self.options.min_width)
    }

    pub fn set_config_view_with_min_width(
        &mut self,
        view: &Rect,
        min_width: f64,
    ) -> Result<(), GeometryError> {
        self.config_view = compute_clamped_config_view(
            view,
            Bounds::new(min_width, self.config_space.width()),
            Bounds::new(0.0, self.config_space.height()),
        )?;
        Ok(())
    }

    pub fn transform_config_view(&mut self, m: &Mat3) -> Result<(), GeometryError> {
        let view = self.config_view.transform_rect(m)?;
        self.set_config_view(&view)
    }

    /// Zoom horizontally by `factor` (< 1 zooms in) around a config-space x.
    pub fn zoom_at(&mut self, factor: f64, center_x: f64) -> Result<(), GeometryError> {
        let m = center_scale_matrix(
            Point::new(factor, 1.0),
            Point::new(center_x, self.config_view.y()),
        );
        self.transform_config_view(&m)
    }

    /// Pan by a config-space delta.
    pub fn pan(&mut self, delta: Point) -> Result<(), GeometryError> {
        self.transform_config_view(&Mat3::from_translation(delta))
    }

    /// Bring `frame` (a config-space rect) into view.
    pub fn zoom_to_frame(&mut self, frame: &Rect, strategy: ZoomStrategy) -> Result<(), GeometryError> {
        let view = compute_config_view_with_strategy(strategy, &self.config_view, frame)?;
        self.set_config_view(&view)
    }

    fn with_inversion(&self, m: Mat3, flip_within: &Rect) -> Mat3 {
        if self.options.inverted {
            flip_within.invert_y_transform().multiply(&m)
        } else {
            m
        }
    }

    /// Map `space` onto config space.
    pub fn to_config_space(&self, space: &Rect) -> Mat3 {
        self.with_inversion(Mat3::between(space, &self.config_space), &self.config_space)
    }

    /// Map `space` onto the current config view.
    pub fn to_config_view(&self, space: &Rect) -> Mat3 {
        self.with_inversion(Mat3::between(space, &self.config_view), &self.config_view)
    }

    /// Map config space onto `space`.
    pub fn from_config_space(&self, space: &Rect) -> Mat3 {
        self.with_inversion(Mat3::between(&self.config_space, space), space)
    }

    /// Map the current config view onto `space`.
    pub fn from_config_view(&self, space: &Rect) -> Mat3 {
        self.with_inversion(Mat3::between(&self.config_view, space), space)
    }

    /// Like [`CanvasView::from_config_view`] for geometry already expressed
    /// relative to `space`'s origin (e.g. inside a translated draw context).
    pub fn from_transformed_config_view(&self, space: &Rect) -> Mat3 {
        let m = Mat3::between(&self.config_view, space);
        if self.options.inverted {
            Mat3::from_values([1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, space.height(), 1.0]).multiply(&m)
        } else {
            m
        }
    }

    pub fn from_transformed_config_space(&self, space: &Rect) -> Mat3 {
        let m = Mat3::between(&self.config_space, space);
        if self.options.inverted {
            Mat3::from_values([1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, space.height(), 1.0]).multiply(&m)
        } else {
            m
        }
    }

    /// Convert a logical-space cursor into a config-space position.
    pub fn config_space_cursor(&self, logical_cursor: Point, canvas: &CanvasSpace) -> Point {
        let physical = canvas.logical_to_physical().transform_point(logical_cursor);
        self.to_config_view(&canvas.physical_space()).transform_point(physical)
    }
}
