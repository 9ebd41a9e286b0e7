//! Renderer-facing data types for stackscope.
//!
//! Everything a renderer needs to place a flamegraph on screen lives here:
//! rectangles, affine matrices, the config-space/view/physical-space
//! transform stack and theme tokens. Nothing in this crate knows how pixels
//! are painted.

pub mod canvas;
pub mod shared_str;
pub mod theme;
pub mod transform;
pub mod types;

pub use canvas::{
    Bounds, CanvasSpace, CanvasView, CanvasViewOptions, ConfigSpaceModel, ViewMode, ZoomStrategy,
    center_scale_matrix, compute_clamped_config_view, compute_config_view_with_strategy,
};
pub use shared_str::SharedStr;
pub use theme::{FlamegraphTheme, ThemeMode, ThemeToken};
pub use transform::Mat3;
pub use types::{Color, GeometryError, Point, Rect};
