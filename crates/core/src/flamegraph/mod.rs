pub mod differential;
pub mod search;

use std::cell::RefCell;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stackscope_protocol::{CanvasViewOptions, ConfigSpaceModel, Point, Rect};
use thiserror::Error;

use crate::model::{Frame, FrameId, NodeId, Profile, ProfileKind};

pub use differential::{DifferentialFlamegraph, FrameDiffKey};
pub use search::{FrameField, trim_package};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlamegraphError {
    #[error("cannot lay out a {kind} profile in {sort} order")]
    UnsupportedSort {
        sort: FlamegraphSort,
        kind: ProfileKind,
    },
    #[error("unknown sort {0:?}")]
    UnknownSort(String),
    #[error("config space width must be positive and finite, got {width}")]
    InvalidConfigSpace { width: f64 },
}

/// Child ordering used when laying out frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlamegraphSort {
    /// Timeline order; needs a time-ordered profile.
    #[default]
    #[serde(rename = "call order")]
    CallOrder,
    /// Heaviest child first; needs an aggregated profile.
    #[serde(rename = "left heavy")]
    LeftHeavy,
    /// By name, then file; needs an aggregated profile.
    #[serde(rename = "alphabetical")]
    Alphabetical,
}

impl FlamegraphSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallOrder => "call order",
            Self::LeftHeavy => "left heavy",
            Self::Alphabetical => "alphabetical",
        }
    }

    /// The tree-building mode a profile needs for this sort.
    pub fn required_kind(&self) -> ProfileKind {
        match self {
            Self::CallOrder => ProfileKind::Flamechart,
            Self::LeftHeavy | Self::Alphabetical => ProfileKind::Flamegraph,
        }
    }
}

impl std::fmt::Display for FlamegraphSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlamegraphSort {
    type Err = FlamegraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call order" | "call-order" => Ok(Self::CallOrder),
            "left heavy" | "left-heavy" => Ok(Self::LeftHeavy),
            "alphabetical" => Ok(Self::Alphabetical),
            other => Err(FlamegraphError::UnknownSort(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlamegraphOptions {
    pub inverted: bool,
    pub sort: FlamegraphSort,
    /// Overrides the width of the config space; the height is always the
    /// flamegraph depth.
    pub config_space: Option<Rect>,
}

/// One laid-out call-tree node.
///
/// `start`/`end` are offsets in the profile's unit; `depth` is the row, 0
/// being the outermost frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlamegraphFrame {
    /// Position in [`Flamegraph::nodes`].
    pub key: usize,
    pub frame: FrameId,
    pub node: NodeId,
    /// `None` for top-level frames.
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: u32,
    pub start: f64,
    pub end: f64,
}

impl FlamegraphFrame {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// The synthetic root spanning every top-level frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlamegraphRoot {
    pub children: Vec<usize>,
    pub start: f64,
    pub end: f64,
    pub total_weight: f64,
}

/// A profile laid out into rows of frames.
#[derive(Debug, Clone)]
pub struct Flamegraph<'p> {
    profile: &'p Profile,
    options: FlamegraphOptions,
    nodes: Vec<FlamegraphFrame>,
    frames: Vec<usize>,
    root: FlamegraphRoot,
    depth: u32,
    config_space: Rect,
}

/// Collects frames as the layout opens and closes call-tree nodes.
struct LayoutBuilder {
    nodes: Vec<FlamegraphFrame>,
    stack: Vec<usize>,
    visible: Vec<usize>,
    root_children: Vec<usize>,
    max_depth: Option<u32>,
}

impl LayoutBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stack: Vec::new(),
            visible: Vec::new(),
            root_children: Vec::new(),
            max_depth: None,
        }
    }

    fn open(&mut self, node: NodeId, frame: FrameId, value: f64) {
        let key = self.nodes.len();
        let parent = self.stack.last().copied();
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(p) => p.children.push(key),
            None => self.root_children.push(key),
        }
        self.nodes.push(FlamegraphFrame {
            key,
            frame,
            node,
            parent,
            children: Vec::new(),
            depth: 0,
            start: value,
            end: value,
        });
        self.stack.push(key);
    }

    fn close(&mut self, value: f64) {
        let Some(key) = self.stack.pop() else {
            return;
        };
        let depth = self.stack.len() as u32;
        let Some(frame) = self.nodes.get_mut(key) else {
            return;
        };
        frame.end = value;
        frame.depth = depth;
        if frame.end - frame.start == 0.0 {
            return;
        }
        self.visible.push(key);
        self.max_depth = Some(self.max_depth.map_or(depth, |d| d.max(depth)));
    }
}

impl<'p> Flamegraph<'p> {
    /// Lay out `profile` under `options.sort`.
    ///
    /// Call order needs a flamechart profile; left heavy and alphabetical
    /// need a flamegraph profile.
    pub fn new(profile: &'p Profile, options: FlamegraphOptions) -> Result<Self, FlamegraphError> {
        let required = options.sort.required_kind();
        if profile.kind() != required {
            return Err(FlamegraphError::UnsupportedSort {
                sort: options.sort,
                kind: profile.kind(),
            });
        }

        let width = match options.config_space {
            Some(space) => space.width(),
            None if profile.duration() > 0.0 => profile.duration(),
            None => profile.unit().one_second(),
        };
        if !(width.is_finite() && width > 0.0) {
            return Err(FlamegraphError::InvalidConfigSpace { width });
        }

        let layout = match options.sort {
            FlamegraphSort::CallOrder => {
                let layout = RefCell::new(LayoutBuilder::new());
                profile.for_each(
                    |node, value| {
                        let frame = profile.node(node).map_or(FrameId::ROOT, |n| n.frame());
                        layout.borrow_mut().open(node, frame, value);
                    },
                    |_, value| layout.borrow_mut().close(value),
                );
                layout.into_inner()
            }
            FlamegraphSort::LeftHeavy | FlamegraphSort::Alphabetical => {
                let mut layout = LayoutBuilder::new();
                Self::layout_sorted(profile, options.sort, &mut layout);
                layout
            }
        };

        // Frames are listed most recently closed first.
        let LayoutBuilder {
            nodes,
            mut visible,
            root_children,
            max_depth,
            ..
        } = layout;
        visible.reverse();

        let total_weight: f64 = root_children
            .iter()
            .filter_map(|&k| nodes.get(k))
            .filter_map(|f| profile.node(f.node))
            .map(|n| n.total_weight())
            .sum();
        let root = FlamegraphRoot {
            children: root_children,
            start: 0.0,
            end: total_weight,
            total_weight,
        };

        let depth = max_depth.map_or(0, |d| d + 1);

        Ok(Self {
            profile,
            options,
            nodes,
            frames: visible,
            root,
            depth,
            config_space: Rect::new(0.0, 0.0, width, f64::from(depth)),
        })
    }

    /// Depth-first walk of the aggregated tree, children ordered by `sort`.
    /// Each child starts where its previous sibling's total weight ends.
    fn layout_sorted(profile: &Profile, sort: FlamegraphSort, layout: &mut LayoutBuilder) {
        enum Step {
            Enter(NodeId, f64),
            Exit(f64),
        }

        let sorted_children = |node: NodeId| -> Vec<NodeId> {
            let mut children = profile
                .node(node)
                .map(|n| n.children().to_vec())
                .unwrap_or_default();
            match sort {
                FlamegraphSort::LeftHeavy => children.sort_by(|a, b| {
                    let weight = |id: &NodeId| profile.node(*id).map_or(0.0, |n| n.total_weight());
                    weight(b).total_cmp(&weight(a))
                }),
                FlamegraphSort::Alphabetical => children.sort_by(|a, b| {
                    let key = |id: &NodeId| {
                        profile
                            .node_frame(*id)
                            .map(|f| (f.name.clone(), f.file.clone()))
                    };
                    key(a).cmp(&key(b))
                }),
                FlamegraphSort::CallOrder => {}
            }
            children
        };

        let mut pending: Vec<Step> = Vec::new();
        let push_children = |pending: &mut Vec<Step>, parent: NodeId, start: f64| {
            let children = sorted_children(parent);
            let mut offsets = Vec::with_capacity(children.len());
            let mut cursor = start;
            for child in children {
                offsets.push((child, cursor));
                cursor += profile.node(child).map_or(0.0, |n| n.total_weight());
            }
            // Reversed so the first child is popped first.
            pending.extend(offsets.into_iter().rev().map(|(c, s)| Step::Enter(c, s)));
        };

        push_children(&mut pending, NodeId::ROOT, 0.0);
        while let Some(step) = pending.pop() {
            match step {
                Step::Enter(node, start) => {
                    let Some(n) = profile.node(node) else {
                        continue;
                    };
                    layout.open(node, n.frame(), start);
                    pending.push(Step::Exit(start + n.total_weight()));
                    push_children(&mut pending, node, start);
                }
                Step::Exit(end) => layout.close(end),
            }
        }
    }

    pub fn profile(&self) -> &'p Profile {
        self.profile
    }

    pub fn options(&self) -> &FlamegraphOptions {
        &self.options
    }

    pub fn inverted(&self) -> bool {
        self.options.inverted
    }

    pub fn sort(&self) -> FlamegraphSort {
        self.options.sort
    }

    pub fn root(&self) -> &FlamegraphRoot {
        &self.root
    }

    /// Every laid-out node, zero-width ones included, indexed by key.
    pub fn nodes(&self) -> &[FlamegraphFrame] {
        &self.nodes
    }

    pub fn node(&self, key: usize) -> Option<&FlamegraphFrame> {
        self.nodes.get(key)
    }

    /// Visible frames, most recently closed first.
    pub fn frames(&self) -> impl Iterator<Item = &FlamegraphFrame> + '_ {
        self.frames.iter().filter_map(|&k| self.nodes.get(k))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of rows.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn config_space(&self) -> Rect {
        self.config_space
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Options for a `CanvasView` over this layout. The view cannot zoom
    /// narrower than the profile's shortest frame, so a profile without
    /// positive frames stays at full width.
    pub fn canvas_view_options(&self) -> CanvasViewOptions {
        CanvasViewOptions {
            inverted: self.options.inverted,
            min_width: self
                .profile
                .min_frame_duration()
                .min(self.config_space.width()),
            ..Default::default()
        }
    }

    /// The profile frame behind a laid-out frame.
    pub fn frame_info(&self, frame: &FlamegraphFrame) -> Option<&'p Frame> {
        self.profile.frame(frame.frame)
    }

    /// Config-space rectangle of a frame: one row tall. Frames lie inside
    /// the config space, whose width was checked to be finite.
    pub fn frame_rect(&self, frame: &FlamegraphFrame) -> Rect {
        Rect::new(frame.start, f64::from(frame.depth), frame.width(), 1.0)
    }

    /// The frame under a config-space point, found by descending from the
    /// top-level frames.
    pub fn frame_at(&self, point: Point) -> Option<&FlamegraphFrame> {
        if point.y < 0.0 || !point.y.is_finite() {
            return None;
        }
        let row = point.y.floor() as u32;
        let mut candidates = &self.root.children;
        loop {
            let hit = candidates
                .iter()
                .filter_map(|&k| self.nodes.get(k))
                .find(|f| f.width() > 0.0 && f.start <= point.x && point.x < f.end)?;
            if hit.depth == row {
                return Some(hit);
            }
            if hit.depth > row {
                return None;
            }
            candidates = &hit.children;
        }
    }

    /// Frames whose rectangle intersects a config-space view; what a
    /// renderer needs to draw.
    pub fn frames_in_view(&self, view: &Rect) -> Vec<&FlamegraphFrame> {
        self.frames()
            .filter(|f| self.frame_rect(f).overlaps(view))
            .collect()
    }
}

impl ConfigSpaceModel for Flamegraph<'_> {
    fn config_space(&self) -> Rect {
        self.config_space
    }
}
