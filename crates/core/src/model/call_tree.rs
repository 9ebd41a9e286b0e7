use serde::{Deserialize, Serialize};

use super::frame::FrameId;
use super::profile::{ProfileError, ProfileKind};

/// Index of a node in a profile's call tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// One call-path position in a finished call tree. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallTreeNode {
    frame: FrameId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    self_weight: f64,
    total_weight: f64,
    count: u64,
    recursive: Option<NodeId>,
}

impl CallTreeNode {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// `None` only for the synthetic root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn self_weight(&self) -> f64 {
        self.self_weight
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Number of samples (or closed spans) that passed through this node.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The same-frame node this one recurses with. Links are symmetric.
    pub fn recursive(&self) -> Option<NodeId> {
        self.recursive
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A node that samples may still merge into.
#[derive(Debug, Clone)]
pub(crate) struct OpenNode {
    pub(crate) frame: FrameId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) self_weight: f64,
    pub(crate) total_weight: f64,
    pub(crate) count: u64,
    pub(crate) recursive: Option<NodeId>,
}

impl OpenNode {
    fn new(frame: FrameId, parent: Option<NodeId>) -> Self {
        Self {
            frame,
            parent,
            children: Vec::new(),
            self_weight: 0.0,
            total_weight: 0.0,
            count: 0,
            recursive: None,
        }
    }

    fn freeze(self) -> CallTreeNode {
        CallTreeNode {
            frame: self.frame,
            parent: self.parent,
            children: self.children,
            self_weight: self.self_weight,
            total_weight: self.total_weight,
            count: self.count,
            recursive: self.recursive,
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Open(OpenNode),
    Frozen(CallTreeNode),
}

impl Slot {
    fn frame(&self) -> FrameId {
        match self {
            Slot::Open(n) => n.frame,
            Slot::Frozen(n) => n.frame,
        }
    }

    fn children(&self) -> &[NodeId] {
        match self {
            Slot::Open(n) => &n.children,
            Slot::Frozen(n) => &n.children,
        }
    }

    fn recursive(&self) -> Option<NodeId> {
        match self {
            Slot::Open(n) => n.recursive,
            Slot::Frozen(n) => n.recursive,
        }
    }
}

/// Two-phase call-tree construction.
///
/// Nodes start [`OpenNode`] and become [`CallTreeNode`] once the stack has
/// moved past them. Only open nodes can be reached mutably, so a closed
/// subtree can never absorb a later sample.
#[derive(Debug, Clone)]
pub(crate) struct CallTreeBuilder {
    kind: ProfileKind,
    slots: Vec<Slot>,
}

impl CallTreeBuilder {
    pub(crate) fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            slots: vec![Slot::Open(OpenNode::new(FrameId::ROOT, None))],
        }
    }

    pub(crate) fn frame_of(&self, node: NodeId) -> Option<FrameId> {
        self.slots.get(node.index()).map(Slot::frame)
    }

    pub(crate) fn open_mut(&mut self, node: NodeId) -> Result<&mut OpenNode, ProfileError> {
        match self.slots.get_mut(node.index()) {
            Some(Slot::Open(n)) => Ok(n),
            _ => Err(ProfileError::FrozenNode(node.0)),
        }
    }

    /// Finds the child of `parent` for `frame` that may absorb more weight.
    ///
    /// Time-ordered trees only reuse the last child, and only while it is
    /// open. Aggregated trees reuse any child with the frame.
    fn mergeable_child(&self, parent: NodeId, frame: FrameId) -> Option<NodeId> {
        let children = self.slots.get(parent.index())?.children();
        match self.kind {
            ProfileKind::Flamechart => {
                let last = *children.last()?;
                match self.slots.get(last.index()) {
                    Some(Slot::Open(n)) if n.frame == frame => Some(last),
                    _ => None,
                }
            }
            ProfileKind::Flamegraph => children
                .iter()
                .copied()
                .find(|c| self.frame_of(*c) == Some(frame)),
        }
    }

    /// The node for `frame` under the last entry of `path`, merged or newly
    /// created. A new node is paired with its nearest unpaired same-frame
    /// ancestor, which is returned alongside it.
    pub(crate) fn enter(
        &mut self,
        path: &[NodeId],
        frame: FrameId,
    ) -> Result<(NodeId, Option<NodeId>), ProfileError> {
        let parent = path.last().copied().unwrap_or(NodeId::ROOT);
        if let Some(existing) = self.mergeable_child(parent, frame) {
            return Ok((existing, None));
        }

        if self.kind == ProfileKind::Flamechart {
            let previous = self
                .slots
                .get(parent.index())
                .and_then(|slot| slot.children().last().copied());
            if let Some(previous) = previous {
                self.freeze(previous);
            }
        }

        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot::Open(OpenNode::new(frame, Some(parent))));
        self.open_mut(parent)?.children.push(id);

        let ancestor = path.iter().rev().copied().find(|&n| {
            !n.is_root()
                && self
                    .slots
                    .get(n.index())
                    .is_some_and(|s| s.frame() == frame && s.recursive().is_none())
        });
        if let Some(ancestor) = ancestor {
            self.open_mut(ancestor)?.recursive = Some(id);
            self.open_mut(id)?.recursive = Some(ancestor);
        }
        Ok((id, ancestor))
    }

    /// Freeze every child of `node`; used after a sample ends at `node`.
    pub(crate) fn close_children(&mut self, node: NodeId) {
        if self.kind != ProfileKind::Flamechart {
            return;
        }
        let children = match self.slots.get(node.index()) {
            Some(slot) => slot.children().to_vec(),
            None => return,
        };
        for child in children {
            self.freeze(child);
        }
    }

    /// Freeze `node` once the stack pops it.
    pub(crate) fn close(&mut self, node: NodeId) {
        if self.kind == ProfileKind::Flamechart && !node.is_root() {
            self.freeze(node);
        }
    }

    fn freeze(&mut self, node: NodeId) {
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slots.get_mut(id.index()) else {
                continue;
            };
            if let Slot::Frozen(_) = slot {
                continue;
            }
            let placeholder = Slot::Frozen(OpenNode::new(FrameId::ROOT, None).freeze());
            if let Slot::Open(open) = std::mem::replace(slot, placeholder) {
                pending.extend(open.children.iter().copied());
                *slot = Slot::Frozen(open.freeze());
            }
        }
    }

    /// Freeze everything. The root's total is its own self weight plus its
    /// children's totals.
    pub(crate) fn finish(mut self) -> CallTree {
        let root_total = {
            let children = self.slots.first().map(Slot::children).unwrap_or_default();
            children
                .iter()
                .filter_map(|c| match self.slots.get(c.index()) {
                    Some(Slot::Open(n)) => Some(n.total_weight),
                    Some(Slot::Frozen(n)) => Some(n.total_weight),
                    None => None,
                })
                .sum::<f64>()
        };
        if let Ok(root) = self.open_mut(NodeId::ROOT) {
            root.total_weight = root_total + root.self_weight;
        }
        let nodes = self
            .slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Open(n) => n.freeze(),
                Slot::Frozen(n) => n,
            })
            .collect();
        CallTree { nodes }
    }
}

/// The frozen call tree of one profile, node 0 being the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
}

impl CallTree {
    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.nodes.get(id.index())
    }

    pub fn root(&self) -> Option<&CallTreeNode> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &CallTreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Walk from `node` up to (excluding) the root; leaf first.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |n| self.node(*n).and_then(CallTreeNode::parent))
            .filter(|n| !n.is_root())
    }
}
