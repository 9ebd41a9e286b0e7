use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::call_tree::{CallTree, CallTreeBuilder, CallTreeNode, NodeId};
use super::frame::{Frame, FrameId, FrameKey};
use super::frame_index::FrameIndex;
use super::unit::ProfileUnit;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("Could not resolve frame {key} in frame index")]
    UnresolvedFrame { key: FrameKey },
    #[error("Missing stackId {0} in trace")]
    MissingStack(u64),
    #[error("unbalanced trace: {open} frame(s) still open at end of stream")]
    UnbalancedStack { open: usize },
    #[error("cannot close frame {frame}: no frame is open")]
    CloseOnEmptyStack { frame: FrameKey },
    #[error("cannot close frame {found}: frame {expected} is on top of the stack")]
    MismatchedClose { expected: FrameKey, found: FrameKey },
    #[error("event at {at} goes back in time from {previous}")]
    NegativeDelta { at: f64, previous: f64 },
    #[error("{samples} samples but {weights} weights")]
    SampleWeightMismatch { samples: usize, weights: usize },
    #[error("trace contains no samples")]
    EmptyTrace,
    #[error("call tree node {0} was modified after it closed")]
    FrozenNode(u32),
}

/// How samples merge into the call tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Time order: a sample only merges into the still-open end of the
    /// previous one.
    #[default]
    Flamechart,
    /// Aggregated: identical call paths merge wherever they occur.
    Flamegraph,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flamechart => f.write_str("flamechart"),
            Self::Flamegraph => f.write_str("flamegraph"),
        }
    }
}

/// The trace encoding a profile was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Evented,
    Sampled,
    JsSelfProfiling,
    SentrySampled,
    Continuous,
}

impl std::fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evented => write!(f, "Evented"),
            Self::Sampled => write!(f, "Sampled"),
            Self::JsSelfProfiling => write!(f, "JS Self-Profiling"),
            Self::SentrySampled => write!(f, "Sentry Sampled"),
            Self::Continuous => write!(f, "Continuous"),
        }
    }
}

/// Degenerate samples that were dropped instead of rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub discarded_samples: u64,
    pub negative_samples: u64,
}

impl ProfileStats {
    pub fn is_clean(&self) -> bool {
        self.discarded_samples == 0 && self.negative_samples == 0
    }
}

/// Descriptive fields of a profile, known before any sample is replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub name: String,
    pub thread_id: Option<u64>,
    pub unit: ProfileUnit,
    pub started_at: f64,
    pub ended_at: f64,
}

impl ProfileMeta {
    pub fn new(name: impl Into<String>, unit: ProfileUnit) -> Self {
        Self {
            name: name.into(),
            thread_id: None,
            unit,
            started_at: 0.0,
            ended_at: 0.0,
        }
    }

    pub fn with_thread_id(mut self, thread_id: Option<u64>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn with_range(mut self, started_at: f64, ended_at: f64) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }
}

/// A weighted call tree plus the timeline of leaf samples that built it.
///
/// Invariants: `samples().len() == weights().len()` and
/// `duration() >= weights().iter().sum()`.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    meta: ProfileMeta,
    source: ProfileSource,
    kind: ProfileKind,
    duration: f64,
    frames: Vec<Frame>,
    tree: CallTree,
    samples: Vec<NodeId>,
    weights: Vec<f64>,
    min_frame_duration: f64,
    stats: ProfileStats,
}

impl Profile {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &ProfileMeta {
        &self.meta
    }

    pub fn thread_id(&self) -> Option<u64> {
        self.meta.thread_id
    }

    pub fn unit(&self) -> ProfileUnit {
        self.meta.unit
    }

    pub fn started_at(&self) -> f64 {
        self.meta.started_at
    }

    pub fn ended_at(&self) -> f64 {
        self.meta.ended_at
    }

    pub fn source(&self) -> ProfileSource {
        self.source
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.index())
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.tree.node(id)
    }

    /// Frame of the node, if both exist.
    pub fn node_frame(&self, id: NodeId) -> Option<&Frame> {
        self.node(id).and_then(|n| self.frame(n.frame()))
    }

    pub fn samples(&self) -> &[NodeId] {
        &self.samples
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Smallest positive sample weight, or the full duration when no sample
    /// carried weight.
    pub fn min_frame_duration(&self) -> f64 {
        self.min_frame_duration
    }

    pub fn stats(&self) -> ProfileStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Replay the sample timeline as nested open/close calls.
    ///
    /// Between consecutive samples, frames no longer on the stack are closed
    /// innermost first and new frames are opened outermost first. The value
    /// passed along is the cumulative weight before the sample; everything
    /// still open is closed at the end.
    pub fn for_each(&self, mut open: impl FnMut(NodeId, f64), mut close: impl FnMut(NodeId, f64)) {
        let mut value = 0.0;
        let mut prev_stack: Vec<NodeId> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();

        for (&sample, &weight) in self.samples.iter().zip(&self.weights) {
            stack.clear();
            stack.extend(self.tree.ancestors(sample));
            stack.reverse();

            let common = prev_stack
                .iter()
                .zip(&stack)
                .take_while(|(a, b)| a == b)
                .count();

            while prev_stack.len() > common {
                if let Some(node) = prev_stack.pop() {
                    close(node, value);
                }
            }
            for &node in &stack[common..] {
                open(node, value);
            }

            value += weight;
            std::mem::swap(&mut prev_stack, &mut stack);
        }

        while let Some(node) = prev_stack.pop() {
            close(node, value);
        }
    }
}

/// Accumulates samples into a call tree and owns the frame weight arena.
///
/// All weight mutation of a profile under construction goes through here.
#[derive(Debug)]
pub struct ProfileBuilder {
    meta: ProfileMeta,
    source: ProfileSource,
    tree: CallTreeBuilder,
    kind: ProfileKind,
    frames: Vec<Frame>,
    samples: Vec<NodeId>,
    weights: Vec<f64>,
    min_frame_duration: f64,
    stats: ProfileStats,
    seen_frames: Vec<FrameId>,
}

impl ProfileBuilder {
    pub fn new(index: &FrameIndex, source: ProfileSource, kind: ProfileKind, meta: ProfileMeta) -> Self {
        Self {
            meta,
            source,
            tree: CallTreeBuilder::new(kind),
            kind,
            frames: index.arena(),
            samples: Vec::new(),
            weights: Vec::new(),
            min_frame_duration: f64::INFINITY,
            stats: ProfileStats::default(),
            seen_frames: Vec::new(),
        }
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Append one stack (root first) carrying `weight`.
    ///
    /// Zero and negative weights are counted in [`ProfileStats`] and leave
    /// the tree untouched. An empty stack is a sample of the root itself.
    pub fn append_sample(&mut self, stack: &[FrameId], weight: f64) -> Result<(), ProfileError> {
        if weight == 0.0 {
            self.stats.discarded_samples += 1;
            return Ok(());
        }
        if weight.is_nan() || weight < 0.0 {
            self.stats.negative_samples += 1;
            return Ok(());
        }
        self.append_weighted(stack, weight)
    }

    /// Append a stack with no weight, keeping its shape in the tree and
    /// timeline without adding duration.
    pub fn append_shape(&mut self, stack: &[FrameId]) -> Result<(), ProfileError> {
        self.append_weighted(stack, 0.0)
    }

    fn append_weighted(&mut self, stack: &[FrameId], weight: f64) -> Result<(), ProfileError> {
        let mut path = Vec::with_capacity(stack.len() + 1);
        path.push(NodeId::ROOT);
        for &frame in stack {
            let node = self.enter(&path, frame)?;
            path.push(node);
        }

        self.attribute(&path, weight)?;
        for &node in &path[1..] {
            self.tree.open_mut(node)?.count += 1;
        }

        let leaf = path.last().copied().unwrap_or(NodeId::ROOT);
        self.tree.close_children(leaf);
        self.record(leaf, weight);
        Ok(())
    }

    /// Merge into or create the child of `path`'s top for `frame`.
    pub(crate) fn enter(&mut self, path: &[NodeId], frame: FrameId) -> Result<NodeId, ProfileError> {
        let (node, recursed_with) = self.tree.enter(path, frame)?;
        if recursed_with.is_some() {
            let caller = path.last().and_then(|p| self.tree.frame_of(*p));
            if let (Some(caller), Some(f)) = (caller, self.frames.get_mut(frame.index())) {
                f.mark_recursive(caller);
            }
        }
        Ok(node)
    }

    /// Add `weight` to every node on `path` and, once per sample, to every
    /// distinct frame on it. The top of the path also gains self weight.
    pub(crate) fn attribute(&mut self, path: &[NodeId], weight: f64) -> Result<(), ProfileError> {
        let Some(&leaf) = path.last() else {
            return Ok(());
        };

        self.seen_frames.clear();
        for &node in path.iter().filter(|n| !n.is_root()) {
            let open = self.tree.open_mut(node)?;
            open.total_weight += weight;
            let frame = open.frame;
            if !self.seen_frames.contains(&frame) {
                self.seen_frames.push(frame);
                if let Some(f) = self.frames.get_mut(frame.index()) {
                    f.add_total_weight(weight);
                }
            }
        }

        let open = self.tree.open_mut(leaf)?;
        open.self_weight += weight;
        let frame = open.frame;
        if !leaf.is_root()
            && let Some(f) = self.frames.get_mut(frame.index())
        {
            f.add_self_weight(weight);
        }
        Ok(())
    }

    /// Push `leaf` onto the timeline, folding into the previous entry when it
    /// is the same node.
    pub(crate) fn record(&mut self, leaf: NodeId, weight: f64) {
        if weight > 0.0 && weight < self.min_frame_duration {
            self.min_frame_duration = weight;
        }
        match (self.samples.last(), self.weights.last_mut()) {
            (Some(&last), Some(w)) if last == leaf => *w += weight,
            _ => {
                self.samples.push(leaf);
                self.weights.push(weight);
            }
        }
    }

    pub(crate) fn count_visit(&mut self, node: NodeId) -> Result<(), ProfileError> {
        self.tree.open_mut(node)?.count += 1;
        Ok(())
    }

    pub(crate) fn close(&mut self, node: NodeId) {
        self.tree.close(node);
    }

    pub(crate) fn frame_key(&self, frame: FrameId) -> FrameKey {
        self.frames
            .get(frame.index())
            .map_or(FrameKey::Root, |f| f.key)
    }

    /// Freeze the tree and settle duration.
    ///
    /// `duration` becomes `max(ended_at - started_at, sum(weights))`, and a
    /// profile that never saw a positive weight gets a minimum frame duration
    /// equal to that duration.
    pub fn build(self) -> Profile {
        let total: f64 = self.weights.iter().sum();
        let declared = self.meta.ended_at - self.meta.started_at;
        let duration = if declared.is_finite() {
            declared.max(total)
        } else {
            total
        };

        let min_frame_duration =
            if self.min_frame_duration.is_infinite() || self.min_frame_duration == 0.0 {
                duration
            } else {
                self.min_frame_duration
            };

        if !self.stats.is_clean() {
            warn!(
                "{}: dropped {} zero-weight and {} negative-weight samples",
                self.meta.name, self.stats.discarded_samples, self.stats.negative_samples
            );
        }
        debug!(
            "built {} profile {:?}: {} samples, duration {}",
            self.source,
            self.meta.name,
            self.samples.len(),
            self.meta.unit.format_value(duration)
        );

        Profile {
            meta: self.meta,
            source: self.source,
            kind: self.kind,
            duration,
            frames: self.frames,
            tree: self.tree.finish(),
            samples: self.samples,
            weights: self.weights,
            min_frame_duration,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrameDescriptor, FramePlatform};

    fn index(names: &[&str]) -> FrameIndex {
        let descs: Vec<_> = names
            .iter()
            .map(|n| FrameDescriptor {
                name: Some(n.to_string()),
                ..Default::default()
            })
            .collect();
        FrameIndex::from_descriptors(&descs, FramePlatform::Other)
    }

    fn ids(index: &FrameIndex, stack: &[u64]) -> Vec<FrameId> {
        stack
            .iter()
            .map(|&i| index.resolve(FrameKey::Index(i)).unwrap())
            .collect()
    }

    fn builder(index: &FrameIndex, kind: ProfileKind) -> ProfileBuilder {
        ProfileBuilder::new(
            index,
            ProfileSource::Sampled,
            kind,
            ProfileMeta::new("test", ProfileUnit::Milliseconds),
        )
    }

    fn frame_weights(p: &Profile, i: u64) -> (f64, f64) {
        let f = p
            .frames()
            .iter()
            .find(|f| f.key == FrameKey::Index(i))
            .unwrap();
        (f.self_weight(), f.total_weight())
    }

    #[test]
    fn accumulates_self_and_total() {
        let idx = index(&["a", "b", "c"]);
        let mut b = builder(&idx, ProfileKind::Flamechart);
        b.append_sample(&ids(&idx, &[0, 1]), 2.0).unwrap();
        b.append_sample(&ids(&idx, &[0, 1]), 1.0).unwrap();
        b.append_sample(&ids(&idx, &[0, 2]), 4.0).unwrap();
        let p = b.build();

        assert_eq!(p.samples().len(), 2);
        assert_eq!(p.weights(), &[3.0, 4.0]);
        assert_eq!(frame_weights(&p, 0), (0.0, 7.0));
        assert_eq!(frame_weights(&p, 1), (3.0, 3.0));
        assert_eq!(p.duration(), 7.0);
        assert_eq!(p.min_frame_duration(), 1.0);
        assert_eq!(p.tree().root().map(CallTreeNode::total_weight), Some(7.0));
    }

    #[test]
    fn degenerate_weights_are_counted_not_appended() {
        let idx = index(&["a"]);
        let mut b = builder(&idx, ProfileKind::Flamechart);
        b.append_sample(&ids(&idx, &[0]), 0.0).unwrap();
        b.append_sample(&ids(&idx, &[0]), -3.0).unwrap();
        let p = b.build();
        assert!(p.is_empty());
        assert_eq!(
            p.stats(),
            ProfileStats {
                discarded_samples: 1,
                negative_samples: 1
            }
        );
        assert_eq!(p.duration(), 0.0);
        assert_eq!(p.min_frame_duration(), 0.0);
    }

    #[test]
    fn declared_duration_is_kept_when_larger() {
        let idx = index(&["a"]);
        let mut b = ProfileBuilder::new(
            &idx,
            ProfileSource::Sampled,
            ProfileKind::Flamechart,
            ProfileMeta::new("t", ProfileUnit::Milliseconds).with_range(0.0, 100.0),
        );
        b.append_sample(&ids(&idx, &[0]), 5.0).unwrap();
        let p = b.build();
        assert_eq!(p.duration(), 100.0);
    }

    #[test]
    fn recursive_frame_total_counted_once() {
        let idx = index(&["a", "b"]);
        let mut b = builder(&idx, ProfileKind::Flamechart);
        b.append_sample(&ids(&idx, &[0, 1, 0]), 2.0).unwrap();
        let p = b.build();
        assert_eq!(frame_weights(&p, 0), (2.0, 2.0));
        let a = idx.resolve(FrameKey::Index(0)).unwrap();
        let b_id = idx.resolve(FrameKey::Index(1)).unwrap();
        assert_eq!(p.frame(a).and_then(Frame::recursive), Some(b_id));
    }

    #[test]
    fn for_each_opens_and_closes_in_stack_order() {
        let idx = index(&["a", "b", "c"]);
        let mut b = builder(&idx, ProfileKind::Flamechart);
        b.append_sample(&ids(&idx, &[0, 1]), 1.0).unwrap();
        b.append_sample(&ids(&idx, &[0, 2]), 2.0).unwrap();
        b.append_sample(&ids(&idx, &[]), 1.0).unwrap();
        let p = b.build();

        let log = std::cell::RefCell::new(Vec::new());
        let name = |n: NodeId| p.node_frame(n).map(|f| f.name.to_string()).unwrap_or_default();
        p.for_each(
            |n, v| log.borrow_mut().push(format!("open {} @{v}", name(n))),
            |n, v| log.borrow_mut().push(format!("close {} @{v}", name(n))),
        );
        assert_eq!(
            log.into_inner(),
            vec![
                "open a @0",
                "open b @0",
                "close b @1",
                "open c @1",
                "close c @3",
                "close a @3",
            ]
        );
    }

    #[test]
    fn flamegraph_kind_merges_separated_paths() {
        let idx = index(&["a", "b"]);
        let mut b = builder(&idx, ProfileKind::Flamegraph);
        b.append_sample(&ids(&idx, &[0]), 1.0).unwrap();
        b.append_sample(&ids(&idx, &[1]), 1.0).unwrap();
        b.append_sample(&ids(&idx, &[0]), 1.0).unwrap();
        let p = b.build();
        let root = p.tree().root().unwrap();
        assert_eq!(root.children().len(), 2);
        let a = p.node(root.children()[0]).unwrap();
        assert_eq!(a.total_weight(), 2.0);
        assert_eq!(a.count(), 2);
    }
}
