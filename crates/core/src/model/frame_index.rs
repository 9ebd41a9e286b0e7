use std::collections::HashMap;

use super::frame::{Frame, FrameDescriptor, FrameId, FrameKey, FramePlatform, SampleMarker};
use super::profile::ProfileError;

/// Lookup table from a trace's frame keys to normalised [`Frame`]s.
///
/// Slot 0 is always the synthetic root frame. Several keys may resolve to the
/// same frame when the importer de-duplicates descriptors.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    frames: Vec<Frame>,
    slots: HashMap<FrameKey, FrameId>,
}

impl Default for FrameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameIndex {
    pub fn new() -> Self {
        let mut slots = HashMap::new();
        slots.insert(FrameKey::Root, FrameId::ROOT);
        Self {
            frames: vec![Frame::root()],
            slots,
        }
    }

    /// One frame per descriptor, keyed by table position.
    pub fn from_descriptors(descriptors: &[FrameDescriptor], platform: FramePlatform) -> Self {
        let mut index = Self::new();
        for (i, desc) in descriptors.iter().enumerate() {
            let key = FrameKey::Index(i as u64);
            index.insert(Frame::from_descriptor(key, desc, platform));
        }
        index
    }

    /// Like [`FrameIndex::from_descriptors`], but descriptors naming the same
    /// `(file, function, line, column, instruction address)` share one frame.
    pub fn deduplicated(descriptors: &[FrameDescriptor], platform: FramePlatform) -> Self {
        let mut index = Self::new();
        let mut seen: HashMap<DedupKey<'_>, FrameId> = HashMap::new();
        for (i, desc) in descriptors.iter().enumerate() {
            let key = FrameKey::Index(i as u64);
            let dedup = DedupKey {
                file: desc.file.as_deref(),
                name: desc.name.as_deref(),
                line: desc.line,
                column: desc.column,
                instruction_addr: desc.instruction_addr.as_deref(),
            };
            match seen.get(&dedup) {
                Some(&id) => {
                    index.slots.insert(key, id);
                }
                None => {
                    let id = index.insert(Frame::from_descriptor(key, desc, platform));
                    seen.insert(dedup, id);
                }
            }
        }
        index
    }

    /// Adds the marker frames browser self-profilers attribute non-script
    /// samples to. Trace frame tables never declare them.
    pub fn with_sample_markers(mut self) -> Self {
        for marker in SampleMarker::ALL {
            self.insert(Frame::marker(marker));
        }
        self
    }

    /// Stores `frame` under its own key. A key that is already present keeps
    /// its existing frame.
    pub fn insert(&mut self, frame: Frame) -> FrameId {
        if let Some(&id) = self.slots.get(&frame.key) {
            return id;
        }
        let id = FrameId(self.frames.len() as u32);
        self.slots.insert(frame.key, id);
        self.frames.push(frame);
        id
    }

    pub fn resolve(&self, key: FrameKey) -> Result<FrameId, ProfileError> {
        self.slots
            .get(&key)
            .copied()
            .ok_or(ProfileError::UnresolvedFrame { key })
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.index())
    }

    /// Number of distinct frames, the root included.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.len() <= 1
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// A fresh weight arena for one profile built from this index.
    pub(crate) fn arena(&self) -> Vec<Frame> {
        self.frames.iter().map(Frame::reset).collect()
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct DedupKey<'a> {
    file: Option<&'a str>,
    name: Option<&'a str>,
    line: Option<u32>,
    column: Option<u32>,
    instruction_addr: Option<&'a str>,
}
