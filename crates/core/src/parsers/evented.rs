use serde::Deserialize;

use crate::model::{
    FrameId, FrameIndex, FrameKey, NodeId, Profile, ProfileBuilder, ProfileError, ProfileMeta,
    ProfileSource, ProfileUnit,
};

use super::{ImportError, ImportOptions};

/// A profile recorded as explicit open/close events.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventedProfile {
    #[serde(default)]
    pub name: Option<String>,
    pub unit: String,
    pub start_value: f64,
    pub end_value: f64,
    #[serde(default, rename = "threadID")]
    pub thread_id: Option<u64>,
    pub events: Vec<FrameEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FrameEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub at: f64,
    pub frame: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "C")]
    Close,
}

/// Replays open/close events against a [`ProfileBuilder`].
///
/// Time elapsed between two events is attributed to whatever is on the stack
/// at that moment, so self weight lands on the stack top and total weight on
/// every open frame. Elapsed time with nothing open becomes a root sample.
pub struct EventedReplay {
    builder: ProfileBuilder,
    path: Vec<NodeId>,
    frames: Vec<FrameId>,
    last_value: f64,
}

impl EventedReplay {
    pub fn new(builder: ProfileBuilder, start_value: f64) -> Self {
        Self {
            builder,
            path: vec![NodeId::ROOT],
            frames: Vec::new(),
            last_value: start_value.max(0.0),
        }
    }

    fn advance(&mut self, at: f64) -> Result<(), ProfileError> {
        let delta = at - self.last_value;
        if delta < 0.0 {
            return Err(ProfileError::NegativeDelta {
                at,
                previous: self.last_value,
            });
        }
        if delta > 0.0 {
            self.builder.attribute(&self.path, delta)?;
            let top = self.path.last().copied().unwrap_or(NodeId::ROOT);
            self.builder.record(top, delta);
        }
        self.last_value = at;
        Ok(())
    }

    pub fn open(&mut self, frame: FrameId, at: f64) -> Result<(), ProfileError> {
        self.advance(at)?;
        let node = self.builder.enter(&self.path, frame)?;
        self.path.push(node);
        self.frames.push(frame);
        Ok(())
    }

    pub fn close(&mut self, frame: FrameId, at: f64) -> Result<(), ProfileError> {
        self.advance(at)?;
        let Some(top) = self.frames.last().copied() else {
            return Err(ProfileError::CloseOnEmptyStack {
                frame: self.builder.frame_key(frame),
            });
        };
        if top != frame {
            return Err(ProfileError::MismatchedClose {
                expected: self.builder.frame_key(top),
                found: self.builder.frame_key(frame),
            });
        }
        self.frames.pop();
        if let Some(node) = self.path.pop() {
            self.builder.count_visit(node)?;
            self.builder.close(node);
        }
        Ok(())
    }

    /// Fails if any frame is still open.
    pub fn finish(self) -> Result<Profile, ProfileError> {
        if !self.frames.is_empty() {
            return Err(ProfileError::UnbalancedStack {
                open: self.frames.len(),
            });
        }
        Ok(self.builder.build())
    }
}

pub fn import_evented(
    profile: &EventedProfile,
    index: &FrameIndex,
    options: &ImportOptions,
    fallback_name: &str,
) -> Result<Profile, ImportError> {
    let unit: ProfileUnit = profile.unit.parse()?;
    let meta = ProfileMeta::new(profile.name.as_deref().unwrap_or(fallback_name), unit)
        .with_thread_id(profile.thread_id)
        .with_range(profile.start_value, profile.end_value);
    let builder = ProfileBuilder::new(index, ProfileSource::Evented, options.kind, meta);

    let mut replay = EventedReplay::new(builder, profile.start_value);
    for event in &profile.events {
        let frame = index.resolve(FrameKey::Index(event.frame))?;
        match event.kind {
            EventKind::Open => replay.open(frame, event.at)?,
            EventKind::Close => replay.close(frame, event.at)?,
        }
    }
    Ok(replay.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrameDescriptor, FramePlatform, ProfileKind};

    fn frames(n: usize) -> FrameIndex {
        let descs: Vec<_> = (0..n)
            .map(|i| FrameDescriptor {
                name: Some(format!("f{i}")),
                ..Default::default()
            })
            .collect();
        FrameIndex::from_descriptors(&descs, FramePlatform::Other)
    }

    fn evented(events: &[(EventKind, f64, u64)], end: f64) -> EventedProfile {
        EventedProfile {
            name: Some("main".into()),
            unit: "milliseconds".into(),
            start_value: 0.0,
            end_value: end,
            thread_id: None,
            events: events
                .iter()
                .map(|&(kind, at, frame)| FrameEvent { kind, at, frame })
                .collect(),
        }
    }

    use EventKind::{Close as C, Open as O};

    #[test]
    fn nested_open_close_weights() {
        let index = frames(2);
        let trace = evented(&[(O, 0.0, 0), (O, 1.0, 1), (C, 2.0, 1), (C, 4.0, 0)], 4.0);
        let profile = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap();

        let f0 = profile.frame(index.resolve(FrameKey::Index(0)).unwrap()).unwrap();
        let f1 = profile.frame(index.resolve(FrameKey::Index(1)).unwrap()).unwrap();
        assert_eq!(f0.total_weight(), 4.0);
        assert_eq!(f0.self_weight(), 3.0);
        assert_eq!(f1.total_weight(), 1.0);
        assert_eq!(profile.duration(), 4.0);

        let order = std::cell::RefCell::new(Vec::new());
        profile.for_each(
            |n, _| order.borrow_mut().push(format!("open {}", profile.node_frame(n).unwrap().name)),
            |n, _| order.borrow_mut().push(format!("close {}", profile.node_frame(n).unwrap().name)),
        );
        assert_eq!(order.into_inner(), ["open f0", "open f1", "close f1", "close f0"]);
    }

    #[test]
    fn unbalanced_stream_fails() {
        let index = frames(2);
        let trace = evented(&[(O, 0.0, 0), (O, 1.0, 1), (C, 2.0, 1)], 4.0);
        let err = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Profile(ProfileError::UnbalancedStack { open: 1 })
        ));
    }

    #[test]
    fn time_going_backwards_fails() {
        let index = frames(1);
        let trace = evented(&[(O, 5.0, 0), (C, 3.0, 0)], 5.0);
        let err = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Profile(ProfileError::NegativeDelta { .. })
        ));
    }

    #[test]
    fn close_must_match_stack_top() {
        let index = frames(2);
        let trace = evented(&[(O, 0.0, 0), (O, 1.0, 1), (C, 2.0, 0)], 4.0);
        let err = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Profile(ProfileError::MismatchedClose { .. })
        ));

        let trace = evented(&[(C, 0.0, 0)], 1.0);
        let err = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Profile(ProfileError::CloseOnEmptyStack { .. })
        ));
    }

    #[test]
    fn idle_time_is_a_root_sample() {
        let index = frames(1);
        let trace = evented(&[(O, 2.0, 0), (C, 3.0, 0)], 3.0);
        let profile = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap();
        assert_eq!(profile.samples()[0], NodeId::ROOT);
        assert_eq!(profile.weights(), &[2.0, 1.0]);
        assert_eq!(profile.tree().root().unwrap().total_weight(), 3.0);
    }

    #[test]
    fn repeated_calls_merge_in_flamegraph_mode() {
        let index = frames(2);
        let trace = evented(
            &[(O, 0.0, 0), (C, 1.0, 0), (O, 1.0, 1), (C, 2.0, 1), (O, 2.0, 0), (C, 4.0, 0)],
            4.0,
        );
        let options = ImportOptions::new(ProfileKind::Flamegraph);
        let profile = import_evented(&trace, &index, &options, "t").unwrap();
        let root = profile.tree().root().unwrap();
        assert_eq!(root.children().len(), 2);
        let f0 = profile.node(root.children()[0]).unwrap();
        assert_eq!(f0.total_weight(), 3.0);
        assert_eq!(f0.count(), 2);

        let chart = import_evented(&trace, &index, &ImportOptions::default(), "t").unwrap();
        assert_eq!(chart.tree().root().unwrap().children().len(), 3);
    }
}
