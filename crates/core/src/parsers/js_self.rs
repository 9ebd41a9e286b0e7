use std::collections::HashMap;

use serde::Deserialize;

use crate::model::{
    FrameDescriptor, FrameId, FrameIndex, FrameKey, FramePlatform, ProfileBuilder, ProfileError,
    ProfileGroup, ProfileMeta, ProfileSource, ProfileUnit, SampleMarker,
};

use super::{ImportError, ImportOptions};

/// Trace produced by the browser JS Self-Profiling API.
#[derive(Debug, Clone, Deserialize)]
pub struct JsSelfProfilingTrace {
    pub resources: Vec<String>,
    pub frames: Vec<JsFrame>,
    pub samples: Vec<JsSample>,
    pub stacks: Vec<JsStack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsFrame {
    pub name: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub resource_id: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsSample {
    pub timestamp: f64,
    #[serde(default)]
    pub stack_id: Option<u64>,
    #[serde(default)]
    pub marker: Option<SampleMarker>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsStack {
    pub frame_id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

fn frame_descriptors(trace: &JsSelfProfilingTrace) -> Vec<FrameDescriptor> {
    trace
        .frames
        .iter()
        .map(|f| FrameDescriptor {
            name: Some(f.name.clone()),
            file: f.resource_id.and_then(|id| trace.resources.get(id).cloned()),
            line: f.line,
            column: f.column,
            ..Default::default()
        })
        .collect()
}

/// Resolves `stackId`s into root-first frame lists, memoising each one.
struct StackResolver<'a> {
    stacks: &'a [JsStack],
    index: &'a FrameIndex,
    cache: HashMap<u64, Vec<FrameId>>,
}

impl<'a> StackResolver<'a> {
    fn new(stacks: &'a [JsStack], index: &'a FrameIndex) -> Self {
        Self {
            stacks,
            index,
            cache: HashMap::new(),
        }
    }

    fn resolve(&mut self, stack_id: u64) -> Result<Vec<FrameId>, ProfileError> {
        if let Some(stack) = self.cache.get(&stack_id) {
            return Ok(stack.clone());
        }

        let mut frames = Vec::new();
        let mut next = Some(stack_id);
        while let Some(id) = next {
            // A parent chain longer than the table means a cycle.
            if frames.len() > self.stacks.len() {
                return Err(ProfileError::MissingStack(id));
            }
            let entry = usize::try_from(id)
                .ok()
                .and_then(|i| self.stacks.get(i))
                .ok_or(ProfileError::MissingStack(id))?;
            frames.push(self.index.resolve(FrameKey::Index(entry.frame_id))?);
            next = entry.parent_id;
        }
        frames.reverse();

        self.cache.insert(stack_id, frames.clone());
        Ok(frames)
    }
}

/// Import a JS Self-Profiling trace as a single millisecond profile.
///
/// Each sample's weight is the time since the previous one. The first sample
/// only contributes its stack shape. A non-script marker becomes a synthetic
/// leaf frame; when such a sample carries no stack, it reuses the previous
/// sample's stack.
pub fn import_js_self_profile(
    value: serde_json::Value,
    options: &ImportOptions,
) -> Result<ProfileGroup, ImportError> {
    let trace: JsSelfProfilingTrace = serde_json::from_value(value)?;
    let (Some(first), Some(last)) = (trace.samples.first(), trace.samples.last()) else {
        return Err(ProfileError::EmptyTrace.into());
    };

    let index = FrameIndex::from_descriptors(&frame_descriptors(&trace), FramePlatform::JavaScript)
        .with_sample_markers();
    let meta = ProfileMeta::new("JS Self-Profiling", ProfileUnit::Milliseconds)
        .with_range(first.timestamp, last.timestamp);
    let mut builder = ProfileBuilder::new(&index, ProfileSource::JsSelfProfiling, options.kind, meta);
    let mut resolver = StackResolver::new(&trace.stacks, &index);

    let mut previous_stack_id: Option<u64> = None;
    for (i, sample) in trace.samples.iter().enumerate() {
        let marker = sample.marker.filter(|m| *m != SampleMarker::Script);
        let stack_id = match (sample.stack_id, marker) {
            (None, Some(_)) => previous_stack_id,
            (id, _) => id,
        };

        let mut stack = match stack_id {
            Some(id) => resolver.resolve(id)?,
            None => Vec::new(),
        };
        if let Some(marker) = marker {
            stack.push(index.resolve(FrameKey::Marker(marker))?);
        }

        if i == 0 {
            builder.append_shape(&stack)?;
        } else {
            let weight = sample.timestamp - trace.samples[i - 1].timestamp;
            builder.append_sample(&stack, weight)?;
        }
        previous_stack_id = stack_id;
    }

    Ok(ProfileGroup {
        name: "JS Self-Profiling".to_string(),
        source: ProfileSource::JsSelfProfiling,
        platform: FramePlatform::JavaScript,
        trace_id: None,
        active_profile_index: 0,
        profiles: vec![builder.build()],
    })
}
