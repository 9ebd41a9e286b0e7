//! Pieces shared by the sampled (`version: "1"`) and continuous
//! (`version: "2"`) Sentry profile formats.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::{Deserialize, Deserializer};

use crate::model::{
    FrameDescriptor, FrameId, FrameIndex, FrameKey, FramePlatform, Profile, ProfileBuilder,
    ProfileError, ProfileMeta, ProfileSource,
};

use super::ImportOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentryFrame {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub abs_path: Option<String>,
    #[serde(default)]
    pub lineno: Option<u32>,
    #[serde(default)]
    pub colno: Option<u32>,
    #[serde(default)]
    pub in_app: Option<bool>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub instruction_addr: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl SentryFrame {
    fn descriptor(&self) -> FrameDescriptor {
        FrameDescriptor {
            name: self.function.clone(),
            file: self.filename.clone().or_else(|| self.abs_path.clone()),
            line: self.lineno,
            column: self.colno,
            package: self.package.clone(),
            module: self.module.clone(),
            instruction_addr: self.instruction_addr.clone(),
            is_application: self.in_app,
            platform: self.platform.as_deref().and_then(|p| p.parse().ok()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Sentry encodes 64-bit integers as strings in some SDKs and as numbers in
/// others.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Float(f64),
}

pub(crate) fn string_or_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        StringOrNumber::Unsigned(n) => Ok(n),
        StringOrNumber::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        StringOrNumber::Float(f) => Err(serde::de::Error::custom(format!(
            "expected an unsigned integer, got {f}"
        ))),
    }
}

pub(crate) fn optional_string_or_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "string_or_u64")] u64);
    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(n)| n))
}

pub(crate) fn string_or_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        StringOrNumber::Unsigned(n) => Ok(n as f64),
        StringOrNumber::Float(f) => Ok(f),
    }
}

/// Frame table with identical frames collapsed onto one [`crate::model::Frame`].
pub(crate) fn frame_index(frames: &[SentryFrame], platform: FramePlatform) -> FrameIndex {
    let descriptors: Vec<_> = frames.iter().map(SentryFrame::descriptor).collect();
    FrameIndex::deduplicated(&descriptors, platform)
}

/// Metadata may sit at the top level or inside `profile`; the inner one wins.
pub(crate) fn merge_thread_metadata(
    outer: Option<HashMap<String, ThreadMetadata>>,
    inner: Option<HashMap<String, ThreadMetadata>>,
) -> HashMap<String, ThreadMetadata> {
    let mut merged = outer.unwrap_or_default();
    merged.extend(inner.unwrap_or_default());
    merged
}

/// One sample normalised across both formats.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreadSample {
    pub thread_id: u64,
    pub stack_id: usize,
    /// In the profile's unit.
    pub timestamp: f64,
}

/// Split samples per thread, each thread sorted by time. Equal timestamps
/// keep their trace order.
pub(crate) fn group_by_thread(samples: Vec<ThreadSample>) -> BTreeMap<u64, Vec<ThreadSample>> {
    let mut threads: BTreeMap<u64, Vec<ThreadSample>> = BTreeMap::new();
    for sample in samples {
        threads.entry(sample.thread_id).or_default().push(sample);
    }
    for samples in threads.values_mut() {
        samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }
    threads
}

pub(crate) fn thread_name(thread_id: u64, metadata: &HashMap<String, ThreadMetadata>) -> String {
    metadata
        .get(&thread_id.to_string())
        .and_then(|m| m.name.clone())
        .unwrap_or_else(|| thread_id.to_string())
}

/// Build one thread's profile. Stacks are stored leaf first; a sample's
/// weight runs until the next sample, and the last sample carries none.
pub(crate) fn build_thread_profile(
    samples: &[ThreadSample],
    stacks: &[Vec<usize>],
    index: &FrameIndex,
    source: ProfileSource,
    options: &ImportOptions,
    meta: ProfileMeta,
) -> Result<Profile, ProfileError> {
    let mut builder = ProfileBuilder::new(index, source, options.kind, meta);
    let mut resolved: HashMap<usize, Vec<FrameId>> = HashMap::new();

    for (i, sample) in samples.iter().enumerate() {
        if !resolved.contains_key(&sample.stack_id) {
            let stack = stacks
                .get(sample.stack_id)
                .ok_or(ProfileError::MissingStack(sample.stack_id as u64))?;
            let frames = stack
                .iter()
                .rev()
                .map(|&f| index.resolve(FrameKey::Index(f as u64)))
                .collect::<Result<Vec<_>, _>>()?;
            resolved.insert(sample.stack_id, frames);
        }
        let stack = resolved
            .get(&sample.stack_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let weight = samples
            .get(i + 1)
            .map_or(0.0, |next| next.timestamp - sample.timestamp);
        builder.append_sample(stack, weight)?;
    }

    Ok(builder.build())
}

/// Index of the profile to open first: the requested thread, then a thread
/// named `main`, then the first one.
pub(crate) fn active_profile_index(profiles: &[Profile], active_thread_id: Option<u64>) -> usize {
    if let Some(tid) = active_thread_id {
        if let Some(i) = profiles.iter().position(|p| p.thread_id() == Some(tid)) {
            return i;
        }
        warn!("active thread {tid} has no samples, falling back");
    }
    profiles
        .iter()
        .position(|p| p.name() == "main")
        .unwrap_or(0)
}
