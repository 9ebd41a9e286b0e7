use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::model::{
    FramePlatform, ProfileError, ProfileGroup, ProfileMeta, ProfileSource, ProfileUnit,
};

use super::sentry::{
    SentryFrame, ThreadMetadata, ThreadSample, active_profile_index, build_thread_profile,
    frame_index, group_by_thread, merge_thread_metadata, optional_string_or_u64, string_or_f64,
    string_or_u64, thread_name,
};
use super::{ImportError, ImportOptions};

/// One chunk of a continuous profiling session (`version: "2"`). Sample
/// timestamps are absolute, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ContinuousChunk {
    #[serde(default)]
    pub platform: Option<FramePlatform>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub profiler_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_u64")]
    pub active_thread_id: Option<u64>,
    pub profile: ChunkPayload,
    #[serde(default)]
    pub thread_metadata: Option<HashMap<String, ThreadMetadata>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkPayload {
    pub samples: Vec<ChunkSample>,
    pub stacks: Vec<Vec<usize>>,
    pub frames: Vec<SentryFrame>,
    #[serde(default)]
    pub thread_metadata: Option<HashMap<String, ThreadMetadata>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkSample {
    #[serde(deserialize_with = "string_or_f64")]
    pub timestamp: f64,
    pub stack_id: usize,
    #[serde(deserialize_with = "string_or_u64")]
    pub thread_id: u64,
}

const MILLISECONDS_PER_SECOND: f64 = 1e3;

/// Import a continuous chunk, one millisecond profile per thread.
pub fn import_continuous(
    value: serde_json::Value,
    options: &ImportOptions,
) -> Result<ProfileGroup, ImportError> {
    let chunk: ContinuousChunk = serde_json::from_value(value)?;
    if chunk.profile.samples.is_empty() {
        return Err(ProfileError::EmptyTrace.into());
    }

    let platform = chunk.platform.unwrap_or_default();
    let index = frame_index(&chunk.profile.frames, platform);
    let metadata = merge_thread_metadata(chunk.thread_metadata, chunk.profile.thread_metadata);

    let threads = group_by_thread(
        chunk
            .profile
            .samples
            .iter()
            .map(|s| ThreadSample {
                thread_id: s.thread_id,
                stack_id: s.stack_id,
                timestamp: s.timestamp * MILLISECONDS_PER_SECOND,
            })
            .collect(),
    );
    debug!(
        "continuous chunk {:?}: {} frames, {} threads",
        chunk.chunk_id,
        chunk.profile.frames.len(),
        threads.len()
    );

    let mut profiles = Vec::with_capacity(threads.len());
    for (thread_id, samples) in &threads {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            continue;
        };
        let meta = ProfileMeta::new(thread_name(*thread_id, &metadata), ProfileUnit::Milliseconds)
            .with_thread_id(Some(*thread_id))
            .with_range(first.timestamp, last.timestamp);
        profiles.push(build_thread_profile(
            samples,
            &chunk.profile.stacks,
            &index,
            ProfileSource::Continuous,
            options,
            meta,
        )?);
    }

    let active_profile_index = active_profile_index(&profiles, chunk.active_thread_id);
    Ok(ProfileGroup {
        name: chunk
            .chunk_id
            .or(chunk.profiler_id)
            .unwrap_or_else(|| "Continuous profile".to_string()),
        source: ProfileSource::Continuous,
        platform,
        trace_id: None,
        active_profile_index,
        profiles,
    })
}
