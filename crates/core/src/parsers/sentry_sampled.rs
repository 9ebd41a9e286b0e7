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

/// Transaction-scoped sampled profile (`version: "1"`), timed in nanoseconds
/// since the profile started.
#[derive(Debug, Clone, Deserialize)]
pub struct SentrySampledProfile {
    #[serde(default)]
    pub platform: Option<FramePlatform>,
    #[serde(default)]
    pub transaction: Option<SentryTransaction>,
    #[serde(default)]
    pub transactions: Vec<SentryTransaction>,
    pub profile: SampledPayload,
    #[serde(default)]
    pub thread_metadata: Option<HashMap<String, ThreadMetadata>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentryTransaction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_u64")]
    pub active_thread_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampledPayload {
    pub samples: Vec<SentrySample>,
    pub stacks: Vec<Vec<usize>>,
    pub frames: Vec<SentryFrame>,
    #[serde(default)]
    pub thread_metadata: Option<HashMap<String, ThreadMetadata>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentrySample {
    pub stack_id: usize,
    #[serde(deserialize_with = "string_or_u64")]
    pub thread_id: u64,
    #[serde(deserialize_with = "string_or_f64")]
    pub elapsed_since_start_ns: f64,
}

pub fn import_sentry_sampled(
    value: serde_json::Value,
    options: &ImportOptions,
) -> Result<ProfileGroup, ImportError> {
    let trace: SentrySampledProfile = serde_json::from_value(value)?;
    if trace.profile.samples.is_empty() {
        return Err(ProfileError::EmptyTrace.into());
    }

    let platform = trace.platform.unwrap_or_default();
    let index = frame_index(&trace.profile.frames, platform);
    let metadata = merge_thread_metadata(trace.thread_metadata, trace.profile.thread_metadata);
    let transaction = trace
        .transaction
        .or_else(|| trace.transactions.into_iter().next());

    let threads = group_by_thread(
        trace
            .profile
            .samples
            .iter()
            .map(|s| ThreadSample {
                thread_id: s.thread_id,
                stack_id: s.stack_id,
                timestamp: s.elapsed_since_start_ns,
            })
            .collect(),
    );
    debug!(
        "sampled profile: {} frames, {} stacks, {} threads",
        trace.profile.frames.len(),
        trace.profile.stacks.len(),
        threads.len()
    );

    let mut profiles = Vec::with_capacity(threads.len());
    for (thread_id, samples) in &threads {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            continue;
        };
        let meta = ProfileMeta::new(thread_name(*thread_id, &metadata), ProfileUnit::Nanoseconds)
            .with_thread_id(Some(*thread_id))
            .with_range(first.timestamp, last.timestamp);
        profiles.push(build_thread_profile(
            samples,
            &trace.profile.stacks,
            &index,
            ProfileSource::SentrySampled,
            options,
            meta,
        )?);
    }

    let active_thread_id = transaction.as_ref().and_then(|t| t.active_thread_id);
    let active_profile_index = active_profile_index(&profiles, active_thread_id);
    Ok(ProfileGroup {
        name: transaction
            .as_ref()
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| "Profile".to_string()),
        source: ProfileSource::SentrySampled,
        platform,
        trace_id: transaction.and_then(|t| t.trace_id),
        active_profile_index,
        profiles,
    })
}
