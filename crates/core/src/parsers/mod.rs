pub mod continuous;
pub mod evented;
pub mod js_self;
pub mod sampled;
pub mod schema;
pub mod sentry;
pub mod sentry_sampled;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ProfileError, ProfileGroup, ProfileKind, UnknownUnit};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    UnsupportedUnit(#[from] UnknownUnit),
    #[error("unable to detect format")]
    UnknownFormat,
    #[error("trace contains no profiles")]
    NoProfiles,
}

/// Settings shared by every importer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Tree-building mode for every imported profile.
    pub kind: ProfileKind,
}

impl ImportOptions {
    pub fn new(kind: ProfileKind) -> Self {
        Self { kind }
    }
}

/// The trace encodings [`import_profile_group`] recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceFormat {
    Schema,
    JsSelfProfiling,
    SentrySampled,
    Continuous,
}

/// Identify the trace encoding from its top-level keys.
///
/// 1. `resources`: browser JS self-profiling trace.
/// 2. `version: "2"` with a `profile`: continuous profiling chunk.
/// 3. `version: "1"`: sampled transaction profile.
/// 4. `profiles` next to `shared.frames`: evented/sampled schema container.
pub fn detect_format(value: &serde_json::Value) -> Option<TraceFormat> {
    let obj = value.as_object()?;

    if obj.get("resources").is_some_and(serde_json::Value::is_array) {
        return Some(TraceFormat::JsSelfProfiling);
    }

    let version = obj.get("version").and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    match version.as_deref() {
        Some("2") if obj.contains_key("profile") => return Some(TraceFormat::Continuous),
        Some("1") => return Some(TraceFormat::SentrySampled),
        _ => {}
    }

    let has_shared_frames = obj
        .get("shared")
        .and_then(|s| s.get("frames"))
        .is_some_and(serde_json::Value::is_array);
    if obj.get("profiles").is_some_and(serde_json::Value::is_array) && has_shared_frames {
        return Some(TraceFormat::Schema);
    }

    None
}

/// Auto-detect the trace format and import every profile it contains.
pub fn import_profile_group(data: &[u8], options: &ImportOptions) -> Result<ProfileGroup, ImportError> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    let format = detect_format(&value).ok_or(ImportError::UnknownFormat)?;
    debug!("detected {format:?} trace ({} bytes)", data.len());

    let group = match format {
        TraceFormat::Schema => schema::import_schema(value, options)?,
        TraceFormat::JsSelfProfiling => js_self::import_js_self_profile(value, options)?,
        TraceFormat::SentrySampled => sentry_sampled::import_sentry_sampled(value, options)?,
        TraceFormat::Continuous => continuous::import_continuous(value, options)?,
    };

    debug!(
        "imported {:?}: {} profile(s), active index {}",
        group.name,
        group.profiles.len(),
        group.active_profile_index
    );
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_each_format() {
        assert_eq!(
            detect_format(&json!({"resources": [], "frames": [], "samples": [], "stacks": []})),
            Some(TraceFormat::JsSelfProfiling)
        );
        assert_eq!(
            detect_format(&json!({"version": "2", "profile": {}})),
            Some(TraceFormat::Continuous)
        );
        assert_eq!(
            detect_format(&json!({"version": "1", "profile": {}})),
            Some(TraceFormat::SentrySampled)
        );
        assert_eq!(
            detect_format(&json!({"shared": {"frames": []}, "profiles": []})),
            Some(TraceFormat::Schema)
        );
        assert_eq!(detect_format(&json!({"traceEvents": []})), None);
        assert_eq!(detect_format(&json!([1, 2])), None);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = import_profile_group(br#"{"nodes": []}"#, &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnknownFormat));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = import_profile_group(b"{not json", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
    }
}
