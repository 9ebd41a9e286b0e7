use log::debug;
use serde::Deserialize;

use crate::model::{FrameDescriptor, FrameIndex, FramePlatform, ProfileGroup, ProfileSource};

use super::evented::{EventedProfile, import_evented};
use super::sampled::{SampledProfile, import_sampled};
use super::{ImportError, ImportOptions};

/// Container file holding evented and sampled profiles that share one frame
/// table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFile {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub active_profile_index: Option<usize>,
    #[serde(default)]
    pub metadata: Option<SchemaMetadata>,
    pub shared: SharedFrames,
    pub profiles: Vec<SchemaProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default)]
    pub platform: Option<FramePlatform>,
    #[serde(default, alias = "traceID", alias = "traceId")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharedFrames {
    pub frames: Vec<FrameDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaProfile {
    Evented(EventedProfile),
    Sampled(SampledProfile),
}

pub fn import_schema(
    value: serde_json::Value,
    options: &ImportOptions,
) -> Result<ProfileGroup, ImportError> {
    let file: SchemaFile = serde_json::from_value(value)?;
    if file.profiles.is_empty() {
        return Err(ImportError::NoProfiles);
    }

    let metadata = file.metadata.unwrap_or_default();
    let platform = metadata.platform.unwrap_or_default();
    let index = FrameIndex::from_descriptors(&file.shared.frames, platform);
    debug!(
        "schema trace: {} frames, {} profiles, platform {platform:?}",
        file.shared.frames.len(),
        file.profiles.len()
    );

    let mut source = ProfileSource::Sampled;
    let mut profiles = Vec::with_capacity(file.profiles.len());
    for (i, profile) in file.profiles.iter().enumerate() {
        let fallback = format!("Profile {}", i + 1);
        let imported = match profile {
            SchemaProfile::Evented(p) => {
                source = ProfileSource::Evented;
                import_evented(p, &index, options, &fallback)?
            }
            SchemaProfile::Sampled(p) => import_sampled(p, &index, options, &fallback)?,
        };
        profiles.push(imported);
    }

    let active_profile_index = file
        .active_profile_index
        .filter(|&i| i < profiles.len())
        .unwrap_or(0);

    Ok(ProfileGroup {
        name: file
            .name
            .or_else(|| profiles.first().map(|p| p.name().to_string()))
            .unwrap_or_default(),
        source,
        platform,
        trace_id: metadata.trace_id,
        active_profile_index,
        profiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn imports_mixed_profiles() {
        let value = json!({
            "$schema": "https://www.speedscope.app/file-format-spec.json",
            "name": "checkout",
            "activeProfileIndex": 1,
            "shared": {"frames": [{"name": "main", "line": 1}, {"name": "work", "file": "w.js", "col": 3}]},
            "profiles": [
                {
                    "type": "evented", "name": "ui", "unit": "milliseconds",
                    "startValue": 0, "endValue": 10,
                    "events": [
                        {"type": "O", "frame": 0, "at": 0},
                        {"type": "C", "frame": 0, "at": 10}
                    ]
                },
                {
                    "type": "sampled", "unit": "microseconds",
                    "startValue": 0, "endValue": 5,
                    "samples": [[0, 1], [0]], "weights": [2, 3]
                }
            ]
        });
        let group = import_schema(value, &ImportOptions::default()).unwrap();
        assert_eq!(group.name, "checkout");
        assert_eq!(group.profiles.len(), 2);
        assert_eq!(group.active_profile_index, 1);
        assert_eq!(group.profiles[0].name(), "ui");
        assert_eq!(group.profiles[1].name(), "Profile 2");
        assert_eq!(group.profiles[1].duration(), 5.0);
        assert_eq!(group.active_profile().map(|p| p.name()), Some("Profile 2"));
    }

    #[test]
    fn out_of_range_active_index_falls_back() {
        let value = json!({
            "activeProfileIndex": 7,
            "shared": {"frames": [{"name": "a"}]},
            "profiles": [{
                "type": "sampled", "unit": "none", "startValue": 0, "endValue": 1,
                "samples": [[0]], "weights": [1]
            }]
        });
        let group = import_schema(value, &ImportOptions::default()).unwrap();
        assert_eq!(group.active_profile_index, 0);
    }

    #[test]
    fn unsupported_unit_is_rejected() {
        let value = json!({
            "shared": {"frames": [{"name": "a"}]},
            "profiles": [{
                "type": "sampled", "unit": "furlongs", "startValue": 0, "endValue": 1,
                "samples": [[0]], "weights": [1]
            }]
        });
        let err = import_schema(value, &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedUnit(_)));
    }

    #[test]
    fn empty_profiles_errors() {
        let value = json!({"shared": {"frames": []}, "profiles": []});
        assert!(matches!(
            import_schema(value, &ImportOptions::default()),
            Err(ImportError::NoProfiles)
        ));
    }
}
