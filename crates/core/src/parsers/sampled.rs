use serde::Deserialize;

use crate::model::{
    FrameId, FrameIndex, FrameKey, Profile, ProfileBuilder, ProfileError, ProfileMeta,
    ProfileSource, ProfileUnit,
};

use super::{ImportError, ImportOptions};

/// A profile recorded as root-first stacks with one weight each.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledProfile {
    #[serde(default)]
    pub name: Option<String>,
    pub unit: String,
    pub start_value: f64,
    pub end_value: f64,
    #[serde(default, rename = "threadID")]
    pub thread_id: Option<u64>,
    pub samples: Vec<Vec<u64>>,
    pub weights: Vec<f64>,
}

/// Node reports GC as a one- or two-frame stack ending in
/// `(garbage collector)`. Such a sample is re-parented onto the previous
/// sample's stack, so a GC pause shows up under the code it
/// interrupted. Back-to-back GC samples land on the same node and merge.
fn fold_garbage_collection(
    stack: Vec<FrameId>,
    previous: &[FrameId],
    index: &FrameIndex,
) -> Vec<FrameId> {
    let is_gc = |id: &FrameId| index.get(*id).is_some_and(|f| f.is_garbage_collector());
    let Some(leaf) = stack.last().copied() else {
        return stack;
    };
    if previous.is_empty() || stack.len() > 2 || !is_gc(&leaf) {
        return stack;
    }

    let keep = previous.len() - previous.iter().rev().take_while(|id| is_gc(id)).count();
    let mut folded = Vec::with_capacity(keep + 1);
    folded.extend_from_slice(&previous[..keep]);
    folded.push(leaf);
    folded
}

pub fn import_sampled(
    profile: &SampledProfile,
    index: &FrameIndex,
    options: &ImportOptions,
    fallback_name: &str,
) -> Result<Profile, ImportError> {
    if profile.samples.len() != profile.weights.len() {
        return Err(ProfileError::SampleWeightMismatch {
            samples: profile.samples.len(),
            weights: profile.weights.len(),
        }
        .into());
    }

    let unit: ProfileUnit = profile.unit.parse()?;
    let meta = ProfileMeta::new(profile.name.as_deref().unwrap_or(fallback_name), unit)
        .with_thread_id(profile.thread_id)
        .with_range(profile.start_value, profile.end_value);
    let mut builder = ProfileBuilder::new(index, ProfileSource::Sampled, options.kind, meta);

    let mut previous: Vec<FrameId> = Vec::new();
    for (sample, &weight) in profile.samples.iter().zip(&profile.weights) {
        let stack = sample
            .iter()
            .map(|&i| index.resolve(FrameKey::Index(i)))
            .collect::<Result<Vec<_>, _>>()?;

        let stack = fold_garbage_collection(stack, &previous, index);

        builder.append_sample(&stack, weight)?;
        previous = stack;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrameDescriptor, FramePlatform, NodeId, ProfileKind};

    fn node_index() -> FrameIndex {
        let descs = ["f0", "f1", "(garbage collector)"].map(|n| FrameDescriptor {
            name: Some(n.to_string()),
            ..Default::default()
        });
        FrameIndex::from_descriptors(&descs, FramePlatform::Node)
    }

    fn sampled(samples: Vec<Vec<u64>>, weights: Vec<f64>) -> SampledProfile {
        SampledProfile {
            name: None,
            unit: "milliseconds".into(),
            start_value: 0.0,
            end_value: weights.iter().sum(),
            thread_id: Some(1),
            samples,
            weights,
        }
    }

    #[test]
    fn garbage_collection_folds_onto_previous_stack() {
        let index = node_index();
        let trace = sampled(vec![vec![0, 1], vec![0, 2]], vec![1.0, 3.0]);
        for kind in [ProfileKind::Flamechart, ProfileKind::Flamegraph] {
            let profile = import_sampled(&trace, &index, &ImportOptions::new(kind), "t").unwrap();

            let root = profile.tree().root().unwrap();
            assert_eq!(root.children().len(), 1, "{kind}");
            let f0 = profile.node(root.children()[0]).unwrap();
            assert_eq!(f0.children().len(), 1, "{kind}");
            let f1_id = f0.children()[0];
            let f1 = profile.node(f1_id).unwrap();
            assert_eq!(profile.node_frame(f1_id).unwrap().name, "f1 [native code]");
            assert_eq!(f1.total_weight(), 4.0, "{kind}");

            let gc = profile.node(f1.children()[0]).unwrap();
            assert!(profile.frame(gc.frame()).unwrap().is_garbage_collector());
            assert_eq!(gc.self_weight(), 3.0, "{kind}");
        }
    }

    #[test]
    fn consecutive_gc_samples_merge() {
        let index = node_index();
        let trace = sampled(vec![vec![0, 1], vec![2], vec![0, 2]], vec![1.0, 2.0, 3.0]);
        let profile = import_sampled(&trace, &index, &ImportOptions::default(), "t").unwrap();
        assert_eq!(profile.samples().len(), 2);
        assert_eq!(profile.weights(), &[1.0, 5.0]);
    }

    #[test]
    fn deep_gc_stacks_are_left_alone() {
        let index = node_index();
        let trace = sampled(vec![vec![0, 1], vec![0, 1, 2]], vec![1.0, 1.0]);
        let profile = import_sampled(&trace, &index, &ImportOptions::default(), "t").unwrap();
        let leaf = profile.samples()[1];
        assert_eq!(profile.tree().ancestors(leaf).count(), 3);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let index = node_index();
        let trace = sampled(vec![vec![0]], vec![1.0, 2.0]);
        let err = import_sampled(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Profile(ProfileError::SampleWeightMismatch { samples: 1, weights: 2 })
        ));
    }

    #[test]
    fn unknown_frame_fails() {
        let index = node_index();
        let trace = sampled(vec![vec![0, 9]], vec![1.0]);
        let err = import_sampled(&trace, &index, &ImportOptions::default(), "t").unwrap_err();
        assert_eq!(err.to_string(), "Could not resolve frame 9 in frame index");
    }

    #[test]
    fn empty_stack_is_a_root_sample() {
        let index = node_index();
        let trace = sampled(vec![vec![], vec![0]], vec![2.0, 1.0]);
        let profile = import_sampled(&trace, &index, &ImportOptions::default(), "t").unwrap();
        assert_eq!(profile.samples()[0], NodeId::ROOT);
        assert_eq!(profile.tree().root().unwrap().total_weight(), 3.0);
    }
}
