use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::Serialize;
use stackscope_protocol::{Color, FlamegraphTheme, SharedStr, ThemeToken};

use super::{Flamegraph, FlamegraphFrame};

/// Identity of a frame across two profiles: its name and file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameDiffKey {
    pub name: SharedStr,
    pub file: Option<SharedStr>,
}

impl fmt::Display for FrameDiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} ({file})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// `(after - before) / before`; the change of a frame that gained or lost
/// occurrences relative to the reference.
pub fn relative_change(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        return if after == 0.0 { 0.0 } else { 1.0 };
    }
    (after - before) / before
}

/// A candidate flamegraph annotated with how often each frame occurs
/// compared with a reference flamegraph.
///
/// Diffs are `+1` for frames new in the candidate and the relative change
/// otherwise. Frames that vanished from the candidate are listed by
/// [`DifferentialFlamegraph::disappeared`] with a diff of `-1`.
#[derive(Debug, Clone)]
pub struct DifferentialFlamegraph<'p> {
    flamegraph: Flamegraph<'p>,
    reference_counts: HashMap<FrameDiffKey, u64>,
    candidate_counts: HashMap<FrameDiffKey, u64>,
    diffs: HashMap<FrameDiffKey, f64>,
    colors: HashMap<FrameDiffKey, Color>,
    disappeared: Vec<FrameDiffKey>,
}

fn histogram(flamegraph: &Flamegraph<'_>) -> HashMap<FrameDiffKey, u64> {
    let mut counts = HashMap::new();
    for frame in flamegraph.frames() {
        if let Some(key) = diff_key(flamegraph, frame) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

fn diff_key(flamegraph: &Flamegraph<'_>, frame: &FlamegraphFrame) -> Option<FrameDiffKey> {
    flamegraph.frame_info(frame).map(|f| FrameDiffKey {
        name: f.name.clone(),
        file: f.file.clone(),
    })
}

impl<'p> DifferentialFlamegraph<'p> {
    pub fn from_flamegraphs(
        reference: &Flamegraph<'_>,
        candidate: Flamegraph<'p>,
        theme: &FlamegraphTheme,
    ) -> Self {
        let reference_counts = histogram(reference);
        let candidate_counts = histogram(&candidate);

        let mut diffs = HashMap::new();
        let mut colors = HashMap::new();
        for (key, &count) in &candidate_counts {
            let Some(&before) = reference_counts.get(key) else {
                diffs.insert(key.clone(), 1.0);
                colors.insert(
                    key.clone(),
                    theme
                        .resolve(ThemeToken::DifferentialIncrease)
                        .with_alpha(theme.max_differential_alpha),
                );
                continue;
            };
            if before == count {
                diffs.insert(key.clone(), 0.0);
                continue;
            }

            let (before, after) = (before as f64, count as f64);
            diffs.insert(key.clone(), relative_change(before, after));
            let intensity = (after - before).abs() / after.max(before);
            let token = if after > before {
                ThemeToken::DifferentialIncrease
            } else {
                ThemeToken::DifferentialDecrease
            };
            colors.insert(
                key.clone(),
                theme
                    .resolve(token)
                    .with_alpha(intensity as f32 * theme.max_differential_alpha),
            );
        }

        let mut disappeared: Vec<_> = reference_counts
            .keys()
            .filter(|key| !candidate_counts.contains_key(*key))
            .cloned()
            .collect();
        disappeared.sort();
        for key in &disappeared {
            diffs.insert(key.clone(), -1.0);
        }

        debug!(
            "differential: {} changed, {} disappeared",
            colors.len(),
            disappeared.len()
        );

        Self {
            flamegraph: candidate,
            reference_counts,
            candidate_counts,
            diffs,
            colors,
            disappeared,
        }
    }

    /// The candidate flamegraph whose frames are annotated.
    pub fn flamegraph(&self) -> &Flamegraph<'p> {
        &self.flamegraph
    }

    pub fn frame_key(&self, frame: &FlamegraphFrame) -> Option<FrameDiffKey> {
        diff_key(&self.flamegraph, frame)
    }

    /// Diff of a candidate frame; 0 for frames with an unchanged count.
    pub fn diff_for(&self, frame: &FlamegraphFrame) -> f64 {
        self.frame_key(frame)
            .and_then(|key| self.diff_for_key(&key))
            .unwrap_or(0.0)
    }

    pub fn diff_for_key(&self, key: &FrameDiffKey) -> Option<f64> {
        self.diffs.get(key).copied()
    }

    /// Color of a candidate frame; `None` renders as neutral.
    pub fn color_for(&self, frame: &FlamegraphFrame) -> Option<Color> {
        self.frame_key(frame)
            .and_then(|key| self.colors.get(&key).copied())
    }

    pub fn reference_count(&self, key: &FrameDiffKey) -> u64 {
        self.reference_counts.get(key).copied().unwrap_or(0)
    }

    pub fn candidate_count(&self, key: &FrameDiffKey) -> u64 {
        self.candidate_counts.get(key).copied().unwrap_or(0)
    }

    /// Frames present in the reference but absent from the candidate,
    /// sorted by key.
    pub fn disappeared(&self) -> &[FrameDiffKey] {
        &self.disappeared
    }

    /// Every changed key with its diff, largest magnitude first.
    pub fn changes(&self) -> Vec<(&FrameDiffKey, f64)> {
        let mut changes: Vec<_> = self
            .diffs
            .iter()
            .filter(|(_, diff)| **diff != 0.0)
            .map(|(key, diff)| (key, *diff))
            .collect();
        changes.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));
        changes
    }
}
