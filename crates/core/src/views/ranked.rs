use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;
use stackscope_protocol::SharedStr;

use crate::model::{FrameId, Profile};

/// A single row in the ranked table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub frame: FrameId,
    pub name: SharedStr,
    pub file: Option<SharedStr>,
    pub self_weight: f64,
    pub total_weight: f64,
    /// Samples taken while the frame was on the stack, summed over its
    /// call-tree nodes.
    pub count: u64,
}

/// Sort field for the ranked table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RankedSort {
    #[default]
    SelfWeight,
    TotalWeight,
    Name,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ranking {0:?}, expected one of self, total, name, count")]
pub struct UnknownRankedSort(pub String);

impl FromStr for RankedSort {
    type Err = UnknownRankedSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::SelfWeight),
            "total" => Ok(Self::TotalWeight),
            "name" => Ok(Self::Name),
            "count" => Ok(Self::Count),
            other => Err(UnknownRankedSort(other.to_string())),
        }
    }
}

/// Aggregate every frame of `profile` into table rows.
///
/// Weighted sorts put the heaviest frame first and `ascending` flips that;
/// name sorts are A to Z unless flipped. Frames with no weight are left out.
pub fn rank_frames(profile: &Profile, sort: RankedSort, ascending: bool) -> Vec<RankedEntry> {
    let mut counts: HashMap<FrameId, u64> = HashMap::new();
    for (_, node) in profile.tree().iter() {
        if !node.is_root() {
            *counts.entry(node.frame()).or_insert(0) += node.count();
        }
    }

    let mut entries: Vec<RankedEntry> = profile
        .frames()
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_root() && (f.total_weight() > 0.0 || f.self_weight() > 0.0))
        .map(|(i, f)| {
            let frame = FrameId(i as u32);
            RankedEntry {
                frame,
                name: f.name.clone(),
                file: f.file.clone(),
                self_weight: f.self_weight(),
                total_weight: f.total_weight(),
                count: counts.get(&frame).copied().unwrap_or(0),
            }
        })
        .collect();

    match sort {
        RankedSort::SelfWeight => entries.sort_by(|a, b| b.self_weight.total_cmp(&a.self_weight)),
        RankedSort::TotalWeight => {
            entries.sort_by(|a, b| b.total_weight.total_cmp(&a.total_weight))
        }
        RankedSort::Name => entries.sort_by(|a, b| (&a.name, &a.file).cmp(&(&b.name, &b.file))),
        RankedSort::Count => entries.sort_by(|a, b| b.count.cmp(&a.count)),
    }

    if ascending {
        entries.reverse();
    }

    entries
}
