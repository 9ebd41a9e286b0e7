//! Subcommand implementations. Each one writes its report into `out` so it
//! can be checked without a terminal.

use std::io::Write;

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::Serialize;
use stackscope_core::flamegraph::{
    DifferentialFlamegraph, Flamegraph, FlamegraphOptions, FlamegraphSort,
};
use stackscope_core::model::{Profile, ProfileGroup};
use stackscope_core::parsers::{ImportOptions, import_profile_group};
use stackscope_core::views::{RankedSort, rank_frames};
use stackscope_protocol::FlamegraphTheme;

pub fn import(data: &[u8], sort: FlamegraphSort) -> Result<ProfileGroup> {
    let options = ImportOptions::new(sort.required_kind());
    let group = import_profile_group(data, &options)?;
    debug!(
        "{} profile(s) imported as {}",
        group.profiles.len(),
        options.kind
    );
    Ok(group)
}

/// The requested thread's profile, or the group's active one.
pub fn select_profile(group: &ProfileGroup, thread: Option<u64>) -> Result<&Profile> {
    match thread {
        Some(id) => group
            .profile_for_thread(id)
            .ok_or_else(|| anyhow!("no profile for thread {id}")),
        None => group
            .active_profile()
            .ok_or_else(|| anyhow!("trace contains no profiles")),
    }
}

pub fn summary(group: &ProfileGroup, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{} ({}, {:?})", group.name, group.source, group.platform)?;
    if let Some(trace_id) = &group.trace_id {
        writeln!(out, "trace {trace_id}")?;
    }
    for (i, profile) in group.profiles.iter().enumerate() {
        let marker = if i == group.active_profile_index { '*' } else { ' ' };
        let unit = profile.unit();
        let thread = profile
            .thread_id()
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        writeln!(
            out,
            "{marker} {:<24} thread {:<8} {:>10}  {} samples, {} frames",
            profile.name(),
            thread,
            unit.format_value(profile.duration()),
            profile.samples().len(),
            profile.frames().len().saturating_sub(1),
        )?;
        let stats = profile.stats();
        if !stats.is_clean() {
            writeln!(
                out,
                "  dropped {} empty and {} negative samples",
                stats.discarded_samples, stats.negative_samples
            )?;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct LaidOutFrame<'a> {
    name: &'a str,
    file: Option<&'a str>,
    depth: u32,
    start: f64,
    end: f64,
}

pub fn layout(
    profile: &Profile,
    sort: FlamegraphSort,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let graph = Flamegraph::new(
        profile,
        FlamegraphOptions {
            sort,
            ..Default::default()
        },
    )?;

    let mut frames: Vec<_> = graph
        .frames()
        .filter_map(|f| graph.frame_info(f).map(|info| (f, info)))
        .map(|(f, info)| LaidOutFrame {
            name: info.name.as_str(),
            file: info.file.as_deref(),
            depth: f.depth,
            start: f.start,
            end: f.end,
        })
        .collect();
    frames.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.depth.cmp(&b.depth)));

    if json {
        serde_json::to_writer_pretty(&mut *out, &frames).context("serializing layout")?;
        writeln!(out)?;
        return Ok(());
    }

    let unit = profile.unit();
    writeln!(
        out,
        "{} in {sort} order, {} rows over {}",
        profile.name(),
        graph.depth(),
        unit.format_value(graph.config_space().width())
    )?;
    for frame in &frames {
        writeln!(
            out,
            "{:indent$}{} [{}]",
            "",
            frame.name,
            unit.format_value(frame.end - frame.start),
            indent = frame.depth as usize * 2
        )?;
    }
    Ok(())
}

pub fn rank(
    profile: &Profile,
    by: RankedSort,
    ascending: bool,
    limit: usize,
    out: &mut impl Write,
) -> Result<()> {
    let unit = profile.unit();
    writeln!(out, "{:>10} {:>10} {:>7}  name", "self", "total", "count")?;
    for entry in rank_frames(profile, by, ascending).iter().take(limit) {
        writeln!(
            out,
            "{:>10} {:>10} {:>7}  {}",
            unit.format_value(entry.self_weight),
            unit.format_value(entry.total_weight),
            entry.count,
            entry.name
        )?;
    }
    Ok(())
}

pub fn diff(
    reference: &Profile,
    candidate: &Profile,
    sort: FlamegraphSort,
    limit: usize,
    out: &mut impl Write,
) -> Result<()> {
    let options = FlamegraphOptions {
        sort,
        ..Default::default()
    };
    let before = Flamegraph::new(reference, options)?;
    let after = Flamegraph::new(candidate, options)?;
    let diff = DifferentialFlamegraph::from_flamegraphs(&before, after, &FlamegraphTheme::default());

    let changes = diff.changes();
    if changes.is_empty() {
        writeln!(out, "no changes")?;
        return Ok(());
    }
    for (key, change) in changes.into_iter().take(limit) {
        let label = if diff.candidate_count(key) == 0 {
            "gone".to_string()
        } else if diff.reference_count(key) == 0 {
            "new".to_string()
        } else {
            format!("{:+.0}%", change * 100.0)
        };
        writeln!(
            out,
            "{label:>6}  {key}  ({} -> {})",
            diff.reference_count(key),
            diff.candidate_count(key)
        )?;
    }
    Ok(())
}
