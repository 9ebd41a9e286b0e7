use pretty_assertions::assert_eq;
use stackscope_core::flamegraph::{
    DifferentialFlamegraph, Flamegraph, FlamegraphOptions, FlamegraphSort, FrameDiffKey,
};
use stackscope_core::model::{ProfileGroup, ProfileKind};
use stackscope_core::parsers::{ImportOptions, import_profile_group};
use stackscope_core::views::{RankedSort, rank_frames};
use stackscope_protocol::{
    CanvasSpace, CanvasView, CanvasViewOptions, FlamegraphTheme, Point, Rect, ViewMode,
    ZoomStrategy,
};

fn import(data: &[u8], sort: FlamegraphSort) -> ProfileGroup {
    import_profile_group(data, &ImportOptions::new(sort.required_kind())).unwrap()
}

fn rows(graph: &Flamegraph<'_>) -> Vec<(String, u32, f64, f64)> {
    let mut rows: Vec<_> = graph
        .frames()
        .map(|f| {
            let name = graph.frame_info(f).unwrap().name.to_string();
            (name, f.depth, f.start, f.end)
        })
        .collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));
    rows
}

fn key(name: &str, file: &str) -> FrameDiffKey {
    FrameDiffKey {
        name: name.into(),
        file: Some(file.into()),
    }
}

#[test]
fn evented_profile_in_call_order() {
    let group = import(
        include_bytes!("fixtures/schema-evented-sampled.json"),
        FlamegraphSort::CallOrder,
    );
    let ui = group.active_profile().unwrap();
    let graph = Flamegraph::new(ui, FlamegraphOptions::default()).unwrap();

    assert_eq!(
        rows(&graph),
        vec![
            ("main".to_string(), 0, 0.0, 10.0),
            ("compute".to_string(), 1, 1.0, 6.0),
            ("compute".to_string(), 1, 7.0, 9.0),
            ("helper".to_string(), 2, 2.0, 4.0),
        ]
    );
    assert_eq!(graph.depth(), 3);
    assert_eq!(graph.config_space(), Rect::new(0.0, 0.0, 10.0, 3.0));
    assert_eq!(graph.root().total_weight, 10.0);

    let hit = graph.frame_at(Point::new(3.0, 2.5)).unwrap();
    assert_eq!(graph.frame_info(hit).unwrap().name, "helper");
    assert!(graph.frame_at(Point::new(6.5, 1.5)).is_none());
}

#[test]
fn canvas_view_zooms_to_a_laid_out_frame() {
    let group = import(
        include_bytes!("fixtures/schema-evented-sampled.json"),
        FlamegraphSort::CallOrder,
    );
    let graph = Flamegraph::new(group.active_profile().unwrap(), FlamegraphOptions::default())
        .unwrap();
    let canvas = CanvasSpace::new(400.0, 60.0, 1.0, Point::ZERO).unwrap();
    let options = CanvasViewOptions {
        mode: ViewMode::StretchToFit,
        ..graph.canvas_view_options()
    };
    assert_eq!(options.min_width, 1.0);
    let mut view = CanvasView::new(&canvas, &graph, options).unwrap();
    assert_eq!(view.config_view(), Rect::new(0.0, 0.0, 10.0, 3.0));

    let helper = graph.frame_at(Point::new(3.0, 2.5)).unwrap();
    view.zoom_to_frame(&graph.frame_rect(helper), ZoomStrategy::Exact)
        .unwrap();
    assert_eq!(view.config_view(), Rect::new(2.0, 0.0, 2.0, 3.0));

    // Zooming stops at the shortest sample.
    view.zoom_at(0.1, 3.0).unwrap();
    assert_eq!(view.config_view().width(), 1.0);
}

#[test]
fn evented_profile_left_heavy() {
    let group = import(
        include_bytes!("fixtures/schema-evented-sampled.json"),
        FlamegraphSort::LeftHeavy,
    );
    let ui = group.active_profile().unwrap();
    let options = FlamegraphOptions {
        sort: FlamegraphSort::LeftHeavy,
        ..Default::default()
    };
    let graph = Flamegraph::new(ui, options).unwrap();
    assert_eq!(
        rows(&graph),
        vec![
            ("main".to_string(), 0, 0.0, 10.0),
            ("compute".to_string(), 1, 0.0, 7.0),
            ("helper".to_string(), 2, 0.0, 2.0),
        ]
    );
}

#[test]
fn left_heavy_rejects_time_ordered_profile() {
    let group = import(
        include_bytes!("fixtures/js-self-profile.json"),
        FlamegraphSort::CallOrder,
    );
    let profile = group.active_profile().unwrap();
    let options = FlamegraphOptions {
        sort: FlamegraphSort::LeftHeavy,
        ..Default::default()
    };
    assert!(Flamegraph::new(profile, options).is_err());
}

#[test]
fn js_profile_layout_keeps_markers_as_leaves() {
    let group = import(
        include_bytes!("fixtures/js-self-profile.json"),
        FlamegraphSort::CallOrder,
    );
    let profile = group.active_profile().unwrap();
    let graph = Flamegraph::new(profile, FlamegraphOptions::default()).unwrap();

    assert_eq!(graph.depth(), 4);
    // The idle root sample widens the space but is not a frame.
    assert_eq!(graph.root().end, 30.0);
    assert_eq!(graph.config_space().width(), 50.0);
    let gc = graph
        .frames()
        .find(|f| graph.frame_info(f).unwrap().name == "Garbage Collection")
        .unwrap();
    assert_eq!((gc.depth, gc.start, gc.end), (3, 20.0, 25.0));
}

#[test]
fn differential_between_builds() {
    let reference = import(
        include_bytes!("fixtures/diff-reference.json"),
        FlamegraphSort::CallOrder,
    );
    let candidate = import(
        include_bytes!("fixtures/diff-candidate.json"),
        FlamegraphSort::CallOrder,
    );
    let before = reference.active_profile().unwrap();
    let after = candidate.active_profile().unwrap();

    let reference_graph = Flamegraph::new(before, FlamegraphOptions::default()).unwrap();
    let candidate_graph = Flamegraph::new(after, FlamegraphOptions::default()).unwrap();
    let theme = FlamegraphTheme::light();
    let diff = DifferentialFlamegraph::from_flamegraphs(&reference_graph, candidate_graph, &theme);

    let parse = key("parse", "parse.rs");
    assert_eq!(diff.reference_count(&parse), 2);
    assert_eq!(diff.candidate_count(&parse), 1);
    assert_eq!(diff.diff_for_key(&parse), Some(-0.5));
    assert_eq!(diff.diff_for_key(&key("resolve", "resolve.rs")), Some(1.0));
    assert_eq!(diff.diff_for_key(&key("typecheck", "check.rs")), Some(1.0));
    assert_eq!(diff.diff_for_key(&key("main", "main.rs")), Some(0.0));
    assert_eq!(diff.disappeared(), &[key("emit", "emit.rs")]);

    let graph = diff.flamegraph();
    for frame in graph.frames() {
        let name = graph.frame_info(frame).unwrap().name.to_string();
        let color = diff.color_for(frame);
        match name.as_str() {
            "main" => assert!(color.is_none()),
            "parse" | "resolve" => assert!((color.unwrap().a - 0.4).abs() < 1e-6),
            _ => assert_eq!(color.unwrap().a, theme.max_differential_alpha),
        }
    }
}

#[test]
fn ranked_table_from_fixture() {
    let group = import(
        include_bytes!("fixtures/sentry-sampled-v1.json"),
        FlamegraphSort::CallOrder,
    );
    let main = group.active_profile().unwrap();
    let ranked = rank_frames(main, RankedSort::TotalWeight, false);
    let names: Vec<_> = ranked.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, ["handle", "fetch_orders", "execute"]);
    assert_eq!(ranked[0].total_weight, 45e6);
    assert_eq!(group.profiles[0].kind(), ProfileKind::Flamechart);
}
