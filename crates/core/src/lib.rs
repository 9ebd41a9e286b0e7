//! Profile ingestion and flamegraph layout.
//!
//! Traces are parsed into a [`ProfileGroup`] of per-thread [`Profile`]s,
//! each holding a frame arena and a weighted call tree. A [`Flamegraph`]
//! lays a profile out into rows, and a [`DifferentialFlamegraph`] compares
//! two layouts frame by frame.

pub mod flamegraph;
pub mod model;
pub mod parsers;
pub mod views;

pub use flamegraph::{
    DifferentialFlamegraph, Flamegraph, FlamegraphError, FlamegraphFrame, FlamegraphOptions,
    FlamegraphSort,
};
pub use model::{Frame, FrameId, NodeId, Profile, ProfileGroup, ProfileKind, ProfileUnit};
pub use parsers::{ImportError, ImportOptions, import_profile_group};
