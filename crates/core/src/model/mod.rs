pub mod call_tree;
pub mod frame;
pub mod frame_index;
pub mod group;
pub mod profile;
pub mod unit;

pub use call_tree::{CallTree, CallTreeNode, NodeId};
pub use frame::{Frame, FrameDescriptor, FrameId, FrameKey, FramePlatform, SampleMarker};
pub use frame_index::FrameIndex;
pub use group::ProfileGroup;
pub use profile::{
    Profile, ProfileBuilder, ProfileError, ProfileKind, ProfileMeta, ProfileSource, ProfileStats,
};
pub use unit::{ProfileUnit, UnknownUnit};
