pub mod ranked;

pub use ranked::{RankedEntry, RankedSort, UnknownRankedSort, rank_frames};
