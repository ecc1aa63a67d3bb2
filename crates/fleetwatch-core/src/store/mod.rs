// ── Resource store ──
//
// The runtime resource tree and the discovery merge that writes into it.

mod merge;
mod tree;

pub use merge::{DiscoveryBatch, MergeOutcome};
pub use tree::ResourceTree;

pub(crate) use tree::Arena;
