pub mod point;
pub mod swc;
pub mod tree;

pub use point::SkeletonPoint;
pub use tree::{NodeData, NodeKey, SkeletonTree};
