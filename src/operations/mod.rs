mod profile;
mod resample;
pub mod voxel;

pub use profile::{RadialProfile, ShellProfile};
pub use resample::{BranchSet, Resample, ResampledSkeleton};
