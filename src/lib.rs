//! Uniform resampling of SWC neuron skeletons and voxel binning of their
//! neurite length.
//!
//! [`operations::Resample`] re-discretises every edge to a fixed step and
//! reports the midpoint and length of each emitted sub-segment.
//! [`operations::voxel`] bins those midpoints onto a cubic lattice and sums
//! the lengths per voxel. [`batch`] runs both over many skeletons in parallel.

pub mod batch;
pub mod config;
pub mod error;
pub mod math;
pub mod operations;
pub mod skeleton;

pub use config::PipelineConfig;
pub use error::{ArborError, Result};
