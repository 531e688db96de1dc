//! Processing many skeletons at once.
//!
//! Every skeleton is independent, so work is spread over the rayon thread
//! pool with no shared state. Results keep the order of the input and a
//! failing skeleton does not stop the others.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, ValidationError};
use crate::operations::voxel::{AggregateVoxels, VoxelTable};
use crate::operations::{Resample, ResampledSkeleton};
use crate::skeleton::SkeletonPoint;

/// Voxel statistics of one skeleton.
#[derive(Debug, Clone)]
pub struct SkeletonDensity {
    /// Sum of the original edge lengths.
    pub total_length: f64,
    /// Fraction of the total length per voxel, one table per grid offset in
    /// [`PipelineConfig::offsets`] order.
    pub tables: Vec<VoxelTable>,
}

/// Resamples every skeleton with sub-segment statistics enabled.
#[must_use]
pub fn resample_all(
    skeletons: &[Vec<SkeletonPoint>],
    config: &PipelineConfig,
) -> Vec<Result<ResampledSkeleton>> {
    skeletons
        .par_iter()
        .enumerate()
        .map(|(index, points)| {
            let result = Resample::new(config.step_length)
                .with_branches(true)
                .execute(points);
            if let Err(error) = &result {
                warn!(index, %error, "failed to resample skeleton");
            }
            result
        })
        .collect()
}

/// Resamples every skeleton and bins its length fractions into voxels.
#[must_use]
pub fn voxel_density(
    skeletons: &[Vec<SkeletonPoint>],
    config: &PipelineConfig,
) -> Vec<Result<SkeletonDensity>> {
    skeletons
        .par_iter()
        .enumerate()
        .map(|(index, points)| {
            let result = density_of(points, config);
            if let Err(error) = &result {
                warn!(index, %error, "failed to compute voxel density");
            }
            result
        })
        .collect()
}

fn density_of(points: &[SkeletonPoint], config: &PipelineConfig) -> Result<SkeletonDensity> {
    let resampled = Resample::new(config.step_length)
        .with_branches(true)
        .execute(points)?;
    let branches = resampled.branches.unwrap_or_default();
    let fractions = branches.length_fractions();

    let tables = config
        .offsets()
        .iter()
        .map(|offset| {
            AggregateVoxels::new(config.grid_size)
                .with_offset(*offset)
                .execute(&branches.centers, &fractions)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SkeletonDensity {
        total_length: resampled.total_length,
        tables,
    })
}

/// Sums tables from independent skeletons into one.
///
/// Returns `None` for an empty input.
///
/// # Errors
///
/// Returns an error if the tables are not all on the same grid.
pub fn merge_tables(tables: Vec<VoxelTable>) -> Result<Option<VoxelTable>> {
    let count = tables.len();
    let merged = tables
        .into_par_iter()
        .map(Ok::<VoxelTable, ValidationError>)
        .try_reduce_with(|mut acc, table| {
            acc.merge(&table)?;
            Ok(acc)
        })
        .transpose()?;
    debug!(tables = count, "merged voxel tables");
    Ok(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{ArborError, TopologyError};
    use crate::math::Point3;
    use approx::assert_abs_diff_eq;

    fn line(length: f64, y: f64) -> Vec<SkeletonPoint> {
        vec![
            SkeletonPoint::root(1, 1, Point3::new(0.0, y, 0.0), 1.0),
            SkeletonPoint::new(2, 3, Point3::new(length, y, 0.0), 1.0, Some(1)),
        ]
    }

    fn broken() -> Vec<SkeletonPoint> {
        vec![SkeletonPoint::new(
            2,
            3,
            Point3::new(1.0, 0.0, 0.0),
            1.0,
            Some(1),
        )]
    }

    fn config(overlapping_windows: bool) -> PipelineConfig {
        PipelineConfig {
            step_length: 1.0,
            grid_size: 5.0,
            overlapping_windows,
        }
    }

    #[test]
    fn resample_all_keeps_order_and_isolates_failures() {
        let skeletons = vec![line(3.0, 0.0), broken(), line(7.5, 2.0)];
        let results = resample_all(&skeletons, &config(false));
        assert_eq!(results.len(), 3);
        assert_abs_diff_eq!(results[0].as_ref().unwrap().total_length, 3.0);
        assert!(matches!(
            results[1],
            Err(ArborError::Topology(TopologyError::MissingParent { .. }))
        ));
        assert_abs_diff_eq!(results[2].as_ref().unwrap().total_length, 7.5);
    }

    #[test]
    fn density_tables_are_fractions() {
        let results = voxel_density(&[line(12.0, 0.0)], &config(false));
        let density = results.into_iter().next().unwrap().unwrap();
        assert_eq!(density.tables.len(), 1);
        assert_abs_diff_eq!(density.tables[0].total(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(density.total_length, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn overlapping_windows_give_eight_tables() {
        let results = voxel_density(&[line(12.0, 0.0)], &config(true));
        let density = results.into_iter().next().unwrap().unwrap();
        assert_eq!(density.tables.len(), 8);
        for table in &density.tables {
            assert_abs_diff_eq!(table.total(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn merged_total_counts_skeletons() {
        let skeletons = vec![line(4.0, 0.0), line(9.0, 1.0), line(2.2, -6.0)];
        let tables: Vec<VoxelTable> = voxel_density(&skeletons, &config(false))
            .into_iter()
            .map(|r| r.unwrap().tables.remove(0))
            .collect();
        let merged = merge_tables(tables).unwrap().unwrap();
        assert_abs_diff_eq!(merged.total(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn merging_nothing_gives_none() {
        assert!(merge_tables(Vec::new()).unwrap().is_none());
    }
}
