use std::collections::BTreeMap;

use tracing::debug;

use super::{GridOffset, VoxelGrid, VoxelIndex};
use crate::error::{NumericalError, Result, ValidationError};
use crate::math::Point3;

/// Per-voxel sums produced by [`AggregateVoxels`].
///
/// Only voxels that received at least one contribution are present. Cells
/// are kept in index order so iteration is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelTable {
    grid: VoxelGrid,
    cells: BTreeMap<VoxelIndex, f64>,
}

impl VoxelTable {
    /// Creates an empty table on `grid`.
    #[must_use]
    pub fn empty(grid: VoxelGrid) -> Self {
        Self {
            grid,
            cells: BTreeMap::new(),
        }
    }

    /// The grid the table is binned on.
    #[must_use]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Number of voxels with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if no voxel has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn add(&mut self, index: VoxelIndex, value: f64) {
        *self.cells.entry(index).or_insert(0.0) += value;
    }

    /// Value stored for `index`, if any.
    #[must_use]
    pub fn get(&self, index: VoxelIndex) -> Option<f64> {
        self.cells.get(&index).copied()
    }

    /// Value of the voxel containing `point`, zero if it has none.
    #[must_use]
    pub fn value_at(&self, point: &Point3) -> f64 {
        self.grid
            .index_of(point)
            .and_then(|i| self.get(i))
            .unwrap_or(0.0)
    }

    /// Iterates `(index, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelIndex, f64)> + '_ {
        self.cells.iter().map(|(k, v)| (*k, *v))
    }

    /// Iterates `(center, value)` pairs in index order.
    pub fn rows(&self) -> impl Iterator<Item = (Point3, f64)> + '_ {
        self.cells
            .iter()
            .map(|(k, v)| (self.grid.center_of(*k), *v))
    }

    /// Sum over all voxels.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cells.values().sum()
    }

    /// Returns a copy with every value divided by [`Self::total`].
    ///
    /// A table whose total is zero is returned unchanged.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total == 0.0 {
            return self.clone();
        }
        Self {
            grid: self.grid,
            cells: self.cells.iter().map(|(k, v)| (*k, v / total)).collect(),
        }
    }

    /// Adds every value of `other` into `self`.
    ///
    /// Merging is commutative and associative, so partial tables from
    /// independent workers can be combined in any order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::GridMismatch`] if the tables use different
    /// grids.
    pub fn merge(&mut self, other: &Self) -> std::result::Result<(), ValidationError> {
        if self.grid != other.grid {
            return Err(ValidationError::GridMismatch);
        }
        for (k, v) in &other.cells {
            *self.cells.entry(*k).or_insert(0.0) += v;
        }
        Ok(())
    }
}

/// Sums values of points that fall into the same voxel.
pub struct AggregateVoxels {
    grid_size: f64,
    offset: GridOffset,
}

impl AggregateVoxels {
    /// Creates a new `AggregateVoxels` operation on an unshifted grid.
    #[must_use]
    pub fn new(grid_size: f64) -> Self {
        Self {
            grid_size,
            offset: GridOffset::ZERO,
        }
    }

    /// Shifts the grid by half a cell along each flagged axis.
    #[must_use]
    pub fn with_offset(mut self, offset: GridOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Executes the aggregation. `values[i]` is credited to the voxel
    /// containing `centers[i]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid size is not positive, the two slices
    /// differ in length, or a center or value is not finite or lies too far
    /// out to be indexed.
    pub fn execute(&self, centers: &[Point3], values: &[f64]) -> Result<VoxelTable> {
        if centers.len() != values.len() {
            return Err(ValidationError::ValueLength {
                centers: centers.len(),
                values: values.len(),
            }
            .into());
        }
        let grid = VoxelGrid::new(self.grid_size, self.offset)?;

        let mut table = VoxelTable::empty(grid);
        for (i, (c, v)) in centers.iter().zip(values).enumerate() {
            if !v.is_finite() {
                return Err(NumericalError::NonFiniteSample(i).into());
            }
            table.add(grid.locate(i, c)?, *v);
        }

        debug!(
            points = centers.len(),
            voxels = table.len(),
            grid_size = self.grid_size,
            offset = ?self.offset.0,
            "aggregated voxels"
        );
        Ok(table)
    }
}

/// Aggregates on each of the eight grids in [`GridOffset::STAGGERED`].
///
/// # Errors
///
/// Same conditions as [`AggregateVoxels::execute`].
pub fn aggregate_staggered(
    centers: &[Point3],
    values: &[f64],
    grid_size: f64,
) -> Result<Vec<VoxelTable>> {
    GridOffset::STAGGERED
        .iter()
        .map(|o| {
            AggregateVoxels::new(grid_size)
                .with_offset(*o)
                .execute(centers, values)
        })
        .collect()
}
