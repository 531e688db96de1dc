use super::{GridOffset, VoxelGrid};
use crate::error::Result;
use crate::math::Point3;

/// Maps points to the centers of the lattice cells containing them.
pub struct WindowPoints {
    grid_size: f64,
    offset: GridOffset,
}

impl WindowPoints {
    /// Creates a new `WindowPoints` operation on an unshifted grid.
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

    /// Executes the operation, returning one center per input point.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid size is not positive or a point is not
    /// finite or lies too far out to be indexed.
    pub fn execute(&self, points: &[Point3]) -> Result<Vec<Point3>> {
        let grid = VoxelGrid::new(self.grid_size, self.offset)?;
        points
            .iter()
            .enumerate()
            .map(|(i, p)| -> Result<Point3> { Ok(grid.center_of(grid.locate(i, p)?)) })
            .collect()
    }
}
