//! Binning points onto a regular cubic lattice.
//!
//! A [`VoxelGrid`] with offset `(0, 0, 0)` has a voxel centered on the
//! origin. A non-zero [`GridOffset`] shifts the lattice by half a cell along
//! each flagged axis, so the eight offsets in [`GridOffset::STAGGERED`] give
//! eight overlapping grids.
//!
//! Points are assigned to a cell by rounding `(p + shift) / size` to the
//! nearest integer with ties away from zero ([`f64::round`]). A point exactly
//! on a boundary therefore goes to the cell further from the origin:
//! `x = 5` with size `10` lands in the cell centered at `10`, and `x = -5` in
//! the one centered at `-10`.

mod aggregate;
mod window;

pub use aggregate::{aggregate_staggered, AggregateVoxels, VoxelTable};
pub use window::WindowPoints;

use crate::error::{NumericalError, ValidationError};
use crate::math::{round_point, Point3, Vector3, CENTER_DECIMALS};

/// Cell indices at or beyond this magnitude are rejected; `2^62` stays
/// clear of `i64` saturation.
const MAX_CELL: f64 = 4_611_686_018_427_387_904.0;

/// Half-cell shift of a lattice, one flag per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridOffset(pub [i32; 3]);

impl GridOffset {
    /// The unshifted lattice.
    pub const ZERO: Self = Self([0, 0, 0]);

    /// Every combination of `{0, 1}` on the three axes.
    pub const STAGGERED: [Self; 8] = [
        Self([0, 0, 0]),
        Self([0, 0, 1]),
        Self([0, 1, 0]),
        Self([0, 1, 1]),
        Self([1, 0, 0]),
        Self([1, 0, 1]),
        Self([1, 1, 0]),
        Self([1, 1, 1]),
    ];
}

/// Integer coordinates of a cell in a [`VoxelGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelIndex(pub [i64; 3]);

/// A uniform cubic lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelGrid {
    size: f64,
    offset: GridOffset,
}

impl VoxelGrid {
    /// Creates a grid with cells of edge `size`, shifted by `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonPositive`] if `size` is not a positive
    /// finite number.
    pub fn new(size: f64, offset: GridOffset) -> Result<Self, ValidationError> {
        if !(size > 0.0 && size.is_finite()) {
            return Err(ValidationError::NonPositive {
                parameter: "grid size",
                value: size,
            });
        }
        Ok(Self { size, offset })
    }

    /// Cell edge length.
    #[must_use]
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Lattice shift flags.
    #[must_use]
    pub fn offset(&self) -> GridOffset {
        self.offset
    }

    /// `offset * size / 2`, added to points before binning.
    #[must_use]
    pub fn shift(&self) -> Vector3 {
        let [x, y, z] = self.offset.0;
        Vector3::new(f64::from(x), f64::from(y), f64::from(z)) * (self.size * 0.5)
    }

    /// Returns the index of the cell containing `point`.
    ///
    /// `None` if a coordinate is not finite or the cell index does not fit
    /// in an `i64`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, point: &Point3) -> Option<VoxelIndex> {
        let scaled = ((point.coords + self.shift()) / self.size).map(f64::round);
        if !scaled.iter().all(|c| c.is_finite() && c.abs() < MAX_CELL) {
            return None;
        }
        Some(VoxelIndex([scaled.x as i64, scaled.y as i64, scaled.z as i64]))
    }

    /// Like [`Self::index_of`], reporting a bad point as sample `sample`.
    pub(crate) fn locate(
        &self,
        sample: usize,
        point: &Point3,
    ) -> Result<VoxelIndex, NumericalError> {
        if !point.iter().all(|c| c.is_finite()) {
            return Err(NumericalError::NonFiniteSample(sample));
        }
        self.index_of(point).ok_or(NumericalError::OutOfGrid(sample))
    }

    /// Returns the center of cell `index`, rounded to 6 decimal digits.
    #[must_use]
    pub fn center_of(&self, index: VoxelIndex) -> Point3 {
        #[allow(clippy::cast_precision_loss)]
        let [i, j, k] = index.0.map(|c| c as f64);
        let raw = Vector3::new(i, j, k) * self.size - self.shift();
        round_point(&Point3::from(raw), CENTER_DECIMALS)
    }

    /// Returns the center of the cell containing `point`.
    #[must_use]
    pub fn window(&self, point: &Point3) -> Option<Point3> {
        self.index_of(point).map(|i| self.center_of(i))
    }
}
