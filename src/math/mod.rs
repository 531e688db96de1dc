/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Number of decimal digits kept in canonical voxel centers.
pub const CENTER_DECIMALS: i32 = 6;

/// Rounds `value` to `decimals` digits after the decimal point.
///
/// Ties are rounded away from zero, matching [`f64::round`]. A result of
/// `-0.0` is normalised to `0.0` so equal centers print and compare alike.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounds every coordinate of `point` with [`round_to`].
#[must_use]
pub fn round_point(point: &Point3, decimals: i32) -> Point3 {
    point.map(|c| round_to(c, decimals))
}
