use crate::math::Point3;

/// One row of an SWC table.
///
/// `parent` is `None` for a root. In SWC text roots carry a negative parent
/// id (conventionally `-1`).
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonPoint {
    /// Point identifier, unique within a skeleton.
    pub id: i64,
    /// Structure tag (soma, axon, dendrite, ...), passed through untouched.
    pub kind: i32,
    /// Position of the point.
    pub position: Point3,
    /// Radius of the neurite at this point.
    pub radius: f64,
    /// Identifier of the parent point.
    pub parent: Option<i64>,
}

impl SkeletonPoint {
    /// Creates a new point.
    #[must_use]
    pub fn new(id: i64, kind: i32, position: Point3, radius: f64, parent: Option<i64>) -> Self {
        Self {
            id,
            kind,
            position,
            radius,
            parent,
        }
    }

    /// Creates a root point (no parent).
    #[must_use]
    pub fn root(id: i64, kind: i32, position: Point3, radius: f64) -> Self {
        Self::new(id, kind, position, radius, None)
    }

    /// Returns `true` if this point has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns `true` if the position and radius are all finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite()) && self.radius.is_finite()
    }
}
