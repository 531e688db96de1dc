use tracing::debug;

use crate::error::{NumericalError, Result, ValidationError};
use crate::math::Point3;

/// Neurite length binned by distance from a fixed origin.
///
/// Bin `i` covers the spherical shell `edges[i] <= d < edges[i + 1]`, where
/// `d` is the distance of a sub-segment's midpoint from the origin. Lengths
/// whose midpoint lies closer than the first edge go to `inside`, beyond the
/// last edge to `outside`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    /// Shell boundaries, strictly increasing.
    pub edges: Vec<f64>,
    /// Summed length per shell, one fewer entry than `edges`.
    pub lengths: Vec<f64>,
    /// Length closer to the origin than `edges[0]`.
    pub inside: f64,
    /// Length at or beyond the last edge.
    pub outside: f64,
}

impl RadialProfile {
    /// Center distance of each shell.
    #[must_use]
    pub fn bin_centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Shell lengths as a percentage of the length inside all shells.
    ///
    /// All zeros when no length fell inside a shell.
    #[must_use]
    pub fn percentages(&self) -> Vec<f64> {
        let total: f64 = self.lengths.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.lengths.len()];
        }
        self.lengths.iter().map(|l| l * 100.0 / total).collect()
    }
}

/// Builds a [`RadialProfile`] from sub-segment midpoints and lengths.
pub struct ShellProfile {
    origin: Point3,
    edges: Vec<f64>,
}

impl ShellProfile {
    /// Creates a new `ShellProfile` query around `origin`.
    #[must_use]
    pub fn new(origin: Point3, edges: Vec<f64>) -> Self {
        Self { origin, edges }
    }

    /// Creates shells of equal `width` covering `[0, max_distance)`.
    ///
    /// The last shell is widened to reach `max_distance` if `width` does not
    /// divide it.
    ///
    /// # Errors
    ///
    /// Returns an error if `width` or `max_distance` is not positive.
    pub fn uniform(origin: Point3, width: f64, max_distance: f64) -> Result<Self> {
        for (parameter, value) in [("shell width", width), ("max distance", max_distance)] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ValidationError::NonPositive { parameter, value }.into());
            }
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (max_distance / width).floor().max(1.0) as usize;
        #[allow(clippy::cast_precision_loss)]
        let mut edges: Vec<f64> = (0..=count).map(|i| i as f64 * width).collect();
        if let Some(last) = edges.last_mut() {
            *last = last.max(max_distance);
        }
        Ok(Self::new(origin, edges))
    }

    /// Executes the query.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two edges, the edges are not
    /// finite and strictly increasing, the slices differ in length, or a
    /// sample is not finite.
    pub fn execute(&self, centers: &[Point3], lengths: &[f64]) -> Result<RadialProfile> {
        if self.edges.len() < 2 {
            return Err(ValidationError::BinEdges("need at least two edges".into()).into());
        }
        if self.edges.iter().any(|e| !e.is_finite()) {
            return Err(ValidationError::BinEdges("edges must be finite".into()).into());
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::BinEdges("edges must be strictly increasing".into()).into());
        }
        if centers.len() != lengths.len() {
            return Err(ValidationError::ValueLength {
                centers: centers.len(),
                values: lengths.len(),
            }
            .into());
        }

        let mut profile = RadialProfile {
            edges: self.edges.clone(),
            lengths: vec![0.0; self.edges.len() - 1],
            inside: 0.0,
            outside: 0.0,
        };

        for (i, (c, l)) in centers.iter().zip(lengths).enumerate() {
            let d = nalgebra::distance(c, &self.origin);
            if !(d.is_finite() && l.is_finite()) {
                return Err(NumericalError::NonFiniteSample(i).into());
            }
            // Index of the first edge strictly greater than `d`.
            let upper = self.edges.partition_point(|e| *e <= d);
            if upper == 0 {
                profile.inside += l;
            } else if upper == self.edges.len() {
                profile.outside += l;
            } else {
                profile.lengths[upper - 1] += l;
            }
        }

        debug!(
            segments = centers.len(),
            shells = profile.lengths.len(),
            outside = profile.outside,
            "built radial profile"
        );
        Ok(profile)
    }
}
