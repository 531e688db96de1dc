use std::borrow::Cow;
use std::collections::HashSet;

use nalgebra::Unit;
use slotmap::SecondaryMap;
use tracing::debug;

use crate::error::{NumericalError, Result, TopologyError, ValidationError};
use crate::math::{Point3, TOLERANCE};
use crate::skeleton::{NodeKey, SkeletonPoint, SkeletonTree};

/// Midpoints and lengths of every sub-segment emitted while resampling.
///
/// `centers[i]` and `lengths[i]` describe the same sub-segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchSet {
    /// Midpoint of each sub-segment.
    pub centers: Vec<Point3>,
    /// Euclidean length of each sub-segment.
    pub lengths: Vec<f64>,
}

impl BranchSet {
    /// Number of sub-segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Returns `true` if no sub-segment was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Sum of all sub-segment lengths.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.lengths.iter().sum()
    }

    /// Each length as a fraction of [`Self::total_length`].
    ///
    /// All zeros when the total is zero.
    #[must_use]
    pub fn length_fractions(&self) -> Vec<f64> {
        let total = self.total_length();
        if total <= 0.0 {
            return vec![0.0; self.lengths.len()];
        }
        self.lengths.iter().map(|l| l / total).collect()
    }

    fn push(&mut self, center: Point3, length: f64) {
        self.centers.push(center);
        self.lengths.push(length);
    }
}

/// Output of [`Resample::execute`].
#[derive(Debug, Clone)]
pub struct ResampledSkeleton {
    /// Resampled points, ids renumbered densely from 1, parents first.
    pub points: Vec<SkeletonPoint>,
    /// Sum of the original edge lengths that survived the mask.
    pub total_length: f64,
    /// Sub-segment statistics, present when requested with
    /// [`Resample::with_branches`].
    pub branches: Option<BranchSet>,
}

/// Re-discretises every edge of a skeleton to a uniform step length.
///
/// An edge longer than the step gets `floor(len / step)` evenly spaced points
/// inserted from the parent side; the original child closes the chain with
/// the residual. Radii are interpolated linearly along the edge. When the
/// residual vanishes the last inserted point would coincide with the child,
/// so the child takes its place instead.
///
/// Edges are visited in input order, except that a row listed before its
/// parent is deferred until the parent has been emitted. Rows therefore need
/// not be sorted parent-first. Masked-out rows are removed before anything
/// else looks at them.
pub struct Resample {
    step_length: f64,
    mask: Option<Vec<bool>>,
    branches: bool,
}

impl Resample {
    /// Creates a new `Resample` operation with the given step length.
    #[must_use]
    pub fn new(step_length: f64) -> Self {
        Self {
            step_length,
            mask: None,
            branches: false,
        }
    }

    /// Keeps only points whose mask entry is `true`.
    ///
    /// The mask is matched to points by position in the input slice.
    #[must_use]
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Records sub-segment centers and lengths in the output.
    #[must_use]
    pub fn with_branches(mut self, branches: bool) -> Self {
        self.branches = branches;
        self
    }

    /// Executes the resampling.
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] for a non-positive step, a mask of the wrong
    ///   length or a negative radius.
    /// - [`TopologyError`] if a parent id does not resolve, a kept point has
    ///   a masked-out parent, or the links do not form a forest.
    /// - [`NumericalError`] for non-finite input or a zero-length edge.
    pub fn execute(&self, points: &[SkeletonPoint]) -> Result<ResampledSkeleton> {
        if !(self.step_length > 0.0 && self.step_length.is_finite()) {
            return Err(ValidationError::NonPositive {
                parameter: "step length",
                value: self.step_length,
            }
            .into());
        }
        let kept = self.apply_mask(points)?;
        validate_points(&kept)?;

        let tree = SkeletonTree::from_points(&kept)?;
        let order = tree.topological_order()?;

        let mut run = Run {
            step: self.step_length,
            points: Vec::with_capacity(kept.len()),
            new_ids: SecondaryMap::with_capacity(kept.len()),
            total_length: 0.0,
            branches: self.branches.then(BranchSet::default),
        };

        for key in order {
            let node = &tree[key];
            match node.parent {
                None => {
                    let id = run.emit(&node.point, node.point.position, node.point.radius, None);
                    run.new_ids.insert(key, id);
                }
                Some(parent_key) => run.edge(&tree, key, parent_key)?,
            }
        }

        debug!(
            input = points.len(),
            kept = kept.len(),
            output = run.points.len(),
            total_length = run.total_length,
            step = self.step_length,
            "resampled skeleton"
        );

        Ok(ResampledSkeleton {
            points: run.points,
            total_length: run.total_length,
            branches: run.branches,
        })
    }

    /// Drops masked-out rows. A kept row whose parent was dropped is an
    /// error; masked-out rows themselves are never inspected.
    fn apply_mask<'a>(&self, points: &'a [SkeletonPoint]) -> Result<Cow<'a, [SkeletonPoint]>> {
        let Some(mask) = &self.mask else {
            return Ok(Cow::Borrowed(points));
        };
        if mask.len() != points.len() {
            return Err(ValidationError::MaskLength {
                mask: mask.len(),
                points: points.len(),
            }
            .into());
        }

        let (kept, dropped): (Vec<_>, Vec<_>) = points
            .iter()
            .zip(mask)
            .partition(|(_, keep)| **keep);
        let kept: Vec<SkeletonPoint> = kept.into_iter().map(|(p, _)| p.clone()).collect();
        let kept_ids: HashSet<i64> = kept.iter().map(|p| p.id).collect();
        let dropped_ids: HashSet<i64> = dropped.into_iter().map(|(p, _)| p.id).collect();

        for p in &kept {
            if let Some(parent) = p.parent {
                if !kept_ids.contains(&parent) && dropped_ids.contains(&parent) {
                    return Err(TopologyError::MaskedParent { id: p.id, parent }.into());
                }
            }
        }
        Ok(Cow::Owned(kept))
    }
}

fn validate_points(points: &[SkeletonPoint]) -> Result<()> {
    for p in points {
        if !p.is_finite() {
            return Err(NumericalError::NonFinite(p.id).into());
        }
        if p.radius < 0.0 {
            return Err(ValidationError::NegativeRadius {
                id: p.id,
                radius: p.radius,
            }
            .into());
        }
    }
    Ok(())
}

/// Mutable state of one resampling pass.
struct Run {
    step: f64,
    points: Vec<SkeletonPoint>,
    new_ids: SecondaryMap<NodeKey, i64>,
    total_length: f64,
    branches: Option<BranchSet>,
}

impl Run {
    /// Appends a point derived from `source` and returns its new id.
    fn emit(
        &mut self,
        source: &SkeletonPoint,
        position: Point3,
        radius: f64,
        parent: Option<i64>,
    ) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        let id = self.points.len() as i64 + 1;
        self.points.push(SkeletonPoint::new(
            id,
            source.kind,
            position,
            radius,
            parent,
        ));
        id
    }

    fn record(&mut self, center: Point3, length: f64) {
        if let Some(branches) = &mut self.branches {
            branches.push(center, length);
        }
    }

    /// Emits the chain of points replacing the edge `parent_key -> key`.
    fn edge(&mut self, tree: &SkeletonTree, key: NodeKey, parent_key: NodeKey) -> Result<()> {
        let child = &tree[key].point;
        let parent = &tree[parent_key].point;

        let parent_id = *self
            .new_ids
            .get(parent_key)
            .ok_or(TopologyError::MissingParent {
                id: child.id,
                parent: parent.id,
            })?;

        let seg = child.position - parent.position;
        let seg_len = seg.norm();
        if seg_len < TOLERANCE {
            return Err(NumericalError::ZeroLengthEdge {
                id: child.id,
                parent: parent.id,
            }
            .into());
        }
        self.total_length += seg_len;

        let mut prev_id = parent_id;
        let mut prev_pos = parent.position;

        if seg_len > self.step {
            let dir = Unit::try_new(seg, TOLERANCE)
                .ok_or(NumericalError::DegenerateDirection(child.id))?;
            let rad_grad = (child.radius - parent.radius) / seg_len;

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let steps = (seg_len / self.step).floor() as usize;
            #[allow(clippy::cast_precision_loss)]
            let residual = seg_len - steps as f64 * self.step;
            let interior = if residual < TOLERANCE * self.step {
                steps - 1
            } else {
                steps
            };

            for k in 1..=interior {
                #[allow(clippy::cast_precision_loss)]
                let dist = k as f64 * self.step;
                let position = parent.position + dir.into_inner() * dist;
                let radius = parent.radius + rad_grad * dist;
                prev_id = self.emit(child, position, radius, Some(prev_id));
                self.record(
                    parent.position + dir.into_inner() * (dist - 0.5 * self.step),
                    self.step,
                );
                prev_pos = position;
            }
        }

        let id = self.emit(child, child.position, child.radius, Some(prev_id));
        self.record(
            nalgebra::center(&prev_pos, &child.position),
            nalgebra::distance(&prev_pos, &child.position),
        );
        self.new_ids.insert(key, id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ArborError;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn two_point(length: f64) -> Vec<SkeletonPoint> {
        vec![
            SkeletonPoint::root(1, 1, p(0.0, 0.0, 0.0), 1.0),
            SkeletonPoint::new(2, 3, p(length, 0.0, 0.0), 2.0, Some(1)),
        ]
    }

    /// A small branching skeleton with edges in several directions.
    fn forked() -> Vec<SkeletonPoint> {
        vec![
            SkeletonPoint::root(1, 1, p(0.0, 0.0, 0.0), 3.0),
            SkeletonPoint::new(2, 3, p(3.0, 4.0, 0.0), 2.0, Some(1)),
            SkeletonPoint::new(3, 3, p(3.0, 4.0, 12.0), 1.0, Some(2)),
            SkeletonPoint::new(4, 3, p(-1.5, 0.2, 0.7), 0.5, Some(1)),
            SkeletonPoint::new(5, 3, p(-9.0, 2.0, 3.3), 0.2, Some(4)),
        ]
    }

    #[test]
    fn end_to_end_two_point_edge() {
        let out = Resample::new(4.0)
            .with_branches(true)
            .execute(&two_point(10.0))
            .unwrap();

        let xs: Vec<f64> = out.points.iter().map(|q| q.position.x).collect();
        let radii: Vec<f64> = out.points.iter().map(|q| q.radius).collect();
        assert_eq!(out.points.len(), 4);
        for (got, want) in xs.iter().zip([0.0, 4.0, 8.0, 10.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        for (got, want) in radii.iter().zip([1.0, 1.4, 1.8, 2.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }

        let branches = out.branches.unwrap();
        assert_eq!(branches.len(), 3);
        for (got, want) in branches.lengths.iter().zip([4.0, 4.0, 2.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        for (got, want) in branches.centers.iter().zip([2.0, 6.0, 9.0]) {
            assert_abs_diff_eq!(got.x, want, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(branches.total_length(), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.total_length, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn ids_are_dense_and_parents_precede_children() {
        let out = Resample::new(0.7).execute(&forked()).unwrap();
        for (i, q) in out.points.iter().enumerate() {
            assert_eq!(q.id, i as i64 + 1);
            if let Some(parent) = q.parent {
                assert!(parent < q.id);
            }
        }
        assert_eq!(out.points.iter().filter(|q| q.is_root()).count(), 1);
    }

    #[test]
    fn root_is_copied_verbatim() {
        let out = Resample::new(1.0).execute(&forked()).unwrap();
        let root = &out.points[0];
        assert_eq!(root.id, 1);
        assert_eq!(root.kind, 1);
        assert_eq!(root.position, p(0.0, 0.0, 0.0));
        assert_abs_diff_eq!(root.radius, 3.0);
        assert!(root.is_root());
    }

    #[test]
    fn inserted_points_take_child_type() {
        let out = Resample::new(1.0).execute(&two_point(5.5)).unwrap();
        assert!(out.points[1..].iter().all(|q| q.kind == 3));
    }

    #[test]
    fn branch_lengths_sum_to_total_length() {
        for step in [0.3, 1.0, 2.5, 7.0, 50.0] {
            let out = Resample::new(step)
                .with_branches(true)
                .execute(&forked())
                .unwrap();
            let branches = out.branches.unwrap();
            assert_relative_eq!(
                branches.total_length(),
                out.total_length,
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn subdivision_count_is_floor_of_ratio() {
        let out = Resample::new(3.0)
            .with_branches(true)
            .execute(&two_point(10.0))
            .unwrap();
        // 3 inserted points + root + child.
        assert_eq!(out.points.len(), 5);
        let branches = out.branches.unwrap();
        assert_abs_diff_eq!(*branches.lengths.last().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn exact_multiple_emits_no_zero_length_branch() {
        let out = Resample::new(2.5)
            .with_branches(true)
            .execute(&two_point(10.0))
            .unwrap();
        // Points at 2.5, 5.0, 7.5 then the child at 10.
        assert_eq!(out.points.len(), 5);
        let branches = out.branches.unwrap();
        assert_eq!(branches.len(), 4);
        for l in &branches.lengths {
            assert_abs_diff_eq!(*l, 2.5, epsilon = 1e-12);
        }
        let last = out.points.last().unwrap();
        assert_eq!(last.position, p(10.0, 0.0, 0.0));
        assert_eq!(last.parent, Some(4));
    }

    #[test]
    fn short_edge_is_one_branch() {
        let out = Resample::new(20.0)
            .with_branches(true)
            .execute(&two_point(10.0))
            .unwrap();
        assert_eq!(out.points.len(), 2);
        assert_eq!(out.points[1].parent, Some(1));
        let branches = out.branches.unwrap();
        assert_eq!(branches.lengths, vec![10.0]);
        assert_eq!(branches.centers, vec![p(5.0, 0.0, 0.0)]);
    }

    #[test]
    fn radius_interpolation_is_linear() {
        let pts = vec![
            SkeletonPoint::root(1, 1, p(1.0, 1.0, 1.0), 0.5),
            SkeletonPoint::new(2, 3, p(4.0, 5.0, 1.0), 3.0, Some(1)),
        ];
        let step = 0.9;
        let out = Resample::new(step).execute(&pts).unwrap();
        let len = 5.0;
        for (k, q) in out.points[1..out.points.len() - 1].iter().enumerate() {
            let k = (k + 1) as f64;
            let expected = 0.5 + k * (3.0 - 0.5) / len * step;
            assert_relative_eq!(q.radius, expected, max_relative = 1e-12);
            let travelled = nalgebra::distance(&q.position, &pts[0].position);
            assert_relative_eq!(travelled, k * step, max_relative = 1e-12);
        }
    }

    #[test]
    fn resampling_again_is_idempotent() {
        let step = 0.8;
        let once = Resample::new(step).execute(&forked()).unwrap();
        let twice = Resample::new(step).execute(&once.points).unwrap();
        assert_eq!(once.points.len(), twice.points.len());
        for (a, b) in once.points.iter().zip(&twice.points) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.parent, b.parent);
            assert_abs_diff_eq!(a.position, b.position, epsilon = 1e-9);
            assert_abs_diff_eq!(a.radius, b.radius, epsilon = 1e-9);
        }
    }

    #[test]
    fn all_true_mask_matches_no_mask() {
        let pts = forked();
        let plain = Resample::new(1.1).with_branches(true).execute(&pts).unwrap();
        let masked = Resample::new(1.1)
            .with_branches(true)
            .with_mask(vec![true; pts.len()])
            .execute(&pts)
            .unwrap();
        assert_eq!(plain.points, masked.points);
        assert_eq!(plain.branches, masked.branches);
        assert_abs_diff_eq!(plain.total_length, masked.total_length);
    }

    #[test]
    fn mask_prunes_leaf_subtree() {
        let pts = forked();
        let full = Resample::new(100.0).execute(&pts).unwrap();
        let pruned = Resample::new(100.0)
            .with_mask(vec![true, true, true, false, false])
            .execute(&pts)
            .unwrap();
        assert_eq!(pruned.points.len(), 3);
        // 5 + 12 for the kept arm.
        assert_abs_diff_eq!(pruned.total_length, 17.0, epsilon = 1e-12);
        assert!(pruned.total_length < full.total_length);
    }

    #[test]
    fn masked_parent_with_kept_child_fails() {
        let err = Resample::new(1.0)
            .with_mask(vec![true, true, true, false, true])
            .execute(&forked())
            .unwrap_err();
        assert!(matches!(
            err,
            ArborError::Topology(TopologyError::MaskedParent { id: 5, parent: 4 })
        ));
    }

    #[test]
    fn masked_rows_are_not_inspected() {
        let mut pts = vec![
            SkeletonPoint::root(1, 1, p(0.0, 0.0, 0.0), 1.0),
            SkeletonPoint::new(2, 3, p(2.0, 0.0, 0.0), 1.0, Some(1)),
            SkeletonPoint::new(3, 3, p(5.0, 0.0, 0.0), 1.0, Some(99)),
            SkeletonPoint::new(4, 3, p(f64::NAN, 0.0, 0.0), -1.0, Some(5)),
            SkeletonPoint::new(5, 3, p(1.0, 1.0, 0.0), 1.0, Some(4)),
        ];
        let out = Resample::new(1.0)
            .with_mask(vec![true, true, false, false, false])
            .execute(&pts)
            .unwrap();
        assert_eq!(out.points.len(), 3);
        assert_abs_diff_eq!(out.total_length, 2.0, epsilon = 1e-12);

        // The same rows fail once they are kept.
        pts.truncate(3);
        assert!(Resample::new(1.0).execute(&pts).is_err());
    }

    #[test]
    fn sorted_branching_rows_keep_row_order() {
        let pts = vec![
            SkeletonPoint::root(1, 1, p(0.0, 0.0, 0.0), 1.0),
            SkeletonPoint::new(2, 3, p(1.0, 0.0, 0.0), 1.0, Some(1)),
            SkeletonPoint::new(3, 3, p(0.0, 1.0, 0.0), 1.0, Some(1)),
            SkeletonPoint::new(4, 3, p(2.0, 0.0, 0.0), 1.0, Some(2)),
        ];
        let out = Resample::new(100.0).execute(&pts).unwrap();
        let rows: Vec<(Point3, Option<i64>)> =
            out.points.iter().map(|q| (q.position, q.parent)).collect();
        assert_eq!(
            rows,
            vec![
                (p(0.0, 0.0, 0.0), None),
                (p(1.0, 0.0, 0.0), Some(1)),
                (p(0.0, 1.0, 0.0), Some(1)),
                (p(2.0, 0.0, 0.0), Some(2)),
            ]
        );
    }

    #[test]
    fn mask_length_mismatch_fails() {
        let err = Resample::new(1.0)
            .with_mask(vec![true])
            .execute(&forked())
            .unwrap_err();
        assert!(matches!(
            err,
            ArborError::Validation(ValidationError::MaskLength { mask: 1, points: 5 })
        ));
    }

    #[test]
    fn non_positive_step_fails() {
        for step in [0.0, -1.0, f64::NAN] {
            let err = Resample::new(step).execute(&forked()).unwrap_err();
            assert!(matches!(
                err,
                ArborError::Validation(ValidationError::NonPositive { .. })
            ));
        }
    }

    #[test]
    fn missing_parent_fails() {
        let pts = vec![
            SkeletonPoint::root(1, 1, p(0.0, 0.0, 0.0), 1.0),
            SkeletonPoint::new(2, 3, p(1.0, 0.0, 0.0), 1.0, Some(9)),
        ];
        let err = Resample::new(1.0).execute(&pts).unwrap_err();
        assert!(matches!(
            err,
            ArborError::Topology(TopologyError::MissingParent { id: 2, parent: 9 })
        ));
    }

    #[test]
    fn zero_length_edge_fails() {
        let err = Resample::new(1.0).execute(&two_point(0.0)).unwrap_err();
        assert!(matches!(
            err,
            ArborError::Numerical(NumericalError::ZeroLengthEdge { id: 2, parent: 1 })
        ));
    }

    #[test]
    fn non_finite_point_fails() {
        let mut pts = two_point(3.0);
        pts[1].position.y = f64::INFINITY;
        let err = Resample::new(1.0).execute(&pts).unwrap_err();
        assert!(matches!(err, ArborError::Numerical(NumericalError::NonFinite(2))));
    }

    #[test]
    fn unsorted_rows_give_same_geometry() {
        let pts = forked();
        let mut shuffled = pts.clone();
        shuffled.reverse();
        let a = Resample::new(0.9).execute(&pts).unwrap();
        let b = Resample::new(0.9).execute(&shuffled).unwrap();
        assert_eq!(a.points.len(), b.points.len());
        assert_abs_diff_eq!(a.total_length, b.total_length, epsilon = 1e-9);
        assert!(b.points[0].is_root());
    }

    #[test]
    fn without_branches_reports_none() {
        let out = Resample::new(1.0).execute(&two_point(3.5)).unwrap();
        assert!(out.branches.is_none());
        assert_abs_diff_eq!(out.total_length, 3.5);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let out = Resample::new(1.0).with_branches(true).execute(&[]).unwrap();
        assert!(out.points.is_empty());
        assert!(out.branches.unwrap().is_empty());
        assert_abs_diff_eq!(out.total_length, 0.0);
    }

    #[test]
    fn length_fractions_sum_to_one() {
        let out = Resample::new(0.5)
            .with_branches(true)
            .execute(&forked())
            .unwrap();
        let fractions = out.branches.unwrap().length_fractions();
        assert_relative_eq!(fractions.iter().sum::<f64>(), 1.0, max_relative = 1e-12);
    }
}
