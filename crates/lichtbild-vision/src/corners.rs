// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive corner editor. All mutation goes through `drag`, which clamps
// to image bounds and re-validates the simple-quadrilateral invariant; an
// edit that would produce a self-intersecting or degenerate shape is a no-op.

use tracing::debug;

use lichtbild_core::error::{LichtbildError, Result};
use lichtbild_core::types::{CornerPoints, Dimensions, Point};

use crate::geometry::{MIN_QUAD_AREA, is_simple_quad, quad_area};

/// Which corner a drag applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

/// Result of a drag attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// The corner moved (possibly clamped to the image bounds).
    Applied,
    /// The edit would have broken the quadrilateral invariant; nothing moved.
    Rejected,
}

impl DragOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Holds the working corner set for one cropping session.
///
/// The renderer reads corners through [`CornerEditor::corners`]; the only
/// mutating entry point is [`CornerEditor::drag`].
#[derive(Debug, Clone)]
pub struct CornerEditor {
    corners: CornerPoints,
    bounds: Dimensions,
}

impl CornerEditor {
    /// Wrap an existing corner set (typically a detector proposal).
    ///
    /// Fails if the set violates the simple-quadrilateral invariant, which
    /// callers should treat as "fall back to full-frame corners".
    pub fn new(corners: CornerPoints, bounds: Dimensions) -> Result<Self> {
        if !valid_quad(&corners) {
            return Err(LichtbildError::Geometry(
                "initial corner set is not a usable quadrilateral".into(),
            ));
        }
        Ok(Self { corners, bounds })
    }

    /// Editor with default full-frame corners, for manual placement when
    /// detection found nothing.
    pub fn full_frame(bounds: Dimensions) -> Self {
        Self {
            corners: CornerPoints::full_frame(bounds),
            bounds,
        }
    }

    /// Current corner set, read-only.
    pub fn corners(&self) -> &CornerPoints {
        &self.corners
    }

    /// Consume the editor, yielding the accepted corner set.
    pub fn into_corners(self) -> CornerPoints {
        self.corners
    }

    /// Apply a drag delta to one corner.
    ///
    /// The moved point is clamped to the image bounds. If the resulting
    /// quadrilateral would self-intersect or collapse below the minimum
    /// area, the drag is rejected and the corner set is left untouched.
    pub fn drag(&mut self, corner: Corner, dx: f32, dy: f32) -> DragOutcome {
        let max_x = self.bounds.width.saturating_sub(1) as f32;
        let max_y = self.bounds.height.saturating_sub(1) as f32;

        let mut candidate = self.corners;
        let target = match corner {
            Corner::TopLeft => &mut candidate.top_left,
            Corner::TopRight => &mut candidate.top_right,
            Corner::BottomRight => &mut candidate.bottom_right,
            Corner::BottomLeft => &mut candidate.bottom_left,
        };
        *target = Point::new(
            (target.x + dx).clamp(0.0, max_x),
            (target.y + dy).clamp(0.0, max_y),
        );

        if !valid_quad(&candidate) {
            debug!(?corner, dx, dy, "drag rejected: invariant violation");
            return DragOutcome::Rejected;
        }

        self.corners = candidate;
        DragOutcome::Applied
    }
}

fn valid_quad(corners: &CornerPoints) -> bool {
    is_simple_quad(corners) && quad_area(corners) >= MIN_QUAD_AREA
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> CornerEditor {
        CornerEditor::full_frame(Dimensions::new(100, 100))
    }

    #[test]
    fn drag_inside_bounds_is_applied() {
        let mut editor = editor();
        let outcome = editor.drag(Corner::TopLeft, 10.0, 5.0);
        assert!(outcome.applied());
        assert_eq!(editor.corners().top_left, Point::new(10.0, 5.0));
    }

    #[test]
    fn drag_is_clamped_to_image_bounds() {
        let mut editor = editor();
        let outcome = editor.drag(Corner::BottomRight, 500.0, 500.0);
        assert!(outcome.applied());
        assert_eq!(editor.corners().bottom_right, Point::new(99.0, 99.0));
    }

    #[test]
    fn self_intersecting_drag_is_rejected() {
        let mut editor = editor();
        let before = *editor.corners();

        // Dragging the top-left corner past the right edge folds the
        // quadrilateral into a bowtie.
        let outcome = editor.drag(Corner::TopLeft, 99.0, 40.0);
        let after = *editor.corners();

        if outcome.applied() {
            // If the clamped position still forms a simple quad the drag may
            // legitimately land; it must then still be simple.
            assert!(is_simple_quad(&after));
        } else {
            assert_eq!(before, after);
        }
    }

    #[test]
    fn bowtie_fold_is_a_no_op() {
        let mut editor = CornerEditor::new(
            CornerPoints {
                top_left: Point::new(0.0, 0.0),
                top_right: Point::new(50.0, 0.0),
                bottom_right: Point::new(50.0, 50.0),
                bottom_left: Point::new(0.0, 50.0),
            },
            Dimensions::new(100, 100),
        )
        .expect("valid quad");
        let before = *editor.corners();

        // Moving TL to (99, 0) makes edge BL→TL cross edge TR→BR.
        let outcome = editor.drag(Corner::TopLeft, 99.0, 0.0);

        assert_eq!(outcome, DragOutcome::Rejected);
        assert_eq!(before, *editor.corners());
    }

    #[test]
    fn collapse_below_minimum_area_is_rejected() {
        let mut editor = CornerEditor::new(
            CornerPoints {
                top_left: Point::new(10.0, 10.0),
                top_right: Point::new(14.0, 10.0),
                bottom_right: Point::new(14.0, 14.0),
                bottom_left: Point::new(10.0, 14.0),
            },
            Dimensions::new(100, 100),
        )
        .expect("16 px² is exactly the minimum");

        // Shrinking the square any further drops below the area floor.
        let outcome = editor.drag(Corner::BottomRight, -2.0, -2.0);
        assert_eq!(outcome, DragOutcome::Rejected);
    }

    #[test]
    fn new_rejects_degenerate_initial_corners() {
        let degenerate = CornerPoints {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(1.0, 0.0),
            bottom_right: Point::new(1.0, 1.0),
            bottom_left: Point::new(0.0, 1.0),
        };
        let result = CornerEditor::new(degenerate, Dimensions::new(100, 100));
        assert!(matches!(result, Err(LichtbildError::Geometry(_))));
    }
}
