// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Boundary detector — proposes the quadrilateral outline of a physical photo
// inside a captured frame.
//
// Pipeline: downscale (large inputs only) → grayscale → gaussian blur → canny
// → close 1px edge gaps → extract closed contours → keep the largest contour
// above a minimum area fraction → approximate to a 4-gon → order corners →
// rescale back to full resolution.
//
// Absence of a boundary is a normal outcome, not an error: the caller falls
// back to manual corner placement over the full frame.

use image::DynamicImage;
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point as ContourPoint;
use tracing::{debug, instrument};

use lichtbild_core::config::DetectorOptions;
use lichtbild_core::types::{CornerPoints, Point};

use crate::geometry::{order_corners, shoelace_area};

/// Escalating tolerance multipliers for the polygon approximation. A contour
/// with slightly ragged edges may need a coarser epsilon before it collapses
/// to exactly four vertices.
const EPSILON_STEPS: [f64; 3] = [1.0, 1.5, 2.5];

/// A proposed photo boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedBoundary {
    /// Corner points in full-resolution image coordinates.
    pub corners: CornerPoints,
    /// Detection confidence in [0, 1]. At least 0.5 for any accepted
    /// candidate; grows with the fraction of the frame the photo covers.
    pub confidence: f32,
}

/// Detect the photo boundary in `image`, if one is present.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn detect_boundary(image: &DynamicImage, opts: &DetectorOptions) -> Option<DetectedBoundary> {
    let (orig_w, orig_h) = (image.width(), image.height());
    if orig_w < 8 || orig_h < 8 {
        debug!("image too small for boundary detection");
        return None;
    }

    // Downscale large frames; detection does not need full resolution and
    // must not stall the interactive path.
    let longest = orig_w.max(orig_h);
    let scale = if longest > opts.working_size {
        opts.working_size as f32 / longest as f32
    } else {
        1.0
    };
    let gray = if scale < 1.0 {
        let working_w = ((orig_w as f32 * scale).round() as u32).max(1);
        let working_h = ((orig_h as f32 * scale).round() as u32).max(1);
        debug!(working_w, working_h, "downscaling for detection");
        image
            .resize_exact(working_w, working_h, image::imageops::FilterType::Triangle)
            .to_luma8()
    } else {
        image.to_luma8()
    };

    let blurred = gaussian_blur_f32(&gray, opts.blur_sigma);
    let edges = canny(&blurred, opts.canny_low, opts.canny_high);
    // Canny can leave single-pixel gaps at corners; close them so the
    // boundary traces as one contour.
    let closed = dilate(&edges, Norm::LInf, 1);

    let contours = find_contours::<i32>(&closed);
    debug!(contour_count = contours.len(), "contours extracted");

    let working_area = (gray.width() * gray.height()) as f32;
    let min_area = opts.min_area_fraction * working_area;

    let (best_area, best_contour) = contours
        .iter()
        .filter(|c| c.points.len() >= 4)
        .map(|c| (contour_area(&c.points), c))
        .filter(|(area, _)| *area >= min_area)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;

    debug!(
        area = best_area,
        min_area, "largest closed contour above area threshold"
    );

    let quad = approximate_to_quad(&best_contour.points, opts.epsilon_fraction)?;

    // Rescale to full resolution and clamp to the frame.
    let inv_scale = 1.0 / scale;
    let max_x = (orig_w - 1) as f32;
    let max_y = (orig_h - 1) as f32;
    let points = quad.map(|p| {
        Point::new(
            (p.x as f32 * inv_scale).clamp(0.0, max_x),
            (p.y as f32 * inv_scale).clamp(0.0, max_y),
        )
    });

    let corners = match order_corners(points) {
        Ok(corners) => corners,
        Err(err) => {
            debug!(%err, "approximated polygon rejected");
            return None;
        }
    };

    let area_fraction = best_area / working_area;
    let confidence = confidence_from_area(area_fraction, opts.min_area_fraction);
    debug!(confidence, area_fraction, "boundary detected");

    Some(DetectedBoundary {
        corners,
        confidence,
    })
}

/// Douglas-Peucker approximation of the contour to exactly four vertices,
/// trying progressively coarser tolerances before giving up.
fn approximate_to_quad(
    points: &[ContourPoint<i32>],
    epsilon_fraction: f64,
) -> Option<[ContourPoint<i32>; 4]> {
    let perimeter = arc_length(points, true);
    for step in EPSILON_STEPS {
        let epsilon = epsilon_fraction * step * perimeter;
        let approx = approximate_polygon_dp(points, epsilon, true);
        if approx.len() == 4 {
            return Some([approx[0], approx[1], approx[2], approx[3]]);
        }
        debug!(
            vertices = approx.len(),
            epsilon, "approximation did not yield a quadrilateral"
        );
    }
    None
}

/// Enclosed area of a closed contour via the shoelace formula.
fn contour_area(points: &[ContourPoint<i32>]) -> f32 {
    let as_points: Vec<Point> = points
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect();
    shoelace_area(&as_points)
}

/// Map the covered-area fraction onto [0.5, 1.0]: any accepted boundary is at
/// least half-confident, and confidence grows as the photo fills the frame.
fn confidence_from_area(area_fraction: f32, min_fraction: f32) -> f32 {
    let span = (1.0 - min_fraction).max(f32::EPSILON);
    let normalized = ((area_fraction - min_fraction) / span).clamp(0.0, 1.0);
    0.5 + 0.5 * normalized
}
