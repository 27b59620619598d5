// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry kernel — corner canonicalization, planar homography computation,
// and inverse-mapped bilinear warping. Pure functions, no I/O, deterministic
// for identical numeric input.

use image::{DynamicImage, Rgba, RgbaImage};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use lichtbild_core::error::{LichtbildError, Result};
use lichtbild_core::types::{CornerPoints, Point};

/// Quadrilaterals with less area than this (in px²) are degenerate.
pub const MIN_QUAD_AREA: f32 = 16.0;

const EPS: f64 = 1e-9;

/// Fill policy for destination pixels that map outside the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderFill {
    /// Fill with a fixed colour.
    Constant(Rgba<u8>),
    /// Clamp the sample position to the nearest edge pixel.
    Replicate,
}

impl BorderFill {
    /// Opaque black, the canonical fill for de-skewed photos.
    pub fn black() -> Self {
        Self::Constant(Rgba([0, 0, 0, 255]))
    }
}

impl Default for BorderFill {
    fn default() -> Self {
        Self::black()
    }
}

/// Canonicalize four raw points into the labeled quadrilateral.
///
/// Points are sorted clockwise (in image coordinates, y down) by their angle
/// around the centroid, with lexicographic (y, then x) tie-breaks so the
/// function is total and deterministic. The corner with the smallest `x + y`
/// becomes `top_left`. Idempotent: ordering an already-ordered set is a no-op.
///
/// Fails with a geometry error for coincident or collinear input.
pub fn order_corners(points: [Point; 4]) -> Result<CornerPoints> {
    // Coincident points can never form a quadrilateral.
    for i in 0..4 {
        for j in (i + 1)..4 {
            let dx = points[i].x - points[j].x;
            let dy = points[i].y - points[j].y;
            if (dx * dx + dy * dy).sqrt() < 1e-3 {
                return Err(LichtbildError::Geometry(
                    "two corner points coincide".into(),
                ));
            }
        }
    }

    let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

    let mut sorted = points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| lexicographic(a, b))
    });

    // Rotate so the corner closest to the origin (smallest x + y) leads.
    let anchor = (0..4)
        .min_by(|&i, &j| {
            let sum_i = sorted[i].x + sorted[i].y;
            let sum_j = sorted[j].x + sorted[j].y;
            sum_i
                .partial_cmp(&sum_j)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| lexicographic(&sorted[i], &sorted[j]))
        })
        .unwrap_or(0);
    sorted.rotate_left(anchor);

    let corners = CornerPoints {
        top_left: sorted[0],
        top_right: sorted[1],
        bottom_right: sorted[2],
        bottom_left: sorted[3],
    };

    let area = quad_area(&corners);
    if area < MIN_QUAD_AREA {
        return Err(LichtbildError::Geometry(format!(
            "quadrilateral area {area:.2} px² is below the {MIN_QUAD_AREA} px² minimum"
        )));
    }
    if !is_simple_quad(&corners) {
        return Err(LichtbildError::Geometry(
            "points do not form a simple quadrilateral".into(),
        ));
    }

    Ok(corners)
}

/// Strict (y, then x) ordering used to break angle ties.
fn lexicographic(a: &Point, b: &Point) -> std::cmp::Ordering {
    a.y.partial_cmp(&b.y)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
}

/// Area of a polygon via the shoelace formula. Vertices must be in order
/// (CW or CCW).
pub fn shoelace_area(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// Area of a labeled quadrilateral.
pub fn quad_area(corners: &CornerPoints) -> f32 {
    shoelace_area(&corners.to_array())
}

/// Whether the labeled quadrilateral is simple (non-self-intersecting).
///
/// Checks the two pairs of non-adjacent edges for proper intersection; a
/// crossing pair means the polygon is a "bowtie".
pub fn is_simple_quad(corners: &CornerPoints) -> bool {
    let [tl, tr, br, bl] = corners.to_array();
    !segments_cross(tl, tr, br, bl) && !segments_cross(tr, br, bl, tl)
}

/// Proper intersection of segments (a1, a2) and (b1, b2); shared endpoints do
/// not count.
fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Solve the planar homography mapping the source quadrilateral onto an
/// axis-aligned `out_w` x `out_h` rectangle.
///
/// The destination corners are the pixel corners (0,0), (out_w-1,0),
/// (out_w-1,out_h-1), (0,out_h-1) so that warping with full-frame corners is
/// an identity mapping.
pub fn perspective_transform(src: &CornerPoints, out_w: u32, out_h: u32) -> Result<Matrix3<f64>> {
    if out_w == 0 || out_h == 0 {
        return Err(LichtbildError::Geometry(
            "output rectangle has zero area".into(),
        ));
    }
    let w = (out_w - 1) as f64;
    let h = (out_h - 1) as f64;
    let dst = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let src_pts = src.to_array();

    // Direct linear transform: 8 equations in the 8 unknowns of H (h33 = 1).
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let (x, y) = (src_pts[i].x as f64, src_pts[i].y as f64);
        let (u, v) = dst[i];
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;
        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let solution = a.lu().solve(&b).ok_or_else(|| {
        LichtbildError::Geometry("corner configuration admits no homography".into())
    })?;

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// Apply a homography to a single point. Returns `None` when the projective
/// divide is degenerate or non-finite.
pub fn apply_transform(h: &Matrix3<f64>, p: Point) -> Option<Point> {
    let v = h * Vector3::new(p.x as f64, p.y as f64, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= EPS || !v[0].is_finite() || !v[1].is_finite() {
        return None;
    }
    Some(Point::new((v[0] / w) as f32, (v[1] / w) as f32))
}

/// Resample the quadrilateral region of `image` into an `out_w` x `out_h`
/// raster.
///
/// Each destination pixel is mapped through the inverse homography and
/// sampled with bilinear interpolation; samples outside the source bounds are
/// filled according to `border`.
pub fn warp(
    image: &DynamicImage,
    corners: &CornerPoints,
    out_w: u32,
    out_h: u32,
    border: BorderFill,
) -> Result<RgbaImage> {
    let area = quad_area(corners);
    if area < MIN_QUAD_AREA {
        return Err(LichtbildError::Geometry(format!(
            "refusing to warp a degenerate quadrilateral (area {area:.2} px²)"
        )));
    }

    let forward = perspective_transform(corners, out_w, out_h)?;
    let inverse = forward.try_inverse().ok_or_else(|| {
        LichtbildError::Geometry("perspective transform is not invertible".into())
    })?;

    let src = image.to_rgba8();
    let mut out = RgbaImage::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let mapped = apply_transform(&inverse, Point::new(x as f32, y as f32));
            let pixel = match mapped {
                Some(p) => sample_bilinear(&src, p.x, p.y, border),
                None => match border {
                    BorderFill::Constant(fill) => fill,
                    BorderFill::Replicate => Rgba([0, 0, 0, 255]),
                },
            };
            out.put_pixel(x, y, pixel);
        }
    }
    Ok(out)
}

/// Bilinear sample at a fractional position, honouring the border policy.
fn sample_bilinear(src: &RgbaImage, x: f32, y: f32, border: BorderFill) -> Rgba<u8> {
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;

    if let BorderFill::Constant(fill) = border {
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return fill;
        }
    }

    let cx = x.clamp(0.0, max_x);
    let cy = y.clamp(0.0, max_y);
    let x0 = cx.floor() as u32;
    let y0 = cy.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = cx - x0 as f32;
    let fy = cy - y0 as f32;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut blended = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        blended[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(blended)
}
