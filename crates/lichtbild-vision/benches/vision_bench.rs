// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Benchmarks for the vision hot paths: boundary detection and warping.

use criterion::{Criterion, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use lichtbild_core::config::DetectorOptions;
use lichtbild_core::types::{CornerPoints, Point};
use lichtbild_vision::geometry::{BorderFill, warp};
use lichtbild_vision::detect_boundary;

fn photo_frame() -> DynamicImage {
    let mut img = GrayImage::from_pixel(640, 480, Luma([40u8]));
    for y in 60..420 {
        for x in 80..560 {
            img.put_pixel(x, y, Luma([230u8]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn bench_detect(c: &mut Criterion) {
    let frame = photo_frame();
    let opts = DetectorOptions::default();
    c.bench_function("detect_boundary_640x480", |b| {
        b.iter(|| detect_boundary(&frame, &opts))
    });
}

fn bench_warp(c: &mut Criterion) {
    let frame = photo_frame();
    let corners = CornerPoints {
        top_left: Point::new(80.0, 60.0),
        top_right: Point::new(560.0, 75.0),
        bottom_right: Point::new(550.0, 420.0),
        bottom_left: Point::new(90.0, 410.0),
    };
    c.bench_function("warp_480x360", |b| {
        b.iter(|| warp(&frame, &corners, 480, 360, BorderFill::black()))
    });
}

criterion_group!(benches, bench_detect, bench_warp);
criterion_main!(benches);
