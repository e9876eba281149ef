//! Path tessellation and frame batching benchmarks
//!
//! Run with: cargo bench -p stipple_gpu

use std::f32::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stipple_gpu::{Canvas, PathTessellator, RecordingSurface, RendererConfig};
use stipple_paint::{Color, Path, PathBuilder, StrokeStyle, Transform2D, Winding};

fn star(points: usize, cx: f32, cy: f32, r0: f32, r1: f32) -> Path {
    let mut b = PathBuilder::new();
    for i in 0..points * 2 {
        let a = i as f32 * PI / points as f32;
        let r = if i % 2 == 0 { r0 } else { r1 };
        let (x, y) = (cx + a.cos() * r, cy + a.sin() * r);
        b = if i == 0 { b.move_to(x, y) } else { b.line_to(x, y) };
    }
    b.close().build()
}

fn bench_tessellate(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut group = c.benchmark_group("tessellate");
    let mut tess = PathTessellator::default();
    let xform = Transform2D::identity();

    for r in [8.0f32, 64.0, 512.0] {
        let circle = PathBuilder::new().circle(0.0, 0.0, r).build();
        group.bench_with_input(BenchmarkId::new("fill_circle", r as u32), &circle, |b, path| {
            b.iter(|| {
                let t = tess.fill(black_box(path), &xform, true).unwrap();
                black_box(t.vertices.len());
            });
        });
    }

    let path = star(64, 0.0, 0.0, 100.0, 40.0);
    for join in [stipple_paint::LineJoin::Miter, stipple_paint::LineJoin::Round] {
        let style = StrokeStyle::new(4.0).with_join(join);
        group.bench_with_input(BenchmarkId::new("stroke_star", format!("{join:?}")), &style, |b, style| {
            b.iter(|| {
                let t = tess.stroke(black_box(&path), &xform, style, true).unwrap();
                black_box(t.vertices.len());
            });
        });
    }

    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for shapes in [16usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(shapes), &shapes, |b, &shapes| {
            let mut canvas = Canvas::new(RendererConfig::default()).unwrap();
            let mut surface = RecordingSurface::new();
            b.iter(|| {
                canvas.begin_frame(800.0, 600.0, 1.0);
                for i in 0..shapes {
                    let x = (i % 16) as f32 * 48.0;
                    let y = (i / 16) as f32 * 36.0;
                    canvas.set_fill_color(Color::hsla(i as f32 / shapes as f32, 0.6, 0.5, 1.0));
                    canvas.begin_path();
                    canvas.rounded_rect(x, y, 40.0, 30.0, 6.0);
                    canvas.circle(x + 20.0, y + 15.0, 8.0);
                    canvas.path_winding(Winding::HOLE);
                    canvas.fill();
                    canvas.stroke();
                }
                surface.clear();
                black_box(canvas.flush(&mut surface).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tessellate, bench_frame);
criterion_main!(benches);
