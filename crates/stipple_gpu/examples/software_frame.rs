//! Software frame demo
//!
//! Run with:
//! `RUST_LOG=stipple_gpu=trace cargo run -p stipple_gpu --example software_frame`
//!
//! Draws a few shapes and a line of text onto the CPU surface and prints the
//! frame as ASCII art.

use std::f32::consts::PI;

use anyhow::Result;
use stipple_gpu::{Canvas, RendererConfig, SoftwareSurface};
use stipple_paint::{Color, LineCap, LineJoin, Paint, Winding};
use stipple_test_fonts::{FontBuilder, GlyphDef};
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 96;
const HEIGHT: u32 = 48;

fn demo_font() -> Vec<u8> {
    let mut b = FontBuilder::new(1000).metrics(800, -200, 100);
    for ch in ('a'..='z').chain('A'..='Z') {
        let g = b.add_glyph(GlyphDef::polygon(550, &[(50, 0), (500, 0), (500, 700), (50, 700)]));
        b.map(ch, g);
    }
    let space = b.add_glyph(GlyphDef::empty(300));
    b.map(' ', space);
    b.build()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RendererConfig::default().with_env_overrides();
    let mut canvas = Canvas::new(config)?;
    let mut surface = SoftwareSurface::new(WIDTH, HEIGHT);
    surface.clear(Color::BLACK);

    canvas.begin_frame(WIDTH as f32, HEIGHT as f32, 1.0);

    // gradient panel with a hole
    canvas.set_fill_paint(Paint::linear_gradient(
        4.0,
        0.0,
        44.0,
        0.0,
        Color::WHITE,
        Color::gray(0.2),
    ));
    canvas.begin_path();
    canvas.rounded_rect(4.0, 4.0, 40.0, 24.0, 6.0);
    canvas.circle(24.0, 16.0, 6.0);
    canvas.path_winding(Winding::HOLE);
    canvas.fill();

    // stroked arc
    canvas.set_stroke_color(Color::rgb(1.0, 0.8, 0.2));
    canvas.set_stroke_width(3.0);
    canvas.set_line_cap(LineCap::Round);
    canvas.set_line_join(LineJoin::Round);
    canvas.begin_path();
    canvas.arc(70.0, 18.0, 12.0, 0.0, PI * 1.5, Winding::Clockwise);
    canvas.stroke();

    let font = canvas.load_font("demo", demo_font());
    canvas.set_font(font);
    canvas.set_font_size(12.0);
    canvas.set_text_color(Color::WHITE);
    canvas.text(4.0, 44.0, "Stipple");

    let stats = canvas.flush(&mut surface)?;
    tracing::info!(
        calls = stats.calls,
        draws = stats.draws,
        vertices = stats.vertices,
        uploads = stats.uploads,
        "frame flushed"
    );

    const RAMP: &[u8] = b" .:-=+*#%@";
    for y in 0..HEIGHT {
        let row: String = (0..WIDTH)
            .map(|x| {
                let [r, g, b, _] = surface.pixel(x, y);
                let luma = (r as u32 * 3 + g as u32 * 6 + b as u32) / 10;
                RAMP[(luma as usize * (RAMP.len() - 1)) / 255] as char
            })
            .collect();
        println!("{row}");
    }
    Ok(())
}
