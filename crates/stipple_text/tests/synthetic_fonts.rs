//! Fonts assembled by the fixture builder parse back to what was described

use stipple_paint::Point;
use stipple_test_fonts::{Component, FontBuilder, GlyphDef};
use stipple_text::outline::OutlineVertex;
use stipple_text::sfnt::face_count;
use stipple_text::FontFace;

#[test]
fn test_consecutive_codepoints_share_a_segment() {
    let mut b = FontBuilder::new(1000);
    for ch in 'a'..='e' {
        let g = b.add_glyph(GlyphDef::rect(500, 0, 0, 400, 500));
        b.map(ch, g);
    }
    let face = FontFace::parse(b.build(), 0).unwrap();
    for (i, ch) in ('a'..='e').enumerate() {
        assert_eq!(face.glyph_index(ch as u32), 1 + i as u16);
    }
    assert_eq!(face.glyph_index('f' as u32), 0);
    assert_eq!(face.glyph_index(0xFFFF), 0);
}

#[test]
fn test_supplementary_plane_uses_format12() {
    let mut b = FontBuilder::new(1000);
    let g = b.add_glyph(GlyphDef::rect(500, 0, 0, 400, 500));
    b.map('\u{1F600}', g);
    let face = FontFace::parse(b.build(), 0).unwrap();
    assert_eq!(face.glyph_index(0x1F600), g);
}

#[test]
fn test_collection_faces() {
    let mut first = FontBuilder::new(1000);
    let a = first.add_glyph(GlyphDef::rect(300, 0, 0, 100, 100));
    first.map('A', a);
    let mut second = FontBuilder::new(2048);
    let skip = second.add_glyph(GlyphDef::empty(10));
    let b = second.add_glyph(GlyphDef::rect(900, 0, 0, 100, 100));
    second.map('B', b);
    assert_eq!(skip, 1);

    let data = FontBuilder::collection(&[&first, &second]);
    assert_eq!(face_count(&data), 2);
    let f0 = FontFace::parse(data.clone(), 0).unwrap();
    let f1 = FontFace::parse(data.clone(), 1).unwrap();
    assert_eq!(f0.units_per_em(), 1000);
    assert_eq!(f1.units_per_em(), 2048);
    assert_eq!(f0.glyph_index('A' as u32), 1);
    assert_eq!(f1.glyph_index('B' as u32), 2);
    assert_eq!(f1.h_metrics(2).advance, 900);
    assert!(FontFace::parse(data, 2).is_err());
}

#[test]
fn test_composite_offsets_components() {
    let mut b = FontBuilder::new(1000);
    let dot = b.add_glyph(GlyphDef::rect(200, 0, 0, 100, 100));
    let pair = b.add_glyph(GlyphDef::composite(
        500,
        &[Component::new(dot, 0, 0), Component::new(dot, 300, 50)],
    ));
    let face = FontFace::parse(b.build(), 0).unwrap();
    let outline = face.outline(pair).unwrap();
    assert_eq!(outline.len(), 10);
    assert_eq!(outline[5], OutlineVertex::MoveTo(Point::new(300.0, 50.0)));
    let bb = face.glyph_box(pair).unwrap();
    assert_eq!((bb.x_max, bb.y_max), (400, 150));
}

#[test]
fn test_scaled_component() {
    let mut b = FontBuilder::new(1000);
    let dot = b.add_glyph(GlyphDef::rect(200, 0, 0, 100, 100));
    let big = b.add_glyph(GlyphDef::composite(
        500,
        &[Component {
            glyph: dot,
            dx: 10,
            dy: 0,
            scale: Some(2.0 - 1.0 / 16384.0),
        }],
    ));
    let face = FontFace::parse(b.build(), 0).unwrap();
    let outline = face.outline(big).unwrap();
    let OutlineVertex::LineTo(p) = outline[2] else {
        panic!("expected a line");
    };
    assert!((p.x - 209.99).abs() < 0.02);
    assert!((p.y - 199.99).abs() < 0.02);
}

#[test]
fn test_cyclic_composite_rejected() {
    let mut b = FontBuilder::new(1000);
    // glyph 1 references itself
    b.add_glyph(GlyphDef::composite(500, &[Component::new(1, 0, 0)]));
    let face = FontFace::parse(b.build(), 0).unwrap();
    assert!(face.outline(1).is_err());
}

#[test]
fn test_composite_fan_out_is_bounded() {
    let mut b = FontBuilder::new(1000);
    let mut glyph = b.add_glyph(GlyphDef::rect(100, 0, 0, 10, 10));
    let mut levels = Vec::new();
    for _ in 0..5 {
        glyph = b.add_glyph(GlyphDef::composite(100, &[Component::new(glyph, 0, 0); 4]));
        levels.push(glyph);
    }
    let face = FontFace::parse(b.build(), 0).unwrap();
    // 4 + 16 components, 16 rectangles of 5 vertices
    assert_eq!(face.outline(levels[1]).unwrap().len(), 80);
    // 4 + 16 + 64 + 256 + 1024 components
    assert!(face.outline(levels[4]).is_err());
}

#[test]
fn test_curved_contour_roundtrips() {
    let mut b = FontBuilder::new(1000);
    let o = b.add_glyph(GlyphDef::empty(600).contour(&[
        (0, 0, true),
        (250, 500, false),
        (500, 0, true),
    ]));
    let face = FontFace::parse(b.build(), 0).unwrap();
    let outline = face.outline(o).unwrap();
    assert_eq!(
        outline[1],
        OutlineVertex::QuadTo {
            control: Point::new(250.0, 500.0),
            end: Point::new(500.0, 0.0)
        }
    );
}
