//! Synthetic TrueType fonts
//!
//! Assembles a minimal but well-formed `glyf` font (`head`, `hhea`, `maxp`,
//! `cmap`, `hmtx`, `loca`, `glyf` and optionally `kern`) from in-memory glyph
//! descriptions. Used by tests and benchmarks so no font files are needed.

use std::collections::BTreeMap;

/// One point of a glyph contour: x, y (font units, y up), on-curve flag
pub type ContourPoint = (i16, i16, bool);

/// Reference to another glyph inside a composite glyph
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Component {
    pub glyph: u16,
    pub dx: i16,
    pub dy: i16,
    /// Uniform scale, encoded as 2.14 fixed point
    pub scale: Option<f32>,
}

impl Component {
    pub fn new(glyph: u16, dx: i16, dy: i16) -> Self {
        Self {
            glyph,
            dx,
            dy,
            scale: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphDef {
    pub advance: u16,
    pub contours: Vec<Vec<ContourPoint>>,
    pub components: Vec<Component>,
}

impl GlyphDef {
    /// Glyph with an advance but no outline
    pub fn empty(advance: u16) -> Self {
        Self {
            advance,
            ..Default::default()
        }
    }

    /// Axis-aligned box from `(x0, y0)` to `(x1, y1)`
    pub fn rect(advance: u16, x0: i16, y0: i16, x1: i16, y1: i16) -> Self {
        Self::empty(advance).contour(&[
            (x0, y0, true),
            (x0, y1, true),
            (x1, y1, true),
            (x1, y0, true),
        ])
    }

    /// Closed polygon through on-curve points
    pub fn polygon(advance: u16, points: &[(i16, i16)]) -> Self {
        let contour: Vec<ContourPoint> = points.iter().map(|&(x, y)| (x, y, true)).collect();
        Self::empty(advance).contour(&contour)
    }

    pub fn composite(advance: u16, components: &[Component]) -> Self {
        Self {
            advance,
            contours: Vec::new(),
            components: components.to_vec(),
        }
    }

    /// Add a contour of on/off-curve points
    pub fn contour(mut self, points: &[ContourPoint]) -> Self {
        self.contours.push(points.to_vec());
        self
    }
}

/// Builds TrueType font bytes
#[derive(Clone, Debug)]
pub struct FontBuilder {
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    glyphs: Vec<GlyphDef>,
    cmap: BTreeMap<u32, u16>,
    kerning: BTreeMap<(u16, u16), i16>,
}

impl FontBuilder {
    /// New font holding only an empty `.notdef` glyph
    pub fn new(units_per_em: u16) -> Self {
        Self {
            units_per_em,
            ascender: (units_per_em as i32 * 4 / 5) as i16,
            descender: -((units_per_em as i32 / 5) as i16),
            line_gap: 0,
            glyphs: vec![GlyphDef::empty(units_per_em / 2)],
            cmap: BTreeMap::new(),
            kerning: BTreeMap::new(),
        }
    }

    pub fn metrics(mut self, ascender: i16, descender: i16, line_gap: i16) -> Self {
        self.ascender = ascender;
        self.descender = descender;
        self.line_gap = line_gap;
        self
    }

    /// Add a glyph and return its index
    pub fn add_glyph(&mut self, glyph: GlyphDef) -> u16 {
        self.glyphs.push(glyph);
        (self.glyphs.len() - 1) as u16
    }

    /// Replace the `.notdef` glyph
    pub fn set_notdef(&mut self, glyph: GlyphDef) {
        self.glyphs[0] = glyph;
    }

    pub fn map(&mut self, ch: char, glyph: u16) {
        self.cmap.insert(ch as u32, glyph);
    }

    pub fn kern(&mut self, left: u16, right: u16, value: i16) {
        self.kerning.insert((left, right), value);
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_at(0)
    }

    /// A `ttcf` collection containing each face in order
    pub fn collection(faces: &[&FontBuilder]) -> Vec<u8> {
        let header = 12 + 4 * faces.len();
        let mut offsets = Vec::with_capacity(faces.len());
        let mut bodies = Vec::with_capacity(faces.len());
        let mut offset = header;
        for face in faces {
            let body = face.build_at(offset);
            offsets.push(offset as u32);
            offset += body.len();
            bodies.push(body);
        }
        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(b"ttcf");
        put_u32(&mut out, 0x0001_0000);
        put_u32(&mut out, faces.len() as u32);
        for o in offsets {
            put_u32(&mut out, o);
        }
        for body in bodies {
            out.extend_from_slice(&body);
        }
        out
    }

    /// Font bytes whose table offsets assume the font starts at `base`
    fn build_at(&self, base: usize) -> Vec<u8> {
        let bounds: Vec<Option<Bounds>> = (0..self.glyphs.len())
            .map(|g| self.glyph_bounds(g as u16, 0))
            .collect();

        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        for (g, glyph) in self.glyphs.iter().enumerate() {
            put_u32(&mut loca, glyf.len() as u32);
            if let Some(b) = bounds[g] {
                encode_glyph(glyph, b, &mut glyf);
                if glyf.len() % 2 != 0 {
                    glyf.push(0);
                }
            }
        }
        put_u32(&mut loca, glyf.len() as u32);

        let mut hmtx = Vec::new();
        for (g, glyph) in self.glyphs.iter().enumerate() {
            put_u16(&mut hmtx, glyph.advance);
            put_i16(&mut hmtx, bounds[g].map_or(0, |b| b.x_min));
        }

        let overall = bounds
            .iter()
            .flatten()
            .copied()
            .reduce(Bounds::union)
            .unwrap_or_default();

        let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
            (*b"cmap", self.cmap_table()),
            (*b"glyf", glyf),
            (*b"head", self.head_table(overall)),
            (*b"hhea", self.hhea_table()),
            (*b"hmtx", hmtx),
            (*b"loca", loca),
            (*b"maxp", self.maxp_table()),
        ];
        if !self.kerning.is_empty() {
            tables.push((*b"kern", self.kern_table()));
        }
        tables.sort_by(|a, b| a.0.cmp(&b.0));

        let num_tables = tables.len() as u16;
        let (search_range, entry_selector) = search_params(num_tables, 16);
        let mut out = Vec::new();
        put_u32(&mut out, 0x0001_0000);
        put_u16(&mut out, num_tables);
        put_u16(&mut out, search_range);
        put_u16(&mut out, entry_selector);
        put_u16(&mut out, num_tables * 16 - search_range);

        let mut offset = base + 12 + 16 * tables.len();
        let mut body = Vec::new();
        for (tag, data) in &tables {
            out.extend_from_slice(tag);
            put_u32(&mut out, checksum(data));
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, data.len() as u32);
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
            offset = base + 12 + 16 * tables.len() + body.len();
        }
        out.extend_from_slice(&body);
        out
    }

    fn glyph_bounds(&self, glyph: u16, depth: u32) -> Option<Bounds> {
        let def = self.glyphs.get(glyph as usize)?;
        if !def.components.is_empty() {
            if depth > 16 {
                // cyclic reference; give it a token box so it is still encoded
                return Some(Bounds::default());
            }
            return def
                .components
                .iter()
                .filter_map(|c| {
                    let b = self.glyph_bounds(c.glyph, depth + 1)?;
                    let s = c.scale.unwrap_or(1.0);
                    let t = |v: i16, d: i16| (v as f32 * s) as i16 + d;
                    Some(Bounds {
                        x_min: t(b.x_min, c.dx),
                        y_min: t(b.y_min, c.dy),
                        x_max: t(b.x_max, c.dx),
                        y_max: t(b.y_max, c.dy),
                    })
                })
                .reduce(Bounds::union)
                .or(Some(Bounds::default()));
        }
        def.contours
            .iter()
            .flatten()
            .map(|&(x, y, _)| Bounds {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            })
            .reduce(Bounds::union)
    }

    fn head_table(&self, bounds: Bounds) -> Vec<u8> {
        let mut t = Vec::with_capacity(54);
        put_u32(&mut t, 0x0001_0000);
        put_u32(&mut t, 0x0001_0000);
        put_u32(&mut t, 0);
        put_u32(&mut t, 0x5F0F_3CF5);
        put_u16(&mut t, 0x000B);
        put_u16(&mut t, self.units_per_em);
        t.extend_from_slice(&[0; 16]);
        put_i16(&mut t, bounds.x_min);
        put_i16(&mut t, bounds.y_min);
        put_i16(&mut t, bounds.x_max);
        put_i16(&mut t, bounds.y_max);
        put_u16(&mut t, 0);
        put_u16(&mut t, 8);
        put_i16(&mut t, 2);
        // long loca offsets
        put_i16(&mut t, 1);
        put_i16(&mut t, 0);
        t
    }

    fn hhea_table(&self) -> Vec<u8> {
        let mut t = Vec::with_capacity(36);
        put_u32(&mut t, 0x0001_0000);
        put_i16(&mut t, self.ascender);
        put_i16(&mut t, self.descender);
        put_i16(&mut t, self.line_gap);
        let max_advance = self.glyphs.iter().map(|g| g.advance).max().unwrap_or(0);
        put_u16(&mut t, max_advance);
        t.extend_from_slice(&[0; 6]);
        put_i16(&mut t, 1);
        put_i16(&mut t, 0);
        t.extend_from_slice(&[0; 12]);
        put_u16(&mut t, self.glyphs.len() as u16);
        t
    }

    fn maxp_table(&self) -> Vec<u8> {
        let mut t = Vec::with_capacity(6);
        put_u32(&mut t, 0x0000_5000);
        put_u16(&mut t, self.glyphs.len() as u16);
        t
    }

    fn cmap_table(&self) -> Vec<u8> {
        let bmp: Vec<(u32, u16)> = self
            .cmap
            .iter()
            .filter(|(&cp, _)| cp < 0xFFFF)
            .map(|(&cp, &g)| (cp, g))
            .collect();
        let needs_full = self.cmap.keys().any(|&cp| cp > 0xFFFF);

        let format4 = format4_subtable(&bmp);
        let mut subtables: Vec<(u16, u16, Vec<u8>)> = vec![(3, 1, format4)];
        if needs_full {
            let all: Vec<(u32, u16)> = self.cmap.iter().map(|(&c, &g)| (c, g)).collect();
            subtables.push((3, 10, format12_subtable(&all)));
        }

        let mut t = Vec::new();
        put_u16(&mut t, 0);
        put_u16(&mut t, subtables.len() as u16);
        let mut offset = 4 + 8 * subtables.len();
        for (platform, encoding, data) in &subtables {
            put_u16(&mut t, *platform);
            put_u16(&mut t, *encoding);
            put_u32(&mut t, offset as u32);
            offset += data.len();
        }
        for (_, _, data) in &subtables {
            t.extend_from_slice(data);
        }
        t
    }

    fn kern_table(&self) -> Vec<u8> {
        let pairs = self.kerning.len() as u16;
        let (search_range, entry_selector) = search_params(pairs, 6);
        let mut t = Vec::new();
        put_u16(&mut t, 0);
        put_u16(&mut t, 1);
        put_u16(&mut t, 0);
        put_u16(&mut t, 14 + 6 * pairs);
        put_u16(&mut t, 1);
        put_u16(&mut t, pairs);
        put_u16(&mut t, search_range);
        put_u16(&mut t, entry_selector);
        put_u16(&mut t, pairs * 6 - search_range);
        for (&(left, right), &value) in &self.kerning {
            put_u16(&mut t, left);
            put_u16(&mut t, right);
            put_i16(&mut t, value);
        }
        t
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Bounds {
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
}

impl Bounds {
    fn union(self, other: Bounds) -> Bounds {
        Bounds {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

fn encode_glyph(glyph: &GlyphDef, bounds: Bounds, out: &mut Vec<u8>) {
    let contours: i16 = if glyph.components.is_empty() {
        glyph.contours.len() as i16
    } else {
        -1
    };
    put_i16(out, contours);
    put_i16(out, bounds.x_min);
    put_i16(out, bounds.y_min);
    put_i16(out, bounds.x_max);
    put_i16(out, bounds.y_max);

    if !glyph.components.is_empty() {
        let last = glyph.components.len() - 1;
        for (i, c) in glyph.components.iter().enumerate() {
            // words + xy values
            let mut flags = 0x0001 | 0x0002;
            if c.scale.is_some() {
                flags |= 0x0008;
            }
            if i != last {
                flags |= 0x0020;
            }
            put_u16(out, flags);
            put_u16(out, c.glyph);
            put_i16(out, c.dx);
            put_i16(out, c.dy);
            if let Some(s) = c.scale {
                put_i16(out, (s * 16384.0).round() as i16);
            }
        }
        return;
    }

    let mut end = 0u16;
    for contour in &glyph.contours {
        end += contour.len() as u16;
        put_u16(out, end - 1);
    }
    // no instructions
    put_u16(out, 0);
    let points: Vec<ContourPoint> = glyph.contours.iter().flatten().copied().collect();
    for &(_, _, on) in &points {
        out.push(if on { 0x01 } else { 0x00 });
    }
    let mut prev = 0i16;
    for &(x, _, _) in &points {
        put_i16(out, x.wrapping_sub(prev));
        prev = x;
    }
    prev = 0;
    for &(_, y, _) in &points {
        put_i16(out, y.wrapping_sub(prev));
        prev = y;
    }
}

fn format4_subtable(entries: &[(u32, u16)]) -> Vec<u8> {
    // (start, end, first glyph) runs of consecutive codepoints and glyphs
    let mut segments: Vec<(u16, u16, u16)> = Vec::new();
    for &(cp, glyph) in entries {
        let cp = cp as u16;
        match segments.last_mut() {
            Some((start, end, first))
                if *end + 1 == cp && first.wrapping_add(cp - *start) == glyph =>
            {
                *end = cp;
            }
            _ => segments.push((cp, cp, glyph)),
        }
    }
    segments.push((0xFFFF, 0xFFFF, 0));

    let seg_count = segments.len() as u16;
    let (search_range, entry_selector) = search_params(seg_count, 2);
    let mut t = Vec::new();
    put_u16(&mut t, 4);
    put_u16(&mut t, 16 + 8 * seg_count);
    put_u16(&mut t, 0);
    put_u16(&mut t, seg_count * 2);
    put_u16(&mut t, search_range);
    put_u16(&mut t, entry_selector);
    put_u16(&mut t, seg_count * 2 - search_range);
    for &(_, end, _) in &segments {
        put_u16(&mut t, end);
    }
    put_u16(&mut t, 0);
    for &(start, _, _) in &segments {
        put_u16(&mut t, start);
    }
    for &(start, _, first) in &segments {
        let delta = if start == 0xFFFF {
            1
        } else {
            first.wrapping_sub(start)
        };
        put_u16(&mut t, delta);
    }
    for _ in &segments {
        put_u16(&mut t, 0);
    }
    t
}

fn format12_subtable(entries: &[(u32, u16)]) -> Vec<u8> {
    let mut groups: Vec<(u32, u32, u32)> = Vec::new();
    for &(cp, glyph) in entries {
        match groups.last_mut() {
            Some((start, end, first)) if *end + 1 == cp && *first + (cp - *start) == glyph as u32 => {
                *end = cp;
            }
            _ => groups.push((cp, cp, glyph as u32)),
        }
    }
    let mut t = Vec::new();
    put_u16(&mut t, 12);
    put_u16(&mut t, 0);
    put_u32(&mut t, 16 + 12 * groups.len() as u32);
    put_u32(&mut t, 0);
    put_u32(&mut t, groups.len() as u32);
    for (start, end, first) in groups {
        put_u32(&mut t, start);
        put_u32(&mut t, end);
        put_u32(&mut t, first);
    }
    t
}

/// `(searchRange, entrySelector)` for binary-search headers
fn search_params(count: u16, unit: u16) -> (u16, u16) {
    let mut pow = 1u16;
    let mut log = 0u16;
    while pow * 2 <= count.max(1) {
        pow *= 2;
        log += 1;
    }
    (pow * unit, log)
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}
