//! Character to glyph mapping (`cmap`)

use crate::sfnt::{read_u16, read_u32, read_u8, ParseError};

/// A selected `cmap` sub-table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharMap {
    /// Absolute offset of the sub-table in the font data
    offset: usize,
    format: u16,
}

/// Lower is preferred
fn encoding_rank(platform: u16, encoding: u16) -> Option<u8> {
    match (platform, encoding) {
        (3, 10) => Some(0),
        (0, 4) | (0, 6) => Some(1),
        (3, 1) => Some(2),
        (0, _) => Some(3),
        (3, 0) => Some(4),
        (1, 0) => Some(5),
        _ => None,
    }
}

fn supported(format: u16) -> bool {
    matches!(format, 0 | 2 | 4 | 6 | 12 | 13)
}

impl CharMap {
    /// Pick the preferred sub-table of the `cmap` table at `table`
    pub fn select(data: &[u8], table: usize) -> Result<Self, ParseError> {
        let count = read_u16(data, table + 2).ok_or(ParseError::UnexpectedEof)?;
        let mut best: Option<(u8, CharMap)> = None;
        for i in 0..count as usize {
            let record = table + 4 + i * 8;
            let platform = read_u16(data, record).ok_or(ParseError::UnexpectedEof)?;
            let encoding = read_u16(data, record + 2).ok_or(ParseError::UnexpectedEof)?;
            let offset = read_u32(data, record + 4).ok_or(ParseError::UnexpectedEof)? as usize;
            let Some(rank) = encoding_rank(platform, encoding) else {
                continue;
            };
            let Some(format) = read_u16(data, table + offset) else {
                continue;
            };
            if !supported(format) {
                continue;
            }
            if best.map_or(true, |(r, _)| rank < r) {
                best = Some((
                    rank,
                    CharMap {
                        offset: table + offset,
                        format,
                    },
                ));
            }
        }
        best.map(|(_, map)| map)
            .ok_or(ParseError::Unsupported("no usable cmap sub-table"))
    }

    pub fn format(&self) -> u16 {
        self.format
    }

    /// Glyph index for `codepoint`, 0 when unmapped
    pub fn glyph_index(&self, data: &[u8], codepoint: u32) -> u16 {
        let found = match self.format {
            0 => self.lookup_format0(data, codepoint),
            2 => self.lookup_format2(data, codepoint),
            4 => self.lookup_format4(data, codepoint),
            6 => self.lookup_format6(data, codepoint),
            12 | 13 => self.lookup_groups(data, codepoint),
            _ => None,
        };
        found.unwrap_or(0)
    }

    fn lookup_format0(&self, data: &[u8], codepoint: u32) -> Option<u16> {
        let length = read_u16(data, self.offset + 2)? as u32;
        if codepoint >= length.saturating_sub(6) {
            return None;
        }
        read_u8(data, self.offset + 6 + codepoint as usize).map(u16::from)
    }

    fn lookup_format2(&self, data: &[u8], codepoint: u32) -> Option<u16> {
        if codepoint > 0xFFFF {
            return None;
        }
        let keys = self.offset + 6;
        let sub_headers = keys + 512;
        let hi = (codepoint >> 8) as usize;
        let lo = codepoint & 0xFF;

        let header = if hi == 0 {
            // a zero key means the low byte starts a two-byte sequence
            if read_u16(data, keys + lo as usize * 2)? != 0 {
                return None;
            }
            sub_headers
        } else {
            let key = read_u16(data, keys + hi * 2)? as usize;
            if key == 0 {
                return None;
            }
            sub_headers + key
        };

        let first = read_u16(data, header)? as u32;
        let count = read_u16(data, header + 2)? as u32;
        let delta = read_u16(data, header + 4)?;
        let range_offset = read_u16(data, header + 6)? as usize;
        let idx = lo.checked_sub(first)?;
        if idx >= count || range_offset == 0 {
            return None;
        }
        let glyph = read_u16(data, header + 6 + range_offset + idx as usize * 2)?;
        (glyph != 0).then(|| glyph.wrapping_add(delta))
    }

    fn lookup_format4(&self, data: &[u8], codepoint: u32) -> Option<u16> {
        if codepoint > 0xFFFF {
            return None;
        }
        let seg_x2 = read_u16(data, self.offset + 6)? as usize;
        let seg_count = seg_x2 / 2;
        let end_codes = self.offset + 14;
        let start_codes = end_codes + seg_x2 + 2;
        let deltas = start_codes + seg_x2;
        let range_offsets = deltas + seg_x2;

        // first segment whose end code is >= codepoint
        let (mut lo, mut hi) = (0usize, seg_count);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if (read_u16(data, end_codes + mid * 2)? as u32) < codepoint {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == seg_count {
            return None;
        }
        let seg = lo;
        let start = read_u16(data, start_codes + seg * 2)? as u32;
        if codepoint < start {
            return None;
        }
        let delta = read_u16(data, deltas + seg * 2)?;
        let range_offset_at = range_offsets + seg * 2;
        let range_offset = read_u16(data, range_offset_at)? as usize;
        if range_offset == 0 {
            return Some((codepoint as u16).wrapping_add(delta));
        }
        let glyph = read_u16(
            data,
            range_offset_at + range_offset + (codepoint - start) as usize * 2,
        )?;
        (glyph != 0).then(|| glyph.wrapping_add(delta))
    }

    fn lookup_format6(&self, data: &[u8], codepoint: u32) -> Option<u16> {
        let first = read_u16(data, self.offset + 6)? as u32;
        let count = read_u16(data, self.offset + 8)? as u32;
        let idx = codepoint.checked_sub(first)?;
        if idx >= count {
            return None;
        }
        read_u16(data, self.offset + 10 + idx as usize * 2)
    }

    fn lookup_groups(&self, data: &[u8], codepoint: u32) -> Option<u16> {
        let groups = read_u32(data, self.offset + 12)? as usize;
        let (mut lo, mut hi) = (0usize, groups);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let group = self.offset + 16 + mid * 12;
            let start = read_u32(data, group)?;
            let end = read_u32(data, group + 4)?;
            if codepoint < start {
                hi = mid;
            } else if codepoint > end {
                lo = mid + 1;
            } else {
                let start_glyph = read_u32(data, group + 8)?;
                let glyph = if self.format == 12 {
                    start_glyph.checked_add(codepoint - start)?
                } else {
                    start_glyph
                };
                return u16::try_from(glyph).ok();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn be32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    /// cmap table with a single sub-table
    fn table(platform: u16, encoding: u16, sub: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        be16(&mut out, 0);
        be16(&mut out, 1);
        be16(&mut out, platform);
        be16(&mut out, encoding);
        be32(&mut out, 12);
        out.extend_from_slice(sub);
        out
    }

    #[test]
    fn test_format0() {
        let mut sub = Vec::new();
        be16(&mut sub, 0);
        be16(&mut sub, 262);
        be16(&mut sub, 0);
        let mut glyphs = [0u8; 256];
        glyphs[b'A' as usize] = 7;
        sub.extend_from_slice(&glyphs);
        let data = table(1, 0, &sub);
        let map = CharMap::select(&data, 0).unwrap();
        assert_eq!(map.glyph_index(&data, 'A' as u32), 7);
        assert_eq!(map.glyph_index(&data, 'B' as u32), 0);
        assert_eq!(map.glyph_index(&data, 0x1234), 0);
    }

    #[test]
    fn test_format0_out_of_range_codepoints() {
        let mut sub = Vec::new();
        be16(&mut sub, 0);
        be16(&mut sub, 262);
        be16(&mut sub, 0);
        sub.extend_from_slice(&[9u8; 256]);
        let data = table(1, 0, &sub);
        let map = CharMap::select(&data, 0).unwrap();
        assert_eq!(map.glyph_index(&data, 255), 9);
        assert_eq!(map.glyph_index(&data, 256), 0);
        assert_eq!(map.glyph_index(&data, u32::MAX), 0);
        assert_eq!(map.glyph_index(&data, u32::MAX - 5), 0);
    }

    #[test]
    fn test_format6() {
        let mut sub = Vec::new();
        be16(&mut sub, 6);
        be16(&mut sub, 14);
        be16(&mut sub, 0);
        be16(&mut sub, 0x30);
        be16(&mut sub, 2);
        be16(&mut sub, 11);
        be16(&mut sub, 12);
        let data = table(3, 1, &sub);
        let map = CharMap::select(&data, 0).unwrap();
        assert_eq!(map.glyph_index(&data, 0x30), 11);
        assert_eq!(map.glyph_index(&data, 0x31), 12);
        assert_eq!(map.glyph_index(&data, 0x32), 0);
        assert_eq!(map.glyph_index(&data, 0x2F), 0);
    }

    #[test]
    fn test_format13_maps_range_to_one_glyph() {
        let mut sub = Vec::new();
        be16(&mut sub, 13);
        be16(&mut sub, 0);
        be32(&mut sub, 28);
        be32(&mut sub, 0);
        be32(&mut sub, 1);
        be32(&mut sub, 0x1F600);
        be32(&mut sub, 0x1F64F);
        be32(&mut sub, 3);
        let data = table(3, 10, &sub);
        let map = CharMap::select(&data, 0).unwrap();
        assert_eq!(map.glyph_index(&data, 0x1F600), 3);
        assert_eq!(map.glyph_index(&data, 0x1F620), 3);
        assert_eq!(map.glyph_index(&data, 0x1F650), 0);
    }

    #[test]
    fn test_format2_single_and_double_byte() {
        let mut sub = Vec::new();
        be16(&mut sub, 2);
        be16(&mut sub, 0);
        be16(&mut sub, 0);
        // keys: byte 0x81 starts a two-byte sequence using sub-header 1
        for hi in 0..256u16 {
            be16(&mut sub, if hi == 0x81 { 8 } else { 0 });
        }
        // sub-header 0: single bytes 0x20..0x7F, glyph array follows the headers
        be16(&mut sub, 0x20);
        be16(&mut sub, 0x60);
        be16(&mut sub, 0);
        be16(&mut sub, 2 + 8);
        // sub-header 1: low bytes 0x40..0x41
        be16(&mut sub, 0x40);
        be16(&mut sub, 2);
        be16(&mut sub, 100);
        be16(&mut sub, 2 + 0x60 * 2);
        for i in 0..0x60u16 {
            be16(&mut sub, 1 + i);
        }
        be16(&mut sub, 5);
        be16(&mut sub, 0);
        let data = table(3, 0, &sub);
        let map = CharMap::select(&data, 0).unwrap();
        assert_eq!(map.format(), 2);
        assert_eq!(map.glyph_index(&data, 0x20), 1);
        assert_eq!(map.glyph_index(&data, 0x41), 0x22);
        assert_eq!(map.glyph_index(&data, 0x8140), 105);
        // mapped to zero stays unmapped despite the delta
        assert_eq!(map.glyph_index(&data, 0x8141), 0);
        assert_eq!(map.glyph_index(&data, 0x8240), 0);
    }

    #[test]
    fn test_prefers_full_unicode_table() {
        // two sub-tables: (3,1) format 6 and (3,10) format 12
        let mut out = Vec::new();
        be16(&mut out, 0);
        be16(&mut out, 2);
        be16(&mut out, 3);
        be16(&mut out, 1);
        be32(&mut out, 20);
        be16(&mut out, 3);
        be16(&mut out, 10);
        be32(&mut out, 32);
        // format 6 at 20 (12 bytes)
        be16(&mut out, 6);
        be16(&mut out, 12);
        be16(&mut out, 0);
        be16(&mut out, 0x41);
        be16(&mut out, 1);
        be16(&mut out, 1);
        // format 12 at 32
        be16(&mut out, 12);
        be16(&mut out, 0);
        be32(&mut out, 28);
        be32(&mut out, 0);
        be32(&mut out, 1);
        be32(&mut out, 0x41);
        be32(&mut out, 0x41);
        be32(&mut out, 9);
        let map = CharMap::select(&out, 0).unwrap();
        assert_eq!(map.format(), 12);
        assert_eq!(map.glyph_index(&out, 0x41), 9);
    }

    #[test]
    fn test_no_usable_subtable() {
        let data = table(2, 0, &[0, 0, 0, 0]);
        assert!(CharMap::select(&data, 0).is_err());
    }
}
