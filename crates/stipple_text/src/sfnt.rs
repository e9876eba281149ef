//! sfnt container parsing
//!
//! Big-endian readers and the table directory of TrueType fonts and font
//! collections. Tables are kept as byte ranges into the owning buffer so a
//! parsed face can hold its data without self-references.

use std::ops::Range;

use thiserror::Error;

/// Font data parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of font data")]
    UnexpectedEof,

    #[error("unrecognized font signature {0:#010x}")]
    BadMagic(u32),

    #[error("required table '{0}' is missing")]
    MissingTable(Tag),

    #[error("unsupported font feature: {0}")]
    Unsupported(&'static str),

    #[error("malformed font data: {0}")]
    Malformed(&'static str),
}

/// A 4-byte table tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const HEAD: Tag = Tag(*b"head");
    pub const HHEA: Tag = Tag(*b"hhea");
    pub const MAXP: Tag = Tag(*b"maxp");
    pub const HMTX: Tag = Tag(*b"hmtx");
    pub const LOCA: Tag = Tag(*b"loca");
    pub const GLYF: Tag = Tag(*b"glyf");
    pub const CMAP: Tag = Tag(*b"cmap");
    pub const KERN: Tag = Tag(*b"kern");
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = std::str::from_utf8(&self.0).unwrap_or("????");
        f.write_str(s)
    }
}

const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_APPLE_TRUE: u32 = u32::from_be_bytes(*b"true");
const SFNT_OPENTYPE_CFF: u32 = u32::from_be_bytes(*b"OTTO");
const SFNT_COLLECTION: u32 = u32::from_be_bytes(*b"ttcf");

pub(crate) fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Option<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Sequential big-endian reader
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        let end = self.pos.checked_add(n).ok_or(ParseError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(ParseError::UnexpectedEof);
        }
        self.pos = end;
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, ParseError> {
        let v = read_u8(self.data, self.pos).ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16, ParseError> {
        let v = read_u16(self.data, self.pos).ok_or(ParseError::UnexpectedEof)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn i16(&mut self) -> Result<i16, ParseError> {
        self.u16().map(|v| v as i16)
    }

    pub fn u32(&mut self) -> Result<u32, ParseError> {
        let v = read_u32(self.data, self.pos).ok_or(ParseError::UnexpectedEof)?;
        self.pos += 4;
        Ok(v)
    }

    /// 2.14 fixed point
    pub fn f2dot14(&mut self) -> Result<f32, ParseError> {
        self.i16().map(|v| v as f32 / 16384.0)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TableRecord {
    pub tag: Tag,
    pub offset: u32,
    pub length: u32,
}

/// The table directory of one face
#[derive(Clone, Debug)]
pub struct TableDirectory {
    records: Vec<TableRecord>,
}

impl TableDirectory {
    /// Parse the directory of face `index` (ignored for plain sfnt files)
    pub fn parse(data: &[u8], index: u32) -> Result<Self, ParseError> {
        let offset = face_offset(data, index)?;
        let mut r = Reader::new(data, offset);
        match r.u32()? {
            SFNT_TRUETYPE | SFNT_APPLE_TRUE => {}
            SFNT_OPENTYPE_CFF => return Err(ParseError::Unsupported("CFF outlines")),
            other => return Err(ParseError::BadMagic(other)),
        }
        let num_tables = r.u16()?;
        r.skip(6)?;

        let mut records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let tag = Tag([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
            let _checksum = r.u32()?;
            let offset = r.u32()?;
            let length = r.u32()?;
            let end = offset as u64 + length as u64;
            if end > data.len() as u64 {
                return Err(ParseError::Malformed("table extends past end of data"));
            }
            records.push(TableRecord {
                tag,
                offset,
                length,
            });
        }
        Ok(Self { records })
    }

    pub fn find(&self, tag: Tag) -> Option<Range<usize>> {
        self.records.iter().find(|t| t.tag == tag).map(|t| {
            let start = t.offset as usize;
            start..start + t.length as usize
        })
    }

    pub fn require(&self, tag: Tag) -> Result<Range<usize>, ParseError> {
        self.find(tag).ok_or(ParseError::MissingTable(tag))
    }

    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }
}

/// Number of faces in the buffer: the collection size for `ttcf`, else 1
pub fn face_count(data: &[u8]) -> u32 {
    match read_u32(data, 0) {
        Some(SFNT_COLLECTION) => read_u32(data, 8).unwrap_or(0),
        Some(_) => 1,
        None => 0,
    }
}

fn face_offset(data: &[u8], index: u32) -> Result<usize, ParseError> {
    let tag = read_u32(data, 0).ok_or(ParseError::UnexpectedEof)?;
    if tag != SFNT_COLLECTION {
        return Ok(0);
    }
    let version = read_u32(data, 4).ok_or(ParseError::UnexpectedEof)?;
    if version != 0x0001_0000 && version != 0x0002_0000 {
        return Err(ParseError::Unsupported("collection version"));
    }
    let count = read_u32(data, 8).ok_or(ParseError::UnexpectedEof)?;
    if index >= count {
        return Err(ParseError::Malformed("face index out of range"));
    }
    read_u32(data, 12 + index as usize * 4)
        .map(|o| o as usize)
        .ok_or(ParseError::UnexpectedEof)
}
