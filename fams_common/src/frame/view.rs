//! Borrowed, read-only frame decoder.

use super::layout::{ElementKind, Layout};
use super::text::read_slot;
use super::{Category, FrameError};
use crate::consts::{FRAME_FORMAT_VERSION, FRAME_PREAMBLE_LEN, MAX_SECTIONS, SECTION_ENTRY_LEN};
use std::slice::ChunksExact;

/// Read the category tag without parsing the rest of the header.
///
/// This is all the dispatcher needs to route a frame.
pub fn peek_category(bytes: &[u8]) -> Result<Category, FrameError> {
    let tag = *bytes.first().ok_or(FrameError::Truncated {
        len: 0,
        needed: FRAME_PREAMBLE_LEN,
    })?;
    Category::from_u8(tag).ok_or(FrameError::UnknownCategory { tag })
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> usize {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw) as usize
}

fn le_f64(chunk: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    f64::from_le_bytes(raw)
}

fn le_i32(chunk: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(chunk);
    i32::from_le_bytes(raw)
}

/// Iterator over the elements of one section.
#[derive(Debug, Clone)]
pub struct Elements<'a, T> {
    chunks: ChunksExact<'a, u8>,
    decode: fn(&'a [u8]) -> T,
}

impl<'a, T> Elements<'a, T> {
    fn new(bytes: &'a [u8], width: usize, decode: fn(&'a [u8]) -> T) -> Self {
        Self {
            chunks: bytes.chunks_exact(width),
            decode,
        }
    }
}

impl<T> Iterator for Elements<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(self.decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T> ExactSizeIterator for Elements<'_, T> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionEntry {
    offset: usize,
    count: usize,
}

/// Read-only view over an encoded frame.
///
/// Accessors borrow from the underlying buffer. A section whose recorded
/// offset is below the header length is absent and yields no elements; so
/// does a section whose byte range runs past the end of the buffer.
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
    layout: &'static Layout,
    entries: heapless::Vec<SectionEntry, MAX_SECTIONS>,
}

impl<'a> FrameView<'a> {
    /// Parse the fixed header of `bytes`.
    ///
    /// # Errors
    ///
    /// - [`FrameError::Truncated`] if the buffer is shorter than the header
    /// - [`FrameError::UnknownCategory`] for an unknown tag
    /// - [`FrameError::UnsupportedVersion`] for another format version
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        let category = peek_category(bytes)?;
        if bytes.len() < FRAME_PREAMBLE_LEN {
            return Err(FrameError::Truncated {
                len: bytes.len(),
                needed: FRAME_PREAMBLE_LEN,
            });
        }
        if bytes[1] != FRAME_FORMAT_VERSION {
            return Err(FrameError::UnsupportedVersion { version: bytes[1] });
        }

        let layout = category.layout();
        let header_len = layout.header_len();
        if bytes.len() < header_len {
            return Err(FrameError::Truncated {
                len: bytes.len(),
                needed: header_len,
            });
        }

        let mut entries = heapless::Vec::new();
        for index in 0..layout.sections.len() {
            let base = FRAME_PREAMBLE_LEN + index * SECTION_ENTRY_LEN;
            let entry = SectionEntry {
                offset: read_u32(bytes, base),
                count: read_u32(bytes, base + 4),
            };
            entries
                .push(entry)
                .map_err(|_| FrameError::LayoutMismatch {
                    category,
                    reason: format!("more than {MAX_SECTIONS} sections"),
                })?;
        }

        Ok(Self {
            bytes,
            layout,
            entries,
        })
    }

    /// Category carried in the tag.
    #[inline]
    pub fn category(&self) -> Category {
        self.layout.category
    }

    /// Layout used to read this frame.
    #[inline]
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Raw frame bytes.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn section(&self, index: usize) -> Option<(&'a [u8], ElementKind)> {
        let spec = self.layout.sections.get(index)?;
        let entry = self.entries.get(index)?;
        if entry.offset < self.layout.header_len() {
            return None;
        }
        let len = entry.count.checked_mul(spec.kind.width())?;
        let end = entry.offset.checked_add(len)?;
        let bytes = self.bytes.get(entry.offset..end)?;
        Some((bytes, spec.kind))
    }

    /// Number of elements the section's accessor yields.
    pub fn count(&self, index: usize) -> usize {
        self.section(index)
            .map(|(bytes, kind)| bytes.len() / kind.width())
            .unwrap_or(0)
    }

    /// `f64` elements of section `index`. Empty if absent or not an `f64` section.
    pub fn f64s(&self, index: usize) -> Elements<'a, f64> {
        match self.section(index) {
            Some((bytes, ElementKind::F64)) => Elements::new(bytes, 8, le_f64),
            _ => Elements::new(&[], 8, le_f64),
        }
    }

    /// `i32` elements of section `index`. Empty if absent or not an `i32` section.
    pub fn i32s(&self, index: usize) -> Elements<'a, i32> {
        match self.section(index) {
            Some((bytes, ElementKind::I32)) => Elements::new(bytes, 4, le_i32),
            _ => Elements::new(&[], 4, le_i32),
        }
    }

    /// Text elements of section `index`. Empty if absent or not a text section.
    pub fn texts(&self, index: usize) -> Elements<'a, &'a str> {
        match self.section(index) {
            Some((bytes, ElementKind::Text(width))) => Elements::new(bytes, width, read_slot),
            _ => Elements::new(&[], 1, read_slot),
        }
    }
}
