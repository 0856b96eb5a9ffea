//! Section declarations per category.

use super::Category;
use crate::consts::{FRAME_PREAMBLE_LEN, MAX_SECTIONS, SECTION_ENTRY_LEN};

/// Element type of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// 8-byte little-endian IEEE-754 double.
    F64,
    /// 4-byte little-endian signed integer.
    I32,
    /// Null-padded text slot of the given width.
    Text(usize),
}

impl ElementKind {
    /// Encoded width of one element in bytes.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::I32 => 4,
            Self::Text(width) => width,
        }
    }
}

/// One declared section of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    /// Field name, also used in diagnostics.
    pub name: &'static str,
    /// Element type.
    pub kind: ElementKind,
}

impl SectionSpec {
    /// Declare a section.
    pub const fn new(name: &'static str, kind: ElementKind) -> Self {
        Self { name, kind }
    }
}

/// Sections of one category, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Category this layout belongs to.
    pub category: Category,
    /// Declared sections.
    pub sections: &'static [SectionSpec],
}

impl Layout {
    /// Length of the fixed header for this layout.
    #[inline]
    pub const fn header_len(&self) -> usize {
        header_len(self.sections.len())
    }

    /// Index of a section by name.
    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }
}

/// Fixed header length for `sections` declared sections.
#[inline]
pub const fn header_len(sections: usize) -> usize {
    FRAME_PREAMBLE_LEN + SECTION_ENTRY_LEN * sections
}
