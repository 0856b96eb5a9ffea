//! Binary frame codec.
//!
//! A frame carries one sensor batch between processes. It is a fixed header
//! followed by variable-length sections, each section a packed array of
//! numbers or fixed-width text slots.
//!
//! ## Wire format (version 1, little-endian)
//!
//! ```text
//! 0      1        2..4       4 + 8*i          4 + 8*i + 4
//! +-----+---------+----------+----------------+---------------+
//! | tag | version | reserved | offset_i (u32) | count_i (u32) |  ... per section
//! +-----+---------+----------+----------------+---------------+
//! | section 0 elements | section 1 elements | ...
//! ```
//!
//! - `offset_i` is 0 for an empty section, otherwise ≥ the header length.
//! - `f64` elements are 8 bytes, `i32` elements 4 bytes, text elements
//!   are null-padded slots of the section's declared width.
//! - Text longer than `width - 1` bytes is truncated, never rejected.
//!
//! Submodules:
//! - `category`: the exhaustive [`Category`] tag
//! - `layout`: per-category section declarations
//! - `encode` / `view`: the generic encoder and borrowed decoder
//! - one module per category with an owned batch and a typed frame view

pub mod category;
pub mod cistern;
pub mod encode;
pub mod layout;
pub mod nitrification;
pub mod outside;
pub mod sensor;
pub mod text;
pub mod view;
pub mod water_replace;

pub use category::Category;
pub use encode::{SectionData, encode, encoded_len};
pub use layout::{ElementKind, Layout, SectionSpec};
pub use view::{Elements, FrameView, peek_category};

use thiserror::Error;

/// Errors raised by the frame codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Buffer shorter than the fixed header it claims to carry.
    #[error("Frame truncated: {len} bytes, header needs {needed}")]
    Truncated {
        /// Received length
        len: usize,
        /// Minimum length for the header
        needed: usize,
    },

    /// Tag does not name a known category.
    #[error("Unknown frame category tag {tag}")]
    UnknownCategory {
        /// Raw tag byte
        tag: u8,
    },

    /// Frame written with a different format version.
    #[error("Unsupported frame format version {version}")]
    UnsupportedVersion {
        /// Version byte found
        version: u8,
    },

    /// Typed view requested for a frame of another category.
    #[error("Frame category mismatch: expected {expected}, found {found}")]
    CategoryMismatch {
        /// Category the caller expected
        expected: Category,
        /// Category carried by the frame
        found: Category,
    },

    /// Encoder input does not follow the category layout.
    #[error("Frame layout mismatch for {category}: {reason}")]
    LayoutMismatch {
        /// Category being encoded
        category: Category,
        /// What did not match
        reason: String,
    },

    /// Encoded frame would not be addressable by 32-bit offsets.
    #[error("Frame too large: {len} bytes")]
    TooLarge {
        /// Required length
        len: usize,
    },
}

/// A decoded frame, one variant per known category.
#[derive(Debug, Clone)]
pub enum DecodedFrame<'a> {
    /// Multi-channel port sensor batch.
    Sensor(sensor::SensorFrame<'a>),
    /// Cistern batch.
    Cistern(cistern::CisternFrame<'a>),
    /// Nitrification tank batch.
    Nitrification(nitrification::NitrificationFrame<'a>),
    /// Outdoor batch.
    Outside(outside::OutsideFrame<'a>),
    /// Water-replacement tank batch.
    WaterReplace(water_replace::WaterReplaceFrame<'a>),
}

impl DecodedFrame<'_> {
    /// Category of the decoded frame.
    pub fn category(&self) -> Category {
        match self {
            Self::Sensor(_) => Category::Sensor,
            Self::Cistern(_) => Category::Cistern,
            Self::Nitrification(_) => Category::Nitrification,
            Self::Outside(_) => Category::Outside,
            Self::WaterReplace(_) => Category::WaterReplace,
        }
    }
}

/// Decode a frame into its typed category view.
///
/// The tag is matched exhaustively; an unknown tag is an error, not a cast.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame<'_>, FrameError> {
    let view = FrameView::parse(bytes)?;
    Ok(match view.category() {
        Category::Sensor => DecodedFrame::Sensor(sensor::SensorFrame::new(view)?),
        Category::Cistern => DecodedFrame::Cistern(cistern::CisternFrame::new(view)?),
        Category::Nitrification => {
            DecodedFrame::Nitrification(nitrification::NitrificationFrame::new(view)?)
        }
        Category::Outside => DecodedFrame::Outside(outside::OutsideFrame::new(view)?),
        Category::WaterReplace => {
            DecodedFrame::WaterReplace(water_replace::WaterReplaceFrame::new(view)?)
        }
    })
}
