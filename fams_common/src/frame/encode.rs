//! Frame encoder.

use super::layout::{ElementKind, Layout};
use super::text::write_slot;
use super::{Category, FrameError};
use crate::consts::FRAME_FORMAT_VERSION;

/// Borrowed contents of one section handed to [`encode`].
#[derive(Debug, Clone, Copy)]
pub enum SectionData<'a> {
    /// `f64` elements.
    F64(&'a [f64]),
    /// `i32` elements.
    I32(&'a [i32]),
    /// Text elements, written into fixed-width slots.
    Text(&'a [String]),
}

impl SectionData<'_> {
    /// Element count.
    pub fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// True when the section carries no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(&self, kind: ElementKind) -> bool {
        matches!(
            (self, kind),
            (Self::F64(_), ElementKind::F64)
                | (Self::I32(_), ElementKind::I32)
                | (Self::Text(_), ElementKind::Text(_))
        )
    }
}

fn check_layout(layout: &Layout, sections: &[SectionData<'_>]) -> Result<(), FrameError> {
    if sections.len() != layout.sections.len() {
        return Err(FrameError::LayoutMismatch {
            category: layout.category,
            reason: format!(
                "{} sections given, {} declared",
                sections.len(),
                layout.sections.len()
            ),
        });
    }
    for (spec, data) in layout.sections.iter().zip(sections) {
        if !data.matches(spec.kind) {
            return Err(FrameError::LayoutMismatch {
                category: layout.category,
                reason: format!("section '{}' expects {:?}", spec.name, spec.kind),
            });
        }
    }
    Ok(())
}

/// Exact encoded length of a frame carrying `sections`.
pub fn encoded_len(layout: &Layout, sections: &[SectionData<'_>]) -> usize {
    layout.header_len()
        + layout
            .sections
            .iter()
            .zip(sections)
            .map(|(spec, data)| data.len() * spec.kind.width())
            .sum::<usize>()
}

/// Encode `sections` as a frame of `category`.
///
/// The buffer is allocated once at its final size. Each section's offset and
/// count go into the header in declared order, then the elements are packed
/// behind the header in the same order. Empty sections record offset 0.
///
/// # Errors
///
/// - [`FrameError::LayoutMismatch`] if `sections` do not follow the category layout
/// - [`FrameError::TooLarge`] if the frame exceeds 32-bit offsets
pub fn encode(category: Category, sections: &[SectionData<'_>]) -> Result<Vec<u8>, FrameError> {
    let layout = category.layout();
    check_layout(layout, sections)?;

    let total = encoded_len(layout, sections);
    if u32::try_from(total).is_err() {
        return Err(FrameError::TooLarge { len: total });
    }

    let mut buf = Vec::with_capacity(total);
    buf.push(category.tag());
    buf.push(FRAME_FORMAT_VERSION);
    buf.extend_from_slice(&[0, 0]);

    let mut offset = layout.header_len();
    for (spec, data) in layout.sections.iter().zip(sections) {
        let count = data.len();
        let recorded = if count == 0 { 0 } else { offset };
        buf.extend_from_slice(&(recorded as u32).to_le_bytes());
        buf.extend_from_slice(&(count as u32).to_le_bytes());
        offset += count * spec.kind.width();
    }

    for (spec, data) in layout.sections.iter().zip(sections) {
        match data {
            SectionData::F64(values) => {
                for value in values.iter() {
                    buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            SectionData::I32(values) => {
                for value in values.iter() {
                    buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            SectionData::Text(values) => {
                for value in values.iter() {
                    write_slot(&mut buf, value, spec.kind.width());
                }
            }
        }
    }

    debug_assert_eq!(buf.len(), total);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{FRAME_PREAMBLE_LEN, TIME_SLOT_LEN};

    #[test]
    fn test_encode_nitrification_layout() {
        let times = vec!["2024-05-01 10:00:00".to_string(), "2024-05-01 10:01:00".to_string()];
        let temps = [18.5, 18.75];
        let bytes = encode(
            Category::Nitrification,
            &[SectionData::Text(&times), SectionData::F64(&temps)],
        )
        .unwrap();

        let header = FRAME_PREAMBLE_LEN + 2 * 8;
        assert_eq!(bytes.len(), header + 2 * TIME_SLOT_LEN + 2 * 8);
        assert_eq!(bytes[0], Category::Nitrification.tag());
        assert_eq!(bytes[1], FRAME_FORMAT_VERSION);

        let offset0 = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let count0 = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let offset1 = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        assert_eq!(offset0, header);
        assert_eq!(count0, 2);
        assert_eq!(offset1, header + 2 * TIME_SLOT_LEN);
        assert_eq!(
            f64::from_le_bytes(bytes[offset1..offset1 + 8].try_into().unwrap()),
            18.5
        );
    }

    #[test]
    fn test_empty_section_records_zero_offset() {
        let times: Vec<String> = Vec::new();
        let bytes = encode(
            Category::Nitrification,
            &[SectionData::Text(&times), SectionData::F64(&[])],
        )
        .unwrap();
        assert_eq!(bytes.len(), FRAME_PREAMBLE_LEN + 16);
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        let result = encode(Category::Nitrification, &[SectionData::F64(&[1.0])]);
        assert!(matches!(result, Err(FrameError::LayoutMismatch { .. })));

        let result = encode(
            Category::Nitrification,
            &[SectionData::F64(&[1.0]), SectionData::F64(&[1.0])],
        );
        assert!(matches!(result, Err(FrameError::LayoutMismatch { .. })));
    }
}
