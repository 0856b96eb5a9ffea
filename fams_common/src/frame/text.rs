//! Fixed-width text slots.

use tracing::trace;

/// Longest prefix of `text` that fits a slot of `width` bytes with its null.
///
/// Cuts back to a UTF-8 character boundary, so ASCII input keeps exactly
/// `width - 1` characters.
pub fn truncate_to_slot(text: &str, width: usize) -> &str {
    let limit = width.saturating_sub(1);
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Append `text` as a null-padded slot of `width` bytes.
pub(crate) fn write_slot(buf: &mut Vec<u8>, text: &str, width: usize) {
    let kept = truncate_to_slot(text, width);
    if kept.len() < text.len() {
        trace!(width, dropped = text.len() - kept.len(), "text truncated to slot");
    }
    buf.extend_from_slice(kept.as_bytes());
    buf.resize(buf.len() + (width - kept.len()), 0);
}

/// Read a slot up to its first null byte.
///
/// Invalid UTF-8 yields the longest valid prefix.
pub fn read_slot(slot: &[u8]) -> &str {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    let bytes = &slot[..end];
    match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_slot("ABCDEFG", 6), "ABCDE");
        assert_eq!(truncate_to_slot("ABCDE", 6), "ABCDE");
        assert_eq!(truncate_to_slot("", 6), "");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // "水槽" is 6 bytes; a 6-byte slot keeps 5 bytes, i.e. one character.
        assert_eq!(truncate_to_slot("水槽", 6), "水");
    }

    #[test]
    fn test_write_and_read_slot() {
        let mut buf = Vec::new();
        write_slot(&mut buf, "C001", 6);
        write_slot(&mut buf, "C0123456", 6);
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[..6], b"C001\0\0");
        assert_eq!(buf[11], 0);
        assert_eq!(read_slot(&buf[..6]), "C001");
        assert_eq!(read_slot(&buf[6..]), "C0123");
    }

    #[test]
    fn test_read_slot_without_null() {
        assert_eq!(read_slot(b"ABC"), "ABC");
    }

    #[test]
    fn test_read_slot_invalid_utf8() {
        assert_eq!(read_slot(&[b'o', b'k', 0xFF, 0]), "ok");
    }
}
