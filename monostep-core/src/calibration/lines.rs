//! Line tokenizer for calibration file images
//!
//! The file image is kept as one owned buffer. Lines are recorded as
//! `(start, len)` spans into it, so no line is ever copied and the buffer
//! outlives every view handed out.
//!
//! Tokenizing takes two passes over the image: the first counts lines,
//! the second fills a span table reserved to exactly that count.

use alloc::vec::Vec;
use core::ops::Range;

use super::CalibrationError;

/// A single line inside a [`LineBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineSpan {
    /// Offset of the first non-indent byte
    pub start: usize,
    /// Length up to (not including) the line ending
    pub len: usize,
}

impl LineSpan {
    /// Byte range of this line in the owning buffer
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Owned file image split into non-blank lines
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    spans: Vec<LineSpan>,
}

/// `\n` and `\r` both terminate a line; runs of them are one separator
fn is_line_end(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

fn is_indent(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Walk the image and report every non-blank line
///
/// Leading spaces and tabs are excluded from the span. Lines made only of
/// indentation are treated as blank.
fn scan_lines(bytes: &[u8], mut visit: impl FnMut(LineSpan)) {
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && is_line_end(bytes[pos]) {
            pos += 1;
        }
        while pos < bytes.len() && is_indent(bytes[pos]) {
            pos += 1;
        }

        let start = pos;
        while pos < bytes.len() && !is_line_end(bytes[pos]) {
            pos += 1;
        }

        if pos > start {
            visit(LineSpan {
                start,
                len: pos - start,
            });
        }
    }
}

impl LineBuffer {
    /// Split a file image into lines
    ///
    /// An empty image produces an empty buffer, not an error.
    pub fn tokenize(bytes: Vec<u8>) -> Result<Self, CalibrationError> {
        let mut count = 0usize;
        scan_lines(&bytes, |_| count += 1);

        let mut spans = Vec::new();
        spans
            .try_reserve_exact(count)
            .map_err(|_| CalibrationError::AllocationFailure)?;
        scan_lines(&bytes, |span| spans.push(span));

        Ok(Self { bytes, spans })
    }

    /// Number of non-blank lines
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Line `index` without indentation or line ending
    pub fn line(&self, index: usize) -> Option<&[u8]> {
        self.spans.get(index).map(|span| &self.bytes[span.range()])
    }

    /// Iterate over all lines in file order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.spans.iter().map(move |span| &self.bytes[span.range()])
    }

    pub fn spans(&self) -> &[LineSpan] {
        &self.spans
    }

    /// Give the file image back, dropping the span table
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(text: &str) -> Vec<Vec<u8>> {
        let buffer = LineBuffer::tokenize(text.as_bytes().to_vec()).unwrap();
        buffer.iter().map(|line| line.to_vec()).collect()
    }

    #[test]
    fn test_empty_image_has_no_lines() {
        let buffer = LineBuffer::tokenize(Vec::new()).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.line(0), None);
    }

    #[test]
    fn test_mixed_line_endings() {
        let lines = lines_of("a\nb\r\nc\rd");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let lines = lines_of("\n\n\r\nfirst\n\n\n\r\r\nsecond\n\n");
        assert_eq!(lines, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_leading_indent_is_stripped() {
        let lines = lines_of("  \t100\t600.0\n\t# note");
        assert_eq!(lines, vec![b"100\t600.0".to_vec(), b"# note".to_vec()]);
    }

    #[test]
    fn test_indent_only_line_is_blank() {
        let lines = lines_of("one\n   \t \ntwo\n \t");
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_final_line_without_terminator() {
        let buffer = LineBuffer::tokenize(b"x\nlast".to_vec()).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.line(1), Some(&b"last"[..]));
        assert_eq!(buffer.spans()[1], LineSpan { start: 2, len: 4 });
    }

    #[test]
    fn test_spans_point_into_original_image() {
        let image = b"# header\r\n  10\t400.5\r\n".to_vec();
        let buffer = LineBuffer::tokenize(image.clone()).unwrap();

        for span in buffer.spans() {
            assert!(span.range().end <= image.len());
        }
        assert_eq!(buffer.into_bytes(), image);
    }
}
