//! Hex dump formatting for frames on the wire
//!
//! Rows of 16 bytes: offset, four groups of four hex bytes, then the
//! printable ASCII rendering.
//!
//! ```text
//! 00000000 | F6 FF 19 00 | 0F          |             |             | .....
//! ```

use core::fmt;

const ROW_LEN: usize = 16;
const GROUP_LEN: usize = 4;

/// Displays a byte slice as a hex dump
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row_index, row) in self.0.chunks(ROW_LEN).enumerate() {
            if row_index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{:08X} | ", row_index * ROW_LEN)?;

            for group in 0..ROW_LEN / GROUP_LEN {
                for column in group * GROUP_LEN..(group + 1) * GROUP_LEN {
                    match row.get(column) {
                        Some(byte) => write!(f, "{:02X} ", byte)?,
                        None => f.write_str("   ")?,
                    }
                }
                f.write_str("| ")?;
            }

            for column in 0..ROW_LEN {
                let c = match row.get(column) {
                    Some(&byte) if byte == b' ' || byte.is_ascii_graphic() => byte as char,
                    Some(_) => '.',
                    None => ' ',
                };
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}
