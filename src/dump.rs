//! Text renderings of binary images and the dictionary (verbose output, C initializers).

use crate::dictionary::Dictionary;
use std::fmt::Write;

/// Hex dump, 16 bytes per row with an address column. The last row is padded with `~~`.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04X}:", row * 16);
        for b in chunk {
            let _ = write!(out, " {:02X}", b);
        }
        for _ in chunk.len()..16 {
            out.push_str(" ~~");
        }
        out.push('\n');
    }
    out
}

/// Body of a C array initializer: `0xNN` bytes, 16 per line, 4-space indent.
/// A partial last line is filled with `0`.
pub fn c_initializer(data: &[u8]) -> String {
    data.chunks(16)
        .map(|chunk| {
            let mut cells: Vec<String> = chunk.iter().map(|b| format!("{:#04x}", b)).collect();
            cells.resize(16, "0".to_string());
            format!("    {}", cells.join(", "))
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Upper-case hex string without separators.
pub fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// One block per object, one line per sub-object.
pub fn dictionary(dictionary: &Dictionary) -> String {
    let mut out = String::new();
    for object in dictionary {
        let _ = writeln!(out, "{}", object);
    }
    out
}
