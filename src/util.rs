//! Small formatting helpers used for `trace!`-level logging of
//! sector and track byte streams.

use std::fmt::Write;

/// Render `data` as a classic hex dump: address gutter, hex columns,
/// ASCII gutter with `.` standing in for non-printable bytes.
pub fn dump_slice(data: &[u8], start_address: usize, bytes_per_row: usize) -> String {
    let mut out = String::new();
    let rows = data.len() / bytes_per_row;
    let last_row_size = data.len() % bytes_per_row;

    for r in 0..rows {
        let _ = write!(out, "{:05X} | ", r * bytes_per_row + start_address);
        for b in 0..bytes_per_row {
            let _ = write!(out, "{:02X} ", data[r * bytes_per_row + b]);
        }
        out.push_str("| ");
        for b in 0..bytes_per_row {
            let byte = data[r * bytes_per_row + b];
            out.push(if (40..=126).contains(&byte) { byte as char } else { '.' });
        }
        out.push('\n');
    }

    if last_row_size > 0 {
        let _ = write!(out, "{:05X} | ", rows * bytes_per_row + start_address);
        for b in 0..bytes_per_row {
            if b < last_row_size {
                let _ = write!(out, "{:02X} ", data[rows * bytes_per_row + b]);
            } else {
                out.push_str("   ");
            }
        }
        out.push_str("| ");
        for b in 0..last_row_size {
            let byte = data[rows * bytes_per_row + b];
            out.push(if (40..=126).contains(&byte) { byte as char } else { '.' });
        }
        out.push('\n');
    }

    out
}

/// Render `data` as a plain ASCII string, `.` for non-printable bytes.
pub fn dump_string(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if (40..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_string_replaces_non_printable() {
        let s = dump_string(&[0x41, 0x00, 0x42]);
        assert_eq!(s, "A.B");
    }

    #[test]
    fn dump_slice_handles_partial_last_row() {
        let data = [0u8; 5];
        let s = dump_slice(&data, 0, 4);
        assert_eq!(s.lines().count(), 2);
    }
}
