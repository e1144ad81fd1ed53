//! A single track's raw byte buffer, with the embedded IDAM table
//! view over its first 128 bytes (§3, §4.B).

use crate::idam::{IdamTable, IDAM_TABLE_BYTES};

/// Smallest and largest legal track lengths (§4.C), rounded to a
/// multiple of 32.
pub const MIN_TRACK_LENGTH: usize = 0x1640;
pub const MAX_TRACK_LENGTH: usize = 0x2940;

#[derive(Debug, Clone)]
pub struct Track {
    data: Vec<u8>,
}

impl Track {
    /// Allocate a new, zero-filled track of `length` bytes. `length`
    /// must already be a valid track length; callers in `disk.rs`
    /// are responsible for deriving/clamping it (§4.C).
    pub fn new(length: usize) -> Self {
        debug_assert!(length >= IDAM_TABLE_BYTES, "track shorter than its own IDAM table");
        Track { data: vec![0u8; length] }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn read_byte(&self, pos: usize) -> u8 {
        self.data[pos]
    }

    pub fn write_byte(&mut self, pos: usize, value: u8) {
        self.data[pos] = value;
    }

    /// View the current IDAM table (parsed from the first 128 bytes).
    pub fn idam_table(&self) -> IdamTable {
        let mut header = [0u8; IDAM_TABLE_BYTES];
        header.copy_from_slice(&self.data[..IDAM_TABLE_BYTES]);
        IdamTable::from_bytes(&header)
    }

    /// Persist an updated IDAM table back into the first 128 bytes.
    pub fn set_idam_table(&mut self, table: &IdamTable) {
        self.data[..IDAM_TABLE_BYTES].copy_from_slice(&table.to_bytes());
    }

    /// Byte range addressable by the data cursor, i.e. everything
    /// after the reserved IDAM table.
    pub fn data_region(&self) -> std::ops::Range<usize> {
        IDAM_TABLE_BYTES..self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idam::{Density, IdamEntry};

    #[test]
    fn new_track_has_empty_idam_table() {
        let t = Track::new(MIN_TRACK_LENGTH);
        assert_eq!(t.idam_table().iter().count(), 0);
        assert_eq!(t.len(), MIN_TRACK_LENGTH);
    }

    #[test]
    fn idam_table_round_trips_through_track_bytes() {
        let mut t = Track::new(MIN_TRACK_LENGTH);
        let mut table = t.idam_table();
        table.install(IdamEntry { offset: 200, density: Density::Double });
        t.set_idam_table(&table);

        let reloaded = t.idam_table();
        let v: Vec<_> = reloaded.iter().collect();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].offset, 200);
    }

    #[test]
    fn data_region_excludes_idam_table() {
        let t = Track::new(MIN_TRACK_LENGTH);
        assert_eq!(t.data_region().start, IDAM_TABLE_BYTES);
    }
}
