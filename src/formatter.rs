//! Track formatting (§4.E): synthesizes a complete, legal MFM/FM
//! track byte stream — gaps, sync, IDAM, DAM, sector data, and CRCs —
//! with a configurable sector interleave.

use crate::chs::ssize_for_code;
use crate::cursor::{Cursor, DensityMode, DATA_REGION_START};
use crate::disk::Disk;
use crate::error::VdiskResult;
use crate::idam::IdamEntry;
use crate::track::Track;

/// In-memory replacement for the source's global `interleave_sd` /
/// `interleave_dd` variables (§9 Design Notes): one field per format
/// call instead of process-wide mutable state.
#[derive(Debug, Clone, Copy)]
pub struct FormatParams {
    pub dden: bool,
    pub cylinder: u16,
    pub head: u8,
    pub num_sectors: u8,
    pub first_sector: u8,
    pub ssize_code: u8,
    pub interleave: u8,
}

/// Compute the interleave permutation: `sector_at_slot[physical_slot]
/// = logical sector number` (§4.E step 1).
fn interleave_permutation(num_sectors: u8, first_sector: u8, interleave: u8) -> Vec<u8> {
    let n = num_sectors as usize;
    if n == 0 {
        return Vec::new();
    }
    let step = interleave as usize % n;
    let mut slot_for_logical = vec![0usize; n];
    let mut taken = vec![false; n];

    // start index = -interleave (mod n)
    let mut idx = (n - (interleave as usize % n)) % n;
    for logical in 0..n {
        idx = (idx + step) % n;
        while taken[idx] {
            idx = (idx + 1) % n;
        }
        slot_for_logical[logical] = idx;
        taken[idx] = true;
    }

    let mut sector_at_slot = vec![0u8; n];
    for (logical, &slot) in slot_for_logical.iter().enumerate() {
        sector_at_slot[slot] = first_sector.wrapping_add(logical as u8);
    }
    sector_at_slot
}

/// Gap sizes derived from the remaining track capacity (§4.E step 4).
fn gap_sizes(track_length: usize, ssize: usize, num_sectors: u8) -> (usize, usize, usize) {
    let n = num_sectors.max(1) as i64;
    let gap = track_length as i64 - ((ssize as i64 + 58) * n) - 87;
    let gap = gap.max(0);
    let pigap = 8 + gap * 46 / 584;
    let gap2 = 16 + gap * 76 / (584 * n);
    let gap3 = 1 + gap * 412 / (584 * n);
    (pigap.max(0) as usize, gap2.max(0) as usize, gap3.max(0) as usize)
}

fn fill(cursor: &mut Cursor, track: &mut Track, byte: u8, count: usize) {
    for _ in 0..count {
        cursor.write_byte(track, byte);
    }
}

/// `format_track`: overwrite the (cylinder, head) track with a
/// freshly synthesized one, growing disk geometry as needed.
pub fn format_track(disk: &mut Disk, params: &FormatParams) -> VdiskResult<()> {
    let ssize = ssize_for_code(params.ssize_code)?;
    let track_length = disk.track_length();
    let sector_at_slot = interleave_permutation(params.num_sectors, params.first_sector, params.interleave);

    let density = if params.dden { DensityMode::Double } else { DensityMode::Single };
    let track = disk.extend(params.cylinder, params.head)?;
    // Fresh IDAM table: formatting replaces the track wholesale.
    track.set_idam_table(&crate::idam::IdamTable::new());

    let mut cursor = Cursor::new(params.cylinder, params.head, density);

    if !params.dden {
        fill(&mut cursor, track, 0xFF, 20);

        for &sector in &sector_at_slot {
            fill(&mut cursor, track, 0x00, 6);
            cursor.reset_crc();
            let idam_offset = cursor.head_pos as u16;
            cursor.write_byte_crc(track, 0xFE);
            cursor.write_byte_crc(track, params.cylinder as u8);
            cursor.write_byte_crc(track, params.head);
            cursor.write_byte_crc(track, sector);
            cursor.write_byte_crc(track, params.ssize_code);
            let crc_bytes = cursor.crc.bytes();
            cursor.write_byte(track, crc_bytes[0]);
            cursor.write_byte(track, crc_bytes[1]);

            let mut table = track.idam_table();
            table.install(IdamEntry { offset: idam_offset, density: density.as_idam_density() });
            track.set_idam_table(&table);

            fill(&mut cursor, track, 0xFF, 11);
            fill(&mut cursor, track, 0x00, 6);
            cursor.reset_crc();
            cursor.write_byte_crc(track, 0xFB);
            for _ in 0..ssize {
                cursor.write_byte_crc(track, 0xE5);
            }
            let crc_bytes = cursor.crc.bytes();
            cursor.write_byte(track, crc_bytes[0]);
            cursor.write_byte(track, crc_bytes[1]);
            fill(&mut cursor, track, 0xFF, 12);
        }

        loop {
            cursor.write_byte(track, 0xFF);
            if cursor.head_pos == DATA_REGION_START {
                break;
            }
        }
    } else {
        let (pigap, gap2, gap3) = gap_sizes(track_length, ssize, params.num_sectors);

        fill(&mut cursor, track, 0x4E, pigap);
        fill(&mut cursor, track, 0x00, 9);
        fill(&mut cursor, track, 0xC2, 3);
        cursor.write_byte(track, 0xFC);
        fill(&mut cursor, track, 0x4E, 32);

        for &sector in &sector_at_slot {
            fill(&mut cursor, track, 0x00, 8);
            cursor.reset_crc();
            fill(&mut cursor, track, 0xA1, 3);
            let idam_offset = cursor.head_pos as u16;
            cursor.write_byte_crc(track, 0xFE);
            cursor.write_byte_crc(track, params.cylinder as u8);
            cursor.write_byte_crc(track, params.head);
            cursor.write_byte_crc(track, sector);
            cursor.write_byte_crc(track, params.ssize_code);
            let crc_bytes = cursor.crc.bytes();
            cursor.write_byte(track, crc_bytes[0]);
            cursor.write_byte(track, crc_bytes[1]);

            let mut table = track.idam_table();
            table.install(IdamEntry { offset: idam_offset, density: density.as_idam_density() });
            track.set_idam_table(&table);

            fill(&mut cursor, track, 0x4E, gap2);
            fill(&mut cursor, track, 0x00, 12);
            cursor.reset_crc();
            fill(&mut cursor, track, 0xA1, 3);
            cursor.write_byte_crc(track, 0xFB);
            for _ in 0..ssize {
                cursor.write_byte_crc(track, 0xE5);
            }
            let crc_bytes = cursor.crc.bytes();
            cursor.write_byte(track, crc_bytes[0]);
            cursor.write_byte(track, crc_bytes[1]);
            fill(&mut cursor, track, 0x4E, gap3);
        }

        loop {
            cursor.write_byte(track, 0x4E);
            if cursor.head_pos == DATA_REGION_START {
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Disk, DiskGeometry};
    use crate::sector_io::read_sector;

    fn formatted_disk() -> Disk {
        let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
        let params = FormatParams {
            dden: true,
            cylinder: 0,
            head: 0,
            num_sectors: 18,
            first_sector: 1,
            ssize_code: 1,
            interleave: 1,
        };
        format_track(&mut disk, &params).unwrap();
        disk
    }

    #[test]
    fn formatted_sector_reads_back_as_e5_fill_scenario_1() {
        let disk = formatted_disk();
        let mut buf = [0u8; 256];
        let result = read_sector(&disk, 0, 0, 5, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xE5));
        assert!(!result.idam_crc_error);
        assert!(!result.data_crc_error);
    }

    #[test]
    fn interleave_permutation_is_a_bijection() {
        let perm = interleave_permutation(18, 1, 7);
        let mut sorted = perm.clone();
        sorted.sort();
        let expected: Vec<u8> = (1..=18).collect();
        assert_eq!(sorted, expected);
    }
}
