//! Sector read/write and whole-disk summary (§4.F).

use crate::chs::ssize_for_code;
use crate::cursor::{Cursor, DensityMode};
use crate::disk::Disk;
use crate::error::{VdiskError, VdiskResult};
use crate::idam::Density;
use crate::track::Track;

const DAM: u8 = 0xFB;
const DAM_SCAN_LIMIT: usize = 43;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadSectorResult {
    pub idam_crc_error: bool,
    pub data_crc_error: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteSectorResult {
    pub idam_crc_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskDensity {
    Single,
    Double,
    Mixed,
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct GetInfoResult {
    pub num_cylinders: u16,
    pub num_heads: u8,
    pub num_sectors: u32,
    pub first_sector_id: u8,
    /// -1 (`None`) means "mixed": not every IDAM shares a sector-size code.
    pub ssize_code: Option<u8>,
    pub density: DiskDensity,
}

fn density_mode_of(d: Density) -> DensityMode {
    match d {
        Density::Single => DensityMode::Single,
        Density::Double => DensityMode::Double,
    }
}

/// Locate the IDAM for `sector` on (cylinder, head), verifying its
/// CRC along the way. Returns the cursor positioned just past the
/// IDAM's own CRC bytes (the post-IDAM gap), plus whether that IDAM's
/// CRC was clean. Per §9, the stored IDAM *track* field is never
/// checked against `cylinder` (the source's documented lenient
/// behavior is preserved).
fn find_idam(track: &Track, cylinder: u16, head: u8, sector: u8) -> Option<(Cursor, bool)> {
    for entry in track.idam_table().iter() {
        let mut cursor = Cursor::new(cylinder, head, density_mode_of(entry.density));
        cursor.seek(entry.offset as usize);
        cursor.reset_crc();

        let _marker = cursor.read_byte_crc(track);
        let _track_field = cursor.read_byte_crc(track);
        let _head_field = cursor.read_byte_crc(track);
        let sector_field = cursor.read_byte_crc(track);
        let ssize_field = cursor.read_byte_crc(track);
        let _crc_hi = cursor.read_byte_crc(track);
        let _crc_lo = cursor.read_byte_crc(track);
        let idam_crc_error = !cursor.crc.is_clean();

        if sector_field == sector {
            // Stash the decoded ssize code for the caller via a side
            // channel: re-derive it from the track bytes at the known offset.
            let _ = ssize_field;
            return Some((cursor, idam_crc_error));
        }
    }
    None
}

fn idam_ssize_code(track: &Track, idam_offset: u16) -> u8 {
    track.read_byte(idam_offset as usize + 4)
}

fn scan_for_dam(cursor: &mut Cursor, track: &Track) -> Option<()> {
    for _ in 0..DAM_SCAN_LIMIT {
        if cursor.read_byte(track) == DAM {
            return Some(());
        }
    }
    None
}

pub fn read_sector(
    disk: &Disk,
    cylinder: u16,
    head: u8,
    sector: u8,
    buf: &mut [u8],
) -> VdiskResult<ReadSectorResult> {
    let track = disk.track(cylinder, head).ok_or(VdiskError::TrackMissing { cylinder, head })?;

    let idams: Vec<_> = track.idam_table().iter().collect();
    for entry in idams {
        let mut cursor = Cursor::new(cylinder, head, density_mode_of(entry.density));
        cursor.seek(entry.offset as usize);
        cursor.reset_crc();
        cursor.read_byte_crc(track); // marker
        cursor.read_byte_crc(track); // track field
        cursor.read_byte_crc(track); // head field
        let sector_field = cursor.read_byte_crc(track);
        let ssize_field = cursor.read_byte_crc(track);
        cursor.read_byte_crc(track); // crc hi
        cursor.read_byte_crc(track); // crc lo
        let idam_crc_error = !cursor.crc.is_clean();

        if sector_field != sector {
            continue;
        }

        if scan_for_dam(&mut cursor, track).is_none() {
            return Err(VdiskError::DamNotFound);
        }

        let recorded_ssize = ssize_for_code(ssize_field)?;
        cursor.reset_crc();
        cursor.crc.feed(DAM);

        let n_read = buf.len().min(recorded_ssize);
        for slot in buf.iter_mut().take(n_read) {
            *slot = cursor.read_byte_crc(track);
        }
        if buf.len() > recorded_ssize {
            for slot in buf.iter_mut().skip(recorded_ssize) {
                *slot = 0;
            }
        } else if recorded_ssize > buf.len() {
            for _ in 0..(recorded_ssize - buf.len()) {
                cursor.read_byte_crc(track);
            }
        }
        cursor.read_byte_crc(track); // data crc hi
        cursor.read_byte_crc(track); // data crc lo
        let data_crc_error = !cursor.crc.is_clean();

        return Ok(ReadSectorResult { idam_crc_error, data_crc_error });
    }

    Err(VdiskError::SectorNotFound { cylinder, head, sector })
}

pub fn write_sector(
    disk: &mut Disk,
    cylinder: u16,
    head: u8,
    sector: u8,
    buf: &[u8],
) -> VdiskResult<WriteSectorResult> {
    let track = disk.track_mut(cylinder, head).ok_or(VdiskError::TrackMissing { cylinder, head })?;

    let (mut cursor, idam_crc_error) =
        find_idam(track, cylinder, head, sector).ok_or(VdiskError::SectorNotFound { cylinder, head, sector })?;

    let recorded_ssize = {
        let mut code = None;
        for entry in track.idam_table().iter() {
            let sector_field = track.read_byte(entry.offset as usize + 3);
            if sector_field == sector {
                code = Some(idam_ssize_code(track, entry.offset));
                break;
            }
        }
        ssize_for_code(code.ok_or(VdiskError::IdamNotFound)?)?
    };

    let gap = if cursor.density == DensityMode::Double { 22 } else { 11 };
    cursor.skip(track, gap);

    let sync_len = if cursor.density == DensityMode::Double { 12 } else { 6 };
    for _ in 0..sync_len {
        cursor.write_byte(track, 0x00);
    }

    cursor.reset_crc();
    cursor.write_byte_crc(track, DAM);

    let n_write = buf.len().min(recorded_ssize);
    for &b in buf.iter().take(n_write) {
        cursor.write_byte_crc(track, b);
    }
    if recorded_ssize > n_write {
        for _ in 0..(recorded_ssize - n_write) {
            cursor.write_byte_crc(track, 0);
        }
    }

    let crc_bytes = cursor.crc.bytes();
    cursor.write_byte(track, crc_bytes[0]);
    cursor.write_byte(track, crc_bytes[1]);
    cursor.write_byte(track, 0xFE);

    Ok(WriteSectorResult { idam_crc_error })
}

pub fn get_info(disk: &Disk) -> VdiskResult<GetInfoResult> {
    let mut first: Option<u8> = None;
    let mut last: Option<u8> = None;
    let mut has_sd = false;
    let mut has_dd = false;
    let mut ssize_code: Option<u8> = None;
    let mut mixed_ssize = false;

    for (_, _, track) in disk.iter_tracks() {
        for entry in track.idam_table().iter() {
            let offset = entry.offset as usize;
            if offset + 4 >= track.len() {
                continue;
            }
            let sector = track.read_byte(offset + 3);
            let code = track.read_byte(offset + 4);

            match entry.density {
                Density::Single => has_sd = true,
                Density::Double => has_dd = true,
            }
            first = Some(first.map_or(sector, |f: u8| f.min(sector)));
            last = Some(last.map_or(sector, |l: u8| l.max(sector)));
            match ssize_code {
                None => ssize_code = Some(code),
                Some(c) if c != code => mixed_ssize = true,
                _ => {}
            }
        }
    }

    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(VdiskError::IdamNotFound),
    };
    if last <= first {
        return Err(VdiskError::IdamNotFound);
    }

    let density = match (has_sd, has_dd) {
        (true, true) => DiskDensity::Mixed,
        (true, false) => DiskDensity::Single,
        (false, true) => DiskDensity::Double,
        (false, false) => DiskDensity::Unknown,
    };

    Ok(GetInfoResult {
        num_cylinders: disk.num_cylinders(),
        num_heads: disk.num_heads(),
        num_sectors: (last - first) as u32 + 1,
        first_sector_id: first,
        ssize_code: if mixed_ssize { None } else { ssize_code },
        density,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Disk, DiskGeometry};
    use crate::formatter::{format_track, FormatParams};

    fn formatted_disk(num_cylinders: u16, num_heads: u8, num_sectors: u8, ssize_code: u8, dden: bool) -> Disk {
        let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
        for cyl in 0..num_cylinders {
            for head in 0..num_heads {
                let params = FormatParams {
                    dden,
                    cylinder: cyl,
                    head,
                    num_sectors,
                    first_sector: 1,
                    ssize_code,
                    interleave: 1,
                };
                format_track(&mut disk, &params).unwrap();
            }
        }
        disk
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut disk = formatted_disk(1, 1, 18, 1, true);
        let mut payload = [0u8; 256];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i & 0xFF) as u8;
        }
        write_sector(&mut disk, 0, 0, 5, &payload).unwrap();

        let mut out = [0u8; 256];
        let result = read_sector(&disk, 0, 0, 5, &mut out).unwrap();
        assert_eq!(out, payload);
        assert!(!result.idam_crc_error);
        assert!(!result.data_crc_error);
    }

    #[test]
    fn short_write_buffer_is_zero_padded_on_readback() {
        let mut disk = formatted_disk(1, 1, 18, 1, true);
        let payload = [0xAAu8; 10];
        write_sector(&mut disk, 0, 0, 1, &payload).unwrap();

        let mut out = [0xFFu8; 256];
        read_sector(&disk, 0, 0, 1, &mut out).unwrap();
        assert!(out[..10].iter().all(|&b| b == 0xAA));
        assert!(out[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn missing_sector_reports_sector_not_found() {
        let disk = formatted_disk(1, 1, 18, 1, true);
        let mut out = [0u8; 256];
        let err = read_sector(&disk, 0, 0, 99, &mut out).unwrap_err();
        assert!(matches!(err, VdiskError::SectorNotFound { .. }));
    }

    #[test]
    fn corrupting_data_field_surfaces_data_crc_error_scenario_6() {
        let mut disk = formatted_disk(1, 1, 18, 1, true);
        // Locate the data field of sector 1 and flip a byte in place.
        let track = disk.track_mut(0, 0).unwrap();
        let entry = track.idam_table().iter().next().unwrap();
        // Data field begins a fixed distance after the IDAM for a
        // freshly-formatted double-density track: gap2 + 12 sync + 3 sync marks + DAM.
        let corrupt_pos = entry.offset as usize + 40;
        let original = track.read_byte(corrupt_pos);
        track.write_byte(corrupt_pos, original ^ 0xFF);

        let mut out = [0u8; 256];
        // Whichever sector's data field this lands in, it must report a CRC error.
        for sector in 1..=18u8 {
            if let Ok(result) = read_sector(&disk, 0, 0, sector, &mut out) {
                if result.data_crc_error {
                    return;
                }
            }
        }
        panic!("expected at least one sector to report a data CRC error after corruption");
    }

    #[test]
    fn get_info_matches_scenario_1() {
        let disk = formatted_disk(35, 1, 18, 1, true);
        let info = get_info(&disk).unwrap();
        assert_eq!(info.num_cylinders, 35);
        assert_eq!(info.num_heads, 1);
        assert_eq!(info.num_sectors, 18);
        assert_eq!(info.first_sector_id, 1);
        assert_eq!(info.ssize_code, Some(1));
        assert_eq!(info.density, DiskDensity::Double);
    }
}
