//! DMK container codec (§4.D "DMK") — bit-exact.
//!
//! DMK is the one format that stores a complete raw per-track dump
//! (IDAM table and all) rather than bare sector payloads, so loading
//! is a direct byte install instead of the format-then-write-sector
//! synthesis VDK/JVC need.

use std::io::Cursor as IoCursor;

use binrw::{BinRead, BinWrite};

use crate::disk::{Disk, FileType};
use crate::error::{VdiskError, VdiskResult};
use crate::track::{MAX_TRACK_LENGTH, MIN_TRACK_LENGTH};

use super::standard_disk_size;

const HEADER_LEN: usize = 16;

#[derive(BinRead, BinWrite, Debug, Clone, Copy)]
#[brw(little)]
struct DmkHeader {
    write_protect: u8,
    cylinders: u8,
    track_length: u16,
    flags: u8,
    reserved: [u8; 6],
    /// Repurposed by this project's convention to carry write-protect
    /// independently of the inverted `write_protect` byte (see
    /// DESIGN.md open question decisions).
    write_protect_ext: u8,
    physical_drive_marker: [u8; 4],
}

const SINGLE_SIDED_BIT: u8 = 0x10;

pub fn load(data: &[u8]) -> VdiskResult<Disk> {
    if data.len() < HEADER_LEN {
        return Err(VdiskError::Internal("DMK file shorter than its own header".into()));
    }
    let mut reader = IoCursor::new(data);
    let header = DmkHeader::read(&mut reader)?;

    if header.physical_drive_marker != [0, 0, 0, 0] {
        return Err(VdiskError::UnsupportedFormat(
            "DMK physical-drive-session images are not supported".into(),
        ));
    }

    let track_length = header.track_length as usize;
    if !(MIN_TRACK_LENGTH..=MAX_TRACK_LENGTH).contains(&track_length) {
        return Err(VdiskError::Internal(format!(
            "DMK track_length {track_length} out of the supported range"
        )));
    }

    let heads = if header.flags & SINGLE_SIDED_BIT != 0 { 1u8 } else { 2u8 };
    let body = &data[HEADER_LEN..];
    if body.len() % (track_length * heads as usize) != 0 {
        return Err(VdiskError::Internal("DMK body is not a whole number of tracks".into()));
    }
    let cylinders = (body.len() / (track_length * heads as usize)) as u16;

    let mut disk = Disk::with_track_length(track_length);
    let mut pos = 0usize;
    for cyl in 0..cylinders {
        for head in 0..heads {
            let raw = &body[pos..pos + track_length];
            let track = disk.extend(cyl, head)?;
            track.as_mut_slice().copy_from_slice(raw);
            pos += track_length;
        }
    }

    disk.filetype = Some(FileType::Dmk);
    // write_protect byte is inverted (0 = enabled); the repurposed
    // extension byte at offset 11 takes precedence when nonzero.
    disk.write_options.write_protect = if header.write_protect_ext != 0 {
        header.write_protect_ext == 0xFF
    } else {
        header.write_protect == 0x00
    };

    Ok(disk)
}

pub fn save(disk: &Disk) -> VdiskResult<Vec<u8>> {
    let cylinders = standard_disk_size(disk.num_cylinders());
    let heads = disk.num_heads();
    let track_length = disk.track_length();

    if track_length > u16::MAX as usize {
        return Err(VdiskError::Internal("track length too large to encode in a DMK header".into()));
    }

    let header = DmkHeader {
        write_protect: if disk.write_options.write_protect { 0x00 } else { 0xFF },
        cylinders: cylinders as u8,
        track_length: track_length as u16,
        flags: if heads <= 1 { SINGLE_SIDED_BIT } else { 0 },
        reserved: [0u8; 6],
        write_protect_ext: if disk.write_options.write_protect { 0xFF } else { 0x00 },
        physical_drive_marker: [0, 0, 0, 0],
    };

    let mut out = Vec::with_capacity(HEADER_LEN + cylinders as usize * heads.max(1) as usize * track_length);
    {
        let mut writer = IoCursor::new(&mut out);
        header.write(&mut writer)?;
    }

    let blank = crate::track::Track::new(track_length);
    for cyl in 0..cylinders {
        for head in 0..heads.max(1) {
            let bytes = disk.track(cyl, head).map(|t| t.as_slice()).unwrap_or_else(|| blank.as_slice());
            out.extend_from_slice(bytes);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskGeometry;
    use crate::formatter::{format_track, FormatParams};
    use crate::sector_io::get_info;

    fn single_density_disk() -> Disk {
        let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
        for cyl in 0..2u16 {
            for head in 0..2u8 {
                let params = FormatParams {
                    dden: false,
                    cylinder: cyl,
                    head,
                    num_sectors: 10,
                    first_sector: 1,
                    ssize_code: 2,
                    interleave: 1,
                };
                format_track(&mut disk, &params).unwrap();
            }
        }
        disk
    }

    #[test]
    fn round_trip_preserves_density_and_geometry_scenario_3() {
        let disk = single_density_disk();
        let saved = save(&disk).unwrap();
        let reloaded = load(&saved).unwrap();

        let info = get_info(&reloaded).unwrap();
        assert_eq!(info.density, crate::sector_io::DiskDensity::Single);
        assert_eq!(info.ssize_code, Some(2));
        assert_eq!(info.num_sectors, 10);
        assert_eq!(reloaded.num_heads(), 2);
    }

    #[test]
    fn write_protect_ext_byte_round_trips() {
        let mut disk = single_density_disk();
        disk.write_options.write_protect = true;
        let saved = save(&disk).unwrap();
        assert_eq!(saved[0], 0x00);
        assert_eq!(saved[11], 0xFF);

        let reloaded = load(&saved).unwrap();
        assert!(reloaded.write_options.write_protect);
    }

    #[test]
    fn rejects_physical_drive_marker() {
        let disk = single_density_disk();
        let mut saved = save(&disk).unwrap();
        saved[12..16].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        assert!(matches!(load(&saved), Err(VdiskError::UnsupportedFormat(_))));
    }
}
