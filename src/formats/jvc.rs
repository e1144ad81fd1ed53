//! JVC/DSK/OS-9 container codec (§4.D "JVC/DSK/OS9") — bit-exact.
//!
//! Unlike VDK, this format has no fixed magic number: its header is
//! optional and its presence is inferred from the file's length modulo
//! 128, the same "sniff, don't declare" strategy the teacher crate
//! uses for ambiguous legacy formats
//! (`examples/dbalsom-fluxfox/src/file_parsers/raw.rs`).

use crate::disk::{Disk, DiskGeometry, FileType};
use crate::error::{VdiskError, VdiskResult};
use crate::formatter::{format_track, FormatParams};
use crate::sector_io::{get_info, read_sector, write_sector, DiskDensity};

use super::standard_disk_size;

const SSIZE: usize = 256;
const DEFAULT_SECTORS_PER_TRACK: u8 = 18;
const DEFAULT_HEADS: u8 = 1;

/// Header fields that may be carried by a JVC file (§4.D). Absent when
/// the file length is an exact multiple of 128 (no header).
#[derive(Debug, Clone, Copy)]
struct JvcHeader {
    sectors_per_track: u8,
    side_count: u8,
    sector_size_code: u8,
    first_sector_id: u8,
    sector_attribute_flag: u8,
}

impl Default for JvcHeader {
    fn default() -> Self {
        JvcHeader {
            sectors_per_track: DEFAULT_SECTORS_PER_TRACK,
            side_count: DEFAULT_HEADS,
            sector_size_code: 1,
            first_sector_id: 1,
            sector_attribute_flag: 0,
        }
    }
}

/// Peek at logical sector zero's OS-9 LSN0 descriptor (bytes 0..=3 give
/// total sector count, byte 4 gives sectors-per-track) to recognize a
/// headerless OS-9 disk where the plain `len % 128` test is ambiguous.
fn looks_like_os9(data: &[u8]) -> bool {
    if data.len() < SSIZE {
        return false;
    }
    let total_sectors =
        ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32;
    let sectors_per_track = data[3];
    if sectors_per_track == 0 || total_sectors == 0 {
        return false;
    }
    let implied_len = total_sectors as usize * SSIZE;
    data.len() == implied_len || data.len() == implied_len + header_len_for(sectors_per_track)
}

fn header_len_for(sectors_per_track: u8) -> usize {
    sectors_per_track as usize % 128
}

fn parse_header(data: &[u8]) -> (JvcHeader, bool, usize) {
    let rem = data.len() % 128;
    if rem == 0 {
        if looks_like_os9(data) {
            let sectors_per_track = data[3];
            return (
                JvcHeader { sectors_per_track, ..JvcHeader::default() },
                true,
                0,
            );
        }
        return (JvcHeader::default(), false, 0);
    }

    let mut header = JvcHeader::default();
    header.sectors_per_track = data[0];
    if rem >= 2 {
        header.side_count = data[1];
    }
    if rem >= 3 {
        header.sector_size_code = data[2];
    }
    if rem >= 4 {
        header.first_sector_id = data[3];
    }
    if rem >= 5 {
        header.sector_attribute_flag = data[4];
    }
    (header, false, rem)
}

pub fn load(data: &[u8], dden: bool) -> VdiskResult<Disk> {
    let (header, headerless_os9, header_len) = parse_header(data);
    let ssize = crate::chs::ssize_for_code(header.sector_size_code)?;
    let sector_data = &data[header_len..];

    let bytes_per_track = header.sectors_per_track as usize * ssize;
    if bytes_per_track == 0 {
        return Err(VdiskError::Internal("JVC header declares zero sectors per track".into()));
    }
    if sector_data.len() % (bytes_per_track * header.side_count.max(1) as usize) != 0 {
        return Err(VdiskError::Internal("JVC sector data is not a whole number of tracks".into()));
    }
    let total_track_groups = sector_data.len() / (bytes_per_track * header.side_count.max(1) as usize);
    let cylinders = total_track_groups as u16;
    let heads = header.side_count.max(1);

    let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
    let mut pos = 0usize;
    for cyl in 0..cylinders {
        for head in 0..heads {
            let params = FormatParams {
                dden,
                cylinder: cyl,
                head,
                num_sectors: header.sectors_per_track,
                first_sector: header.first_sector_id,
                ssize_code: header.sector_size_code,
                interleave: 1,
            };
            format_track(&mut disk, &params)?;
            for i in 0..header.sectors_per_track {
                let sector = header.first_sector_id.wrapping_add(i);
                let payload = &sector_data[pos..pos + ssize];
                write_sector(&mut disk, cyl, head, sector, payload)?;
                pos += ssize;
            }
        }
    }

    disk.filetype = Some(FileType::Jvc);
    disk.write_options.write_protect = header.sector_attribute_flag & 0x01 != 0;
    disk.format_metadata.jvc_headerless_os9 = headerless_os9;

    Ok(disk)
}

pub fn save(disk: &Disk) -> VdiskResult<Vec<u8>> {
    let info = get_info(disk)?;
    if info.density == DiskDensity::Mixed {
        return Err(VdiskError::MixedDensityUnsupported);
    }
    let ssize_code = info.ssize_code.ok_or(VdiskError::BadSectorSize { requested: 0 })?;
    let ssize = crate::chs::ssize_for_code(ssize_code)?;

    let cylinders = standard_disk_size(info.num_cylinders);
    let heads = info.num_heads;
    let num_sectors = info.num_sectors as u8;

    let mut out = Vec::with_capacity(
        5 + cylinders as usize * heads as usize * num_sectors as usize * ssize,
    );

    let needs_header = !disk.format_metadata.jvc_headerless_os9
        && (num_sectors != DEFAULT_SECTORS_PER_TRACK
            || heads != DEFAULT_HEADS
            || ssize_code != 1
            || info.first_sector_id != 1
            || disk.write_options.write_protect);

    if needs_header {
        out.push(num_sectors);
        out.push(heads);
        out.push(ssize_code);
        out.push(info.first_sector_id);
        out.push(if disk.write_options.write_protect { 0xFF } else { 0x00 });
    }

    for cyl in 0..cylinders {
        for head in 0..heads {
            for i in 0..num_sectors {
                let sector = info.first_sector_id.wrapping_add(i);
                let mut buf = vec![0u8; ssize];
                read_sector(disk, cyl, head, sector, &mut buf)?;
                out.extend_from_slice(&buf);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headerless_disk(cylinders: u16) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..cylinders {
            for s in 0..DEFAULT_SECTORS_PER_TRACK {
                out.extend(std::iter::repeat(s.wrapping_add(1)).take(SSIZE));
            }
        }
        out
    }

    #[test]
    fn headerless_file_loads_with_default_geometry() {
        let file = headerless_disk(1);
        let disk = load(&file, true).unwrap();
        assert_eq!(disk.num_cylinders(), 1);
        assert_eq!(disk.num_heads(), 1);
    }

    #[test]
    fn header_fields_drive_geometry_and_round_trip() {
        let mut file = vec![10u8, 2, 1, 1, 0xFF];
        for _ in 0..1 {
            for head in 0..2 {
                for s in 0..10 {
                    file.extend(std::iter::repeat((s as u8 + head as u8).wrapping_add(1)).take(SSIZE));
                }
            }
        }
        let disk = load(&file, true).unwrap();
        assert_eq!(disk.num_heads(), 2);
        assert!(disk.write_options.write_protect);

        let saved = save(&disk).unwrap();
        assert_eq!(saved[0], 10);
        assert_eq!(saved[1], 2);
        assert_eq!(saved[4], 0xFF);
    }
}
