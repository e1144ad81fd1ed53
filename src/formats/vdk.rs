//! VDK container codec (§4.D "VDK") — bit-exact.
//!
//! The header struct uses `binrw`, the same declarative
//! binary-struct idiom the teacher crate uses for its own fixed
//! binary headers (`examples/dbalsom-fluxfox/src/file_parsers/hfe.rs`'s
//! `HfeFileHeader`).

use std::io::Cursor as IoCursor;

use binrw::{BinRead, BinWrite};

use crate::disk::{Disk, DiskGeometry, FileType};
use crate::error::{VdiskError, VdiskResult};
use crate::formatter::{format_track, FormatParams};
use crate::sector_io::{get_info, write_sector, DiskDensity};

use super::standard_disk_size;

const MAGIC: [u8; 2] = [b'd', b'k'];
const NUM_SECTORS: u8 = 18;
const SSIZE_CODE: u8 = 1; // 256 bytes
const SSIZE: usize = 256;

#[derive(BinRead, BinWrite, Debug, Clone, Copy)]
#[brw(little)]
struct VdkHeader {
    magic: [u8; 2],
    header_length: u16,
    version: u8,
    bw_compat: u8,
    source_id: u8,
    source_ver: u8,
    cylinders: u8,
    heads: u8,
    flags: u8,
    name_len_compression: u8,
}

pub fn load(data: &[u8], dden: bool) -> VdiskResult<Disk> {
    if data.len() < 12 {
        return Err(VdiskError::Internal("VDK file shorter than its own header".into()));
    }
    let mut reader = IoCursor::new(data);
    let header = VdkHeader::read(&mut reader)?;

    if header.magic != MAGIC {
        return Err(VdiskError::BadMagic);
    }
    if header.header_length < 12 {
        return Err(VdiskError::Internal("VDK header_length below the minimum of 12".into()));
    }
    if header.bw_compat > 0x10 {
        return Err(VdiskError::UnsupportedVersion(header.bw_compat));
    }
    if header.name_len_compression & 0x07 != 0 {
        return Err(VdiskError::CompressionUnsupported);
    }

    let header_length = header.header_length as usize;
    if data.len() < header_length {
        return Err(VdiskError::Internal("VDK file truncated before end of header".into()));
    }
    let extra_bytes = data[12..header_length].to_vec();

    let cylinders = header.cylinders as u16;
    let heads = header.heads;
    let sector_data = &data[header_length..];
    let expected_len = cylinders as usize * heads as usize * NUM_SECTORS as usize * SSIZE;
    if sector_data.len() != expected_len {
        return Err(VdiskError::Internal(format!(
            "VDK sector data size mismatch: expected {expected_len}, found {}",
            sector_data.len()
        )));
    }

    let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
    let mut pos = 0usize;
    for cyl in 0..cylinders {
        for head in 0..heads {
            let params = FormatParams {
                dden,
                cylinder: cyl,
                head,
                num_sectors: NUM_SECTORS,
                first_sector: 1,
                ssize_code: SSIZE_CODE,
                interleave: 1,
            };
            format_track(&mut disk, &params)?;
            for sector in 1..=NUM_SECTORS {
                let payload = &sector_data[pos..pos + SSIZE];
                write_sector(&mut disk, cyl, head, sector, payload)?;
                pos += SSIZE;
            }
        }
    }

    disk.filetype = Some(FileType::Vdk);
    disk.write_options.write_protect = header.flags & 0x01 != 0;
    disk.format_metadata.vdk_extra_bytes = extra_bytes;
    disk.format_metadata.vdk_original_header = Some({
        let mut raw = [0u8; 12];
        let mut w = IoCursor::new(&mut raw[..]);
        header.write(&mut w)?;
        raw
    });

    Ok(disk)
}

pub fn save(disk: &Disk) -> VdiskResult<Vec<u8>> {
    let info = get_info(disk)?;
    if info.density == DiskDensity::Mixed {
        return Err(VdiskError::MixedDensityUnsupported);
    }
    if info.ssize_code != Some(SSIZE_CODE) {
        return Err(VdiskError::BadSectorSize { requested: 128usize << info.ssize_code.unwrap_or(0) });
    }
    if info.num_sectors != NUM_SECTORS as u32 {
        return Err(VdiskError::TooManySectors { requested: info.num_sectors as u8, max: NUM_SECTORS });
    }

    let cylinders = standard_disk_size(info.num_cylinders);
    let heads = info.num_heads;
    let extra = &disk.format_metadata.vdk_extra_bytes;

    let mut header = disk.format_metadata.vdk_original_header.map(|raw| {
        let mut reader = IoCursor::new(raw);
        VdkHeader::read(&mut reader).expect("stored VDK header bytes are always well-formed")
    }).unwrap_or(VdkHeader {
        magic: MAGIC,
        header_length: 12,
        version: 1,
        bw_compat: 0x10,
        source_id: 0,
        source_ver: 0,
        cylinders: 0,
        heads: 0,
        flags: 0,
        name_len_compression: 0,
    });

    header.header_length = 12 + extra.len() as u16;
    header.cylinders = cylinders as u8;
    header.heads = heads;
    header.flags = if disk.write_options.write_protect { 0x01 } else { 0x00 };

    let mut out = Vec::with_capacity(12 + extra.len() + (cylinders as usize) * (heads as usize) * NUM_SECTORS as usize * SSIZE);
    {
        let mut writer = IoCursor::new(&mut out);
        header.write(&mut writer)?;
    }
    out.extend_from_slice(extra);

    for cyl in 0..cylinders {
        for head in 0..heads {
            for sector in 1..=NUM_SECTORS {
                let mut buf = [0u8; SSIZE];
                crate::sector_io::read_sector(disk, cyl, head, sector, &mut buf)?;
                out.extend_from_slice(&buf);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vdk(extra_blob: &[u8]) -> Vec<u8> {
        let header = VdkHeader {
            magic: MAGIC,
            header_length: 12 + extra_blob.len() as u16,
            version: 3,
            bw_compat: 0x10,
            source_id: 7,
            source_ver: 2,
            cylinders: 1,
            heads: 1,
            flags: 0,
            name_len_compression: 0,
        };
        let mut out = Vec::new();
        {
            let mut writer = IoCursor::new(&mut out);
            header.write(&mut writer).unwrap();
        }
        out.extend_from_slice(extra_blob);
        for s in 0..NUM_SECTORS {
            out.extend(std::iter::repeat((s as u8).wrapping_add(1)).take(SSIZE));
        }
        out
    }

    #[test]
    fn header_extra_blob_survives_load_save_round_trip_scenario_4() {
        let extra = vec![0x42u8; 20];
        let file = sample_vdk(&extra);
        let disk = load(&file, true).unwrap();
        assert_eq!(disk.format_metadata.vdk_extra_bytes, extra);

        let saved = save(&disk).unwrap();
        let header_length = u16::from_le_bytes([saved[2], saved[3]]) as usize;
        assert_eq!(&saved[12..header_length], extra.as_slice());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut file = sample_vdk(&[]);
        file[0] = b'x';
        assert!(matches!(load(&file, true), Err(VdiskError::BadMagic)));
    }
}
