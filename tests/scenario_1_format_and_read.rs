use floppy_core::disk::{Disk, DiskGeometry};
use floppy_core::formatter::{format_track, FormatParams};
use floppy_core::sector_io::{get_info, read_sector, DiskDensity};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn format_then_read_back_scenario_1() {
    init();
    let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
    for cylinder in 0..35u16 {
        let params = FormatParams {
            dden: true,
            cylinder,
            head: 0,
            num_sectors: 18,
            first_sector: 1,
            ssize_code: 1,
            interleave: 1,
        };
        format_track(&mut disk, &params).unwrap();
    }

    let mut buf = [0u8; 256];
    let result = read_sector(&disk, 0, 0, 5, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0xE5));
    assert!(!result.idam_crc_error);
    assert!(!result.data_crc_error);

    let info = get_info(&disk).unwrap();
    assert_eq!(info.num_cylinders, 35);
    assert_eq!(info.num_heads, 1);
    assert_eq!(info.num_sectors, 18);
    assert_eq!(info.first_sector_id, 1);
    assert_eq!(info.ssize_code, Some(1));
    assert_eq!(info.density, DiskDensity::Double);
}
