//! The disk container (§3 "Disk", §4.C).
//!
//! A disk owns a dense, side-indexed array of per-cylinder track
//! buffers, allocated lazily as writes touch new cylinders/heads.
//! Disks are shared via `Rc<RefCell<Disk>>` (§5, §10.5): the whole
//! subsystem is single-threaded and cooperatively scheduled, so there
//! is no need for atomics or a multi-threaded-capable lock.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{VdiskError, VdiskResult};
use crate::track::{Track, MAX_TRACK_LENGTH, MIN_TRACK_LENGTH};

pub const MAX_CYLINDERS: u16 = 256;
pub const MAX_HEADS: u8 = 2;

pub type DiskRef = Rc<RefCell<Disk>>;

/// Drives the track-length derivation of §4.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    pub data_rate_bps: u32,
    pub rpm: u32,
}

impl DiskGeometry {
    /// `round_up_to_32((data_rate * 60) / (8 * rpm)) + 128`, clamped
    /// to `[MIN_TRACK_LENGTH, MAX_TRACK_LENGTH]`.
    pub fn track_length(&self) -> usize {
        let raw = (self.data_rate_bps as u64 * 60) / (8 * self.rpm as u64);
        let rounded = ((raw + 31) / 32) * 32;
        let with_header = rounded as usize + 128;
        with_header.clamp(MIN_TRACK_LENGTH, MAX_TRACK_LENGTH)
    }
}

/// The container format a disk was loaded from / will be saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Vdk,
    Jvc,
    Dmk,
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub write_back: bool,
    pub write_protect: bool,
}

/// Format-specific metadata that must survive a load/save round-trip
/// even though it has no bearing on sector data (§8 scenario 4).
#[derive(Debug, Clone, Default)]
pub struct FormatMetadata {
    /// VDK's opaque header extension blob (bytes 12..header_length).
    pub vdk_extra_bytes: Vec<u8>,
    /// The 12-byte VDK main header as loaded, preserved verbatim so a
    /// later save can reuse its version/source/compat bytes; only
    /// `cylinders`, `heads`, and `flags` are recomputed at save time.
    pub vdk_original_header: Option<[u8; 12]>,
    /// JVC "headerless OS-9" auto-detection flag (§4.D).
    pub jvc_headerless_os9: bool,
}

#[derive(Debug, Clone)]
pub struct Disk {
    track_length: usize,
    /// Outer index: head. Inner index: cylinder. Dense and
    /// lazily-grown in both dimensions (§3 "Tracks are allocated
    /// lazily").
    tracks: Vec<Vec<Track>>,
    pub write_options: WriteOptions,
    pub filename: Option<String>,
    pub filetype: Option<FileType>,
    pub format_metadata: FormatMetadata,
}

impl Disk {
    pub fn new(geometry: DiskGeometry) -> Self {
        Disk {
            track_length: geometry.track_length(),
            tracks: Vec::new(),
            write_options: WriteOptions::default(),
            filename: None,
            filetype: None,
            format_metadata: FormatMetadata::default(),
        }
    }

    /// Construct directly from an already-known track length, as
    /// codecs do when loading a file whose track length is given by
    /// the container header rather than derived from data rate/rpm.
    pub fn with_track_length(track_length: usize) -> Self {
        Disk {
            track_length: track_length.clamp(MIN_TRACK_LENGTH, MAX_TRACK_LENGTH),
            tracks: Vec::new(),
            write_options: WriteOptions::default(),
            filename: None,
            filetype: None,
            format_metadata: FormatMetadata::default(),
        }
    }

    pub fn into_ref(self) -> DiskRef {
        Rc::new(RefCell::new(self))
    }

    pub fn track_length(&self) -> usize {
        self.track_length
    }

    pub fn num_heads(&self) -> u8 {
        self.tracks.len() as u8
    }

    pub fn num_cylinders(&self) -> u16 {
        self.tracks.iter().map(|side| side.len() as u16).max().unwrap_or(0)
    }

    /// `track_base`: look up a track without extending geometry.
    pub fn track(&self, cylinder: u16, head: u8) -> Option<&Track> {
        self.tracks.get(head as usize)?.get(cylinder as usize)
    }

    pub fn track_mut(&mut self, cylinder: u16, head: u8) -> Option<&mut Track> {
        self.tracks.get_mut(head as usize)?.get_mut(cylinder as usize)
    }

    /// Grow the side/cylinder arrays as needed, zero-filling newly
    /// added tracks, and return the (cylinder, head) track.
    pub fn extend(&mut self, cylinder: u16, head: u8) -> VdiskResult<&mut Track> {
        if cylinder >= MAX_CYLINDERS || head >= MAX_HEADS {
            return Err(VdiskError::BadGeometry { cylinders: cylinder + 1, heads: head + 1 });
        }

        while self.tracks.len() <= head as usize {
            self.tracks.push(Vec::new());
        }
        let side = &mut self.tracks[head as usize];
        while side.len() <= cylinder as usize {
            side.push(Track::new(self.track_length));
        }
        Ok(&mut side[cylinder as usize])
    }

    /// Iterate over all currently-allocated (cylinder, head) pairs.
    pub fn iter_tracks(&self) -> impl Iterator<Item = (u16, u8, &Track)> {
        self.tracks.iter().enumerate().flat_map(|(head, side)| {
            side.iter().enumerate().map(move |(cyl, track)| (cyl as u16, head as u8, track))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_length_matches_scenario_1() {
        let geom = DiskGeometry { data_rate_bps: 250_000, rpm: 300 };
        // (250000 * 60) / (8 * 300) = 6250, rounded up to a multiple of 32 is
        // 6272, plus the 128-byte IDAM table header = 6400 = 0x1900.
        assert_eq!(geom.track_length(), 0x1900);
    }

    #[test]
    fn extend_allocates_lazily_and_zero_fills() {
        let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
        assert!(disk.track(2, 1).is_none());
        disk.extend(2, 1).unwrap();
        assert!(disk.track(2, 1).is_some());
        assert_eq!(disk.track(2, 1).unwrap().as_slice().iter().all(|&b| b == 0), true);
        assert_eq!(disk.num_heads(), 2);
        assert_eq!(disk.num_cylinders(), 3);
    }

    #[test]
    fn extend_rejects_out_of_range_geometry() {
        let mut disk = Disk::new(DiskGeometry { data_rate_bps: 250_000, rpm: 300 });
        assert!(disk.extend(256, 0).is_err());
        assert!(disk.extend(0, 2).is_err());
    }
}
