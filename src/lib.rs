//! # floppy_core
//!
//! `floppy_core` emulates the floppy disk subsystem of an 8-bit home
//! computer emulator: an in-memory virtual disk model with VDK,
//! JVC/DSK/OS9, and DMK container codecs, a virtual drive array
//! handling head positioning and rotational timing, and a
//! cycle-driven WD279x-compatible floppy disk controller.
//!
//! The three pieces compose bottom-up: [`disk::Disk`] owns [`track::Track`]
//! buffers and their [`idam::IdamTable`] pointers; [`drive::DriveArray`]
//! positions a head over a disk's tracks and derives rotational signals
//! from [`event::EventQueue`] ticks; [`fdc::Fdc`] drives a [`drive::DriveArrayRef`]
//! through the WD command set, byte at a time, exactly as a real
//! controller would see only a serial bit stream and never a sector API.
//!
//! [`sector_io`] and [`formats`] sit alongside the controller as a
//! higher-level convenience surface for codec authors who want to read
//! or write whole sectors without stepping the state machine.

pub mod chs;
pub mod crc;
pub mod cursor;
pub mod disk;
pub mod drive;
pub mod error;
pub mod event;
pub mod fdc;
pub mod formats;
pub mod formatter;
pub mod idam;
pub mod sector_io;
pub mod track;
pub mod util;

pub use crate::disk::{Disk, DiskGeometry, DiskRef, FileType};
pub use crate::drive::{DriveArray, DriveArrayRef, DriveSignalSink, DriveSignals, NUM_DRIVES};
pub use crate::error::{VdiskError, VdiskResult};
pub use crate::event::{EventQueue, EventQueueRef, Tick};
pub use crate::fdc::{Fdc, FdcRef};
pub use crate::formats::VdiskFormat;
