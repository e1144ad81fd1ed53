//! Virtual drive array (§4.G): up to four slots, each tracking head
//! position, rotational timing, and the four level-triggered signal
//! outputs a WD279x subscribes to.
//!
//! Per the cyclic-ownership design note (§9), the drive doesn't borrow
//! the controller back. It holds a registered `DriveSignalSink`
//! (the FDC, wrapped by the machine) and calls it only on an actual
//! level change, and it schedules its own index-pulse events against
//! a caller-supplied `EventQueue` rather than owning one.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::disk::DiskRef;
use crate::event::EventQueueRef;
use crate::idam::{Density, IdamEntry};

pub const NUM_DRIVES: usize = 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriveSignals: u8 {
        const READY         = 0b0001;
        const TRACK0        = 0b0010;
        const INDEX         = 0b0100;
        const WRITE_PROTECT = 0b1000;
    }
}

/// The two-way handshake the FDC registers with the drive array
/// (§9 "trait/capability" note): signal-level changes are pushed in,
/// rather than polled.
pub trait DriveSignalSink {
    fn on_signals_changed(&mut self, signals: DriveSignals);
}

struct Slot {
    disk: Option<DiskRef>,
    cylinder: u16,
    side: u8,
    /// Position of the data cursor within the currently selected
    /// track, kept independent of any in-flight FDC cursor so
    /// `time_to_next_idam`/`next_idam` can reason about wall-clock
    /// rotation without the controller's help.
    head_pos: usize,
    last_signals: DriveSignals,
    index_event: Option<crate::event::EventId>,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            disk: None,
            cylinder: 0,
            side: 0,
            head_pos: crate::idam::IDAM_TABLE_BYTES,
            last_signals: DriveSignals::empty(),
            index_event: None,
        }
    }
}

pub type DriveArrayRef = Rc<RefCell<DriveArray>>;

pub struct DriveArray {
    slots: [Slot; NUM_DRIVES],
    selected: usize,
    direction: i8,
    dden: bool,
    tick_rate: u64,
    sink: Option<Rc<RefCell<dyn DriveSignalSink>>>,
}

impl DriveArray {
    pub fn new(tick_rate: u64) -> DriveArrayRef {
        Rc::new(RefCell::new(DriveArray {
            slots: [Slot::empty(), Slot::empty(), Slot::empty(), Slot::empty()],
            selected: 0,
            direction: 1,
            dden: false,
            tick_rate,
            sink: None,
        }))
    }

    pub fn register_sink(&mut self, sink: Rc<RefCell<dyn DriveSignalSink>>) {
        self.sink = Some(sink);
    }

    fn density(&self) -> Density {
        if self.dden { Density::Double } else { Density::Single }
    }

    pub fn is_double_density(&self) -> bool {
        self.dden
    }

    fn selected_slot(&self) -> &Slot {
        &self.slots[self.selected]
    }

    fn selected_slot_mut(&mut self) -> &mut Slot {
        &mut self.slots[self.selected]
    }

    // -- Controller-facing setters (§4.G) ---------------------------------

    pub fn set_dirc(&mut self, dirc: i8) {
        self.direction = if dirc < 0 { -1 } else { 1 };
    }

    pub fn set_dden(&mut self, dden: bool) {
        self.dden = dden;
    }

    pub fn set_sso(&mut self, side: u8) {
        self.selected_slot_mut().side = side;
    }

    pub fn set_drive(&mut self, n: usize) {
        debug_assert!(n < NUM_DRIVES);
        self.selected = n.min(NUM_DRIVES - 1);
    }

    pub fn current_cylinder(&self) -> u16 {
        self.selected_slot().cylinder
    }

    /// Move the head by the latched direction, clamped to [0, 256).
    pub fn step(&mut self) {
        let slot = self.selected_slot_mut();
        let next = slot.cylinder as i32 + self.direction as i32;
        slot.cylinder = next.clamp(0, 255) as u16;
    }

    fn head_incr(&self) -> usize {
        if self.dden { 1 } else { 2 }
    }

    fn track_length(&self) -> Option<usize> {
        let slot = self.selected_slot();
        let disk = slot.disk.as_ref()?;
        Some(disk.borrow().track_length())
    }

    fn advance_head(&mut self, track_length: usize) -> bool {
        let incr = if self.dden { 1 } else { 2 };
        let slot = self.selected_slot_mut();
        slot.head_pos += incr;
        if slot.head_pos >= track_length {
            slot.head_pos = crate::idam::IDAM_TABLE_BYTES + (slot.head_pos - track_length);
            true
        } else {
            false
        }
    }

    /// Read the current track byte, advance by `head_incr`, and
    /// report whether the head wrapped (the caller raises the index
    /// line through `update_signals`/the index-pulse event).
    pub fn read(&mut self) -> Option<u8> {
        let track_length = self.track_length()?;
        let pos = self.selected_slot().head_pos;
        let byte = {
            let slot = self.selected_slot();
            let disk = slot.disk.as_ref()?;
            disk.borrow().track(slot.cylinder, slot.side).map(|t| t.read_byte(pos))?
        };
        self.advance_head(track_length);
        Some(byte)
    }

    /// As `read`, but discards the byte.
    pub fn skip(&mut self) {
        if let Some(track_length) = self.track_length() {
            self.advance_head(track_length);
        }
    }

    /// Write the current track byte; invalidate and re-sort any IDAM
    /// pointer that coincides with the new head position.
    pub fn write(&mut self, value: u8) -> VdiskIoResult {
        let track_length = match self.track_length() {
            Some(t) => t,
            None => return VdiskIoResult::NoDisk,
        };
        if self.selected_slot().disk.as_ref().map(|d| d.borrow().write_options.write_protect).unwrap_or(true) {
            return VdiskIoResult::WriteProtected;
        }

        let (cyl, side, pos) = {
            let slot = self.selected_slot();
            (slot.cylinder, slot.side, slot.head_pos)
        };
        if let Some(disk_ref) = self.selected_slot().disk.clone() {
            let mut disk = disk_ref.borrow_mut();
            if let Some(track) = disk.track_mut(cyl, side) {
                track.write_byte(pos, value);
                let mut table = track.idam_table();
                table.invalidate_at(pos as u16);
                track.set_idam_table(&table);
            }
        }
        self.advance_head(track_length);
        VdiskIoResult::Ok
    }

    /// Write `0xFE`; install a fresh IDAM pointer at the pre-write
    /// head position, replacing any pointer already there.
    pub fn write_idam(&mut self) -> VdiskIoResult {
        let density = self.density();
        let track_length = match self.track_length() {
            Some(t) => t,
            None => return VdiskIoResult::NoDisk,
        };
        let (cyl, side, pos) = {
            let slot = self.selected_slot();
            (slot.cylinder, slot.side, slot.head_pos)
        };
        if let Some(disk_ref) = self.selected_slot().disk.clone() {
            let mut disk = disk_ref.borrow_mut();
            if let Some(track) = disk.track_mut(cyl, side) {
                track.write_byte(pos, 0xFE);
                let mut table = track.idam_table();
                table.install(IdamEntry { offset: pos as u16, density });
                track.set_idam_table(&table);
            }
        }
        self.advance_head(track_length);
        VdiskIoResult::Ok
    }

    pub fn byte_time(&self) -> u64 {
        self.tick_rate / 31_250
    }

    pub fn time_to_next_byte(&self) -> u64 {
        self.byte_time()
    }

    /// Scan the IDAM table for the next entry of the current density
    /// whose offset exceeds `head_pos`, without moving the head.
    /// Returns cycles until that byte is under the head, or `None` if
    /// no disk/IDAM is present (caller should wait for the next index
    /// pulse instead).
    pub fn time_to_next_idam(&self) -> Option<u64> {
        let byte_time = self.byte_time();
        let density = self.density();
        let slot = self.selected_slot();
        let disk = slot.disk.as_ref()?;
        let disk = disk.borrow();
        let track = disk.track(slot.cylinder, slot.side)?;
        let incr = if self.dden { 1 } else { 2 };

        let mut best: Option<usize> = None;
        for entry in track.idam_table().iter() {
            if entry.density != density {
                continue;
            }
            if entry.offset as usize > slot.head_pos {
                best = Some(best.map_or(entry.offset as usize, |b| b.min(entry.offset as usize)));
            }
        }
        let target = best?;
        let bytes_away = (target - slot.head_pos) / incr.max(1);
        Some(bytes_away as u64 * byte_time)
    }

    /// As `time_to_next_idam`, but actually advances the head and
    /// returns the matching pointer; raises the index signal and
    /// returns `None` if the table has nothing ahead of `head_pos`.
    pub fn next_idam(&mut self) -> Option<IdamEntry> {
        let density = self.density();
        let (cyl, side) = {
            let slot = self.selected_slot();
            (slot.cylinder, slot.side)
        };
        let found = {
            let slot = self.selected_slot();
            let disk = slot.disk.as_ref()?;
            let disk = disk.borrow();
            let track = disk.track(cyl, side)?;
            track
                .idam_table()
                .iter()
                .filter(|e| e.density == density && e.offset as usize > slot.head_pos)
                .min_by_key(|e| e.offset)
        };
        match found {
            Some(entry) => {
                self.selected_slot_mut().head_pos = entry.offset as usize;
                Some(entry)
            }
            None => {
                self.selected_slot_mut().last_signals.insert(DriveSignals::INDEX);
                None
            }
        }
    }

    // -- Media + signals ---------------------------------------------------

    /// Install a disk in `slot`. Does not itself start the rotational
    /// index-pulse train: the array has no `Rc` handle to itself to
    /// hand the scheduled closures, so machine glue must follow this
    /// call with `schedule_index_pulse(&array_rc, slot, events)`.
    pub fn insert_disk(&mut self, slot: usize, disk: DiskRef) {
        self.slots[slot].disk = Some(disk);
        self.slots[slot].head_pos = crate::idam::IDAM_TABLE_BYTES;
        if slot == self.selected {
            self.update_signals();
        }
    }

    /// Eject and, if write-back is enabled, leave the disk's final
    /// contents for the caller to persist (save is a codec-layer
    /// concern, not the drive's).
    pub fn eject_disk(&mut self, slot: usize, events: &EventQueueRef) -> Option<DiskRef> {
        if let Some(id) = self.slots[slot].index_event.take() {
            events.borrow_mut().cancel(id);
        }
        let disk = self.slots[slot].disk.take();
        if slot == self.selected {
            self.update_signals();
        }
        disk
    }

    /// Recompute ready/tr00/index/write-protect for the selected
    /// drive and push only the bits that changed to the registered sink.
    pub fn update_signals(&mut self) {
        let slot = self.selected_slot();
        let mut signals = DriveSignals::empty();
        if let Some(disk) = &slot.disk {
            signals.insert(DriveSignals::READY);
            if disk.borrow().write_options.write_protect {
                signals.insert(DriveSignals::WRITE_PROTECT);
            }
        }
        if slot.cylinder == 0 {
            signals.insert(DriveSignals::TRACK0);
        }
        if slot.last_signals.contains(DriveSignals::INDEX) {
            signals.insert(DriveSignals::INDEX);
        }

        let slot = self.selected_slot_mut();
        if slot.last_signals != signals {
            slot.last_signals = signals;
            if let Some(sink) = self.sink.clone() {
                sink.borrow_mut().on_signals_changed(signals);
            }
        }
    }
}

/// Entry point for machine glue: start (or restart) the recurring
/// index-pulse pair for `slot`. The pulse raises INDEX when the head
/// would wrap past `track_length`, a second event drops it ~1% of a
/// rotation later, and the raise event re-queues the whole pair for
/// the next wrap (§4.G "index-pulse event... re-queues itself").
/// `array` and `events` are both `Rc` handles so the scheduled
/// closures can re-enter them when they fire.
pub fn schedule_index_pulse(array: &DriveArrayRef, slot: usize, events: &EventQueueRef) {
    let track_length = match array.borrow().slots[slot].disk.as_ref().map(|d| d.borrow().track_length()) {
        Some(t) => t,
        None => return,
    };
    let byte_time = array.borrow().byte_time();
    let rotation_ticks = track_length as u64 * byte_time;

    let at = events.borrow().current_tick() + rotation_ticks;
    let raise_array = array.clone();
    let raise_events = events.clone();
    let id = events.borrow_mut().queue(at, move || {
        {
            let mut a = raise_array.borrow_mut();
            a.slots[slot].last_signals.insert(DriveSignals::INDEX);
            if slot == a.selected {
                a.update_signals();
            }
        }
        schedule_index_pulse(&raise_array, slot, &raise_events);
    });
    array.borrow_mut().slots[slot].index_event = Some(id);

    let drop_delay = rotation_ticks / 100;
    let drop_array = array.clone();
    let drop_at = at + drop_delay.max(1);
    let _ = events.borrow_mut().queue(drop_at, move || {
        let mut a = drop_array.borrow_mut();
        a.slots[slot].last_signals.remove(DriveSignals::INDEX);
        if slot == a.selected {
            a.update_signals();
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdiskIoResult {
    Ok,
    NoDisk,
    WriteProtected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Disk, DiskGeometry};
    use crate::formatter::{format_track, FormatParams};

    fn disk_with_one_track() -> DiskRef {
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
        disk.into_ref()
    }

    #[test]
    fn step_is_clamped_to_non_negative() {
        let array = DriveArray::new(1_000_000);
        let mut a = array.borrow_mut();
        a.set_dirc(-1);
        a.step();
        assert_eq!(a.current_cylinder(), 0);
    }

    #[test]
    fn write_protected_disk_refuses_writes() {
        let array = DriveArray::new(1_000_000);
        let disk = disk_with_one_track();
        disk.borrow_mut().write_options.write_protect = true;
        array.borrow_mut().insert_disk(0, disk);

        let result = array.borrow_mut().write(0xAA);
        assert_eq!(result, VdiskIoResult::WriteProtected);
    }

    #[test]
    fn inserting_a_disk_raises_ready() {
        let array = DriveArray::new(1_000_000);
        let disk = disk_with_one_track();
        array.borrow_mut().insert_disk(0, disk);
        assert!(array.borrow().slots[0].last_signals.contains(DriveSignals::READY));
    }

    #[test]
    fn index_pulse_raises_and_then_drops_the_index_line() {
        use crate::event::{pump, EventQueue};
        use std::cell::RefCell as StdRefCell;

        let array = DriveArray::new(1_000_000);
        let disk = disk_with_one_track();
        array.borrow_mut().insert_disk(0, disk);
        let events: crate::event::EventQueueRef = std::rc::Rc::new(StdRefCell::new(EventQueue::new()));
        schedule_index_pulse(&array, 0, &events);

        let track_length = array.borrow().slots[0].disk.as_ref().unwrap().borrow().track_length() as u64;
        let byte_time = array.borrow().byte_time();
        let rotation_ticks = track_length * byte_time;

        pump(&events, rotation_ticks);
        assert!(array.borrow().slots[0].last_signals.contains(DriveSignals::INDEX));

        pump(&events, rotation_ticks + rotation_ticks / 100 + 1);
        assert!(!array.borrow().slots[0].last_signals.contains(DriveSignals::INDEX));
    }
}
