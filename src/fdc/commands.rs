//! Command decode and the state-machine engine (§4.H).
//!
//! `run` is the `goto`-replacement loop from §9: it keeps advancing
//! through zero-delay transitions inline, and returns to the
//! cooperative event loop as soon as a state schedules a positive
//! delay. States are free functions taking `&FdcRef` and returning
//! the next transition, rather than one giant match arm, so each
//! command family reads as its own short routine.

use log::{debug, trace, warn};

use crate::chs::ssize_for_code;
use crate::idam::{Density, IdamEntry};

use super::states::State;
use super::{ms_to_ticks, CommandFlags, CommandType, Fdc, FdcRef, ForceInterruptEnables, StatusFlags, FORCED_WRITE_DELAY_MS, HEAD_SETTLE_MS, STEP_RATES_MS};

const DAM_SCAN_LIMIT_SD: u32 = 30;
const DAM_SCAN_LIMIT_DD: u32 = 43;
const MAX_SEEK_INDEX_HOLES: u32 = 5;
const MAX_READ_ADDRESS_INDEX_HOLES: u32 = 6;

enum Transition {
    /// Fall straight through to the next state with no delay.
    Now(State),
    /// Schedule a continuation after `ticks` and return to the event loop.
    After(u64, State),
    /// The command is finished: BUSY cleared, INTRQ raised.
    Done,
}

fn decode(cmd: u8) -> (CommandType, CommandFlags) {
    let top = cmd >> 4;
    let mut flags = CommandFlags::default();

    let ty = match top {
        0x0 | 0x1 | 0x2 | 0x3 | 0x4 | 0x5 | 0x6 | 0x7 => {
            flags.step_rate_index = cmd & 0x03;
            flags.verify = cmd & 0x04 != 0;
            flags.update_track_register = cmd & 0x10 != 0;
            CommandType::I
        }
        0x8 | 0x9 | 0xA | 0xB => {
            flags.head_settle = cmd & 0x04 != 0;
            flags.side_select = Some((cmd >> 3) & 0x01);
            flags.multiple_sectors = top == 0x9 || top == 0xB;
            flags.deleted_dam = cmd & 0x01 != 0;
            CommandType::II
        }
        0xD => CommandType::IV,
        0xC | 0xE | 0xF => {
            flags.head_settle = cmd & 0x04 != 0;
            CommandType::III
        }
        _ => unreachable!(),
    };
    (ty, flags)
}

pub fn accept_command(fdc: &FdcRef, cmd: u8) {
    let (ty, flags) = decode(cmd);

    if ty == CommandType::IV {
        force_interrupt(fdc, cmd);
        return;
    }

    {
        let mut this = fdc.borrow_mut();
        if this.status.contains(StatusFlags::BUSY) {
            debug!("FDC busy, ignoring command 0x{cmd:02x}");
            return;
        }
        this.command = cmd;
        this.command_type = ty;
        this.flags = flags;
        this.status = StatusFlags::BUSY;
        this.intrq = false;
        this.drq = false;
        this.index_count = 0;
        this.settle_applied = false;
        this.state = State::AcceptCommand;
    }
    debug!("FDC accept_command: 0x{cmd:02x} ({ty})");
    run(fdc);
}

fn force_interrupt(fdc: &FdcRef, cmd: u8) {
    let mut this = fdc.borrow_mut();
    this.cancel_pending();
    this.force_enables = ForceInterruptEnables::from_bits_truncate(cmd & 0x0F);
    this.status.remove(StatusFlags::BUSY);
    debug!("forced-interrupt enables set to {:?}", this.force_enables);
    if this.force_enables.contains(ForceInterruptEnables::IMMEDIATE) {
        this.intrq = true;
    }
}

/// The engine loop: advance through zero-delay transitions inline,
/// scheduling a continuation and returning at the first positive delay.
pub fn run(fdc: &FdcRef) {
    loop {
        let state = fdc.borrow().state;
        trace!("FDC state {state}");
        let transition = dispatch(fdc, state);
        match transition {
            Transition::Now(next) => {
                fdc.borrow_mut().state = next;
            }
            Transition::After(ticks, next) => {
                Fdc::schedule(fdc, ticks, next);
                return;
            }
            Transition::Done => {
                let mut this = fdc.borrow_mut();
                this.raise_intrq();
                debug!("FDC command 0x{:02x} complete, status {:?}", this.command, this.status);
                return;
            }
        }
    }
}

fn dispatch(fdc: &FdcRef, state: State) -> Transition {
    match state {
        State::AcceptCommand => match fdc.borrow().command_type {
            CommandType::I => type1_entry(fdc),
            CommandType::II => type2_1(fdc),
            CommandType::III => type3_1(fdc),
            // Type IV never reaches the engine: `accept_command` handles
            // force-interrupt directly and returns without calling `run`.
            CommandType::IV => Transition::Done,
        },
        State::Type1_1 => type1_1(fdc),
        State::Type1_2 => type1_2(fdc),
        State::Type1_3 => type1_3(fdc),
        State::VerifyTrack1 => verify_track_1(fdc),
        State::VerifyTrack2 => verify_track_2(fdc),
        State::Type2_1 => type2_1(fdc),
        State::Type2_2 => type2_2(fdc),
        State::ReadSector1 => read_sector_1(fdc),
        State::ReadSector2 => read_sector_2(fdc),
        State::ReadSector3 => read_sector_3(fdc),
        State::WriteSector1 => write_sector_1(fdc),
        State::WriteSector2 => write_sector_2(fdc),
        State::WriteSector3 => write_sector_3(fdc),
        State::WriteSector4 => write_sector_4(fdc),
        State::WriteSector5 => write_sector_5(fdc),
        State::WriteSector6 => write_sector_6(fdc),
        State::Type3_1 => type3_1(fdc),
        State::ReadAddress1 => read_address_1(fdc),
        State::ReadAddress2 => read_address_2(fdc),
        State::ReadAddress3 => read_address_3(fdc),
        State::WriteTrack1 => write_track_1(fdc),
        State::WriteTrack2 => write_track_2(fdc),
        State::WriteTrack2b => write_track_2b(fdc),
        State::WriteTrack3 => write_track_3(fdc),
    }
}

// ---------------------------------------------------------------------
// Type I: Restore / Seek / Step / Step-in / Step-out (§4.H)
// ---------------------------------------------------------------------

fn type1_entry(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    match this.command >> 4 {
        0x0 => {
            this.track_register = 0xFF;
            this.data_register = 0;
        }
        _ => {}
    }
    Transition::Now(State::Type1_1)
}

fn step_delay(fdc: &Fdc) -> u64 {
    ms_to_ticks(fdc.tick_rate, STEP_RATES_MS[fdc.flags.step_rate_index as usize])
}

fn type1_1(fdc: &FdcRef) -> Transition {
    let top = fdc.borrow().command >> 4;
    match top {
        0x0 | 0x1 => {
            // Restore / Seek: compare data register to track register.
            let (track, data) = {
                let this = fdc.borrow();
                (this.track_register, this.data_register)
            };
            if track == data {
                Transition::Now(State::VerifyTrack1)
            } else {
                let dirc = if data > track { 1 } else { -1 };
                fdc.borrow().drive.borrow_mut().set_dirc(dirc);
                fdc.borrow().drive.borrow_mut().step();
                let mut this = fdc.borrow_mut();
                this.track_register = this.track_register.wrapping_add(dirc as u8);
                let delay = step_delay(&this);
                Transition::After(delay, State::Type1_1)
            }
        }
        _ => {
            // Step / Step-in / Step-out: one step using latched or implied direction.
            let dirc: i8 = match top {
                0x2 | 0x3 => fdc.borrow().last_direction(),
                0x4 | 0x5 => 1,
                0x6 | 0x7 => -1,
                _ => unreachable!(),
            };
            {
                let mut this = fdc.borrow_mut();
                this.set_last_direction(dirc);
                if this.flags.update_track_register {
                    this.track_register = this.track_register.wrapping_add(dirc as u8);
                }
            }
            fdc.borrow().drive.borrow_mut().set_dirc(dirc);
            fdc.borrow().drive.borrow_mut().step();

            let tr00 = fdc.borrow().drive_signals.contains(crate::drive::DriveSignals::TRACK0);
            if dirc < 0 && tr00 {
                fdc.borrow_mut().track_register = 0;
                return Transition::Now(State::VerifyTrack1);
            }
            let delay = step_delay(&fdc.borrow());
            Transition::After(delay, State::Type1_2)
        }
    }
}

fn type1_2(_fdc: &FdcRef) -> Transition {
    Transition::Now(State::VerifyTrack1)
}

fn type1_3(_fdc: &FdcRef) -> Transition {
    Transition::Done
}

fn verify_track_1(fdc: &FdcRef) -> Transition {
    if !fdc.borrow().flags.verify {
        return Transition::Done;
    }
    fdc.borrow_mut().index_count = 0;
    Transition::Now(State::VerifyTrack2)
}

fn verify_track_2(fdc: &FdcRef) -> Transition {
    let found = fdc.borrow_mut().drive.borrow_mut().next_idam();
    match found {
        Some(entry) => {
            let matches = verify_idam_crc_and_track(fdc, entry);
            if matches {
                Transition::Done
            } else {
                retry_verify_or_seek_error(fdc)
            }
        }
        None => retry_verify_or_seek_error(fdc),
    }
}

fn retry_verify_or_seek_error(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    this.index_count += 1;
    if this.index_count >= MAX_SEEK_INDEX_HOLES {
        this.status.insert(StatusFlags::SEEK_OR_RNF);
        Transition::Done
    } else {
        Transition::Now(State::VerifyTrack2)
    }
}

/// Read an IDAM's 7-byte record through the drive's raw byte
/// primitives, feeding the FDC's own CRC accumulator, and report
/// whether the track field matches and the CRC is clean. Per §9's
/// documented open question, a track mismatch is tolerated elsewhere
/// (sector find); only `verify` actually checks it, per WD279x
/// datasheet behavior.
fn verify_idam_crc_and_track(fdc: &FdcRef, entry: IdamEntry) -> bool {
    let mut this = fdc.borrow_mut();
    this.crc.reset(entry.density == Density::Double);
    let (marker, track_field, head_field, sector_field, ssize_field, crc_hi, crc_lo) = {
        let mut drive = this.drive.borrow_mut();
        (drive.read(), drive.read(), drive.read(), drive.read(), drive.read(), drive.read(), drive.read())
    };
    for byte in [marker, track_field, head_field, sector_field, ssize_field, crc_hi, crc_lo].into_iter().flatten() {
        this.crc.feed(byte);
    }
    track_field == Some(this.track_register) && this.crc.is_clean()
}

// ---------------------------------------------------------------------
// Type II: Read sector / Write sector (§4.H)
// ---------------------------------------------------------------------

fn type2_1(fdc: &FdcRef) -> Transition {
    let is_write = fdc.borrow().command >> 4 >= 0xA;
    if is_write && fdc.borrow().drive_signals.contains(crate::drive::DriveSignals::WRITE_PROTECT) {
        fdc.borrow_mut().status.insert(StatusFlags::WRITE_PROTECT);
        return Transition::Done;
    }
    // The Type II algorithm names this delay 30 ms, not the 15 ms the
    // generic Type II/III command-flag table gives for the E flag; the
    // algorithm's own wording wins (see DESIGN.md open question decisions).
    if fdc.borrow().flags.head_settle {
        let delay = ms_to_ticks(fdc.borrow().tick_rate, FORCED_WRITE_DELAY_MS);
        return Transition::After(delay, State::Type2_2);
    }
    Transition::Now(State::Type2_2)
}

fn type2_2(fdc: &FdcRef) -> Transition {
    let sector = fdc.borrow().sector_register;
    let found = loop {
        let entry = fdc.borrow_mut().drive.borrow_mut().next_idam();
        match entry {
            Some(e) => {
                let mut this = fdc.borrow_mut();
                this.crc.reset(e.density == Density::Double);
                let (marker, track_field, head_field, sector_field, ssize_field, crc_hi, crc_lo) = {
                    let mut drive = this.drive.borrow_mut();
                    (drive.read(), drive.read(), drive.read(), drive.read(), drive.read(), drive.read(), drive.read())
                };
                for byte in [marker, track_field, head_field, sector_field, ssize_field, crc_hi, crc_lo].into_iter().flatten() {
                    this.crc.feed(byte);
                }
                let matches_crc = this.crc.is_clean();
                if sector_field == Some(sector) && matches_crc {
                    this.located_ssize_code = ssize_field.unwrap_or(1);
                    drop(this);
                    break Some(e);
                }
            }
            None => break None,
        }
    };

    match found {
        Some(_) => {
            if fdc.borrow().command >> 4 >= 0xA {
                Transition::Now(State::WriteSector1)
            } else {
                Transition::Now(State::ReadSector1)
            }
        }
        None => {
            fdc.borrow_mut().status.insert(StatusFlags::SEEK_OR_RNF);
            Transition::Done
        }
    }
}

fn read_sector_1(fdc: &FdcRef) -> Transition {
    let dd = fdc.borrow().drive.borrow().is_double_density();
    let limit = if dd { DAM_SCAN_LIMIT_DD } else { DAM_SCAN_LIMIT_SD };
    let mut found_dam = None;
    for _ in 0..limit {
        let byte = fdc.borrow_mut().drive.borrow_mut().read();
        if matches!(byte, Some(0xF8) | Some(0xFB)) {
            found_dam = byte;
            break;
        }
    }
    match found_dam {
        Some(dam) => {
            let mut this = fdc.borrow_mut();
            this.dam_byte = dam;
            this.status.set(StatusFlags::RECORD_TYPE, dam == 0xF8);
            this.crc.reset(dd);
            this.crc.feed(dam);
            this.bytes_left = ssize_for_code(current_ssize_code(&this)).unwrap_or(256);
            Transition::Now(State::ReadSector2)
        }
        None => {
            fdc.borrow_mut().status.insert(StatusFlags::SEEK_OR_RNF);
            Transition::Done
        }
    }
}

fn current_ssize_code(this: &Fdc) -> u8 {
    this.located_ssize_code
}

fn read_sector_2(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    if this.bytes_left == 0 {
        return Transition::Now(State::ReadSector3);
    }
    let byte = this.drive.clone().borrow_mut().read().unwrap_or(0);
    this.crc.feed(byte);
    this.data_register = byte;
    this.bytes_left -= 1;
    this.raise_drq();
    let bt = this.byte_time();
    drop(this);
    Transition::After(bt, State::ReadSector2)
}

fn read_sector_3(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    if this.drq {
        warn!("FDC lost data: host did not read last sector byte in time");
        this.status.insert(StatusFlags::TRACK0_OR_LOST);
    }
    let (crc_hi, crc_lo) = {
        let mut drive = this.drive.borrow_mut();
        (drive.read(), drive.read())
    };
    for byte in [crc_hi, crc_lo].into_iter().flatten() {
        this.crc.feed(byte);
    }
    this.status.set(StatusFlags::CRC_ERROR, !this.crc.is_clean());
    let multiple = this.flags.multiple_sectors;
    let crc_ok = this.crc.is_clean();
    drop(this);

    if multiple && crc_ok {
        fdc.borrow_mut().sector_register = fdc.borrow().sector_register.wrapping_add(1);
        Transition::Now(State::Type2_1)
    } else {
        Transition::Done
    }
}

fn write_sector_1(fdc: &FdcRef) -> Transition {
    let dd = fdc.borrow().drive.borrow().is_double_density();
    let gap = if dd { 22 } else { 11 };
    for _ in 0..gap {
        fdc.borrow_mut().drive.borrow_mut().skip();
    }
    Transition::Now(State::WriteSector2)
}

fn write_sector_2(fdc: &FdcRef) -> Transition {
    let dd = fdc.borrow().drive.borrow().is_double_density();
    let sync_len = if dd { 12 } else { 6 };
    for _ in 0..sync_len {
        fdc.borrow_mut().drive.borrow_mut().write(0x00);
    }
    Transition::Now(State::WriteSector3)
}

fn write_sector_3(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    let dd = this.drive.borrow().is_double_density();
    let dam = if this.flags.deleted_dam { 0xF8 } else { 0xFB };
    this.crc.reset(dd);
    this.drive.clone().borrow_mut().write(dam);
    this.crc.feed(dam);
    this.bytes_left = ssize_for_code(current_ssize_code(&this)).unwrap_or(256);
    this.raise_drq();
    Transition::Now(State::WriteSector4)
}

fn write_sector_4(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    if this.bytes_left == 0 {
        return Transition::Now(State::WriteSector5);
    }
    let byte = if this.drq {
        warn!("FDC lost data: host did not supply next sector byte in time");
        this.status.insert(StatusFlags::TRACK0_OR_LOST);
        0
    } else {
        this.data_register
    };
    this.drive.clone().borrow_mut().write(byte);
    this.crc.feed(byte);
    this.bytes_left -= 1;
    this.raise_drq();
    let bt = this.byte_time();
    drop(this);
    Transition::After(bt, State::WriteSector4)
}

fn write_sector_5(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    let bytes = this.crc.bytes();
    let mut drive = this.drive.borrow_mut();
    drive.write(bytes[0]);
    drive.write(bytes[1]);
    drive.write(0xFE);
    drop(drive);
    Transition::Now(State::WriteSector6)
}

fn write_sector_6(fdc: &FdcRef) -> Transition {
    let multiple = fdc.borrow().flags.multiple_sectors;
    if multiple {
        fdc.borrow_mut().sector_register = fdc.borrow().sector_register.wrapping_add(1);
        Transition::Now(State::Type2_1)
    } else {
        Transition::Done
    }
}

// ---------------------------------------------------------------------
// Type III: Read address / Read track / Write track (§4.H)
// ---------------------------------------------------------------------

fn type3_1(fdc: &FdcRef) -> Transition {
    if fdc.borrow().flags.head_settle && !fdc.borrow().settle_applied {
        fdc.borrow_mut().settle_applied = true;
        let delay = ms_to_ticks(fdc.borrow().tick_rate, HEAD_SETTLE_MS);
        return Transition::After(delay, State::Type3_1);
    }
    match fdc.borrow().command >> 4 {
        0xC => {
            fdc.borrow_mut().index_count = 0;
            Transition::Now(State::ReadAddress1)
        }
        0xF => Transition::Now(State::WriteTrack1),
        // Read Track (0xE_): not implemented upstream; completes immediately.
        _ => Transition::Done,
    }
}

fn read_address_1(fdc: &FdcRef) -> Transition {
    let entry = fdc.borrow_mut().drive.borrow_mut().next_idam();
    match entry {
        Some(e) => {
            let mut this = fdc.borrow_mut();
            this.crc.reset(e.density == Density::Double);
            let marker = this.drive.clone().borrow_mut().read();
            if let Some(m) = marker {
                this.crc.feed(m);
            }
            this.bytes_left = 6;
            Transition::Now(State::ReadAddress2)
        }
        None => {
            let mut this = fdc.borrow_mut();
            this.index_count += 1;
            if this.index_count >= MAX_READ_ADDRESS_INDEX_HOLES {
                this.status.insert(StatusFlags::SEEK_OR_RNF);
                Transition::Done
            } else {
                Transition::Now(State::ReadAddress1)
            }
        }
    }
}

fn read_address_2(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    if this.bytes_left == 0 {
        return Transition::Now(State::ReadAddress3);
    }
    let byte = this.drive.clone().borrow_mut().read().unwrap_or(0);
    this.crc.feed(byte);
    this.data_register = byte;
    if this.bytes_left == 6 {
        this.track_register = byte;
    }
    this.bytes_left -= 1;
    this.raise_drq();
    let bt = this.byte_time();
    drop(this);
    Transition::After(bt, State::ReadAddress2)
}

fn read_address_3(fdc: &FdcRef) -> Transition {
    let mut this = fdc.borrow_mut();
    this.status.set(StatusFlags::CRC_ERROR, !this.crc.is_clean());
    Transition::Done
}

fn write_track_1(fdc: &FdcRef) -> Transition {
    fdc.borrow_mut().raise_drq();
    Transition::Now(State::WriteTrack2)
}

fn write_track_2(fdc: &FdcRef) -> Transition {
    let at_index = fdc.borrow().drive_signals.contains(crate::drive::DriveSignals::INDEX);
    if at_index {
        fdc.borrow_mut().index_count = 0;
        Transition::Now(State::WriteTrack2b)
    } else {
        // Wait for the index pulse a byte-time at a stretch rather than
        // spinning: `Now` never hands control back to the event loop, so
        // the recurring index event that would set this flag could never fire.
        let bt = fdc.borrow().byte_time();
        Transition::After(bt, State::WriteTrack2)
    }
}

fn write_track_2b(fdc: &FdcRef) -> Transition {
    let dd = fdc.borrow().drive.borrow().is_double_density();
    let byte = fdc.borrow().data_register;
    let mut this = fdc.borrow_mut();
    this.drq = false;

    if dd {
        match byte {
            0xF5 => {
                this.crc.reset(true);
                this.drive.clone().borrow_mut().write(0xA1);
            }
            0xF6 => {
                this.drive.clone().borrow_mut().write(0xC2);
            }
            0xF7 => {
                let bytes = this.crc.bytes();
                let mut drive = this.drive.borrow_mut();
                drive.write(bytes[0]);
                drive.write(bytes[1]);
            }
            0xFE => {
                this.drive.clone().borrow_mut().write_idam();
                this.crc.reset(true);
                this.crc.feed(0xFE);
            }
            other => {
                this.drive.clone().borrow_mut().write(other);
                this.crc.feed(other);
            }
        }
    } else {
        match byte {
            0xF7 => {
                let bytes = this.crc.bytes();
                let mut drive = this.drive.borrow_mut();
                drive.write(bytes[0]);
                drive.write(bytes[1]);
            }
            0xF8..=0xFB => {
                this.crc.reset(false);
                this.crc.feed(byte);
                this.drive.clone().borrow_mut().write(byte);
            }
            0xFE => {
                this.drive.clone().borrow_mut().write_idam();
                this.crc.reset(false);
                this.crc.feed(0xFE);
            }
            other => {
                this.drive.clone().borrow_mut().write(other);
                this.crc.feed(other);
            }
        }
    }
    this.raise_drq();
    Transition::Now(State::WriteTrack3)
}

fn write_track_3(fdc: &FdcRef) -> Transition {
    let at_index = fdc.borrow().drive_signals.contains(crate::drive::DriveSignals::INDEX);
    if at_index {
        Transition::Done
    } else {
        let bt = fdc.borrow().byte_time();
        Transition::After(bt, State::WriteTrack2b)
    }
}

// ---------------------------------------------------------------------
// Small accessors kept on `Fdc` itself so command bodies stay terse.
// ---------------------------------------------------------------------

impl Fdc {
    fn last_direction(&self) -> i8 {
        self.latched_direction
    }

    fn set_last_direction(&mut self, dirc: i8) {
        self.latched_direction = dirc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveArray;
    use crate::event::EventQueue;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TICK_RATE: u64 = 1_000_000;

    #[test]
    fn decode_recognizes_all_four_command_types() {
        assert_eq!(decode(0x00).0, CommandType::I); // Restore
        assert_eq!(decode(0x18).0, CommandType::I); // Seek
        assert_eq!(decode(0x80).0, CommandType::II); // Read Sector
        assert_eq!(decode(0xA0).0, CommandType::II); // Write Sector
        assert_eq!(decode(0xC0).0, CommandType::III); // Read Address
        assert_eq!(decode(0xF0).0, CommandType::III); // Write Track
        assert_eq!(decode(0xD8).0, CommandType::IV); // Force Interrupt
    }

    #[test]
    fn seek_steps_the_drive_to_the_target_track_and_raises_intrq() {
        let array = DriveArray::new(TICK_RATE);
        let events: crate::event::EventQueueRef = Rc::new(RefCell::new(EventQueue::new()));
        let fdc = Fdc::new(array.clone(), events.clone(), TICK_RATE);
        array.borrow_mut().register_sink(fdc.clone());

        Fdc::write_register(&fdc, 3, 5); // data register: target track
        Fdc::write_register(&fdc, 0, 0x10); // Seek, step rate 0

        let step_ticks = 6 * TICK_RATE / 1000; // STEP_RATES_MS[0] == 6ms
        for i in 1..=6u64 {
            crate::event::pump(&events, step_ticks * i);
            if fdc.borrow().intrq() {
                break;
            }
        }

        assert!(fdc.borrow().intrq());
        assert_eq!(array.borrow().current_cylinder(), 5);
        assert_eq!(Fdc::read_register(&fdc, 1), 5);
    }
}

