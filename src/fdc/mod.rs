//! WD279x floppy disk controller (§4.H) — the design centerpiece.
//!
//! A cycle-driven, 25-state execution engine. Per §5, `accept_command`
//! commits and returns; every other state either falls straight
//! through to the next (zero delay) or schedules a continuation event
//! and returns to the cooperative event loop. The state enum and the
//! per-state `goto`-replacement loop follow the design note in §9
//! ("tagged enum `State`... loop that repeatedly advances while the
//! next step is zero-delay").

mod commands;
mod states;

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, warn};

use crate::crc::Crc16;
use crate::drive::{DriveArrayRef, DriveSignalSink, DriveSignals};
use crate::event::EventQueueRef;

pub use states::State;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        const BUSY             = 0b0000_0001;
        const INDEX_OR_DRQ     = 0b0000_0010;
        const TRACK0_OR_LOST   = 0b0000_0100;
        const CRC_ERROR        = 0b0000_1000;
        const SEEK_OR_RNF      = 0b0001_0000;
        const RECORD_TYPE      = 0b0010_0000;
        const WRITE_PROTECT    = 0b0100_0000;
        const NOT_READY        = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ForceInterruptEnables: u8 {
        const NOT_READY_TO_READY = 0b0001;
        const READY_TO_NOT_READY = 0b0010;
        const INDEX_PULSE        = 0b0100;
        const IMMEDIATE          = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CommandType {
    I,
    II,
    III,
    IV,
}

/// Flags decoded from the command register's low nibble. Which of
/// these apply depends on `CommandType` (§4.H "Command register
/// decoding").
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandFlags {
    pub step_rate_index: u8,
    pub verify: bool,
    pub update_track_register: bool,
    pub head_settle: bool,
    pub side_select: Option<u8>,
    pub multiple_sectors: bool,
    pub deleted_dam: bool,
}

pub type FdcRef = Rc<RefCell<Fdc>>;

pub struct Fdc {
    drive: DriveArrayRef,
    events: EventQueueRef,
    tick_rate: u64,

    status: StatusFlags,
    command: u8,
    command_type: CommandType,
    flags: CommandFlags,
    state: State,

    track_register: u8,
    sector_register: u8,
    data_register: u8,

    drq: bool,
    intrq: bool,
    force_enables: ForceInterruptEnables,

    crc: Crc16,
    bytes_left: usize,
    dam_byte: u8,
    index_count: u32,
    settle_applied: bool,
    pending_event: Option<crate::event::EventId>,
    /// Direction latched by `set_dirc` for the plain Step command
    /// (§4.H: "Step... uses latched direction").
    latched_direction: i8,
    /// Sector-size code of the IDAM most recently matched by `type2_2`,
    /// consumed by `read_sector_1`/`write_sector_3` to size the data field.
    located_ssize_code: u8,

    drive_signals: DriveSignals,

    /// 2791/2795-style data-bus inversion; `0x00` for plain 179x parts.
    data_xor_mask: u8,
}

const BYTE_TIME_DENOM: u64 = 31_250;

fn ms_to_ticks(tick_rate: u64, ms: u64) -> u64 {
    (tick_rate * ms) / 1000
}

const STEP_RATES_MS: [u64; 4] = [6, 12, 20, 30];
const HEAD_SETTLE_MS: u64 = 15;
const FORCED_WRITE_DELAY_MS: u64 = 30;

impl Fdc {
    pub fn new(drive: DriveArrayRef, events: EventQueueRef, tick_rate: u64) -> FdcRef {
        Rc::new(RefCell::new(Fdc {
            drive,
            events,
            tick_rate,
            status: StatusFlags::empty(),
            command: 0,
            command_type: CommandType::I,
            flags: CommandFlags::default(),
            state: State::AcceptCommand,
            track_register: 0,
            sector_register: 0,
            data_register: 0,
            drq: false,
            intrq: false,
            force_enables: ForceInterruptEnables::empty(),
            crc: Crc16::new(),
            bytes_left: 0,
            dam_byte: 0xFB,
            index_count: 0,
            settle_applied: false,
            pending_event: None,
            latched_direction: 1,
            located_ssize_code: 1,
            drive_signals: DriveSignals::empty(),
            data_xor_mask: 0,
        }))
    }

    pub fn with_data_inversion(mut self, mask: u8) -> Self {
        self.data_xor_mask = mask;
        self
    }

    /// Mirror the host's DDEN line onto the drive (§6 "Controller ↔
    /// drive": the real WD279x has no density pin of its own, the
    /// machine's glue logic drives DDEN into both the controller and
    /// the drive together). Must be set before issuing a command on a
    /// double-density disk, or the IDAM scan will find nothing.
    pub fn set_dden(fdc: &FdcRef, dden: bool) {
        let drive = fdc.borrow().drive.clone();
        drive.borrow_mut().set_dden(dden);
    }

    fn byte_time(&self) -> u64 {
        self.tick_rate / BYTE_TIME_DENOM
    }

    // -- Host-facing data bus (§4.H "Data bus semantics") ------------------

    pub fn read_register(fdc: &FdcRef, addr: u8) -> u8 {
        let mut this = fdc.borrow_mut();
        let value = match addr & 0x03 {
            0 => this.read_status(),
            1 => this.track_register,
            2 => this.sector_register,
            3 => {
                this.drq = false;
                this.data_register
            }
            _ => unreachable!(),
        };
        value ^ this.data_xor_mask
    }

    pub fn write_register(fdc: &FdcRef, addr: u8, value: u8) {
        let value = value ^ fdc.borrow().data_xor_mask;
        match addr & 0x03 {
            0 => commands::accept_command(fdc, value),
            1 => fdc.borrow_mut().track_register = value,
            2 => fdc.borrow_mut().sector_register = value,
            3 => {
                let mut this = fdc.borrow_mut();
                this.data_register = value;
                this.drq = false;
            }
            _ => unreachable!(),
        }
    }

    fn read_status(&mut self) -> u8 {
        let mut status = self.status;
        status.set(StatusFlags::NOT_READY, !self.drive_signals.contains(DriveSignals::READY));
        if matches!(self.command_type, CommandType::I) {
            status.set(StatusFlags::TRACK0_OR_LOST, self.drive_signals.contains(DriveSignals::TRACK0));
            status.set(StatusFlags::INDEX_OR_DRQ, self.drive_signals.contains(DriveSignals::INDEX));
        } else {
            status.set(StatusFlags::INDEX_OR_DRQ, self.drq);
        }
        status.bits()
    }

    pub fn drq(&self) -> bool {
        self.drq
    }

    pub fn intrq(&self) -> bool {
        self.intrq
    }

    fn raise_intrq(&mut self) {
        self.intrq = true;
        self.status.remove(StatusFlags::BUSY);
    }

    fn raise_drq(&mut self) {
        if self.drq {
            self.status.insert(StatusFlags::TRACK0_OR_LOST);
            warn!("FDC overrun: DRQ still set when next byte was ready");
        }
        self.drq = true;
    }

    fn schedule(fdc: &FdcRef, delay_ticks: u64, next: State) {
        let mut this = fdc.borrow_mut();
        this.state = next;
        let at = this.events.borrow().current_tick() + delay_ticks;
        let fdc_clone = fdc.clone();
        let id = this.events.borrow_mut().queue(at, move || {
            commands::run(&fdc_clone);
        });
        this.pending_event = Some(id);
    }

    /// Cancel any pending continuation (§5 "writing a force-interrupt
    /// command dequeues any pending FDC state event").
    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending_event.take() {
            self.events.borrow_mut().cancel(id);
        }
    }
}

impl DriveSignalSink for Fdc {
    fn on_signals_changed(&mut self, signals: DriveSignals) {
        let became_ready = !self.drive_signals.contains(DriveSignals::READY) && signals.contains(DriveSignals::READY);
        let became_not_ready = self.drive_signals.contains(DriveSignals::READY) && !signals.contains(DriveSignals::READY);
        let index_rose = !self.drive_signals.contains(DriveSignals::INDEX) && signals.contains(DriveSignals::INDEX);
        self.drive_signals = signals;

        if self.force_enables.contains(ForceInterruptEnables::NOT_READY_TO_READY) && became_ready {
            debug!("forced-interrupt: not-ready -> ready");
            self.raise_intrq();
        }
        if self.force_enables.contains(ForceInterruptEnables::READY_TO_NOT_READY) && became_not_ready {
            debug!("forced-interrupt: ready -> not-ready");
            self.raise_intrq();
        }
        if self.force_enables.contains(ForceInterruptEnables::INDEX_PULSE) && index_rose {
            debug!("forced-interrupt: index pulse");
            self.raise_intrq();
        }
    }
}
