//! The crate's single flat error type.
//!
//! Sector- and controller-level *recoverable* failures (CRC error,
//! record-not-found, lost data) are not represented here — those are
//! carried as status-register bits by the FDC, matching real WD279x
//! behavior. `VdiskError` is for operations with no status-bit
//! representation: geometry/track programming and container codecs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VdiskError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("bad geometry: {cylinders} cylinders x {heads} heads")]
    BadGeometry { cylinders: u16, heads: u8 },

    #[error("too many sectors requested: {requested} (max {max})")]
    TooManySectors { requested: u8, max: u8 },

    #[error("track missing at cylinder {cylinder}, head {head}")]
    TrackMissing { cylinder: u16, head: u8 },

    #[error("sector not found: cylinder {cylinder}, head {head}, sector {sector}")]
    SectorNotFound { cylinder: u16, head: u8, sector: u8 },

    #[error("no IDAM found on track")]
    IdamNotFound,

    #[error("no data address mark found after IDAM")]
    DamNotFound,

    #[error("bad sector size requested: {requested} bytes")]
    BadSectorSize { requested: usize },

    #[error("malformed IDAM record")]
    BadIdam,

    #[error("bad sector-size code: {0}")]
    BadSsizeCode(u8),

    #[error("IDAM CRC error")]
    IdamCrc,

    #[error("data field CRC error")]
    DataCrc,

    #[error("bad magic number in container header")]
    BadMagic,

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("mixed-density images cannot be saved in this format")]
    MixedDensityUnsupported,

    #[error("compressed images are not supported")]
    CompressionUnsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    BinRw(#[from] binrw::Error),
}

pub type VdiskResult<T> = Result<T, VdiskError>;
