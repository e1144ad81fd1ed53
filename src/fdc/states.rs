//! The 25-state execution engine (§4.H "Execution states").

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum State {
    AcceptCommand,
    Type1_1,
    Type1_2,
    Type1_3,
    VerifyTrack1,
    VerifyTrack2,
    Type2_1,
    Type2_2,
    ReadSector1,
    ReadSector2,
    ReadSector3,
    WriteSector1,
    WriteSector2,
    WriteSector3,
    WriteSector4,
    WriteSector5,
    WriteSector6,
    Type3_1,
    ReadAddress1,
    ReadAddress2,
    ReadAddress3,
    WriteTrack1,
    WriteTrack2,
    WriteTrack2b,
    WriteTrack3,
}
