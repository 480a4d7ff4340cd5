use crate::address::UnitIndex;
use crate::message::{FirmwareVersion, Reply, CELLS_PER_BLOCK};

/// Number of cells monitored by one BMS-12 unit.
pub const CELL_COUNT: usize = 12;

/// The last known state of one BMS-12 unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    /// Which unit this is
    pub unit: UnitIndex,
    /// Shunt level in mV sent with each query. 0 disables shunting
    pub shunt_mv: u16,
    /// The voltage of each cell in mV
    pub cell_mv: [u16; CELL_COUNT],
    /// The two temperature sensors in °C
    pub temperature_c: [i16; 2],
    /// Firmware version, once the unit has acknowledged a version request
    pub version: Option<FirmwareVersion>,
}

impl Telemetry {
    pub fn new(unit: UnitIndex, shunt_mv: u16) -> Self {
        Self {
            unit,
            shunt_mv,
            cell_mv: [0; CELL_COUNT],
            temperature_c: [0; 2],
            version: None,
        }
    }

    /// Sum of all cell voltages in mV
    pub fn pack_mv(&self) -> u32 {
        self.cell_mv.iter().map(|&mv| u32::from(mv)).sum()
    }

    pub(crate) fn apply(&mut self, reply: Reply) {
        match reply {
            Reply::Cells { offset, mv } => {
                self.cell_mv[offset..offset + CELLS_PER_BLOCK].copy_from_slice(&mv);
            }
            Reply::Temperatures(t) => self.temperature_c = t,
            Reply::Version(v) => self.version = Some(v),
        }
    }
}

#[test]
fn test_apply_cell_block_leaves_neighbours() {
    let mut telemetry = Telemetry::new(UnitIndex::new(0).unwrap(), 0);
    telemetry.cell_mv = [7; CELL_COUNT];
    telemetry.apply(Reply::Cells { offset: 4, mv: [1, 2, 3, 4] });
    assert_eq!(telemetry.cell_mv, [7, 7, 7, 7, 1, 2, 3, 4, 7, 7, 7, 7]);
}

#[test]
fn test_pack_mv() {
    let mut telemetry = Telemetry::new(UnitIndex::new(0).unwrap(), 0);
    telemetry.cell_mv = [3300; CELL_COUNT];
    assert_eq!(telemetry.pack_mv(), 39_600);
}
