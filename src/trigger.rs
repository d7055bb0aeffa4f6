//! Trigger Module (§4.5): hardware breakpoint/watchpoint allocation.
//!
//! Hardware triggers are the only way this architecture stops on an
//! instruction fetch or data access without single-stepping through it; the
//! allocator below walks the hart's `tselect` indices looking for a free
//! `mcontrol`-typed slot, exactly mirroring how the executor-based register
//! stubs stand in for what a real RISC-V core would otherwise expose
//! through dedicated debug registers.

use crate::error::RiscvError;
use crate::registers::{CSR_MCONTROL, CSR_TDATA2, CSR_TSELECT};
use crate::stubs::{csr_read, csr_write};
use crate::dtm::Dtm;

const MCONTROL_TYPE_SHIFT: u32 = 28;
const MCONTROL_TYPE_MASK: u32 = 0xf << MCONTROL_TYPE_SHIFT;
const MCONTROL_TYPE_MATCH: u32 = 2 << MCONTROL_TYPE_SHIFT;

const MCONTROL_DMODE: u32 = 1 << 27;
const MCONTROL_ACTION_DEBUG: u32 = 1 << 12;
/// Bits 6:3 — load/store/execute/u-mode/etc enable bits. A slot is free
/// when its type is `match` (2) and none of these are set.
const MCONTROL_ENABLE_MASK: u32 = 0xf << 3;

const MCONTROL_EXECUTE: u32 = 1 << 2;
const MCONTROL_STORE: u32 = 1 << 1;
const MCONTROL_LOAD: u32 = 1 << 0;

/// The kind of access a breakwatch stops on, inferred from the generic
/// request (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakwatchKind {
    Execute,
    Load,
    Store,
    LoadStore,
}

impl BreakwatchKind {
    fn mcontrol_bits(self) -> u32 {
        match self {
            BreakwatchKind::Execute => MCONTROL_EXECUTE,
            BreakwatchKind::Load => MCONTROL_LOAD,
            BreakwatchKind::Store => MCONTROL_STORE,
            BreakwatchKind::LoadStore => MCONTROL_LOAD | MCONTROL_STORE,
        }
    }
}

/// An installed trigger: which `tselect` index it occupies and what kind it
/// is watching.
#[derive(Debug, Clone, Copy)]
pub struct Breakwatch {
    index: u32,
    kind: BreakwatchKind,
}

impl Breakwatch {
    pub fn kind(&self) -> BreakwatchKind {
        self.kind
    }
}

fn read_tselect(dtm: &mut Dtm) -> Result<u32, RiscvError> {
    csr_read(dtm, CSR_TSELECT)
}

fn write_tselect(dtm: &mut Dtm, index: u32) -> Result<(), RiscvError> {
    csr_write(dtm, CSR_TSELECT, index)
}

/// Find the smallest free trigger slot and configure it to watch `addr` for
/// accesses of `kind` (§4.5, §8 "Trigger allocator").
pub fn breakwatch_set(
    dtm: &mut Dtm,
    addr: u32,
    kind: BreakwatchKind,
) -> Result<Breakwatch, RiscvError> {
    let saved_tselect = read_tselect(dtm)?;

    let mut found = None;
    let mut i = 0u32;
    loop {
        write_tselect(dtm, i)?;
        let readback = read_tselect(dtm)?;
        if readback != i {
            // Hart has no slot `i`; stop scanning.
            break;
        }
        let tdata1 = csr_read(dtm, CSR_MCONTROL)?;
        let ty = tdata1 & MCONTROL_TYPE_MASK;
        if ty == 0 {
            break;
        }
        if ty == MCONTROL_TYPE_MATCH && (tdata1 & MCONTROL_ENABLE_MASK) == 0 {
            found = Some(i);
            break;
        }
        i += 1;
    }

    let Some(index) = found else {
        write_tselect(dtm, saved_tselect)?;
        return Err(RiscvError::NoFreeTrigger);
    };

    write_tselect(dtm, index)?;
    let mcontrol = MCONTROL_DMODE | MCONTROL_ACTION_DEBUG | MCONTROL_ENABLE_MASK | kind.mcontrol_bits();
    csr_write(dtm, CSR_MCONTROL, mcontrol)?;
    csr_write(dtm, CSR_TDATA2, addr)?;

    write_tselect(dtm, saved_tselect)?;

    tracing::debug!(index, ?kind, addr, "allocated trigger");
    Ok(Breakwatch { index, kind })
}

/// Release a previously allocated trigger by zeroing its `mcontrol`.
pub fn breakwatch_clear(dtm: &mut Dtm, bw: &Breakwatch) -> Result<(), RiscvError> {
    let saved_tselect = read_tselect(dtm)?;
    write_tselect(dtm, bw.index)?;
    csr_write(dtm, CSR_MCONTROL, 0)?;
    write_tselect(dtm, saved_tselect)?;
    tracing::debug!(index = bw.index, "released trigger");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn execute_trigger_mcontrol_value_matches_catalog_formula() {
        // §8 Scenario 4's formula, not its (arithmetically inconsistent)
        // literal worked value — see DESIGN.md.
        let mcontrol =
            MCONTROL_DMODE | MCONTROL_ACTION_DEBUG | MCONTROL_ENABLE_MASK | BreakwatchKind::Execute.mcontrol_bits();
        assert_eq!(mcontrol, 0x0800_107c);
    }
}
