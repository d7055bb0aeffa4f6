//! The control surface a higher-level debug protocol server drives —
//! attach/detach, halt/resume/step, reset, register and memory access, and
//! the breakwatch entry points, filling in a generic target vtable.

use std::fmt;

use crate::dtm::{Dtm, DtmOptions};
use crate::error::RiscvError;
use crate::jtag::JtagAccess;
use crate::registers::{gdb_index_to_target, RegisterTarget, CSR_DCSR, REGS_SIZE, TDESC_RV32};
use crate::stubs;
use crate::trigger::{self, Breakwatch, BreakwatchKind};

/// Why the hart is (or isn't) halted, decoded from `dcsr.cause` (§4.4).
///
/// Added as a standalone `Display`-able type rather than kept internal to
/// `halt_poll` (§A.5) so a caller building a "why did we stop" message
/// doesn't have to re-derive it from a raw cause code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Running,
    Breakpoint,
    Request,
    Stepping,
    Error,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaltReason::Running => "running",
            HaltReason::Breakpoint => "breakpoint",
            HaltReason::Request => "halt request",
            HaltReason::Stepping => "single-step",
            HaltReason::Error => "undefined halt cause",
        };
        f.write_str(s)
    }
}

fn decode_cause(cause: u32) -> HaltReason {
    match cause {
        0 => HaltReason::Running,
        1 | 2 => HaltReason::Breakpoint,
        3 | 5 => HaltReason::Request,
        4 => HaltReason::Stepping,
        _ => HaltReason::Error,
    }
}

/// Name this driver fills in on the generic target vtable (§6).
pub const DRIVER_NAME: &str = "RISC-V";

/// The RISC-V target control surface.
///
/// Owns the [`Dtm`] link for the duration of attachment (§9: "a faithful
/// rewrite should make the DTM state an owned value inside the target
/// façade", which this does directly rather than copying a heap buffer
/// around).
pub struct RiscvTarget {
    dtm: Dtm,
}

impl RiscvTarget {
    /// Driver name for the generic target vtable.
    pub fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Size in bytes of the `regs` blob this driver reports (33 × 4 bytes).
    pub fn regs_size(&self) -> usize {
        REGS_SIZE
    }

    /// Static GDB target-description XML.
    pub fn tdesc(&self) -> &'static str {
        TDESC_RV32
    }

    /// Scan the hart, validate the protocol-refusal conditions, and request
    /// a halt. Per §4.4, halt is observed indirectly — this call does not
    /// block waiting for `halt_poll` to confirm it.
    pub fn attach(probe: Box<dyn JtagAccess>, options: DtmOptions) -> Result<Self, RiscvError> {
        let mut dtm = Dtm::new(probe, options)?;
        stubs::halt(&mut dtm)?;
        dtm.set_halt_requested(true);
        Ok(RiscvTarget { dtm })
    }

    /// Resume without stepping and give up the DTM state.
    pub fn detach(mut self) -> Result<(), RiscvError> {
        self.halt_resume(false)
    }

    /// Execute the halt stub and record that this driver requested it.
    pub fn halt_request(&mut self) -> Result<(), RiscvError> {
        stubs::halt(&mut self.dtm)?;
        self.dtm.set_halt_requested(true);
        Ok(())
    }

    /// Patch and execute the resume stub; clears the driver-originated halt
    /// flag regardless of `step`.
    pub fn halt_resume(&mut self, step: bool) -> Result<(), RiscvError> {
        stubs::resume(&mut self.dtm, step)?;
        self.dtm.set_halt_requested(false);
        Ok(())
    }

    /// Decode the hart's current halt state (§4.4).
    ///
    /// Per §9, `halt_requested` is authoritative for the initial transition
    /// because `HALTNOT` can lag the halt-request stub by several
    /// transactions: a `false` `halt_requested` with `HALTNOT` clear is
    /// trusted as `RUNNING` without even looking at `dcsr`.
    pub fn halt_poll(&mut self) -> Result<HaltReason, RiscvError> {
        let dmcontrol = self.dtm.read_dmcontrol()?;
        let haltnot = (dmcontrol >> 32) & 1 != 0;
        if !self.dtm.halt_requested() && !haltnot {
            return Ok(HaltReason::Running);
        }
        let dcsr = stubs::csr_read(&mut self.dtm, CSR_DCSR)?;
        let cause = (dcsr >> 6) & 7;
        let reason = decode_cause(cause);
        if reason == HaltReason::Error {
            tracing::warn!(cause, "halt_poll: dcsr.cause is undefined");
        }
        Ok(reason)
    }

    /// `dcsr.ndmreset` reset, via CSR write.
    pub fn reset(&mut self) -> Result<(), RiscvError> {
        stubs::reset(&mut self.dtm)
    }

    /// Read a register by GDB `rv32` index (§4.4).
    pub fn reg_read(&mut self, index: u32) -> Result<u32, RiscvError> {
        match gdb_index_to_target(index) {
            Some(RegisterTarget::HardZero) => Ok(0),
            Some(RegisterTarget::Gpr(rx)) => stubs::gpreg_read(&mut self.dtm, rx),
            Some(RegisterTarget::DscratchShadow) => {
                stubs::csr_read(&mut self.dtm, crate::registers::CSR_DSCRATCH)
            }
            Some(RegisterTarget::DramsizeShadow) => {
                let addr = self.dtm.dramsize() as u32;
                Ok(self.dtm.read(addr)? as u32)
            }
            Some(RegisterTarget::Dpc) => stubs::csr_read(&mut self.dtm, crate::registers::CSR_DPC),
            Some(RegisterTarget::Csr(csr)) => stubs::csr_read(&mut self.dtm, csr),
            None => Err(RiscvError::InvalidRegisterIndex(index)),
        }
    }

    /// Write a register by GDB `rv32` index.
    pub fn regs_write(&mut self, index: u32, value: u32) -> Result<(), RiscvError> {
        match gdb_index_to_target(index) {
            Some(RegisterTarget::HardZero) => Ok(()),
            Some(RegisterTarget::Gpr(rx)) => stubs::gpreg_write(&mut self.dtm, rx, value),
            Some(RegisterTarget::DscratchShadow) => {
                stubs::csr_write(&mut self.dtm, crate::registers::CSR_DSCRATCH, value)
            }
            Some(RegisterTarget::DramsizeShadow) => {
                let addr = self.dtm.dramsize() as u32;
                self.dtm.write(addr, value as u64)
            }
            Some(RegisterTarget::Dpc) => stubs::csr_write(&mut self.dtm, crate::registers::CSR_DPC, value),
            Some(RegisterTarget::Csr(csr)) => stubs::csr_write(&mut self.dtm, csr, value),
            None => Err(RiscvError::InvalidRegisterIndex(index)),
        }
    }

    /// Read `len` bytes of target memory starting at `src` into `dest`.
    /// Both `src` and `len` must be 4-byte aligned (§4.4).
    pub fn mem_read(&mut self, dest: &mut [u8], src: u32, len: u32) -> Result<(), RiscvError> {
        check_aligned(src, len)?;
        for (i, chunk) in dest[..len as usize].chunks_mut(4).enumerate() {
            let word = stubs::mem_read32(&mut self.dtm, src + (i as u32) * 4)?;
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Write `len` bytes of target memory starting at `dest`.
    pub fn mem_write(&mut self, dest: u32, src: &[u8], len: u32) -> Result<(), RiscvError> {
        check_aligned(dest, len)?;
        for (i, chunk) in src[..len as usize].chunks(4).enumerate() {
            let word = u32::from_le_bytes(chunk.try_into().expect("4-byte aligned chunk"));
            stubs::mem_write32(&mut self.dtm, dest + (i as u32) * 4, word)?;
        }
        Ok(())
    }

    /// Allocate and configure a hardware breakpoint/watchpoint (§4.5).
    pub fn breakwatch_set(&mut self, addr: u32, kind: BreakwatchKind) -> Result<Breakwatch, RiscvError> {
        trigger::breakwatch_set(&mut self.dtm, addr, kind)
    }

    /// Release a previously allocated breakpoint/watchpoint.
    pub fn breakwatch_clear(&mut self, bw: &Breakwatch) -> Result<(), RiscvError> {
        trigger::breakwatch_clear(&mut self.dtm, bw)
    }

    /// If the sticky bus error is set, issue a DBUS reset, clear it, and
    /// return `true`; otherwise return `false` (§4.4).
    pub fn check_error(&mut self) -> Result<bool, RiscvError> {
        self.dtm.check_error()
    }
}

fn check_aligned(addr: u32, len: u32) -> Result<(), RiscvError> {
    if addr % 4 != 0 || len % 4 != 0 {
        return Err(RiscvError::MisalignedAccess { address: addr, len });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn halt_reason_decode_table() {
        assert_eq!(decode_cause(0), HaltReason::Running);
        assert_eq!(decode_cause(1), HaltReason::Breakpoint);
        assert_eq!(decode_cause(2), HaltReason::Breakpoint);
        assert_eq!(decode_cause(3), HaltReason::Request);
        assert_eq!(decode_cause(4), HaltReason::Stepping);
        assert_eq!(decode_cause(5), HaltReason::Request);
        assert_eq!(decode_cause(6), HaltReason::Error);
        assert_eq!(decode_cause(7), HaltReason::Error);
    }

    #[test]
    fn misaligned_access_is_rejected() {
        assert!(matches!(
            check_aligned(0x1001, 4),
            Err(RiscvError::MisalignedAccess { .. })
        ));
        assert!(matches!(
            check_aligned(0x1000, 3),
            Err(RiscvError::MisalignedAccess { .. })
        ));
        assert!(check_aligned(0x1000, 4).is_ok());
    }
}
